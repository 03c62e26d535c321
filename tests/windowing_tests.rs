use ecgwin::catalog::build_catalog;
use ecgwin::doctest_utils::{create_test_database, create_test_record};
use ecgwin::{
    build_dataset, sample_weights, Database, EcgError, LabelMap, MissingLabelPolicy,
    RecordReader,
};
use ndarray::s;
use std::fs;
use std::path::{Path, PathBuf};

const WINDOW: usize = 256;

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ecgwin_windowing_{}", name));
    cleanup_test_dir(&dir);
    dir
}

// 清理测试目录的辅助函数
fn cleanup_test_dir(dir: &Path) {
    if dir.exists() {
        fs::remove_dir_all(dir).ok();
    }
}

fn two_classes() -> LabelMap {
    LabelMap::new(["Healthy control", "Myocardial infarction"]).unwrap()
}

#[test]
fn test_end_to_end_window_shapes() {
    let dir = test_dir("shapes");
    // 每类 2 个病人，每人 1 条记录，每条 3 个窗口
    create_test_database(&dir, 2, 1, 3 * WINDOW).unwrap();

    let db = Database::open(&dir).unwrap();
    let catalog =
        build_catalog(&db, &db.record_names().unwrap(), MissingLabelPolicy::Error).unwrap();
    let labels = two_classes();

    let dataset = build_dataset(
        catalog.entries(),
        &db,
        catalog.channel_names(),
        &labels,
        true,
        WINDOW,
    )
    .unwrap();

    assert_eq!(dataset.features.dim(), (12, 3, WINDOW));
    assert_eq!(dataset.labels.dim(), (12, 2));
    assert_eq!(dataset.class_counts(), vec![6, 6]);
    assert_eq!(dataset.record_ids.len(), 12);
    assert_eq!(dataset.record_ids[0], "patient001/s0010_re");
    assert_eq!(dataset.record_ids[11], "patient004/s0040_re");

    // 类别平衡时权重均为 0.5
    let weights = sample_weights(&dataset.labels);
    assert!(weights.iter().all(|&w| (w - 0.5).abs() < 1e-6));

    cleanup_test_dir(&dir);
}

#[test]
fn test_windows_match_record_samples() {
    let dir = test_dir("contents");
    create_test_database(&dir, 1, 1, 2 * WINDOW + 100).unwrap();

    let db = Database::open(&dir).unwrap();
    let catalog =
        build_catalog(&db, &db.record_names().unwrap(), MissingLabelPolicy::Error).unwrap();
    let dataset = build_dataset(
        catalog.entries(),
        &db,
        catalog.channel_names(),
        &two_classes(),
        false,
        WINDOW,
    )
    .unwrap();

    // 尾部不足一个窗口的 100 个样本被丢弃
    assert_eq!(dataset.len(), 4);
    assert!(dataset.record_ids.is_empty());

    let signal = RecordReader::open(&dir, "patient002/s0020_re")
        .unwrap()
        .read_physical()
        .unwrap();
    let expected = signal.slice(s![.., WINDOW..2 * WINDOW]).mapv(|v| v as f32);
    assert_eq!(dataset.features.slice(s![3, .., ..]), expected);
    assert_eq!(dataset.class_indices(), vec![0, 0, 1, 1]);

    cleanup_test_dir(&dir);
}

#[test]
fn test_channel_order_follows_request() {
    let dir = test_dir("channel_order");
    create_test_record(&dir, "patient001/s0001_re", "Healthy control", WINDOW).unwrap();
    fs::write(dir.join("RECORDS"), "patient001/s0001_re\n").unwrap();

    let db = Database::open(&dir).unwrap();
    let catalog =
        build_catalog(&db, &db.record_names().unwrap(), MissingLabelPolicy::Error).unwrap();
    let reversed = vec!["v1".to_string(), "i".to_string()];

    let dataset = build_dataset(
        catalog.entries(),
        &db,
        &reversed,
        &two_classes(),
        false,
        WINDOW,
    )
    .unwrap();
    assert_eq!(dataset.num_channels(), 2);

    let signal = RecordReader::open(&dir, "patient001/s0001_re")
        .unwrap()
        .read_physical()
        .unwrap();
    assert_eq!(dataset.features[[0, 0, 10]], signal[[2, 10]] as f32);
    assert_eq!(dataset.features[[0, 1, 10]], signal[[0, 10]] as f32);

    let missing = vec!["avr".to_string()];
    assert!(matches!(
        build_dataset(catalog.entries(), &db, &missing, &two_classes(), false, WINDOW),
        Err(EcgError::MissingChannel { .. })
    ));

    cleanup_test_dir(&dir);
}

#[test]
fn test_catalog_length_must_match_signal() {
    let dir = test_dir("length_mismatch");
    create_test_database(&dir, 1, 1, 2 * WINDOW).unwrap();

    let db = Database::open(&dir).unwrap();
    let catalog =
        build_catalog(&db, &db.record_names().unwrap(), MissingLabelPolicy::Error).unwrap();

    let mut entries = catalog.entries().to_vec();
    entries[0].signal_length = 4 * WINDOW;

    assert!(matches!(
        build_dataset(&entries, &db, catalog.channel_names(), &two_classes(), false, WINDOW),
        Err(EcgError::ShapeMismatch { .. })
    ));

    cleanup_test_dir(&dir);
}

#[test]
fn test_shuffle_is_seeded() {
    let dir = test_dir("shuffle");
    create_test_database(&dir, 2, 1, 4 * WINDOW).unwrap();

    let db = Database::open(&dir).unwrap();
    let catalog =
        build_catalog(&db, &db.record_names().unwrap(), MissingLabelPolicy::Error).unwrap();
    let build = || {
        build_dataset(
            catalog.entries(),
            &db,
            catalog.channel_names(),
            &two_classes(),
            true,
            WINDOW,
        )
        .unwrap()
    };

    let mut a = build();
    let mut b = build();
    a.shuffle(99);
    b.shuffle(99);
    assert_eq!(a.record_ids, b.record_ids);
    assert_eq!(a.features, b.features);
    assert_eq!(a.class_counts(), vec![8, 8]);

    cleanup_test_dir(&dir);
}
