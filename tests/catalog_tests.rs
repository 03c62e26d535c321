use ecgwin::catalog::build_catalog;
use ecgwin::doctest_utils::{create_test_database, create_test_record};
use ecgwin::{
    Database, EcgError, LabelMap, MissingLabelPolicy, RecordReader, RecordWriter, SignalSpec,
};
use std::fs;
use std::path::{Path, PathBuf};

// 每个测试使用独立的临时目录
fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ecgwin_catalog_{}", name));
    cleanup_test_dir(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

// 清理测试目录的辅助函数
fn cleanup_test_dir(dir: &Path) {
    if dir.exists() {
        fs::remove_dir_all(dir).ok();
    }
}

fn write_records_file(dir: &Path, names: &[&str]) {
    fs::write(dir.join("RECORDS"), names.join("\n") + "\n").unwrap();
}

#[test]
fn test_catalog_of_synthetic_database() {
    let dir = test_dir("synthetic");
    let names = create_test_database(&dir, 2, 2, 4096).unwrap();
    assert_eq!(names.len(), 8);

    let db = Database::open(&dir).unwrap();
    assert_eq!(db.record_names().unwrap(), names);

    let catalog = build_catalog(&db, &names, MissingLabelPolicy::Error).unwrap();
    assert_eq!(catalog.len(), 8);
    assert_eq!(catalog.channel_names(), ["i", "ii", "v1"]);
    assert_eq!(
        catalog.label_counts(),
        vec![
            ("Healthy control".to_string(), 4),
            ("Myocardial infarction".to_string(), 4)
        ]
    );

    let first = &catalog.entries()[0];
    assert_eq!(first.record_name, "patient001/s0010_re");
    assert_eq!(first.patient_id, "patient001");
    assert_eq!(first.signal_length, 4096);

    assert_eq!(
        catalog.patients_with_label("Myocardial infarction"),
        vec!["patient003", "patient004"]
    );

    cleanup_test_dir(&dir);
}

#[test]
fn test_ptb_style_header() {
    let dir = test_dir("ptb_header");
    fs::create_dir_all(dir.join("patient104")).unwrap();

    // PTB 风格的头文件，无 .dat 文件时长度取自头部
    let header = "\
s0306lre 3 1000 38400
s0306lre.dat 16 2000 16 0 -489 -1035 0 i
s0306lre.dat 16 2000 16 0 -2 13838 0 ii
s0306lre.dat 16 2000 16 0 487 -3011 0 v1
# age: 66
# sex: male
# ECG date: 18/02/1992
# Reason for admission: Healthy control
# Acute infarction (localization): no
";
    fs::write(dir.join("patient104/s0306lre.hea"), header).unwrap();
    write_records_file(&dir, &["patient104/s0306lre"]);

    let db = Database::open(&dir).unwrap();
    let catalog = build_catalog(&db, &db.record_names().unwrap(), MissingLabelPolicy::Error)
        .unwrap();

    let entry = &catalog.entries()[0];
    assert_eq!(entry.patient_id, "patient104");
    assert_eq!(entry.label, "Healthy control");
    assert_eq!(entry.signal_length, 38400);

    let reader = RecordReader::open(&dir, "patient104/s0306lre").unwrap();
    assert_eq!(reader.comments()[2], "ECG date: 18/02/1992");
    assert_eq!(reader.header().sampling_frequency, 1000.0);

    cleanup_test_dir(&dir);
}

#[test]
fn test_missing_label_policy() {
    let dir = test_dir("missing_label");
    create_test_record(&dir, "patient001/s0001_re", "Healthy control", 1024).unwrap();

    // 没有 "Reason for admission" 注释的记录
    let mut writer = RecordWriter::create(&dir, "patient002/s0002_re").unwrap();
    let data_file = writer.data_file_name();
    for lead in ["i", "ii", "v1"] {
        writer
            .add_signal(SignalSpec::new(&data_file, lead, 2000.0, "mV"))
            .unwrap();
    }
    writer.add_comment("age: n/a");
    writer.write_samples(&vec![vec![0.0; 1024]; 3]).unwrap();
    writer.finalize().unwrap();

    write_records_file(&dir, &["patient001/s0001_re", "patient002/s0002_re"]);
    let db = Database::open(&dir).unwrap();
    let names = db.record_names().unwrap();

    match build_catalog(&db, &names, MissingLabelPolicy::Error) {
        Err(EcgError::MissingAnnotation { record, key }) => {
            assert_eq!(record, "patient002/s0002_re");
            assert_eq!(key, "Reason for admission");
        }
        other => panic!("expected MissingAnnotation, got {:?}", other.map(|c| c.len())),
    }

    let catalog = build_catalog(&db, &names, MissingLabelPolicy::Skip).unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.entries()[0].record_name, "patient001/s0001_re");

    cleanup_test_dir(&dir);
}

#[test]
fn test_label_missing_from_catalog_fails_early() {
    let dir = test_dir("label_check");
    create_test_database(&dir, 1, 1, 2048).unwrap();

    let db = Database::open(&dir).unwrap();
    let catalog =
        build_catalog(&db, &db.record_names().unwrap(), MissingLabelPolicy::Error).unwrap();

    let labels = LabelMap::new(["Healthy control", "Cardiomyopathy"]).unwrap();
    assert!(matches!(
        labels.validate_against(&catalog),
        Err(EcgError::LabelNotInCatalog(label)) if label == "Cardiomyopathy"
    ));

    cleanup_test_dir(&dir);
}

#[test]
fn test_missing_record_file() {
    let dir = test_dir("missing_record");
    write_records_file(&dir, &["patient009/s0099_re"]);

    let db = Database::open(&dir).unwrap();
    let result = build_catalog(&db, &db.record_names().unwrap(), MissingLabelPolicy::Skip);
    assert!(matches!(result, Err(EcgError::FileNotFound(_))));

    cleanup_test_dir(&dir);
}
