use ecgwin::catalog::build_catalog;
use ecgwin::doctest_utils::create_test_database;
use ecgwin::split::split_patients;
use ecgwin::{Catalog, CatalogEntry, Database, LabelMap, MissingLabelPolicy};
use std::collections::HashSet;
use std::fs;

fn two_classes() -> LabelMap {
    LabelMap::new(["Healthy control", "Myocardial infarction"]).unwrap()
}

// 模拟 PTB 的规模：52 个健康对照病人，148 个心梗病人，另有其他诊断
fn ptb_like_catalog() -> Catalog {
    let mut entries = Vec::new();
    let groups = [
        ("Healthy control", 52),
        ("Myocardial infarction", 148),
        ("Cardiomyopathy", 15),
    ];
    let mut patient = 0;
    for (label, count) in groups {
        for _ in 0..count {
            patient += 1;
            for r in 0..(1 + patient % 3) {
                entries.push(CatalogEntry {
                    record_name: format!("patient{:03}/s{:04}_re", patient, patient * 10 + r),
                    patient_id: format!("patient{:03}", patient),
                    label: label.to_string(),
                    signal_length: 38400,
                });
            }
        }
    }
    Catalog::from_entries(entries, vec!["i".to_string(), "ii".to_string()])
}

#[test]
fn test_split_sizes_per_label() {
    let catalog = ptb_like_catalog();
    let split = split_patients(&catalog, &two_classes(), 0.2, 1337).unwrap();

    // ceil(52 × 0.2) + ceil(148 × 0.2)
    assert_eq!(split.test.len(), 11 + 30);
    assert_eq!(split.train.len(), 52 + 148 - 41);
}

#[test]
fn test_patients_never_straddle_sets() {
    let catalog = ptb_like_catalog();
    let labels = two_classes();
    let split = split_patients(&catalog, &labels, 0.2, 42).unwrap();

    let train: HashSet<&String> = split.train.iter().collect();
    let test: HashSet<&String> = split.test.iter().collect();
    assert!(train.is_disjoint(&test));

    let train_records = split.train_records(&catalog, &labels);
    let test_records = split.test_records(&catalog, &labels);
    assert!(train_records.iter().all(|e| train.contains(&e.patient_id)));
    assert!(test_records.iter().all(|e| test.contains(&e.patient_id)));

    // 未选中的诊断不会进入任何一边
    assert!(train_records
        .iter()
        .chain(&test_records)
        .all(|e| labels.contains(&e.label)));

    let selected = catalog
        .entries()
        .iter()
        .filter(|e| labels.contains(&e.label))
        .count();
    assert_eq!(train_records.len() + test_records.len(), selected);
}

#[test]
fn test_same_seed_same_split() {
    let catalog = ptb_like_catalog();
    let labels = two_classes();

    let first = split_patients(&catalog, &labels, 0.2, 2024).unwrap();
    let second = split_patients(&catalog, &labels, 0.2, 2024).unwrap();
    assert_eq!(first, second);

    let other = split_patients(&catalog, &labels, 0.2, 2025).unwrap();
    assert_ne!(first.test, other.test);
}

#[test]
fn test_extreme_fractions() {
    let catalog = ptb_like_catalog();
    let labels = two_classes();

    let none = split_patients(&catalog, &labels, 0.0, 1).unwrap();
    assert!(none.test.is_empty());
    assert_eq!(none.train.len(), 200);

    let all = split_patients(&catalog, &labels, 1.0, 1).unwrap();
    assert!(all.train.is_empty());
    assert_eq!(all.test.len(), 200);
}

#[test]
fn test_split_on_written_database() {
    let dir = std::env::temp_dir().join("ecgwin_split_database");
    fs::remove_dir_all(&dir).ok();
    create_test_database(&dir, 5, 2, 1024).unwrap();

    let db = Database::open(&dir).unwrap();
    let catalog =
        build_catalog(&db, &db.record_names().unwrap(), MissingLabelPolicy::Error).unwrap();
    let labels = two_classes();
    let split = split_patients(&catalog, &labels, 0.2, ecgwin::DEFAULT_SEED).unwrap();

    assert_eq!(split.test.len(), 2);
    assert_eq!(split.train.len(), 8);
    // 每个病人 2 条记录，整体进入同一边
    assert_eq!(split.test_records(&catalog, &labels).len(), 4);
    assert_eq!(split.train_records(&catalog, &labels).len(), 16);

    fs::remove_dir_all(&dir).ok();
}
