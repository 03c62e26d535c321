// Internal utilities for documentation tests
// This file contains helpers that generate small synthetic WFDB databases

use std::fs;
use std::path::Path;

use crate::database::RECORDS_FILE;
use crate::{RecordWriter, Result, SignalSpec};

/// Labels used by [`create_test_database`], in class order.
pub const TEST_LABELS: [&str; 2] = ["Healthy control", "Myocardial infarction"];

/// Creates a 3-lead (i, ii, v1) record with PTB-style header comments.
///
/// Leads are 1.2 Hz sine waves sampled at 1 kHz. Infarction records get a
/// larger amplitude on a raised baseline, so their samples never overlap
/// with control records.
pub fn create_test_record<P: AsRef<Path>>(
    dir: P,
    record_name: &str,
    label: &str,
    samples: usize,
) -> Result<()> {
    let mut writer = RecordWriter::create(&dir, record_name)?;
    writer.set_sampling_frequency(1000.0)?;

    let data_file = writer.data_file_name();
    for lead in ["i", "ii", "v1"] {
        writer.add_signal(SignalSpec::new(&data_file, lead, 2000.0, "mV"))?;
    }

    writer.add_comment("age: 60");
    writer.add_comment("sex: male");
    writer.add_comment(&format!("Reason for admission: {}", label));

    let (amplitude, offset) = if label == TEST_LABELS[1] {
        (1.5, 2.5)
    } else {
        (0.5, 0.0)
    };
    let leads: Vec<Vec<f64>> = (0..3)
        .map(|lead| {
            (0..samples)
                .map(|t| {
                    let phase = 2.0 * std::f64::consts::PI * 1.2 * t as f64 / 1000.0;
                    offset + amplitude * (phase + lead as f64).sin()
                })
                .collect()
        })
        .collect();

    writer.write_samples(&leads)?;
    writer.finalize()
}

/// Creates a database with `patients_per_label` patients for each of
/// [`TEST_LABELS`], `records_per_patient` records each, and a `RECORDS`
/// index. Returns the record names in index order.
pub fn create_test_database<P: AsRef<Path>>(
    dir: P,
    patients_per_label: usize,
    records_per_patient: usize,
    samples: usize,
) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut names = Vec::new();
    let mut patient = 0;
    for label in TEST_LABELS {
        for _ in 0..patients_per_label {
            patient += 1;
            for r in 0..records_per_patient {
                let name = format!("patient{:03}/s{:04}_re", patient, patient * 10 + r);
                create_test_record(dir, &name, label, samples)?;
                names.push(name);
            }
        }
    }

    fs::write(dir.join(RECORDS_FILE), names.join("\n") + "\n")?;
    Ok(names)
}
