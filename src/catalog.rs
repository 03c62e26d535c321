use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::{EcgError, Result};
use crate::label::LabelMap;

/// Header comment key holding the diagnosis in the PTB database.
pub const REASON_FOR_ADMISSION: &str = "Reason for admission";

/// One row of the record catalog. Holds metadata only, never signal data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub record_name: String,
    pub patient_id: String,
    pub label: String,
    pub signal_length: usize,
}

/// What to do with a record whose header lacks the label comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingLabelPolicy {
    /// Abort catalog construction.
    #[default]
    Error,
    /// Leave the record out of the catalog and log a warning.
    Skip,
}

/// Per-record metadata index of a database.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    channel_names: Vec<String>,
}

/// Patient id of a path-like record name: everything before the first `/`.
///
/// ```rust
/// use ecgwin::catalog::patient_id;
///
/// assert_eq!(patient_id("patient001/s0010_re"), "patient001");
/// assert_eq!(patient_id("s0010_re"), "s0010_re");
/// ```
pub fn patient_id(record_name: &str) -> &str {
    record_name.split('/').next().unwrap_or(record_name)
}

/// Splits `key:value` comment lines into a map.
///
/// The value is the text between the first and second `:`; lines without a
/// `:` are ignored and a repeated key keeps its last value.
pub fn comments_to_map(comments: &[String]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for comment in comments {
        let mut parts = comment.split(':');
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

/// Extracts the diagnostic label of `record_name` from its header comments.
///
/// The value under [`REASON_FOR_ADMISSION`] keeps everything after its first
/// character, which in PTB headers is the blank following the colon.
///
/// ```rust
/// use ecgwin::catalog::label_from_comments;
///
/// let comments = vec![
///     "age: 81".to_string(),
///     "Reason for admission: Myocardial infarction".to_string(),
/// ];
/// let label = label_from_comments("patient001/s0010_re", &comments)?;
/// assert_eq!(label, "Myocardial infarction");
/// # Ok::<(), ecgwin::EcgError>(())
/// ```
pub fn label_from_comments(record_name: &str, comments: &[String]) -> Result<String> {
    let map = comments_to_map(comments);
    let value = map
        .get(REASON_FOR_ADMISSION)
        .ok_or_else(|| EcgError::MissingAnnotation {
            record: record_name.to_string(),
            key: REASON_FOR_ADMISSION.to_string(),
        })?;

    let mut chars = value.chars();
    chars.next();
    Ok(chars.as_str().to_string())
}

/// Builds the catalog for `record_names` by reading each record's header.
///
/// Channel names are taken from the first cataloged record; records with a
/// different channel list are kept but logged.
pub fn build_catalog(
    db: &Database,
    record_names: &[String],
    policy: MissingLabelPolicy,
) -> Result<Catalog> {
    let mut entries = Vec::with_capacity(record_names.len());
    let mut channel_names: Option<Vec<String>> = None;

    for name in record_names {
        let reader = db.open_record(name)?;

        let label = match label_from_comments(name, reader.comments()) {
            Ok(label) => label,
            Err(EcgError::MissingAnnotation { record, key })
                if policy == MissingLabelPolicy::Skip =>
            {
                log::warn!("skipping {}: no '{}' comment", record, key);
                continue;
            }
            Err(e) => return Err(e),
        };

        let channels = reader.channel_names();
        match &channel_names {
            None => channel_names = Some(channels),
            Some(expected) if expected != &channels => {
                log::warn!(
                    "{}: channels {:?} differ from {:?}",
                    name,
                    channels,
                    expected
                );
            }
            Some(_) => {}
        }

        let entry = CatalogEntry {
            record_name: name.clone(),
            patient_id: patient_id(name).to_string(),
            label,
            signal_length: reader.signal_length()?,
        };
        log::debug!(
            "{}: patient {}, '{}', {} samples",
            entry.record_name,
            entry.patient_id,
            entry.label,
            entry.signal_length
        );
        entries.push(entry);
    }

    log::info!("cataloged {} of {} records", entries.len(), record_names.len());

    Ok(Catalog {
        entries,
        channel_names: channel_names.unwrap_or_default(),
    })
}

impl Catalog {
    pub fn from_entries(entries: Vec<CatalogEntry>, channel_names: Vec<String>) -> Self {
        Catalog {
            entries,
            channel_names,
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// Distinct labels in order of first appearance.
    pub fn labels(&self) -> Vec<String> {
        self.label_counts().into_iter().map(|(l, _)| l).collect()
    }

    /// Records per label, in order of first appearance.
    pub fn label_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for entry in &self.entries {
            match counts.iter_mut().find(|(l, _)| l == &entry.label) {
                Some((_, n)) => *n += 1,
                None => counts.push((entry.label.clone(), 1)),
            }
        }
        counts
    }

    /// Distinct patients having at least one record with `label`, in order
    /// of first appearance.
    pub fn patients_with_label(&self, label: &str) -> Vec<String> {
        let mut patients: Vec<String> = Vec::new();
        for entry in self.entries.iter().filter(|e| e.label == label) {
            if !patients.contains(&entry.patient_id) {
                patients.push(entry.patient_id.clone());
            }
        }
        patients
    }

    /// Records of `patients` whose label is in `label_map`.
    ///
    /// Grouped in the order of `patients`; within a patient, catalog order.
    pub fn records_for_patients(
        &self,
        patients: &[String],
        label_map: &LabelMap,
    ) -> Vec<CatalogEntry> {
        patients
            .iter()
            .flat_map(|patient| {
                self.entries
                    .iter()
                    .filter(move |e| &e.patient_id == patient && label_map.contains(&e.label))
            })
            .cloned()
            .collect()
    }
}
