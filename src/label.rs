use crate::catalog::Catalog;
use crate::error::{EcgError, Result};

/// Ordered bijection between selected diagnostic labels and class indices.
///
/// Class indices follow insertion order, so the first label is class 0.
///
/// ```rust
/// use ecgwin::LabelMap;
///
/// let map = LabelMap::new(["Healthy control", "Myocardial infarction"])?;
/// assert_eq!(map.index_of("Healthy control"), Some(0));
/// assert_eq!(map.index_of("Myocardial infarction"), Some(1));
/// assert_eq!(map.index_of("Cardiomyopathy"), None);
/// # Ok::<(), ecgwin::EcgError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    /// # Errors
    ///
    /// * `EcgError::DuplicateLabel` - A label is listed twice
    /// * `EcgError::InvalidConfig` - No labels given
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if out.contains(&label) {
                return Err(EcgError::DuplicateLabel(label));
            }
            out.push(label);
        }

        if out.is_empty() {
            return Err(EcgError::InvalidConfig("label set is empty".to_string()));
        }

        Ok(LabelMap { labels: out })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    /// Checks that every selected label occurs in `catalog`.
    ///
    /// Run before windowing so a typo in the label set fails immediately.
    pub fn validate_against(&self, catalog: &Catalog) -> Result<()> {
        for label in &self.labels {
            if !catalog.entries().iter().any(|e| &e.label == label) {
                return Err(EcgError::LabelNotInCatalog(label.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;

    #[test]
    fn test_duplicate_label_rejected() {
        let result = LabelMap::new(["Healthy control", "Healthy control"]);
        assert!(matches!(result, Err(EcgError::DuplicateLabel(_))));
    }

    #[test]
    fn test_empty_label_set_rejected() {
        let result = LabelMap::new(Vec::<String>::new());
        assert!(matches!(result, Err(EcgError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_against_catalog() {
        let catalog = Catalog::from_entries(
            vec![CatalogEntry {
                record_name: "patient001/s0001_re".to_string(),
                patient_id: "patient001".to_string(),
                label: "Healthy control".to_string(),
                signal_length: 4096,
            }],
            vec!["i".to_string()],
        );

        let ok = LabelMap::new(["Healthy control"]).unwrap();
        assert!(ok.validate_against(&catalog).is_ok());

        let missing = LabelMap::new(["Healthy control", "Myocardial infarction"]).unwrap();
        match missing.validate_against(&catalog) {
            Err(EcgError::LabelNotInCatalog(label)) => assert_eq!(label, "Myocardial infarction"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
