use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EcgError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid header {path}: {reason}")]
    InvalidHeader { path: String, reason: String },

    #[error("Unsupported signal format: {0}")]
    UnsupportedFormat(u16),

    #[error("Record {record} has no '{key}' comment")]
    MissingAnnotation { record: String, key: String },

    #[error("Label '{0}' is not in the label map")]
    UnknownLabel(String),

    #[error("Record {record} has no channel '{channel}'")]
    MissingChannel { record: String, channel: String },

    #[error("Record {record}: expected {expected} samples, got {actual}")]
    ShapeMismatch {
        record: String,
        expected: usize,
        actual: usize,
    },

    #[error("{what}: expected length {expected}, got {actual}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Label '{0}' does not appear in the catalog")]
    LabelNotInCatalog(String),

    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Record-level aggregation needs exactly 2 classes, got {0}")]
    UnsupportedClassCount(usize),

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

pub type Result<T> = std::result::Result<T, EcgError>;
