//! Error types for vocabulary conversion

use std::path::PathBuf;
use thiserror::Error;

use crate::validate::ValidationReport;

#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Failed to parse {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Validation failed with {summary}:\n{0}", summary = .0.summary())]
    Validation(ValidationReport),

    #[error("Unexpected entry {path}: {reason}")]
    Structure { path: PathBuf, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cycle detected in hierarchy between: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("No top concept found: every concept declares a parent within the scheme")]
    NoTopConcept,

    #[error("Failed to process workbook {path}: {reason}")]
    Workbook { path: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Forbidden removal of {} concepts/collections detected: {}", .0.len(), .0.join(", "))]
    RemovedEntities(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VocabError {
    pub(crate) fn parse(source_name: impl Into<String>, reason: impl ToString) -> Self {
        VocabError::Parse {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn structure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        VocabError::Structure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn workbook(path: impl ToString, reason: impl ToString) -> Self {
        VocabError::Workbook {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while loading or checking the vocabulary configuration.
///
/// These are fatal before any conversion starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Overlapping ID ranges {first} and {second}")]
    Overlap { first: String, second: String },

    #[error("Missing mandatory field \"{field}\" for vocabulary \"{vocab}\"")]
    MissingField { vocab: String, field: String },

    #[error("Invalid value for \"{field}\" in vocabulary \"{vocab}\": {reason}")]
    InvalidField {
        vocab: String,
        field: String,
        reason: String,
    },

    #[error("Inconsistent config: \"single_vocab\" is true but {0} vocabularies are found")]
    SingleVocab(usize),

    #[error("Vocabulary \"{0}\" is not declared in the configuration")]
    UnknownVocab(String),
}

impl ConfigError {
    pub(crate) fn invalid(vocab: &str, field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            vocab: vocab.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = VocabError> = std::result::Result<T, E>;
