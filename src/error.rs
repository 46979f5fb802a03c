use thiserror::Error;

/// Failures that end an entity stream.
///
/// Malformed snaks and claims never surface here; readers log and drop them.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read dump input")]
    Io(#[from] std::io::Error),
    #[error("failed to parse XML dump")]
    Xml(#[from] quick_xml::Error),
    #[error("failed to read tabular input")]
    Csv(#[from] csv::Error),
    #[error("reading was cancelled")]
    Cancelled,
}

impl ReadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReadError::Cancelled)
    }
}

/// Why a single snak was rejected during normalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnakError {
    #[error("property id {0:?} is not a positive P-number")]
    InvalidProperty(String),
    #[error("value snak without datatype")]
    MissingDatatype,
    #[error("unknown datatype {0:?}")]
    UnknownDatatype(String),
    #[error("datatype marked bad")]
    BadDatatype,
    #[error("unknown entity type {found:?}, expected {expected:?}")]
    EntityTypeMismatch { expected: &'static str, found: String },
    #[error("missing field {0:?}")]
    MissingField(&'static str),
    #[error("value for datatype {0:?} has an unexpected shape")]
    UnexpectedValue(&'static str),
}
