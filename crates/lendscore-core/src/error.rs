//! Error types for loading, validation, assembly and inference.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Failure while loading the model artifact or its preprocessing metadata.
///
/// All variants are configuration errors: they are reported once at startup
/// and surface as "model not loaded" for every request afterwards.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("artifact not found: {}", .path.display())]
    ArtifactNotFound { path: PathBuf },

    #[error("artifact {} is corrupt: {reason}", .path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("failed to read artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("model slot already initialized")]
    AlreadyInitialized,
}

/// The kind of constraint a field violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    InvalidType,
    OutOfRange,
    NotAllowed,
    InvalidFormat,
    UnknownCategory,
}

/// One offending field in a rejected request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Position of the request inside a batch, `None` for single requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            index: None,
            field: field.into(),
            kind,
            message: message.into(),
        }
    }

    /// Tag this violation with its batch position.
    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.index {
            write!(f, "[{}].", index)?;
        }
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A request rejected by the validator or the assembler.
///
/// Always carries every violation found, never only the first one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{} invalid field(s): {}", .violations.len(), join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Field names cited by this error, in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    /// Tag every violation with a batch position.
    pub fn at(self, index: usize) -> Self {
        Self {
            violations: self.violations.into_iter().map(|v| v.at(index)).collect(),
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A categorical value absent from the trained category table.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownCategory {
    pub field: String,
    pub value: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}' for field '{}'", self.value, self.field)?;
        if let Some(ref s) = self.suggestion {
            write!(f, "; did you mean '{}'?", s)?;
        }
        Ok(())
    }
}

/// Failure while turning a validated request into a feature vector.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssembleError {
    #[error("{}", join_unknown(.0))]
    UnknownCategories(Vec<UnknownCategory>),
}

fn join_unknown(unknown: &[UnknownCategory]) -> String {
    unknown
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<AssembleError> for ValidationError {
    fn from(err: AssembleError) -> Self {
        match err {
            AssembleError::UnknownCategories(unknown) => ValidationError::new(
                unknown
                    .iter()
                    .map(|u| Violation::new(&u.field, ViolationKind::UnknownCategory, u.to_string()))
                    .collect(),
            ),
        }
    }
}

/// Failure at the inference boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("feature vector has {actual} values but the model expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("batch of {size} requests exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("model produced a non-finite score for this input")]
    NonFiniteScore,
}

/// Any per-request failure of the prediction service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl From<AssembleError> for ServeError {
    fn from(err: AssembleError) -> Self {
        ServeError::Validation(err.into())
    }
}

/// Result type for artifact loading.
pub type LoadResult<T> = Result<T, LoadError>;
