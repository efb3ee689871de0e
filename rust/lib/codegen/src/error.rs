use std::path::PathBuf;

use stencil_core::ServiceError;
use thiserror::Error;

use crate::registry::ArtifactKind;

/// Stable error codes for generation failures.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNSUPPORTED_BACKEND: &str = "UNSUPPORTED_BACKEND";
    pub const INVALID_MODEL_NAME: &str = "INVALID_MODEL_NAME";
    pub const ARTIFACT_EXISTS: &str = "ARTIFACT_EXISTS";
    pub const TEMPLATE_ERROR: &str = "TEMPLATE_ERROR";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const ENTRY_PROCEDURE_NOT_FOUND: &str = "ENTRY_PROCEDURE_NOT_FOUND";
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Every failure a generation request can surface.
///
/// The orchestrator stops at the first error and returns it unchanged.
#[derive(Error, Debug)]
pub enum GenError {
    /// Model, project or field missing, or an empty id.
    #[error("{0}")]
    NotFound(String),

    /// The model's storage backend has no registered templates.
    #[error("unsupported storage backend: {0}")]
    UnsupportedBackend(String),

    /// The normalized model name cannot be used as a module name.
    #[error("model name '{0}' is not a usable module name")]
    InvalidModelName(String),

    /// Protective overwrite refusal. Pass `force` to regenerate.
    #[error("{kind} for model '{model}' already exists: {}", .path.display())]
    ArtifactExists {
        kind: ArtifactKind,
        model: String,
        path: PathBuf,
    },

    /// Malformed template or render-time mismatch.
    #[error("template '{template}': {message}")]
    Template { template: String, message: String },

    /// The entry file is not valid source.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("entry procedure '{name}' not found in {}", .path.display())]
    EntryProcedureNotFound { name: String, path: PathBuf },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata store failure other than a missing row.
    #[error(transparent)]
    Store(ServiceError),
}

impl GenError {
    pub fn error_code(&self) -> &'static str {
        match self {
            GenError::NotFound(_) => error_code::NOT_FOUND,
            GenError::UnsupportedBackend(_) => error_code::UNSUPPORTED_BACKEND,
            GenError::InvalidModelName(_) => error_code::INVALID_MODEL_NAME,
            GenError::ArtifactExists { .. } => error_code::ARTIFACT_EXISTS,
            GenError::Template { .. } => error_code::TEMPLATE_ERROR,
            GenError::Parse { .. } => error_code::PARSE_ERROR,
            GenError::EntryProcedureNotFound { .. } => error_code::ENTRY_PROCEDURE_NOT_FOUND,
            GenError::Io { .. } => error_code::IO_ERROR,
            GenError::Store(e) => e.error_code(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn template(template: &str, message: impl std::fmt::Display) -> Self {
        GenError::Template {
            template: template.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<ServiceError> for GenError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound(msg) => GenError::NotFound(msg),
            other => GenError::Store(other),
        }
    }
}
