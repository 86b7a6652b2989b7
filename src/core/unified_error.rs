//! Unified error types for the embedding library

use std::fmt;

/// Unified error type for the library
#[derive(Debug)]
pub enum UnifiedError {
    /// Model loading or initialization error
    ModelLoad {
        model_path: String,
        source: String,
    },
    /// Configuration error
    Config {
        field: String,
        message: String,
    },
    /// Inference error
    Inference {
        operation: String,
        source: String,
    },
    /// Validation error
    Validation {
        field: String,
        expected: String,
        actual: String,
        context: Option<String>,
    },
    /// File not found
    FileNotFound {
        path: String,
    },
    /// Invalid JSON
    InvalidJson {
        path: String,
        source: String,
    },
}

impl fmt::Display for UnifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnifiedError::ModelLoad { model_path, source } => {
                write!(f, "Failed to load model from '{}': {}", model_path, source)
            }
            UnifiedError::Config { field, message } => {
                write!(f, "Configuration error for '{}': {}", field, message)
            }
            UnifiedError::Inference { operation, source } => {
                write!(f, "Inference error during '{}': {}", operation, source)
            }
            UnifiedError::Validation {
                field,
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Validation error for '{}': expected {}, got {}",
                    field, expected, actual
                )?;
                if let Some(context) = context {
                    write!(f, " ({})", context)?;
                }
                Ok(())
            }
            UnifiedError::FileNotFound { path } => {
                write!(f, "File not found: {}", path)
            }
            UnifiedError::InvalidJson { path, source } => {
                write!(f, "Invalid JSON in '{}': {}", path, source)
            }
        }
    }
}

impl std::error::Error for UnifiedError {}

/// Result type alias using UnifiedError
pub type UnifiedResult<T> = Result<T, UnifiedError>;

/// Fold a candle error into the unified type.
///
/// With a model path the failure is attributed to loading, otherwise to the
/// named inference operation.
pub fn from_candle_error(
    e: candle_core::Error,
    operation: &str,
    model_path: Option<&str>,
) -> UnifiedError {
    match model_path {
        Some(path) => UnifiedError::ModelLoad {
            model_path: path.to_string(),
            source: format!("{}: {}", operation, e),
        },
        None => UnifiedError::Inference {
            operation: operation.to_string(),
            source: e.to_string(),
        },
    }
}

/// Helper functions for creating errors
pub mod config_errors {
    use super::UnifiedError;

    pub fn config_error(field: &str, message: &str) -> UnifiedError {
        UnifiedError::Config {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn file_not_found(path: &str) -> UnifiedError {
        UnifiedError::FileNotFound {
            path: path.to_string(),
        }
    }

    pub fn invalid_json(path: &str, source: &str) -> UnifiedError {
        UnifiedError::InvalidJson {
            path: path.to_string(),
            source: source.to_string(),
        }
    }
}
