use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A file the server still holds for the current session, offered as a
/// remediation when the requested one is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Main error type for the BOQ table editor
#[derive(Error, Debug)]
pub enum BoqError {
    #[error("Container not found: {container}")]
    MissingTarget { container: String },

    #[error("Upstream resource not found: {message}")]
    UpstreamNotFound {
        message: String,
        available_files: Vec<AvailableFile>,
    },

    #[error("Upstream rejected request: {message}")]
    UpstreamBadRequest {
        message: String,
        details: Option<String>,
        hint: Option<String>,
        available_keys: Vec<String>,
    },

    #[error("Upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("No table found in fragment")]
    NoTable,

    #[error("Table {index} has no discoverable header row")]
    StructuralDegeneracy { index: usize },

    #[error("Row {row} not found in table {table}")]
    RowNotFound { table: usize, row: usize },

    #[error("Cell ({row}, {col}) not found in table {table}")]
    CellNotFound { table: usize, row: usize, col: usize },

    #[error("No pristine snapshot captured for file {file_id}")]
    NoSnapshot { file_id: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File I/O error: {path}")]
    FileIO {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}

impl BoqError {
    pub fn missing_target(container: impl Into<String>) -> Self {
        Self::MissingTarget {
            container: container.into(),
        }
    }

    pub fn file_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileIO {
            path: path.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Whether the user can fix the situation without reloading the page
    pub fn is_recoverable(&self) -> bool {
        match self {
            BoqError::MissingTarget { .. } => false,
            BoqError::StructuralDegeneracy { .. } => false,
            BoqError::Configuration { .. } => false,
            BoqError::UpstreamNotFound { .. } => true,
            BoqError::UpstreamBadRequest { .. } => true,
            _ => true,
        }
    }

    /// Short remediation text shown under the diagnostic
    pub fn user_message(&self) -> String {
        match self {
            BoqError::MissingTarget { container } => {
                format!("The page is missing the '{}' area. Reload the page and try again.", container)
            }
            BoqError::UpstreamNotFound { available_files, .. } => {
                if available_files.is_empty() {
                    "The file is no longer available in this session. Upload it again.".to_string()
                } else {
                    "The file is no longer available in this session. Pick one of the files below or upload it again.".to_string()
                }
            }
            BoqError::UpstreamBadRequest { hint, .. } => hint.clone().unwrap_or_else(|| {
                "No tables were found to stitch. Run the extraction again and check the document contains tables.".to_string()
            }),
            BoqError::NoTable => {
                "The stitched result did not contain a table. Try extracting again.".to_string()
            }
            BoqError::StructuralDegeneracy { .. } => {
                "The stitched table has no header row and cannot be edited.".to_string()
            }
            BoqError::NoSnapshot { .. } => {
                "There is no original copy of this table to reset to.".to_string()
            }
            BoqError::Http(_) => "Could not reach the server. Check your connection and retry.".to_string(),
            _ => "Something went wrong. Check the logs for details.".to_string(),
        }
    }
}

/// Result type alias for convenience
pub type BoqResult<T> = Result<T, BoqError>;

/// Error context for I/O style failures
pub trait ErrorContext<T> {
    fn with_path(self, path: &std::path::Path) -> BoqResult<T>;
}

impl<T> ErrorContext<T> for Result<T, std::io::Error> {
    fn with_path(self, path: &std::path::Path) -> BoqResult<T> {
        self.map_err(|e| BoqError::file_io(path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(!BoqError::missing_target("stitched-table").is_recoverable());
        assert!(BoqError::UpstreamNotFound {
            message: "File not found".into(),
            available_files: vec![],
        }
        .is_recoverable());
    }

    #[test]
    fn test_bad_request_prefers_server_hint() {
        let err = BoqError::UpstreamBadRequest {
            message: "No tables found to stitch".into(),
            details: None,
            hint: Some("Re-run extraction".into()),
            available_keys: vec![],
        };
        assert_eq!(err.user_message(), "Re-run extraction");
    }
}
