//! Error types for the temploader library
//!
//! Errors are organized by domain: faults raised by a document store,
//! configuration problems detected at construction time, and failures while
//! decoding template content. Expected absence (missing site, folder or
//! template) is never an error; it surfaces as `None`.

use thiserror::Error;

/// Main error type for the temploader library
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fault reported by the document store backend
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Template content could not be decoded with the requested encoding
    #[error("Encoding error: {encoding} - {reason}")]
    Encoding { encoding: String, reason: String },
}

/// Faults raised by a document store
///
/// Lookups that find nothing return `Ok(None)` instead of one of these.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object is not a folder: {0}")]
    NotAFolder(String),

    #[error("Object is not a document: {0}")]
    NotADocument(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Access denied: {0}")]
    Unauthorized(String),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors detected when a loader is built
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting: {setting}")]
    Missing { setting: String },

    #[error("Invalid template folder path '{path}': {reason}")]
    InvalidFolderPath { path: String, reason: String },

    #[error("Invalid configuration: {setting} - {reason}")]
    Invalid { setting: String, reason: String },

    #[error("A default template is required when {flag} is enabled")]
    DefaultTemplateRequired { flag: String },
}

/// Shorthand result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Shorthand result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl ConfigError {
    pub fn missing(setting: &str) -> Self {
        Self::Missing {
            setting: setting.to_string(),
        }
    }

    pub fn invalid(setting: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            setting: setting.to_string(),
            reason: reason.into(),
        }
    }
}

impl StoreError {
    /// Whether the error means the backend could not be reached or refused us,
    /// as opposed to a problem with a single object
    pub fn is_backend_fault(&self) -> bool {
        matches!(
            self,
            StoreError::Backend(_) | StoreError::Io(_) | StoreError::Unauthorized(_)
        )
    }
}
