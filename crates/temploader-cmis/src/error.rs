//! Errors raised while talking to a CMIS repository

use serde::Deserialize;
use temploader::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmisError {
    /// Transport failure, timeout or undecodable body
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error response from the repository
    #[error("CMIS {exception} ({status}): {message}")]
    Service {
        status: u16,
        exception: String,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    Response(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error body returned by the browser binding
#[derive(Debug, Deserialize)]
struct ServiceException {
    exception: String,
    #[serde(default)]
    message: String,
}

impl CmisError {
    /// Build a service error from a non-success status and its body
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ServiceException>(body) {
            Ok(e) => CmisError::Service {
                status,
                exception: e.exception,
                message: e.message,
            },
            Err(_) => CmisError::Service {
                status,
                exception: exception_for_status(status).to_string(),
                message: body.trim().to_string(),
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CmisError::Service { status, .. } => Some(*status),
            CmisError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            CmisError::Service { status, exception, .. } => *status == 404 || exception == "objectNotFound",
            _ => false,
        }
    }

    /// Name collision on create
    pub fn is_conflict(&self) -> bool {
        match self {
            CmisError::Service { status, exception, .. } => {
                *status == 409 || exception == "contentAlreadyExists" || exception == "nameConstraintViolation"
            }
            _ => false,
        }
    }
}

fn exception_for_status(status: u16) -> &'static str {
    match status {
        400 => "invalidArgument",
        401 | 403 => "permissionDenied",
        404 => "objectNotFound",
        405 => "notSupported",
        409 => "contentAlreadyExists",
        _ => "runtime",
    }
}

impl From<CmisError> for StoreError {
    fn from(err: CmisError) -> Self {
        match err.status() {
            Some(401) | Some(403) => StoreError::Unauthorized(err.to_string()),
            _ if err.is_not_found() => StoreError::NotFound(err.to_string()),
            _ if err.is_conflict() => StoreError::AlreadyExists(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}
