//! Logical folder paths inside a document store

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An ordered, non-empty sequence of folder names, root to leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalPath {
    segments: Vec<String>,
}

impl LogicalPath {
    /// Parse a slash-separated folder path such as `templates/email`
    ///
    /// Leading and trailing slashes are ignored. Empty interior segments and
    /// the relative names `.` and `..` are rejected.
    pub fn parse(path: &str) -> Result<Self, ConfigError> {
        let trimmed = path.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(invalid(path, "path has no folder segments"));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            match segment {
                "" => return Err(invalid(path, "path contains an empty segment")),
                "." | ".." => {
                    return Err(invalid(path, "relative segments are not allowed"));
                }
                s if s.contains('\\') => {
                    return Err(invalid(path, "segments may not contain '\\'"));
                }
                s => segments.push(s.to_string()),
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of the terminal folder
    pub fn leaf(&self) -> &str {
        // parse() guarantees at least one segment
        &self.segments[self.segments.len() - 1]
    }

    /// Absolute form, e.g. `/templates/email`
    pub fn to_absolute(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Absolute path of the first `depth` segments
    pub fn prefix(&self, depth: usize) -> String {
        let depth = depth.min(self.segments.len());
        format!("/{}", self.segments[..depth].join("/"))
    }

    /// Absolute path of a document named `name` inside the terminal folder
    pub fn child(&self, name: &str) -> String {
        format!("{}/{}", self.to_absolute(), name)
    }
}

fn invalid(path: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidFolderPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for LogicalPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LogicalPath {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LogicalPath> for String {
    fn from(path: LogicalPath) -> Self {
        path.to_string()
    }
}
