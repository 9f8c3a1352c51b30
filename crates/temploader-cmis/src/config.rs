//! Connection settings for a CMIS repository

use crate::error::CmisError;
use std::fmt;
use std::time::Duration;

/// Locale sent as `Accept-Language` unless configured otherwise
pub const DEFAULT_LOCALE: &str = "sv-SE";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, PartialEq)]
pub struct CmisConfig {
    /// Browser binding service URL
    pub url: String,
    pub repository_id: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub locale: String,
    /// Deadline for each request
    pub timeout: Duration,
}

impl fmt::Debug for CmisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmisConfig")
            .field("url", &self.url)
            .field("repository_id", &self.repository_id)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("locale", &self.locale)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CmisConfig {
    pub fn new(url: impl Into<String>, repository_id: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            repository_id: repository_id.into(),
            user: None,
            password: None,
            locale: DEFAULT_LOCALE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load settings from `CMIS_*` environment variables
    pub fn from_env() -> Result<Self, CmisError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CmisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| CmisError::Config(format!("{} environment variable not set", key)))
        };

        let mut config = Self::new(required("CMIS_URL")?, required("CMIS_REPOSITORY_ID")?);

        if let Some(user) = lookup("CMIS_USER").filter(|u| !u.is_empty()) {
            config = config.with_credentials(user, lookup("CMIS_PASSWORD").unwrap_or_default());
        }

        if let Some(locale) = lookup("CMIS_LOCALE").filter(|l| !l.trim().is_empty()) {
            config.locale = locale.trim().to_string();
        }

        if let Some(seconds) = lookup("CMIS_TIMEOUT_SECONDS") {
            let seconds: u64 = seconds
                .trim()
                .parse()
                .map_err(|_| CmisError::Config("Invalid CMIS_TIMEOUT_SECONDS value".to_string()))?;
            config.timeout = Duration::from_secs(seconds);
        }

        Ok(config)
    }
}
