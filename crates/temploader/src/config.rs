//! Loader configuration

use crate::error::{ConfigError, StoreResult};
use crate::path::LogicalPath;
use crate::resolver::MissingLeafHook;
use crate::store::{DocumentStore, Handle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// MIME type used when uploading the default template
pub const DEFAULT_TEMPLATE_MIME_TYPE: &str = "text/plain";

/// Site (group) that owns the template library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,

    /// Create the site when it does not exist
    #[serde(default)]
    pub create: bool,
}

/// Template copied into the template folder when that folder is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultTemplate {
    /// Document name, e.g. `view.ftl`
    pub name: String,
    pub content: Vec<u8>,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_mime_type() -> String {
    DEFAULT_TEMPLATE_MIME_TYPE.to_string()
}

impl DefaultTemplate {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            mime_type: default_mime_type(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Load the default template from a file; the file name becomes the document name
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ConfigError::invalid("default_template", format!("{} has no file name", path.display())))?;
        let content = std::fs::read(path)
            .map_err(|e| ConfigError::invalid("default_template", format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(name, content))
    }
}

#[async_trait]
impl MissingLeafHook for DefaultTemplate {
    async fn seed(&self, store: &dyn DocumentStore, folder: &Handle) -> StoreResult<()> {
        info!("Seeding default template {} into {}", self.name, folder.name);
        store
            .create_document(&folder.id, &self.content, &self.mime_type, &self.name)
            .await?;
        Ok(())
    }
}

/// What happens to the cached template folder id after a lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderCachePolicy {
    /// Drop the folder id at the end of every lookup; only the site id survives
    #[default]
    EvictAfterLookup,
    /// Keep the folder id for later lookups
    Retain,
}

/// Immutable loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub site: Option<SiteConfig>,
    pub template_folder_path: LogicalPath,
    #[serde(default)]
    pub create_folder: bool,
    pub default_template: Option<DefaultTemplate>,
    #[serde(default)]
    pub folder_cache: FolderCachePolicy,
}

impl LoaderConfig {
    pub fn builder(template_folder_path: impl Into<String>) -> LoaderConfigBuilder {
        LoaderConfigBuilder::new(template_folder_path)
    }

    /// Load configuration from environment variables
    ///
    /// Reads `TEMPLOADER_FOLDER_PATH` (required), `TEMPLOADER_CREATE_FOLDER`,
    /// `TEMPLOADER_SITE_NAME`, `TEMPLOADER_CREATE_SITE`,
    /// `TEMPLOADER_DEFAULT_TEMPLATE` (path to a file) and
    /// `TEMPLOADER_RETAIN_FOLDER_ID`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let folder_path = lookup("TEMPLOADER_FOLDER_PATH")
            .ok_or_else(|| ConfigError::missing("TEMPLOADER_FOLDER_PATH"))?;

        let mut builder = LoaderConfigBuilder::new(folder_path)
            .create_folder(parse_flag(&lookup, "TEMPLOADER_CREATE_FOLDER")?)
            .retain_folder_id(parse_flag(&lookup, "TEMPLOADER_RETAIN_FOLDER_ID")?);

        if let Some(site_name) = lookup("TEMPLOADER_SITE_NAME") {
            builder = builder.site(site_name, parse_flag(&lookup, "TEMPLOADER_CREATE_SITE")?);
        }

        if let Some(template_path) = lookup("TEMPLOADER_DEFAULT_TEMPLATE") {
            builder = builder.default_template(DefaultTemplate::from_file(template_path)?);
        }

        builder.build()
    }

    pub fn create_site(&self) -> bool {
        self.site.as_ref().is_some_and(|site| site.create)
    }

    /// Check the invariants a loader relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(site) = &self.site {
            if site.name.trim().is_empty() {
                return Err(ConfigError::invalid("site_name", "must not be empty"));
            }
        }

        if self.default_template.is_none() {
            if self.create_folder {
                return Err(ConfigError::DefaultTemplateRequired {
                    flag: "create_folder".into(),
                });
            }
            if self.create_site() {
                return Err(ConfigError::DefaultTemplateRequired {
                    flag: "create_site".into(),
                });
            }
        }

        if let Some(template) = &self.default_template {
            if template.name.is_empty() || template.name.contains('/') {
                return Err(ConfigError::invalid(
                    "default_template",
                    format!("invalid document name '{}'", template.name),
                ));
            }
        }

        Ok(())
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(false),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(ConfigError::invalid(key, format!("expected a boolean, got '{}'", other))),
        },
    }
}

/// Builder for [`LoaderConfig`]
#[derive(Debug, Clone)]
pub struct LoaderConfigBuilder {
    template_folder_path: String,
    site: Option<SiteConfig>,
    create_folder: bool,
    default_template: Option<DefaultTemplate>,
    folder_cache: FolderCachePolicy,
}

impl LoaderConfigBuilder {
    pub fn new(template_folder_path: impl Into<String>) -> Self {
        Self {
            template_folder_path: template_folder_path.into(),
            site: None,
            create_folder: false,
            default_template: None,
            folder_cache: FolderCachePolicy::default(),
        }
    }

    pub fn site(mut self, name: impl Into<String>, create: bool) -> Self {
        self.site = Some(SiteConfig {
            name: name.into(),
            create,
        });
        self
    }

    pub fn create_folder(mut self, create: bool) -> Self {
        self.create_folder = create;
        self
    }

    pub fn default_template(mut self, template: DefaultTemplate) -> Self {
        self.default_template = Some(template);
        self
    }

    pub fn retain_folder_id(mut self, retain: bool) -> Self {
        self.folder_cache = if retain {
            FolderCachePolicy::Retain
        } else {
            FolderCachePolicy::EvictAfterLookup
        };
        self
    }

    pub fn build(self) -> Result<LoaderConfig, ConfigError> {
        let config = LoaderConfig {
            site: self.site,
            template_folder_path: LogicalPath::parse(&self.template_folder_path)?,
            create_folder: self.create_folder,
            default_template: self.default_template,
            folder_cache: self.folder_cache,
        };
        config.validate()?;
        Ok(config)
    }
}
