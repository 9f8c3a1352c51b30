//! The loader contract a templating engine calls, and its store-backed implementation

use crate::backend::TemplateStoreBackend;
use crate::cache::{CacheKey, ResolutionCache};
use crate::config::{FolderCachePolicy, LoaderConfig};
use crate::error::{Result, StoreResult};
use crate::reader::TemplateReader;
use crate::resolver::{MissingLeafHook, PathResolver, Resolution};
use crate::store::{Handle, ObjectId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A template found by [`TemplateLoader::find_template_source`]
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSource {
    handle: Handle,
}

impl TemplateSource {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    pub fn id(&self) -> &ObjectId {
        &self.handle.id
    }
}

/// Callback interface a templating engine uses to fetch template sources
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    /// Find the template called `name`; `None` if it does not exist
    async fn find_template_source(&self, name: &str) -> Result<Option<TemplateSource>>;

    /// Last modification time in milliseconds since the Unix epoch
    fn last_modified(&self, source: &TemplateSource) -> i64;

    /// Open the template content, decoded with `encoding`
    async fn reader(&self, source: &TemplateSource, encoding: &str) -> Result<TemplateReader>;

    /// Release a template source
    fn close_template_source(&self, source: TemplateSource);
}

/// Loads templates from a folder in a document store
///
/// A lookup resolves the backend's template root (site), then the configured
/// folder path below it, then the template by name inside that folder. Each
/// step that finds nothing ends the lookup with `Ok(None)`.
pub struct StoreTemplateLoader {
    backend: Arc<dyn TemplateStoreBackend>,
    cache: Arc<ResolutionCache>,
    config: LoaderConfig,
}

impl std::fmt::Debug for StoreTemplateLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTemplateLoader")
            .field("backend", &self.backend.kind())
            .field("config", &self.config)
            .finish()
    }
}

impl StoreTemplateLoader {
    /// Create a loader; fails if the configuration does not fit the backend
    pub fn new(
        backend: Arc<dyn TemplateStoreBackend>,
        cache: Arc<ResolutionCache>,
        config: LoaderConfig,
    ) -> Result<Self> {
        config.validate()?;
        backend.check_config(&config)?;
        Ok(Self {
            backend,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Absolute path of a template relative to the template root
    pub fn template_path(&self, name: &str) -> String {
        self.config.template_folder_path.child(name)
    }

    /// Resolve the template folder without creating anything
    async fn existing_template_folder(&self) -> StoreResult<Option<ObjectId>> {
        let Some(root) = self.backend.template_root(&self.config, &self.cache).await? else {
            return Ok(None);
        };
        let resolution = PathResolver::new(self.backend.store())
            .resolve(&root, &self.config.template_folder_path, false, None)
            .await?;
        Ok(resolution.found().map(|folder| folder.id))
    }

    /// Delete one template from the template folder; missing templates are ignored
    pub async fn remove_template(&self, name: &str) -> Result<bool> {
        let Some(folder) = self.existing_template_folder().await? else {
            return Ok(false);
        };
        let store = self.backend.store();
        match store.find_child(&folder, name).await? {
            Some(doc) if doc.is_document() => {
                store.delete_subtree(&doc.id).await?;
                info!("Removed template {}", self.template_path(name));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Delete the terminal template folder with everything in it
    pub async fn remove_template_folder(&self) -> Result<bool> {
        let removed = match self.existing_template_folder().await? {
            Some(folder) => {
                self.backend.store().delete_subtree(&folder).await?;
                info!("Removed template folder {}", self.config.template_folder_path.to_absolute());
                true
            }
            None => false,
        };
        self.cache.remove(CacheKey::TemplateFolderId);
        Ok(removed)
    }

    async fn template_folder(&self, root: &ObjectId) -> StoreResult<Option<ObjectId>> {
        let hook = self
            .config
            .default_template
            .as_ref()
            .map(|template| template as &dyn MissingLeafHook);

        self.cache
            .get_or_resolve(CacheKey::TemplateFolderId, || async move {
                let resolution = PathResolver::new(self.backend.store())
                    .resolve(
                        root,
                        &self.config.template_folder_path,
                        self.config.create_folder,
                        hook,
                    )
                    .await?;
                Ok(match resolution {
                    Resolution::Found(folder) => Some(folder.id),
                    Resolution::Missing(_) => None,
                })
            })
            .await
    }

    async fn lookup(&self, name: &str) -> StoreResult<Option<TemplateSource>> {
        let Some(root) = self.backend.template_root(&self.config, &self.cache).await? else {
            return Ok(None);
        };

        let Some(folder) = self.template_folder(&root).await? else {
            return Ok(None);
        };

        match self.backend.store().find_child(&folder, name).await? {
            Some(handle) if handle.is_document() => Ok(Some(TemplateSource::new(handle))),
            Some(_) => {
                debug!("{} is a folder, not a template", self.template_path(name));
                Ok(None)
            }
            None => {
                debug!("No template named {}, trying next", name);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TemplateLoader for StoreTemplateLoader {
    async fn find_template_source(&self, name: &str) -> Result<Option<TemplateSource>> {
        let result = self.lookup(name).await;

        if self.config.folder_cache == FolderCachePolicy::EvictAfterLookup {
            self.cache.remove(CacheKey::TemplateFolderId);
        }

        match result {
            Ok(source) => Ok(source),
            Err(e) => {
                error!("Lookup of template {} failed: {}", name, e);
                Err(e.into())
            }
        }
    }

    fn last_modified(&self, source: &TemplateSource) -> i64 {
        source.handle().last_modified_millis()
    }

    async fn reader(&self, source: &TemplateSource, encoding: &str) -> Result<TemplateReader> {
        let content = self.backend.store().read_content(source.id()).await?;
        TemplateReader::decode(&content, encoding)
    }

    fn close_template_source(&self, _source: TemplateSource) {
        // Handles own no store resources
    }
}
