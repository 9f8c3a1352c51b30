//! Where a loader's template folder path starts
//!
//! Both variants share the same [`StoreTemplateLoader`](crate::StoreTemplateLoader);
//! they differ only in how the root folder of the template path is found.

use crate::cache::{CacheKey, ResolutionCache};
use crate::config::{LoaderConfig, SiteConfig};
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::store::{DocumentStore, ObjectId, SiteDirectory};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// A document store plus the rule for locating the template root in it
#[async_trait]
pub trait TemplateStoreBackend: Send + Sync {
    fn store(&self) -> &dyn DocumentStore;

    /// Short name used in log output
    fn kind(&self) -> &'static str;

    /// Reject configurations this backend cannot serve
    fn check_config(&self, config: &LoaderConfig) -> Result<(), ConfigError>;

    /// Folder the template folder path is resolved from
    ///
    /// `None` means the root does not exist and was not created.
    async fn template_root(&self, config: &LoaderConfig, cache: &ResolutionCache) -> StoreResult<Option<ObjectId>>;
}

/// Templates below the repository root of a store
pub struct RepositoryBackend<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> RepositoryBackend<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DocumentStore + 'static> TemplateStoreBackend for RepositoryBackend<S> {
    fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    fn kind(&self) -> &'static str {
        "repository"
    }

    fn check_config(&self, config: &LoaderConfig) -> Result<(), ConfigError> {
        if config.site.is_some() {
            return Err(ConfigError::invalid(
                "site_name",
                "the repository backend has no sites",
            ));
        }
        Ok(())
    }

    async fn template_root(&self, _config: &LoaderConfig, _cache: &ResolutionCache) -> StoreResult<Option<ObjectId>> {
        self.store.root_id().await.map(Some)
    }
}

/// Templates below the library root of a named site
pub struct SiteBackend<S> {
    store: Arc<S>,
}

impl<S: DocumentStore + SiteDirectory> SiteBackend<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn lookup_site(&self, site: &SiteConfig) -> StoreResult<Option<ObjectId>> {
        if let Some(id) = self.store.fetch_site(&site.name).await? {
            debug!("Found site {} with library root {}", site.name, id);
            return Ok(Some(id));
        }

        if !site.create {
            info!(
                "No site named {} exists; create it or enable create_site",
                site.name
            );
            return Ok(None);
        }

        info!("No site named {} exists, creating one", site.name);
        Ok(Some(self.store.create_site(&site.name).await?.into_inner()))
    }
}

#[async_trait]
impl<S: DocumentStore + SiteDirectory + 'static> TemplateStoreBackend for SiteBackend<S> {
    fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    fn kind(&self) -> &'static str {
        "site"
    }

    fn check_config(&self, config: &LoaderConfig) -> Result<(), ConfigError> {
        if config.site.is_none() {
            return Err(ConfigError::missing("site_name"));
        }
        Ok(())
    }

    async fn template_root(&self, config: &LoaderConfig, cache: &ResolutionCache) -> StoreResult<Option<ObjectId>> {
        let site = config
            .site
            .as_ref()
            .ok_or_else(|| StoreError::Backend("site backend used without a site name".into()))?;

        cache
            .get_or_resolve(CacheKey::SiteId, || self.lookup_site(site))
            .await
    }
}
