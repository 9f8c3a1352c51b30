//! Resolution cache for site and template folder ids

use crate::store::ObjectId;
use once_cell::sync::Lazy;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// The two values the loader remembers between steps of a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Library root of the configured site
    SiteId,
    /// Terminal folder of the configured template path
    TemplateFolderId,
}

#[derive(Debug, Default)]
struct Slots {
    site_id: Option<ObjectId>,
    template_folder_id: Option<ObjectId>,
}

impl Slots {
    fn slot(&mut self, key: CacheKey) -> &mut Option<ObjectId> {
        match key {
            CacheKey::SiteId => &mut self.site_id,
            CacheKey::TemplateFolderId => &mut self.template_folder_id,
        }
    }
}

/// Two-slot cache shared by every loader of a process
///
/// No expiry and no size bound. Slot access goes through a plain mutex;
/// first-time resolution of a key is serialized by [`get_or_resolve`]
/// so concurrent misses run the resolver once.
///
/// [`get_or_resolve`]: ResolutionCache::get_or_resolve
#[derive(Debug, Default)]
pub struct ResolutionCache {
    slots: Mutex<Slots>,
    site_resolution: tokio::sync::Mutex<()>,
    folder_resolution: tokio::sync::Mutex<()>,
}

static PROCESS_CACHE: Lazy<Arc<ResolutionCache>> = Lazy::new(|| Arc::new(ResolutionCache::new()));

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache instance shared by everything in this process
    pub fn process_wide() -> Arc<ResolutionCache> {
        PROCESS_CACHE.clone()
    }

    pub fn get(&self, key: CacheKey) -> Option<ObjectId> {
        self.lock().slot(key).clone()
    }

    pub fn put(&self, key: CacheKey, value: ObjectId) {
        debug!("Caching {:?} = {}", key, value);
        *self.lock().slot(key) = Some(value);
    }

    pub fn remove(&self, key: CacheKey) -> Option<ObjectId> {
        self.lock().slot(key).take()
    }

    pub fn clear(&self) {
        *self.lock() = Slots::default();
    }

    /// Return the cached value for `key`, or run `resolve` and cache its result
    ///
    /// The slot is re-checked after taking the per-key resolution lock, so a
    /// caller that waited behind another resolver picks up its value instead
    /// of resolving again. `None` results are not cached.
    pub async fn get_or_resolve<F, Fut, E>(&self, key: CacheKey, resolve: F) -> Result<Option<ObjectId>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<ObjectId>, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(Some(value));
        }

        let _resolving = match key {
            CacheKey::SiteId => self.site_resolution.lock().await,
            CacheKey::TemplateFolderId => self.folder_resolution.lock().await,
        };

        if let Some(value) = self.get(key) {
            return Ok(Some(value));
        }

        let resolved = resolve().await?;
        if let Some(value) = &resolved {
            self.put(key, value.clone());
        }
        Ok(resolved)
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // Slots hold plain values, a poisoned lock still holds valid ids
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
