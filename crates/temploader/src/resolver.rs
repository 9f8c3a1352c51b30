//! Folder path resolution with lazy creation

use crate::error::{StoreError, StoreResult};
use crate::path::LogicalPath;
use crate::store::{CreateOutcome, DocumentStore, Handle, ObjectId};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// Called once when the terminal folder of a path had to be created
#[async_trait]
pub trait MissingLeafHook: Send + Sync {
    async fn seed(&self, store: &dyn DocumentStore, folder: &Handle) -> StoreResult<()>;
}

/// A path segment that does not exist and was not created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFolder {
    /// Absolute path of the first missing folder
    pub path: String,
    pub segment: String,
}

/// Outcome of walking a [`LogicalPath`]
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Handle),
    Missing(MissingFolder),
}

impl Resolution {
    pub fn found(self) -> Option<Handle> {
        match self {
            Resolution::Found(handle) => Some(handle),
            Resolution::Missing(_) => None,
        }
    }
}

/// Walks a logical path segment by segment against a store
pub struct PathResolver<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> PathResolver<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Resolve `path` below `root` and return the terminal folder
    ///
    /// Segments are visited root to leaf; each step needs the previous
    /// step's folder id. Without `create_missing` the walk stops at the
    /// first missing segment. With it, missing folders are created and
    /// `on_missing_leaf` runs if this call created the terminal folder.
    pub async fn resolve(
        &self,
        root: &ObjectId,
        path: &LogicalPath,
        create_missing: bool,
        on_missing_leaf: Option<&dyn MissingLeafHook>,
    ) -> StoreResult<Resolution> {
        let last = path.len() - 1;
        let mut current = root.clone();
        let mut resolved = None;

        for (depth, segment) in path.segments().iter().enumerate() {
            let handle = match self.store.find_child(&current, segment).await? {
                Some(handle) if handle.is_folder() => handle,
                Some(handle) => return Err(StoreError::NotAFolder(handle.id.to_string())),
                None if !create_missing => {
                    let missing = path.prefix(depth + 1);
                    info!(
                        "Folder {} does not exist; create it or enable create_folder",
                        missing
                    );
                    return Ok(Resolution::Missing(MissingFolder {
                        path: missing,
                        segment: segment.clone(),
                    }));
                }
                None => match self.store.create_folder(segment, &current).await? {
                    CreateOutcome::Created(handle) => {
                        info!("Created folder {}", path.prefix(depth + 1));
                        if depth == last {
                            if let Some(hook) = on_missing_leaf {
                                self.seed_or_roll_back(hook, &handle).await?;
                            }
                        }
                        handle
                    }
                    CreateOutcome::Existing(handle) => {
                        warn!(
                            "Folder {} appeared concurrently, using the existing one",
                            path.prefix(depth + 1)
                        );
                        handle
                    }
                },
            };

            debug!("Resolved {} to {}", path.prefix(depth + 1), handle.id);
            current = handle.id.clone();
            resolved = Some(handle);
        }

        // LogicalPath is never empty, so the loop ran at least once
        resolved
            .map(Resolution::Found)
            .ok_or_else(|| StoreError::NotFound(path.to_absolute()))
    }

    /// Run the hook on a folder this resolver just created
    ///
    /// A failed seed deletes the folder again, so the next resolution
    /// creates it afresh and retries the seed.
    async fn seed_or_roll_back(&self, hook: &dyn MissingLeafHook, folder: &Handle) -> StoreResult<()> {
        let Err(e) = hook.seed(self.store, folder).await else {
            return Ok(());
        };
        warn!("Seeding folder {} failed, removing it: {}", folder.name, e);
        if let Err(rollback) = self.store.delete_subtree(&folder.id).await {
            error!("Could not remove unseeded folder {}: {}", folder.id, rollback);
        }
        Err(e)
    }
}
