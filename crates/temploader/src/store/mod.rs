//! Document store abstraction
//!
//! A [`DocumentStore`] is the capability surface the loader needs from a
//! hierarchical document repository: lookups, idempotent folder creation,
//! document upload, deletion and enumeration. Lookups that find nothing
//! return `Ok(None)`; everything else that goes wrong is a [`StoreError`].

pub mod memory;
#[cfg(feature = "fs")]
pub mod file;

pub use memory::MemoryStore;
#[cfg(feature = "fs")]
pub use file::FileSystemStore;

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Opaque identifier of a folder or document in a store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub String);

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        ObjectId(s)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId(s.to_string())
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a stored object
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Folder,
    Document,
}

/// A resolved node in a document store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Handle {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,

    /// Store's last modification timestamp
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,

    pub mime_type: Option<String>,
    pub content_length: Option<u64>,
}

impl Handle {
    pub fn folder(id: impl Into<ObjectId>, name: impl Into<String>, last_modified: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ObjectKind::Folder,
            last_modified,
            mime_type: None,
            content_length: None,
        }
    }

    pub fn document(
        id: impl Into<ObjectId>,
        name: impl Into<String>,
        last_modified: OffsetDateTime,
        mime_type: Option<String>,
        content_length: Option<u64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ObjectKind::Document,
            last_modified,
            mime_type,
            content_length,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ObjectKind::Folder
    }

    pub fn is_document(&self) -> bool {
        self.kind == ObjectKind::Document
    }

    /// Last modification time in milliseconds since the Unix epoch
    pub fn last_modified_millis(&self) -> i64 {
        (self.last_modified.unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Result of an idempotent create
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome<T> {
    /// The call created the object
    Created(T),
    /// An object with the same name was already there
    Existing(T),
}

impl<T> CreateOutcome<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            CreateOutcome::Created(v) | CreateOutcome::Existing(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            CreateOutcome::Created(v) | CreateOutcome::Existing(v) => v,
        }
    }
}

/// Capability surface of a hierarchical document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Id of the repository root folder
    async fn root_id(&self) -> StoreResult<ObjectId>;

    /// Look up an object by absolute `/`-separated path
    async fn get_by_path(&self, path: &str) -> StoreResult<Option<Handle>>;

    /// Look up an object by id
    async fn get_by_id(&self, id: &ObjectId) -> StoreResult<Option<Handle>>;

    /// Look up a direct child of `parent` by name
    async fn find_child(&self, parent: &ObjectId, name: &str) -> StoreResult<Option<Handle>>;

    /// Create a folder under `parent`
    ///
    /// Must be idempotent: if `parent` already holds a child called `name`
    /// the existing folder is returned as [`CreateOutcome::Existing`].
    async fn create_folder(&self, name: &str, parent: &ObjectId) -> StoreResult<CreateOutcome<Handle>>;

    /// Upload a document into `parent`
    async fn create_document(
        &self,
        parent: &ObjectId,
        content: &[u8],
        mime_type: &str,
        name: &str,
    ) -> StoreResult<Handle>;

    /// Read the full content stream of a document
    async fn read_content(&self, id: &ObjectId) -> StoreResult<Vec<u8>>;

    /// Delete a document, or a folder with everything below it
    ///
    /// Deleting an object that does not exist is not an error.
    async fn delete_subtree(&self, id: &ObjectId) -> StoreResult<()>;

    /// Enumerate the direct children of a folder
    async fn list_children(&self, id: &ObjectId) -> StoreResult<Vec<Handle>>;
}

/// Lookup and creation of sites (groups) that own a document library
///
/// A site is identified by the id of its library root folder.
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    async fn fetch_site(&self, name: &str) -> StoreResult<Option<ObjectId>>;

    /// Create a site; idempotent like [`DocumentStore::create_folder`]
    async fn create_site(&self, name: &str) -> StoreResult<CreateOutcome<ObjectId>>;
}

/// Find a same-named child after a create lost a race
///
/// Stores whose backend reports a name collision instead of returning the
/// existing object use this to honour the idempotent-create contract.
pub async fn existing_child<S: DocumentStore + ?Sized>(
    store: &S,
    parent: &ObjectId,
    name: &str,
) -> StoreResult<CreateOutcome<Handle>> {
    store
        .list_children(parent)
        .await?
        .into_iter()
        .find(|child| child.name == name)
        .map(CreateOutcome::Existing)
        .ok_or_else(|| StoreError::AlreadyExists(format!("{} under {}", name, parent)))
}

/// Reject names that cannot be a single path segment
pub(crate) fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
