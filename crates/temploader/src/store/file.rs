//! [`DocumentStore`] over a directory tree on the local filesystem

use super::{CreateOutcome, DocumentStore, Handle, ObjectId, validate_name};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// File-based store: folders are directories and documents are files
///
/// Object ids are base-relative paths such as `/templates/email/view.ftl`;
/// the repository root is `/`.
pub struct FileSystemStore {
    base_path: PathBuf,
}

impl FileSystemStore {
    /// Create a new file store rooted at `base_path`
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map an object id onto the filesystem, refusing anything that escapes the base
    fn resolve(&self, id: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(id.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::InvalidName(id.to_string()));
        }
        Ok(self.base_path.join(relative))
    }

    fn child_id(parent: &ObjectId, name: &str) -> ObjectId {
        let parent = parent.0.trim_end_matches('/');
        ObjectId(format!("{}/{}", parent, name))
    }

    async fn handle_for(&self, id: ObjectId, path: &Path) -> StoreResult<Option<Handle>> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let last_modified = metadata
            .modified()
            .map(OffsetDateTime::from)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let handle = if metadata.is_dir() {
            Handle::folder(id, name, last_modified)
        } else {
            Handle::document(id, name, last_modified, None, Some(metadata.len()))
        };
        Ok(Some(handle))
    }

    async fn require_folder(&self, id: &ObjectId) -> StoreResult<PathBuf> {
        let path = self.resolve(&id.0)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => Ok(path),
            Ok(_) => Err(StoreError::NotAFolder(id.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DocumentStore for FileSystemStore {
    async fn root_id(&self) -> StoreResult<ObjectId> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(ObjectId::from("/"))
    }

    async fn get_by_path(&self, path: &str) -> StoreResult<Option<Handle>> {
        self.get_by_id(&ObjectId::from(path)).await
    }

    async fn get_by_id(&self, id: &ObjectId) -> StoreResult<Option<Handle>> {
        let path = match self.resolve(&id.0) {
            Ok(path) => path,
            Err(StoreError::InvalidName(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.handle_for(id.clone(), &path).await
    }

    async fn find_child(&self, parent: &ObjectId, name: &str) -> StoreResult<Option<Handle>> {
        if validate_name(name).is_err() {
            return Ok(None);
        }
        let id = Self::child_id(parent, name);
        let path = self.resolve(&id.0)?;
        self.handle_for(id, &path).await
    }

    async fn create_folder(&self, name: &str, parent: &ObjectId) -> StoreResult<CreateOutcome<Handle>> {
        validate_name(name)?;
        let parent_path = self.require_folder(parent).await?;
        let id = Self::child_id(parent, name);
        let path = parent_path.join(name);

        let created = match fs::create_dir(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => false,
            Err(e) => return Err(e.into()),
        };

        let handle = self
            .handle_for(id.clone(), &path)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !handle.is_folder() {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }

        Ok(if created {
            CreateOutcome::Created(handle)
        } else {
            CreateOutcome::Existing(handle)
        })
    }

    async fn create_document(
        &self,
        parent: &ObjectId,
        content: &[u8],
        _mime_type: &str,
        name: &str,
    ) -> StoreResult<Handle> {
        validate_name(name)?;
        let parent_path = self.require_folder(parent).await?;
        let id = Self::child_id(parent, name);
        let path = parent_path.join(name);

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(content).await?;
        file.flush().await?;

        self.handle_for(id.clone(), &path)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn read_content(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let path = self.resolve(&id.0)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => return Err(StoreError::NotADocument(id.to_string())),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(id.to_string())),
            Err(e) => return Err(e.into()),
        }
        Ok(fs::read(&path).await?)
    }

    async fn delete_subtree(&self, id: &ObjectId) -> StoreResult<()> {
        let path = self.resolve(&id.0)?;
        if path == self.base_path {
            return Err(StoreError::Backend("cannot delete the repository root".into()));
        }

        let result = match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&path).await,
            Ok(_) => fs::remove_file(&path).await,
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn list_children(&self, id: &ObjectId) -> StoreResult<Vec<Handle>> {
        let path = self.require_folder(id).await?;
        let mut entries = fs::read_dir(&path).await?;

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(handle) = self.handle_for(Self::child_id(id, &name), &entry.path()).await? {
                children.push(handle);
            }
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }
}
