//! In-memory document store
//!
//! Keeps the whole tree behind one mutex, so check-then-insert in
//! `create_folder` and `create_site` is atomic. Also acts as the in-process
//! site directory: every site gets its own library root that is not
//! reachable from the repository root.

use super::{CreateOutcome, DocumentStore, Handle, ObjectId, ObjectKind, SiteDirectory, validate_name};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// A mutating call observed by the store, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    CreateFolder { parent: ObjectId, name: String, created: bool },
    CreateDocument { parent: ObjectId, name: String },
    CreateSite { name: String, created: bool },
    Delete { id: ObjectId },
}

impl StoreOperation {
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            StoreOperation::CreateFolder { .. }
                | StoreOperation::CreateDocument { .. }
                | StoreOperation::CreateSite { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<ObjectId>,
    kind: ObjectKind,
    last_modified: OffsetDateTime,
    content: Vec<u8>,
    mime_type: Option<String>,
}

impl Node {
    fn handle(&self, id: &ObjectId) -> Handle {
        match self.kind {
            ObjectKind::Folder => Handle::folder(id.clone(), self.name.clone(), self.last_modified),
            ObjectKind::Document => Handle::document(
                id.clone(),
                self.name.clone(),
                self.last_modified,
                self.mime_type.clone(),
                Some(self.content.len() as u64),
            ),
        }
    }
}

#[derive(Debug)]
struct Tree {
    root: ObjectId,
    nodes: HashMap<ObjectId, Node>,
    sites: HashMap<String, ObjectId>,
    journal: Vec<StoreOperation>,
    offline: bool,
}

impl Tree {
    fn child_of(&self, parent: &ObjectId, name: &str) -> Option<(ObjectId, &Node)> {
        self.nodes
            .iter()
            .find(|(_, node)| node.parent.as_ref() == Some(parent) && node.name == name)
            .map(|(id, node)| (id.clone(), node))
    }

    fn folder(&self, id: &ObjectId) -> StoreResult<&Node> {
        match self.nodes.get(id) {
            Some(node) if node.kind == ObjectKind::Folder => Ok(node),
            Some(_) => Err(StoreError::NotAFolder(id.to_string())),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    fn insert(&mut self, node: Node) -> ObjectId {
        let id = ObjectId(Uuid::new_v4().to_string());
        self.nodes.insert(id.clone(), node);
        id
    }

    fn new_folder(&mut self, name: &str, parent: Option<ObjectId>) -> ObjectId {
        self.insert(Node {
            name: name.to_string(),
            parent,
            kind: ObjectKind::Folder,
            last_modified: OffsetDateTime::now_utc(),
            content: Vec::new(),
            mime_type: None,
        })
    }
}

/// In-memory store for tests, demos and in-process hosting
#[derive(Debug)]
pub struct MemoryStore {
    tree: Mutex<Tree>,
    lookups: AtomicUsize,
    latency: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let root = ObjectId(Uuid::new_v4().to_string());
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            Node {
                name: String::new(),
                parent: None,
                kind: ObjectKind::Folder,
                last_modified: OffsetDateTime::now_utc(),
                content: Vec::new(),
                mime_type: None,
            },
        );

        Self {
            tree: Mutex::new(Tree {
                root,
                nodes,
                sites: HashMap::new(),
                journal: Vec::new(),
                offline: false,
            }),
            lookups: AtomicUsize::new(0),
            latency: None,
        }
    }

    /// Delay every call by `latency` before it touches the tree
    ///
    /// Widens the window between a lookup and a create so concurrent callers
    /// interleave in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every following call fail with a backend error
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Creates and deletes recorded so far
    pub fn journal(&self) -> Vec<StoreOperation> {
        self.lock().journal.clone()
    }

    /// Number of recorded create calls that actually created something
    pub fn creations(&self) -> usize {
        self.lock()
            .journal
            .iter()
            .filter(|op| match op {
                StoreOperation::CreateFolder { created, .. } | StoreOperation::CreateSite { created, .. } => *created,
                StoreOperation::CreateDocument { .. } => true,
                _ => false,
            })
            .count()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Number of `find_child` calls so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of stored objects, roots included
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create every folder of `path` below the repository root and return the last one
    pub async fn seed_folders(&self, path: &str) -> StoreResult<Handle> {
        let mut current = self.root_id().await?;
        let mut last = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let handle = self.create_folder(segment, &current).await?.into_inner();
            current = handle.id.clone();
            last = Some(handle);
        }
        last.ok_or_else(|| StoreError::InvalidName(path.to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        // Tree operations never panic mid-update, so a poisoned lock still holds a consistent tree
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self) -> StoreResult<MutexGuard<'_, Tree>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let tree = self.lock();
        if tree.offline {
            return Err(StoreError::Backend("memory store is offline".into()));
        }
        Ok(tree)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn root_id(&self) -> StoreResult<ObjectId> {
        Ok(self.enter().await?.root.clone())
    }

    async fn get_by_path(&self, path: &str) -> StoreResult<Option<Handle>> {
        let tree = self.enter().await?;
        let mut current = tree.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match tree.child_of(&current, segment) {
                Some((id, _)) => current = id,
                None => return Ok(None),
            }
        }
        Ok(tree.nodes.get(&current).map(|node| node.handle(&current)))
    }

    async fn get_by_id(&self, id: &ObjectId) -> StoreResult<Option<Handle>> {
        let tree = self.enter().await?;
        Ok(tree.nodes.get(id).map(|node| node.handle(id)))
    }

    async fn find_child(&self, parent: &ObjectId, name: &str) -> StoreResult<Option<Handle>> {
        let tree = self.enter().await?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(tree.child_of(parent, name).map(|(id, node)| node.handle(&id)))
    }

    async fn create_folder(&self, name: &str, parent: &ObjectId) -> StoreResult<CreateOutcome<Handle>> {
        validate_name(name)?;
        let mut tree = self.enter().await?;
        tree.folder(parent)?;

        let existing = tree.child_of(parent, name).map(|(id, node)| node.handle(&id));
        let outcome = match existing {
            Some(handle) if handle.is_folder() => CreateOutcome::Existing(handle),
            Some(_) => return Err(StoreError::AlreadyExists(format!("{} under {}", name, parent))),
            None => {
                let id = tree.new_folder(name, Some(parent.clone()));
                CreateOutcome::Created(tree.nodes[&id].handle(&id))
            }
        };

        tree.journal.push(StoreOperation::CreateFolder {
            parent: parent.clone(),
            name: name.to_string(),
            created: outcome.was_created(),
        });
        Ok(outcome)
    }

    async fn create_document(
        &self,
        parent: &ObjectId,
        content: &[u8],
        mime_type: &str,
        name: &str,
    ) -> StoreResult<Handle> {
        validate_name(name)?;
        let mut tree = self.enter().await?;
        tree.folder(parent)?;
        if tree.child_of(parent, name).is_some() {
            return Err(StoreError::AlreadyExists(format!("{} under {}", name, parent)));
        }

        let id = tree.insert(Node {
            name: name.to_string(),
            parent: Some(parent.clone()),
            kind: ObjectKind::Document,
            last_modified: OffsetDateTime::now_utc(),
            content: content.to_vec(),
            mime_type: Some(mime_type.to_string()),
        });
        tree.journal.push(StoreOperation::CreateDocument {
            parent: parent.clone(),
            name: name.to_string(),
        });
        Ok(tree.nodes[&id].handle(&id))
    }

    async fn read_content(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let tree = self.enter().await?;
        match tree.nodes.get(id) {
            Some(node) if node.kind == ObjectKind::Document => Ok(node.content.clone()),
            Some(_) => Err(StoreError::NotADocument(id.to_string())),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn delete_subtree(&self, id: &ObjectId) -> StoreResult<()> {
        let mut tree = self.enter().await?;
        if *id == tree.root || tree.sites.values().any(|site| site == id) {
            return Err(StoreError::Backend(format!("cannot delete library root {}", id)));
        }

        let mut pending = vec![id.clone()];
        while let Some(current) = pending.pop() {
            if tree.nodes.remove(&current).is_none() {
                continue;
            }
            pending.extend(
                tree.nodes
                    .iter()
                    .filter(|(_, node)| node.parent.as_ref() == Some(&current))
                    .map(|(child, _)| child.clone()),
            );
        }

        tree.journal.push(StoreOperation::Delete { id: id.clone() });
        Ok(())
    }

    async fn list_children(&self, id: &ObjectId) -> StoreResult<Vec<Handle>> {
        let tree = self.enter().await?;
        tree.folder(id)?;
        let mut children: Vec<Handle> = tree
            .nodes
            .iter()
            .filter(|(_, node)| node.parent.as_ref() == Some(id))
            .map(|(child, node)| node.handle(child))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }
}

#[async_trait]
impl SiteDirectory for MemoryStore {
    async fn fetch_site(&self, name: &str) -> StoreResult<Option<ObjectId>> {
        Ok(self.enter().await?.sites.get(name).cloned())
    }

    async fn create_site(&self, name: &str) -> StoreResult<CreateOutcome<ObjectId>> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let mut tree = self.enter().await?;

        let outcome = match tree.sites.get(name) {
            Some(existing) => CreateOutcome::Existing(existing.clone()),
            None => {
                let root = tree.new_folder(name, None);
                tree.sites.insert(name.to_string(), root.clone());
                CreateOutcome::Created(root)
            }
        };

        tree.journal.push(StoreOperation::CreateSite {
            name: name.to_string(),
            created: outcome.was_created(),
        });
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic_operations() {
        let store = MemoryStore::new();
        let root = store.root_id().await.unwrap();

        // Create a folder and a document inside it
        let folder = store.create_folder("templates", &root).await.unwrap();
        assert!(folder.was_created());
        let folder = folder.into_inner();

        let doc = store
            .create_document(&folder.id, b"Hello ${name}", "text/plain", "view.ftl")
            .await
            .unwrap();
        assert!(doc.is_document());
        assert_eq!(doc.content_length, Some(13));

        // Path and child lookups agree
        let by_path = store.get_by_path("/templates/view.ftl").await.unwrap().unwrap();
        assert_eq!(by_path.id, doc.id);
        let by_child = store.find_child(&folder.id, "view.ftl").await.unwrap().unwrap();
        assert_eq!(by_child.id, doc.id);

        assert_eq!(store.read_content(&doc.id).await.unwrap(), b"Hello ${name}");

        // Delete the folder and everything below it
        store.delete_subtree(&folder.id).await.unwrap();
        assert!(store.get_by_id(&doc.id).await.unwrap().is_none());
        assert!(store.get_by_path("/templates").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_folder_is_idempotent() {
        let store = MemoryStore::new();
        let root = store.root_id().await.unwrap();

        let first = store.create_folder("templates", &root).await.unwrap();
        let second = store.create_folder("templates", &root).await.unwrap();

        assert!(first.was_created());
        assert!(!second.was_created());
        assert_eq!(first.get().id, second.get().id);
        assert_eq!(store.list_children(&root).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_objects_are_absent_not_errors() {
        let store = MemoryStore::new();
        let root = store.root_id().await.unwrap();

        assert!(store.get_by_path("/nope/nothing").await.unwrap().is_none());
        assert!(store.get_by_id(&ObjectId::from("unknown")).await.unwrap().is_none());
        assert!(store.find_child(&root, "nothing").await.unwrap().is_none());

        // Deleting a missing object is a no-op
        store.delete_subtree(&ObjectId::from("unknown")).await.unwrap();
    }

    #[tokio::test]
    async fn test_document_name_collision() {
        let store = MemoryStore::new();
        let root = store.root_id().await.unwrap();

        store.create_document(&root, b"a", "text/plain", "a.ftl").await.unwrap();
        let result = store.create_document(&root, b"b", "text/plain", "a.ftl").await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));

        // A folder cannot take the name of a document
        let result = store.create_folder("a.ftl", &root).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_sites_are_separate_roots() {
        let store = MemoryStore::new();

        assert!(store.fetch_site("Guest").await.unwrap().is_none());
        let created = store.create_site("Guest").await.unwrap();
        assert!(created.was_created());
        let again = store.create_site("Guest").await.unwrap();
        assert!(!again.was_created());

        let site_root = store.fetch_site("Guest").await.unwrap().unwrap();
        assert_eq!(&site_root, created.get());

        store.create_folder("templates", &site_root).await.unwrap();
        // Not visible from the repository root
        assert!(store.get_by_path("/templates").await.unwrap().is_none());

        // Library roots cannot be deleted
        assert!(store.delete_subtree(&site_root).await.is_err());
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);

        assert!(matches!(store.root_id().await, Err(StoreError::Backend(_))));
        assert!(store.get_by_path("/").await.is_err());

        store.set_offline(false);
        assert!(store.root_id().await.is_ok());
    }

    #[tokio::test]
    async fn test_journal_counts_creations() {
        let store = MemoryStore::new();
        let leaf = store.seed_folders("a/b").await.unwrap();
        assert_eq!(leaf.name, "b");
        assert_eq!(store.creations(), 2);

        store.seed_folders("a/b").await.unwrap();
        assert_eq!(store.creations(), 2);

        store.clear_journal();
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_lookups_are_counted_not_journaled() {
        let store = MemoryStore::new();
        let root = store.root_id().await.unwrap();
        store.seed_folders("templates").await.unwrap();
        store.clear_journal();

        for _ in 0..1000 {
            store.find_child(&root, "templates").await.unwrap();
        }
        assert!(store.journal().is_empty());
        assert_eq!(store.lookups(), 1000);
    }
}
