//! [`DocumentStore`] over the CMIS 1.1 browser binding

use crate::config::CmisConfig;
use crate::error::CmisError;
use crate::model::{self, RepositoryInfo};
use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use temploader::store::existing_child;
use temploader::{CreateOutcome, DocumentStore, Handle, ObjectId, StoreError, StoreResult};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Children fetched per listing request
const PAGE_SIZE: usize = 100;

/// CMIS repository reached through its browser binding URL
pub struct CmisStore {
    client: Client,
    config: CmisConfig,
    repository: OnceCell<RepositoryInfo>,
    /// `cmis:path` of folders seen so far, by object id
    folder_paths: Mutex<HashMap<ObjectId, String>>,
}

impl std::fmt::Debug for CmisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmisStore")
            .field("config", &self.config)
            .field("repository", &self.repository.get())
            .finish()
    }
}

/// Form fields declaring `cmis:name` and `cmis:objectTypeId`
fn property_fields(name: &str, type_id: &str) -> Vec<(String, String)> {
    vec![
        ("propertyId[0]".into(), "cmis:name".into()),
        ("propertyValue[0]".into(), name.into()),
        ("propertyId[1]".into(), "cmis:objectTypeId".into()),
        ("propertyValue[1]".into(), type_id.into()),
    ]
}

/// Form of a `createFolder` action
pub fn create_folder_form(name: &str, parent: &ObjectId) -> Vec<(String, String)> {
    let mut form = vec![
        ("cmisaction".to_string(), "createFolder".to_string()),
        ("objectId".to_string(), parent.to_string()),
        ("succinct".to_string(), "true".to_string()),
    ];
    form.extend(property_fields(name, "cmis:folder"));
    form
}

/// Form of a `delete` or `deleteTree` action for `target`
pub fn delete_form(target: &Handle) -> Vec<(String, String)> {
    let mut form = vec![
        ("objectId".to_string(), target.id.to_string()),
        ("allVersions".to_string(), "true".to_string()),
    ];
    if target.is_folder() {
        form.push(("cmisaction".into(), "deleteTree".into()));
        form.push(("continueOnFailure".into(), "true".into()));
    } else {
        form.push(("cmisaction".into(), "delete".into()));
    }
    form
}

fn child_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

/// `/a/b c` becomes `/a/b%20c`
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("/{}", urlencoding::encode(segment)))
        .collect()
}

impl CmisStore {
    pub fn new(config: CmisConfig) -> Result<Self, CmisError> {
        let mut headers = HeaderMap::new();
        let locale = HeaderValue::from_str(&config.locale)
            .map_err(|_| CmisError::Config(format!("Invalid locale {}", config.locale)))?;
        headers.insert(ACCEPT_LANGUAGE, locale);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config,
            repository: OnceCell::new(),
            folder_paths: Mutex::new(HashMap::new()),
        })
    }

    /// Build a store from `CMIS_*` environment variables
    pub fn from_env() -> Result<Self, CmisError> {
        Self::new(CmisConfig::from_env()?)
    }

    pub fn config(&self) -> &CmisConfig {
        &self.config
    }

    /// Repository info, fetched once per store
    pub async fn repository(&self) -> Result<&RepositoryInfo, CmisError> {
        self.repository
            .get_or_try_init(|| async {
                let body: Value = self.send(self.client.get(&self.config.url)).await?.json().await?;
                let info = model::parse_repositories(body, &self.config.repository_id)?;
                info!(
                    "Connected to CMIS repository {} at {}",
                    info.repository_id, self.config.url
                );
                self.paths()
                    .insert(ObjectId::from(info.root_folder_id.clone()), "/".to_string());
                Ok(info)
            })
            .await
    }

    fn paths(&self) -> MutexGuard<'_, HashMap<ObjectId, String>> {
        self.folder_paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn known_path(&self, id: &ObjectId) -> Option<String> {
        self.paths().get(id).cloned()
    }

    /// Parse an object response, remembering the path of folders
    fn parse_and_remember(&self, body: Value) -> Result<Handle, CmisError> {
        let path = model::object_path(&body);
        let handle = model::parse_object(body)?;
        if let (true, Some(path)) = (handle.is_folder(), path) {
            self.paths().insert(handle.id.clone(), path);
        }
        Ok(handle)
    }

    /// Drop `id` and everything recorded below it
    fn forget(&self, id: &ObjectId) {
        let mut paths = self.paths();
        let Some(path) = paths.remove(id) else {
            return;
        };
        let prefix = child_path(&path, "");
        paths.retain(|_, known| !known.starts_with(&prefix));
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.user {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, CmisError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CmisError::from_response(status.as_u16(), &body))
    }

    /// Run an object lookup; a missing object is `None`
    async fn fetch_object(&self, request: RequestBuilder) -> Result<Option<Handle>, CmisError> {
        match self.send(request).await {
            Ok(response) => Ok(Some(self.parse_and_remember(response.json().await?)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn object_by_path(&self, path: &str) -> Result<Option<Handle>, CmisError> {
        let repository = self.repository().await?;
        let url = format!("{}{}", repository.root_folder_url, encode_path(path));
        self.fetch_object(
            self.client
                .get(url)
                .query(&[("cmisselector", "object"), ("succinct", "true")]),
        )
        .await
    }

    async fn object_by_id(&self, id: &ObjectId) -> Result<Option<Handle>, CmisError> {
        let repository = self.repository().await?;
        self.fetch_object(self.client.get(&repository.root_folder_url).query(&[
            ("objectId", id.as_ref()),
            ("cmisselector", "object"),
            ("succinct", "true"),
        ]))
        .await
    }

    async fn children(&self, id: &ObjectId) -> Result<Vec<Handle>, CmisError> {
        let repository = self.repository().await?;
        let mut children = Vec::new();
        loop {
            let skip = children.len().to_string();
            let max = PAGE_SIZE.to_string();
            let body: Value = self
                .send(self.client.get(&repository.root_folder_url).query(&[
                    ("objectId", id.as_ref()),
                    ("cmisselector", "children"),
                    ("succinct", "true"),
                    ("maxItems", max.as_str()),
                    ("skipCount", skip.as_str()),
                ]))
                .await?
                .json()
                .await?;
            let page = model::parse_children(body)?;
            let fetched = page.children.len();
            children.extend(page.children);
            if !page.has_more_items || fetched == 0 {
                return Ok(children);
            }
        }
    }

    async fn post_form(&self, form: &[(String, String)]) -> Result<Response, CmisError> {
        let repository = self.repository().await?;
        self.send(self.client.post(&repository.root_folder_url).form(form))
            .await
    }
}

#[async_trait]
impl DocumentStore for CmisStore {
    async fn root_id(&self) -> StoreResult<ObjectId> {
        Ok(ObjectId::from(self.repository().await?.root_folder_id.clone()))
    }

    async fn get_by_path(&self, path: &str) -> StoreResult<Option<Handle>> {
        Ok(self.object_by_path(path).await?)
    }

    async fn get_by_id(&self, id: &ObjectId) -> StoreResult<Option<Handle>> {
        Ok(self.object_by_id(id).await?)
    }

    async fn find_child(&self, parent: &ObjectId, name: &str) -> StoreResult<Option<Handle>> {
        self.repository().await?;
        let path = match self.known_path(parent) {
            Some(path) => Some(path),
            // Unseen parent, fetched once so its path is remembered
            None => match self.object_by_id(parent).await? {
                Some(handle) if handle.is_folder() => self.known_path(parent),
                _ => return Ok(None),
            },
        };
        if let Some(path) = path {
            return Ok(self.object_by_path(&child_path(&path, name)).await?);
        }
        // Folder without a reported cmis:path
        match self.children(parent).await {
            Ok(children) => Ok(children.into_iter().find(|child| child.name == name)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_folder(&self, name: &str, parent: &ObjectId) -> StoreResult<CreateOutcome<Handle>> {
        match self.post_form(&create_folder_form(name, parent)).await {
            Ok(response) => {
                let body: Value = response.json().await.map_err(CmisError::from)?;
                let folder = self.parse_and_remember(body)?;
                if self.known_path(&folder.id).is_none() {
                    if let Some(path) = self.known_path(parent) {
                        self.paths().insert(folder.id.clone(), child_path(&path, name));
                    }
                }
                debug!("Created CMIS folder {} ({})", name, folder.id);
                Ok(CreateOutcome::Created(folder))
            }
            Err(e) if e.is_conflict() => {
                warn!("Folder {} already exists under {}, reusing it", name, parent);
                existing_child(self, parent, name).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_document(
        &self,
        parent: &ObjectId,
        content: &[u8],
        mime_type: &str,
        name: &str,
    ) -> StoreResult<Handle> {
        let repository = self.repository().await?;
        let part = Part::bytes(content.to_vec())
            .file_name(name.to_string())
            .mime_str(mime_type)
            .map_err(CmisError::from)?;

        let mut form = Form::new()
            .text("cmisaction", "createDocument")
            .text("objectId", parent.to_string())
            .text("versioningState", "major")
            .text("succinct", "true");
        for (key, value) in property_fields(name, "cmis:document") {
            form = form.text(key, value);
        }
        let form = form.part("content", part);

        let response = self
            .send(self.client.post(&repository.root_folder_url).multipart(form))
            .await?;
        let body: Value = response.json().await.map_err(CmisError::from)?;
        Ok(model::parse_object(body)?)
    }

    async fn read_content(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let repository = self.repository().await?;
        let response = self
            .send(
                self.client
                    .get(&repository.root_folder_url)
                    .query(&[("objectId", id.as_ref()), ("cmisselector", "content")]),
            )
            .await?;
        let bytes = response.bytes().await.map_err(CmisError::from)?;
        Ok(bytes.to_vec())
    }

    async fn delete_subtree(&self, id: &ObjectId) -> StoreResult<()> {
        let Some(target) = self.object_by_id(id).await? else {
            return Ok(());
        };
        let deleted = match self.post_form(&delete_form(&target)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(StoreError::from(e)),
        };
        if deleted.is_ok() {
            self.forget(id);
        }
        deleted
    }

    async fn list_children(&self, id: &ObjectId) -> StoreResult<Vec<Handle>> {
        Ok(self.children(id).await?)
    }
}
