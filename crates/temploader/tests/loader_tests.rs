use std::io::Read;
use std::sync::Arc;
use temploader::store::memory::StoreOperation;
use temploader::{
    CacheKey, DefaultTemplate, DocumentStore, LoaderConfig, LoaderError, MemoryStore, ObjectId,
    RepositoryBackend, ResolutionCache, SiteBackend, SiteDirectory, StoreError, StoreTemplateLoader,
    TemplateLoader,
};

const DEFAULT_VIEW: &str = "<#-- default -->\n<h1>${title}</h1>\n";

fn repository_loader(store: Arc<MemoryStore>, config: LoaderConfig) -> StoreTemplateLoader {
    StoreTemplateLoader::new(
        Arc::new(RepositoryBackend::new(store)),
        Arc::new(ResolutionCache::new()),
        config,
    )
    .unwrap()
}

fn creating_config(folder: &str) -> LoaderConfig {
    LoaderConfig::builder(folder)
        .create_folder(true)
        .default_template(DefaultTemplate::new("view.ftl", DEFAULT_VIEW))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_empty_store_creates_folders_and_seeds_default_template() {
    let store = Arc::new(MemoryStore::new());
    let loader = repository_loader(store.clone(), creating_config("templates/email"));

    let source = loader
        .find_template_source("view.ftl")
        .await
        .unwrap()
        .expect("default template should be found");

    // Folders created root to leaf, then the seed document in the leaf
    let root = store.root_id().await.unwrap();
    let templates = store.get_by_path("/templates").await.unwrap().unwrap();
    let email = store.get_by_path("/templates/email").await.unwrap().unwrap();
    let created: Vec<StoreOperation> = store
        .journal()
        .into_iter()
        .filter(|op| op.is_creation())
        .collect();
    assert_eq!(
        created,
        vec![
            StoreOperation::CreateFolder {
                parent: root,
                name: "templates".into(),
                created: true,
            },
            StoreOperation::CreateFolder {
                parent: templates.id,
                name: "email".into(),
                created: true,
            },
            StoreOperation::CreateDocument {
                parent: email.id,
                name: "view.ftl".into(),
            },
        ]
    );

    let mut text = String::new();
    loader
        .reader(&source, "UTF-8")
        .await
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, DEFAULT_VIEW);

    loader.close_template_source(source);
}

#[tokio::test]
async fn test_no_create_on_empty_store_returns_none_without_creating() {
    let store = Arc::new(MemoryStore::new());
    let config = LoaderConfig::builder("templates/email").build().unwrap();
    let loader = repository_loader(store.clone(), config);

    let source = loader.find_template_source("x.ftl").await.unwrap();
    assert!(source.is_none());
    assert_eq!(store.creations(), 0);
}

#[tokio::test]
async fn test_existing_template_is_found_without_creation() {
    let store = Arc::new(MemoryStore::new());
    let folder = store.seed_folders("templates/email").await.unwrap();
    let doc = store
        .create_document(&folder.id, b"Dear ${name},", "text/plain", "welcome.ftl")
        .await
        .unwrap();
    store.clear_journal();

    let loader = repository_loader(store.clone(), creating_config("templates/email"));
    let source = loader.find_template_source("welcome.ftl").await.unwrap().unwrap();

    assert_eq!(source.id(), &doc.id);
    assert_eq!(loader.last_modified(&source), doc.last_modified_millis());
    assert_eq!(store.creations(), 0);

    let text = loader.reader(&source, "utf-8").await.unwrap().into_string();
    assert_eq!(text, "Dear ${name},");
}

#[tokio::test]
async fn test_missing_document_in_existing_folder() {
    let store = Arc::new(MemoryStore::new());
    store.seed_folders("templates").await.unwrap();

    let loader = repository_loader(store.clone(), creating_config("templates"));
    assert!(loader.find_template_source("nope.ftl").await.unwrap().is_none());

    // The folder already existed, so nothing was seeded
    assert!(store.get_by_path("/templates/view.ftl").await.unwrap().is_none());
}

#[tokio::test]
async fn test_folder_with_template_name_is_not_a_template() {
    let store = Arc::new(MemoryStore::new());
    store.seed_folders("templates/partials").await.unwrap();

    let config = LoaderConfig::builder("templates").build().unwrap();
    let loader = repository_loader(store, config);
    assert!(loader.find_template_source("partials").await.unwrap().is_none());
}

#[tokio::test]
async fn test_folder_id_evicted_after_every_lookup() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(ResolutionCache::new());
    let loader = StoreTemplateLoader::new(
        Arc::new(RepositoryBackend::new(store.clone())),
        cache.clone(),
        creating_config("templates"),
    )
    .unwrap();

    // Hit
    assert!(loader.find_template_source("view.ftl").await.unwrap().is_some());
    assert!(cache.get(CacheKey::TemplateFolderId).is_none());

    // Miss
    assert!(loader.find_template_source("other.ftl").await.unwrap().is_none());
    assert!(cache.get(CacheKey::TemplateFolderId).is_none());

    // Failure
    store.set_offline(true);
    assert!(loader.find_template_source("view.ftl").await.is_err());
    assert!(cache.get(CacheKey::TemplateFolderId).is_none());
}

#[tokio::test]
async fn test_folder_id_evicted_even_when_preloaded() {
    let store = Arc::new(MemoryStore::new());
    store.seed_folders("templates").await.unwrap();
    let cache = Arc::new(ResolutionCache::new());
    cache.put(CacheKey::TemplateFolderId, ObjectId::from("stale"));

    let config = LoaderConfig::builder("templates").build().unwrap();
    let loader = StoreTemplateLoader::new(
        Arc::new(RepositoryBackend::new(store)),
        cache.clone(),
        config,
    )
    .unwrap();

    // The cached id is used for this call and dropped afterwards
    assert!(loader.find_template_source("view.ftl").await.unwrap().is_none());
    assert!(cache.get(CacheKey::TemplateFolderId).is_none());
}

#[tokio::test]
async fn test_retain_policy_keeps_folder_id() {
    let store = Arc::new(MemoryStore::new());
    let folder = store.seed_folders("templates").await.unwrap();
    let cache = Arc::new(ResolutionCache::new());
    let config = LoaderConfig::builder("templates")
        .retain_folder_id(true)
        .build()
        .unwrap();
    let loader = StoreTemplateLoader::new(
        Arc::new(RepositoryBackend::new(store.clone())),
        cache.clone(),
        config,
    )
    .unwrap();

    loader.find_template_source("view.ftl").await.unwrap();
    assert_eq!(cache.get(CacheKey::TemplateFolderId), Some(folder.id.clone()));

    // Second lookup goes straight to the folder
    let before = store.lookups();
    loader.find_template_source("view.ftl").await.unwrap();
    assert_eq!(store.lookups() - before, 1);
}

#[tokio::test]
async fn test_store_fault_fails_the_lookup() {
    let store = Arc::new(MemoryStore::new());
    store.set_offline(true);
    let loader = repository_loader(store, creating_config("templates"));

    let err = loader.find_template_source("view.ftl").await.unwrap_err();
    assert!(matches!(err, LoaderError::Store(StoreError::Backend(_))));
}

#[tokio::test]
async fn test_site_backend_missing_site() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(ResolutionCache::new());
    let config = LoaderConfig::builder("templates")
        .site("Guest", false)
        .build()
        .unwrap();
    let loader = StoreTemplateLoader::new(Arc::new(SiteBackend::new(store.clone())), cache.clone(), config).unwrap();

    assert!(loader.find_template_source("view.ftl").await.unwrap().is_none());
    assert!(cache.get(CacheKey::SiteId).is_none());
    assert_eq!(store.creations(), 0);
}

#[tokio::test]
async fn test_site_backend_creates_site_and_keeps_site_id() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(ResolutionCache::new());
    let config = LoaderConfig::builder("templates/email")
        .site("Marketing", true)
        .create_folder(true)
        .default_template(DefaultTemplate::new("view.ftl", DEFAULT_VIEW))
        .build()
        .unwrap();
    let loader = StoreTemplateLoader::new(Arc::new(SiteBackend::new(store.clone())), cache.clone(), config).unwrap();

    let source = loader.find_template_source("view.ftl").await.unwrap().unwrap();
    let site_root = store.fetch_site("Marketing").await.unwrap().unwrap();

    // Site id persists, folder id does not
    assert_eq!(cache.get(CacheKey::SiteId), Some(site_root.clone()));
    assert!(cache.get(CacheKey::TemplateFolderId).is_none());

    // Templates live under the site, not the repository root
    assert!(store.get_by_path("/templates").await.unwrap().is_none());
    let templates = store.find_child(&site_root, "templates").await.unwrap().unwrap();
    let email = store.find_child(&templates.id, "email").await.unwrap().unwrap();
    let view = store.find_child(&email.id, "view.ftl").await.unwrap().unwrap();
    assert_eq!(source.id(), &view.id);

    // Later lookups never ask the directory for the site again
    store.clear_journal();
    loader.find_template_source("view.ftl").await.unwrap().unwrap();
    assert!(
        store
            .journal()
            .iter()
            .all(|op| !matches!(op, StoreOperation::CreateSite { .. }))
    );
    assert_eq!(store.creations(), 0);
}

#[tokio::test]
async fn test_site_backend_existing_site() {
    let store = Arc::new(MemoryStore::new());
    let site_root = store.create_site("Guest").await.unwrap().into_inner();
    let folder = store.create_folder("templates", &site_root).await.unwrap().into_inner();
    store
        .create_document(&folder.id, b"guest", "text/plain", "view.ftl")
        .await
        .unwrap();

    let config = LoaderConfig::builder("templates")
        .site("Guest", false)
        .build()
        .unwrap();
    let loader = StoreTemplateLoader::new(
        Arc::new(SiteBackend::new(store.clone())),
        Arc::new(ResolutionCache::new()),
        config,
    )
    .unwrap();

    let source = loader.find_template_source("view.ftl").await.unwrap().unwrap();
    let text = loader.reader(&source, "ISO-8859-1").await.unwrap().into_string();
    assert_eq!(text, "guest");
}

#[test]
fn test_backend_config_mismatch_fails_construction() {
    let store = Arc::new(MemoryStore::new());
    let config = LoaderConfig::builder("templates").build().unwrap();

    let result = StoreTemplateLoader::new(
        Arc::new(SiteBackend::new(store)),
        Arc::new(ResolutionCache::new()),
        config,
    );
    assert!(matches!(result, Err(LoaderError::Config(_))));
}

#[tokio::test]
async fn test_remove_template_and_folder() {
    let store = Arc::new(MemoryStore::new());
    let loader = repository_loader(store.clone(), creating_config("templates/email"));

    loader.find_template_source("view.ftl").await.unwrap().unwrap();
    assert_eq!(loader.template_path("view.ftl"), "/templates/email/view.ftl");

    assert!(loader.remove_template("view.ftl").await.unwrap());
    assert!(!loader.remove_template("view.ftl").await.unwrap());
    assert!(store.get_by_path("/templates/email/view.ftl").await.unwrap().is_none());

    assert!(loader.remove_template_folder().await.unwrap());
    assert!(store.get_by_path("/templates/email").await.unwrap().is_none());
    assert!(store.get_by_path("/templates").await.unwrap().is_some());
    assert!(!loader.remove_template_folder().await.unwrap());
}

#[tokio::test]
async fn test_unknown_encoding_is_reported() {
    let store = Arc::new(MemoryStore::new());
    let loader = repository_loader(store, creating_config("templates"));
    let source = loader.find_template_source("view.ftl").await.unwrap().unwrap();

    let err = loader.reader(&source, "KOI8-R").await.unwrap_err();
    assert!(matches!(err, LoaderError::Encoding { .. }));
}
