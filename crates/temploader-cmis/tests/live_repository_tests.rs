//! Runs against a real repository configured through `CMIS_*` variables
//! (or a `.env` file). Ignored by default:
//!
//! ```sh
//! cargo test -p temploader-cmis --test live_repository_tests -- --ignored
//! ```

use std::sync::Arc;
use temploader::{
    DefaultTemplate, DocumentStore, LoaderConfig, RepositoryBackend, ResolutionCache,
    StoreTemplateLoader, TemplateLoader,
};
use temploader_cmis::CmisStore;

#[tokio::test]
#[ignore]
async fn test_seed_and_remove_against_live_repository() {
    dotenv::dotenv().ok();
    let store = Arc::new(CmisStore::from_env().expect("CMIS_* variables must be set"));
    println!("Root folder: {}", store.root_id().await.unwrap());

    let config = LoaderConfig::builder("temploader-live-test/email")
        .create_folder(true)
        .default_template(DefaultTemplate::new("view.ftl", "Hej ${namn}"))
        .build()
        .unwrap();
    let loader = StoreTemplateLoader::new(
        Arc::new(RepositoryBackend::new(store.clone())),
        Arc::new(ResolutionCache::new()),
        config,
    )
    .unwrap();

    let source = loader.find_template_source("view.ftl").await.unwrap().unwrap();
    let text = loader.reader(&source, "UTF-8").await.unwrap().into_string();
    assert_eq!(text, "Hej ${namn}");

    assert!(loader.remove_template_folder().await.unwrap());
    if let Some(base) = store.get_by_path("/temploader-live-test").await.unwrap() {
        store.delete_subtree(&base.id).await.unwrap();
    }
}
