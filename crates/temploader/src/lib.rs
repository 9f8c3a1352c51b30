//! Temploader resolves template names to documents in a hierarchical
//! document store, creating the template folder (and site) on demand, and
//! hands them to a templating engine through the [`TemplateLoader`] contract.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use temploader::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let config = LoaderConfig::builder("templates/email")
//!     .create_folder(true)
//!     .default_template(DefaultTemplate::new("view.ftl", "Hello ${name}"))
//!     .build()?;
//!
//! let loader = StoreTemplateLoader::new(
//!     Arc::new(RepositoryBackend::new(store)),
//!     Arc::new(ResolutionCache::new()),
//!     config,
//! )?;
//!
//! if let Some(source) = loader.find_template_source("view.ftl").await? {
//!     let text = loader.reader(&source, "UTF-8").await?.into_string();
//!     println!("{}", text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod path;
pub mod reader;
pub mod resolver;
pub mod store;

pub use backend::{RepositoryBackend, SiteBackend, TemplateStoreBackend};
pub use cache::{CacheKey, ResolutionCache};
pub use config::{DefaultTemplate, FolderCachePolicy, LoaderConfig, LoaderConfigBuilder, SiteConfig};
pub use error::{ConfigError, LoaderError, Result, StoreError, StoreResult};
pub use loader::{StoreTemplateLoader, TemplateLoader, TemplateSource};
pub use path::LogicalPath;
pub use reader::{Encoding, TemplateReader};
pub use resolver::{MissingFolder, MissingLeafHook, PathResolver, Resolution};
pub use store::{CreateOutcome, DocumentStore, Handle, MemoryStore, ObjectId, ObjectKind, SiteDirectory};

#[cfg(feature = "fs")]
pub use store::FileSystemStore;

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
