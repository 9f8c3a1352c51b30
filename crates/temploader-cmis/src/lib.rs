//! CMIS document store for temploader
//!
//! Speaks the CMIS 1.1 browser binding (JSON over HTTP) with succinct
//! properties. Folder creation is idempotent: a name collision re-reads the
//! parent's children and returns the existing folder.

pub mod config;
pub mod error;
pub mod model;
pub mod store;

pub use config::CmisConfig;
pub use error::CmisError;
pub use model::RepositoryInfo;
pub use store::CmisStore;
