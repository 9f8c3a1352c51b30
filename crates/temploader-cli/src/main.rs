//! Temploader command line tool
//!
//! Resolves a template through the same loader a template engine uses,
//! creating the template folder and default template when configured to.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use temploader::{
    FileSystemStore, LoaderConfig, MemoryStore, RepositoryBackend, ResolutionCache, SiteBackend,
    StoreTemplateLoader, TemplateLoader, TemplateStoreBackend,
};
use temploader_cmis::CmisStore;
use tracing::{debug, info};

mod args;

use args::{BackendKind, Cli, Commands};

fn build_backend(cli: &Cli, config: &LoaderConfig) -> Result<Arc<dyn TemplateStoreBackend>> {
    let backend: Arc<dyn TemplateStoreBackend> = match cli.backend {
        BackendKind::Memory if config.site.is_some() => Arc::new(SiteBackend::new(Arc::new(MemoryStore::new()))),
        BackendKind::Memory => Arc::new(RepositoryBackend::new(Arc::new(MemoryStore::new()))),
        BackendKind::Fs => {
            if !cli.base_path.is_dir() {
                bail!("Base path {} is not a directory", cli.base_path.display());
            }
            Arc::new(RepositoryBackend::new(Arc::new(FileSystemStore::new(&cli.base_path))))
        }
        BackendKind::Cmis => {
            let store = CmisStore::from_env().context("Failed to set up the CMIS store")?;
            Arc::new(RepositoryBackend::new(Arc::new(store)))
        }
    };
    Ok(backend)
}

async fn run(cli: Cli) -> Result<()> {
    let config = LoaderConfig::from_env().context("Invalid loader configuration")?;
    let backend = build_backend(&cli, &config)?;
    debug!("Using {} backend with {:?}", backend.kind(), config);

    let loader = StoreTemplateLoader::new(backend, ResolutionCache::process_wide(), config)?;

    match cli.command {
        Commands::Get { name, encoding } => {
            let Some(source) = loader.find_template_source(&name).await? else {
                bail!("Template {} not found", loader.template_path(&name));
            };
            info!(
                "Loaded {} (last modified {})",
                loader.template_path(&name),
                loader.last_modified(&source)
            );
            let text = loader.reader(&source, &encoding).await?.into_string();
            loader.close_template_source(source);

            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        Commands::Path { name } => {
            println!("{}", loader.template_path(&name));
        }
        Commands::Remove { name } => {
            if !loader.remove_template(&name).await? {
                bail!("Template {} not found", loader.template_path(&name));
            }
        }
        Commands::RemoveFolder => {
            if !loader.remove_template_folder().await? {
                info!("Template folder does not exist, nothing removed");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Log to stderr so template output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "temploader=info".to_string()),
        )
        .init();

    run(Cli::parse()).await
}
