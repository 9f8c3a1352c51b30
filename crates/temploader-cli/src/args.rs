//! Command line arguments
//!
//! Loader settings (folder path, create flags, site, default template) come
//! from `TEMPLOADER_*` environment variables; the arguments pick the store
//! and the operation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Look templates up in a document store the way a template engine would
#[derive(Debug, Parser)]
#[command(name = "temploader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Document store to load templates from
    #[arg(short, long, value_enum, env = "TEMPLOADER_BACKEND", default_value = "fs", global = true)]
    pub backend: BackendKind,

    /// Base directory of the filesystem store
    #[arg(long, env = "TEMPLOADER_BASE_PATH", default_value = ".", global = true)]
    pub base_path: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// In-process store, empty at start; supports sites
    Memory,
    /// Directory tree under --base-path
    Fs,
    /// CMIS repository configured through CMIS_* variables
    Cmis,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find a template and print its content
    Get {
        /// Template name inside the template folder
        name: String,

        /// Character encoding of the template content
        #[arg(short, long, default_value = "UTF-8")]
        encoding: String,
    },

    /// Print the store path a template name resolves to
    Path { name: String },

    /// Delete one template from the template folder
    Remove { name: String },

    /// Delete the template folder and everything in it
    RemoveFolder,
}
