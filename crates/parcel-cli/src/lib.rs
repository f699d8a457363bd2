//! parcel - one front door for many package sources
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Resolves packages from every registered source by URN or web URL,
//! downloads and classifies their installers, checks them against the host
//! and hands them to the OS installer.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.parcel/
//! ├── config.toml   # Download dir, stall timeout, install commands
//! ├── catalog.toml  # Default file-backed catalog
//! └── cache/        # Downloaded installers
//! ```

pub mod cmd;
pub mod context;
pub mod ui;

pub use parcel_core::USER_AGENT;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "parcel")]
#[command(author, version, about = "parcel - resolve, download and install packages")]
pub struct Cli {
    /// Catalog file to serve packages from (defaults to ~/.parcel/catalog.toml)
    #[arg(long, global = true, env = "PARCEL_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show package details
    Info {
        /// Package reference (urn:<namespace>:<id>) or source web URL
        package: String,
        /// Print machine readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Search every source
    Search {
        /// Search query
        query: String,
    },
    /// Suggest packages for a partially typed query
    Suggest {
        /// Partial query
        query: String,
    },
    /// List featured packages
    Featured,
    /// Download a package's installer
    Download {
        /// Package reference or source web URL
        package: String,
    },
    /// Download and install a package
    Install {
        /// Package reference or source web URL
        package: String,
    },
    /// Launch an installed package
    Launch {
        /// Package reference or source web URL
        package: String,
    },
    /// Classify an installer file on disk
    Classify {
        /// Installer file
        file: PathBuf,
    },
    /// Parse a package reference and print its parts
    Urn {
        /// Reference text
        text: String,
    },
}
