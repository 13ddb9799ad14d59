//! Command-line and environment configuration.
//!
//! Every flag has an environment fallback so the library can be pointed at a
//! shared data directory without a wrapper script.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::store::{FlatFileStore, DEFAULT_BOOKS_FILE, DEFAULT_MEMBERS_FILE};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "city-library",
    version,
    about = "Books, members, and loans for a small library, kept in two flat files."
)]
pub struct Cli {
    /// Books file (`id,title,author,category,issued` per line).
    #[arg(long, env = "LIBRARY_BOOKS_FILE", default_value = DEFAULT_BOOKS_FILE)]
    pub books: PathBuf,

    /// Members file (`id,name,email,issued;ids` per line).
    #[arg(long, env = "LIBRARY_MEMBERS_FILE", default_value = DEFAULT_MEMBERS_FILE)]
    pub members: PathBuf,

    /// Start the full-screen interface instead of the numbered menu.
    #[arg(long, env = "LIBRARY_TUI")]
    pub tui: bool,

    /// Append log output to this file instead of stderr.
    #[arg(long, env = "LIBRARY_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn store(&self) -> FlatFileStore {
        FlatFileStore::new(&self.books, &self.members)
    }

    /// Install the global `tracing` subscriber. Output goes to the log file
    /// when one is configured, otherwise to stderr for the menu and nowhere
    /// for the full-screen UI (it would draw over the alternate screen).
    pub fn init_logging(&self) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false);

        if let Some(path) = &self.log_file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        } else if self.tui {
            builder.with_writer(io::sink).init();
        } else {
            builder.with_writer(io::stderr).init();
        }
        Ok(())
    }
}
