//! Lookout command line: argument parsing, logging setup and the daemon loop

pub mod daemon;
pub mod logging;

use clap::Parser;
use lookout_core::BackendKind;
use std::path::PathBuf;

/// Lookout - analyze every image that changes under a folder
#[derive(Parser, Debug, Clone)]
#[command(name = "lookout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Folder to watch recursively
    #[arg(long, default_value = "data")]
    pub root: PathBuf,

    /// Analysis template (default: <root>/Analysis_Template.ini)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Backend to use instead of the template's [Backend] kind
    #[arg(long)]
    pub backend: Option<BackendKind>,

    /// Also write diagnostics to a daily rolling file in this folder
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}
