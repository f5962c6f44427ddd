use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fleet-enroll")]
#[command(about = "Collection hierarchies, duplicate membership and device enrollment", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a pilot and child collections under a parent collection
    Hierarchy(HierarchyArgs),
    /// Snapshot membership and list devices found in more than one collection
    Dedup(DedupArgs),
    /// Resolve, probe and register devices in the hosts file
    Enroll(EnrollArgs),
    /// Inspect or reset the hosts-file registry
    #[command(subcommand)]
    Registry(RegistryCommand),
    /// Show a collection and its device count
    ShowCollection {
        /// Collection ID
        id: String,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct HierarchyArgs {
    /// Parent collection ID (prompted for when missing or unknown)
    #[arg(long)]
    pub parent: Option<String>,
    /// Also create a {parent}_PILOT collection
    #[arg(long)]
    pub pilot: bool,
    /// Number of child collections (prompted for when missing or invalid)
    #[arg(long)]
    pub children: Option<String>,
    /// Check the new collections for duplicate members once they exist
    #[arg(long)]
    pub dedup: bool,
    /// Write membership snapshots to CSV (with --dedup)
    #[arg(long)]
    pub export: bool,
}

#[derive(Debug, Args)]
pub struct DedupArgs {
    /// Collection IDs to compare
    #[arg(required = true)]
    pub ids: Vec<String>,
    /// Write membership snapshots and duplicates to CSV
    #[arg(long)]
    pub export: bool,
}

#[derive(Debug, Args)]
pub struct EnrollArgs {
    /// Device short names
    pub names: Vec<String>,
    /// Read device names from a file (one per line, # comments)
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Open a management session to each registered device
    #[arg(long)]
    pub session: bool,
    /// Clear the registry first (asks for confirmation)
    #[arg(long)]
    pub clear_registry: bool,
}

#[derive(Debug, Subcommand)]
pub enum RegistryCommand {
    /// List registry entries
    List,
    /// Truncate the registry file
    Clear,
}
