use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "famtree", about = "Family tree store inspection and import/export", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database file
    #[arg(long, global = true, default_value = "famtree.sqlite3")]
    pub db: PathBuf,

    /// trace|debug|info|warn|error; defaults by build mode
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off when absent
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check core linkage
    Ping,
    /// Decode and print one owner's tree
    Show(OwnerArgs),
    /// Write one owner's tree as legacy JSON rows to stdout
    Export(OwnerArgs),
    /// Load legacy JSON rows from a file into the store
    Import(ImportArgs),
    /// List invitations sent or received by a user
    Invitations(InvitationsArgs),
}

#[derive(Args)]
pub struct OwnerArgs {
    /// Tree owner id
    #[arg(long)]
    pub owner: Uuid,
}

#[derive(Args)]
pub struct ImportArgs {
    /// JSON file holding an array of legacy member rows
    pub file: PathBuf,
}

#[derive(Args)]
pub struct InvitationsArgs {
    /// User id
    #[arg(long)]
    pub user: Uuid,
    /// Only pending invitations received by the user
    #[arg(long)]
    pub pending: bool,
}
