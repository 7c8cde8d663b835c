//! rvcs CLI - recursive version control

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;
mod util;

/// rvcs - recursive version control built on content-addressed snapshots
#[derive(Parser)]
#[command(name = "rvcs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot a file or directory tree
    Snapshot {
        /// Path to snapshot
        path: PathBuf,
        /// Extra parent hashes recorded verbatim on the new snapshot
        /// (used to conclude a manual merge)
        #[arg(long = "additional-parents", value_delimiter = ',')]
        additional_parents: Vec<String>,
    },
    /// Show the snapshot history of a path
    Log {
        /// Path whose history to walk
        path: PathBuf,
        /// Number of entries to show (default: 20)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Merge a snapshot into a destination path
    Merge {
        /// Source snapshot hash, or an identity whose latest published
        /// snapshot should be merged
        src: String,
        /// Destination path on the local filesystem
        dest: PathBuf,
    },
    /// Snapshot a path, sign it, and push the signature to mirrors
    Publish {
        /// Path to publish
        path: PathBuf,
        /// Identity to sign as, e.g. pgp::alice@example.com
        identity: String,
    },
    /// Register a mirror for an identity
    AddMirror {
        /// Only ever pull from this mirror, never push to it
        #[arg(long)]
        read_only: bool,
        identity: String,
        url: String,
    },
    /// Remove a mirror from an identity
    RemoveMirror {
        identity: String,
        url: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Snapshot {
            path,
            additional_parents,
        } => cmd::snapshot::run(&path, &additional_parents).await,
        Commands::Log { path, limit } => cmd::log::run(&path, limit).await,
        Commands::Merge { src, dest } => cmd::merge::run(&src, &dest).await,
        Commands::Publish { path, identity } => cmd::publish::run(&path, &identity).await,
        Commands::AddMirror {
            read_only,
            identity,
            url,
        } => cmd::add_mirror::run(&identity, &url, read_only).await,
        Commands::RemoveMirror { identity, url } => {
            cmd::remove_mirror::run(&identity, &url).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("rvcs: {:#}", err);
            ExitCode::from(util::exit_code_for(&err))
        }
    }
}
