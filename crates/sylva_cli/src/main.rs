//! Sylva CLI
//!
//! Command-line tools driving the Sylva request handler in-process.
//!
//! # Commands
//!
//! - `create` - Create or replace a resource from an XML document
//! - `delete` - Delete all databases, a database, a resource or a subtree
//! - `get` - Print a resource, optionally at a past revision
//! - `list` - List databases or the resources of a database
//! - `token` - Issue a bearer token for the configured secret

mod commands;

use clap::{Parser, Subcommand};
use commands::Session;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sylva command-line tools.
#[derive(Parser)]
#[command(name = "sylva")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Storage root holding all databases
    #[arg(global = true, short, long, default_value = "sylva-data")]
    root: PathBuf,

    /// Token signing secret (random per invocation if omitted; required by `token`)
    #[arg(global = true, long)]
    secret: Option<String>,

    /// Indent serialized output
    #[arg(global = true, long)]
    pretty: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or replace a resource from an XML document
    Create {
        /// Database name
        database: String,

        /// Resource name (defaults to the database name)
        #[arg(short, long)]
        resource: Option<String>,

        /// Document file (reads stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Keep whitespace-only text
        #[arg(long)]
        keep_whitespace: bool,
    },

    /// Delete all databases, a database, a resource or a subtree
    Delete {
        /// Database name (all databases if omitted)
        database: Option<String>,

        /// Resource name
        resource: Option<String>,

        /// Node id of the subtree to remove
        #[arg(short, long)]
        node: Option<String>,
    },

    /// Print a resource
    Get {
        /// Database name
        database: String,

        /// Resource name
        resource: String,

        /// Revision to read (latest if omitted)
        #[arg(long)]
        revision: Option<u64>,
    },

    /// List databases, or the resources of a database
    List {
        /// Database name
        database: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Issue a bearer token (requires --secret)
    Token {
        /// Granted scopes (create, delete, view); all if omitted
        #[arg(short, long)]
        scope: Vec<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let session = Session::new(cli.root, cli.secret, cli.pretty)?;

    match cli.command {
        Commands::Create {
            database,
            resource,
            input,
            keep_whitespace,
        } => {
            commands::create::run(&session, database, resource, input.as_deref(), keep_whitespace)?;
        }
        Commands::Delete {
            database,
            resource,
            node,
        } => {
            commands::delete::run(&session, database.as_deref(), resource.as_deref(), node.as_deref())?;
        }
        Commands::Get {
            database,
            resource,
            revision,
        } => {
            commands::get::run(&session, database, resource, revision)?;
        }
        Commands::List { database, format } => {
            commands::list::run(&session, database.as_deref(), &format)?;
        }
        Commands::Token { scope } => {
            commands::token::run(&session, &scope)?;
        }
        Commands::Version => {
            println!("Sylva CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Storage format v{}.{}", sylva_core::FORMAT_VERSION.0, sylva_core::FORMAT_VERSION.1);
        }
    }

    Ok(())
}
