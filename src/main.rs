//! Organizer Store - Main Entry Point
//!
//! Serves the organizer storage engine over MCP on stdio.
//! The actual implementation is in the `organizer_store` library.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use mcp_attr::server::serve_stdio;
use organizer_store::OrganizerServerHandler;
use organizer_store::logging::{self, LogFormat};

/// Organizer Store - versioned personal organizer storage via Model Context Protocol
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the organizer data file (TOML key/value table)
    file: String,

    /// Log output format on stderr; overrides RUST_LOG_FORMAT
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // No arguments: show help and exit with an error code
    if std::env::args().len() == 1 {
        let mut cmd = Args::command();
        cmd.print_help().ok();
        println!();
        std::process::exit(2);
    }

    let args = Args::parse();
    logging::init(args.log_format.unwrap_or_else(LogFormat::from_env));

    let handler = OrganizerServerHandler::new(&args.file)?;
    serve_stdio(handler).await?;
    Ok(())
}
