mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use netwatch_types::DEFAULT_METADATA_PATH;

/// netwatch -- record and diagnose browser network activity over CDP.
#[derive(Parser, Debug)]
#[command(name = "netwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record network activity of a browser tab until interrupted
    Capture {
        /// DevTools target id, or a full ws:// debugger URL
        target: String,

        /// Remote debugging port of the browser
        #[arg(long, env = "CDP_PORT")]
        port: Option<String>,

        /// Where to write the raw live-tail log
        #[arg(long)]
        raw_log: Option<PathBuf>,

        /// Where to write the normalized record log
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Analyze a recorded network log and print a report
    Diagnose {
        /// Normalized record log to analyze
        #[arg(default_value = DEFAULT_METADATA_PATH)]
        path: PathBuf,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is reserved for reports.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Capture {
            target,
            port,
            raw_log,
            metadata,
        } => commands::capture::run(&target, port.as_deref(), raw_log, metadata),
        Commands::Diagnose { path, format } => commands::diagnose::run(&path, &format),
    }
}
