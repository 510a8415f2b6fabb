//! `research`: investment research server and command-line interface

mod commands;
mod error;
mod http;
mod sink;
mod state;
mod ws;

use clap::{Parser, Subcommand};
use research_utils::{LogFormat, Settings};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "research")]
#[command(about = "AI investment research reports over HTTP, WebSocket or the command line", long_about = None)]
#[command(version)]
struct Args {
    /// TOML config file; `RESEARCH_*` environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (pretty or json)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP and WebSocket server (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one analyst and stream its answer to stdout
    Analyze {
        #[arg(short, long)]
        ticker: String,
        #[arg(long)]
        company: String,
        #[arg(short, long, default_value = "chief")]
        analyst: String,
        /// Research question for the analyst
        #[arg(short, long)]
        query: Option<String>,
        /// Text file of supporting material to put in the prompt
        #[arg(long)]
        sources: Option<PathBuf>,
    },
    /// Run several analysts and write the HTML report
    Report {
        #[arg(short, long)]
        ticker: String,
        #[arg(long)]
        company: String,
        /// Comma-separated analyst ids; all analysts when omitted
        #[arg(long, value_delimiter = ',')]
        analysts: Vec<String>,
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Text file of supporting material to put in the prompt
        #[arg(long)]
        sources: Option<PathBuf>,
    },
    /// Convert an HTML report to Word or PDF
    Export {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value = "word")]
        format: String,
        #[arg(short, long)]
        ticker: String,
        #[arg(long)]
        company: String,
    },
    /// Inspect or change the API key pool
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeysAction {
    /// Show pool counters
    Stats,
    /// Re-read the key files and environment
    Reload,
    /// Validate a key and append it to the pool file
    Add { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    research_utils::init_tracing_with(args.log_format);

    let settings = Settings::load(args.config.as_deref())?;

    match args.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            let mut settings = settings;
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            info!("Starting research server");
            commands::serve(settings).await
        }
        Command::Analyze {
            ticker,
            company,
            analyst,
            query,
            sources,
        } => {
            let sources = commands::read_sources(sources.as_deref()).await?;
            commands::analyze(settings, &ticker, &company, &analyst, query, sources).await
        }
        Command::Report {
            ticker,
            company,
            analysts,
            out,
            sources,
        } => {
            let sources = commands::read_sources(sources.as_deref()).await?;
            commands::report(settings, &ticker, &company, &analysts, out, sources).await
        }
        Command::Export {
            input,
            format,
            ticker,
            company,
        } => commands::export(&settings, &input, &format, &ticker, &company).await,
        Command::Keys { action } => commands::keys(&settings, &action),
    }
}
