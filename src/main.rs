use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use typeahead::config::{Config, ConfigOverrides};
use typeahead::flatten::{flatten, load_document};
use typeahead::service::{OutputFormat, TypeaheadService};

/// Autocomplete query pipeline driven from stdin, one input event per line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to <config dir>/typeahead/config.toml when present)
    #[arg(long, env = "TYPEAHEAD_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Write views as JSON lines instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Flatten a nested JSON document into dotted key paths
    Flatten {
        /// JSON file to read (defaults to stdin)
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout only carries rendered output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if let Some(command) = args.command {
        return handle_command(command).await;
    }

    let mut config = Config::discover(args.config.as_deref())?;
    args.overrides.apply(&mut config);

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let service = TypeaheadService::new(&config, format)?;

    tracing::info!("Reading input events from stdin...");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    tokio::select! {
        result = service.run(stdin, &mut stdout) => result.inspect_err(|e| {
            tracing::error!("driver error: {:?}", e);
        }),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}

async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Flatten { file } => flatten_document(file).await,
    }
}

async fn flatten_document(file: Option<PathBuf>) -> Result<()> {
    let document = load_document(file.as_deref()).await?;
    let flat = flatten(&document);

    println!("{}", serde_json::to_string_pretty(&flat)?);
    Ok(())
}
