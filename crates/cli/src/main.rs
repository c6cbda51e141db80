//! Sentinel CLI: the main entry point.
//!
//! Commands:
//! - `onboard`   Write a default config file
//! - `doctor`    Diagnose configuration and provider access
//! - `flows`     List registered flows and tools
//! - `run`       Run any flow with JSON input
//! - `weather`, `briefing`, `birds`, `pest`, `ask`   Farm flow shortcuts
//! - `wav`       Encode raw PCM to WAV, or inspect a WAV header
//! - `serve`     Start the HTTP gateway

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "sentinel",
    about = "Sentinel: AI flows for farm monitoring",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Config file (defaults to ~/.sentinel/config.toml)
    #[arg(long, global = true, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Diagnose configuration and provider access
    Doctor,

    /// List registered flows and tools
    Flows,

    /// Run a flow by name with JSON input
    Run {
        /// Flow name, e.g. weatherSummaryFlow
        flow: String,

        /// Input as a JSON string
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,

        /// Read input JSON from a file
        #[arg(long)]
        input_file: Option<PathBuf>,
    },

    /// Summarize the week's weather for the farm
    Weather {
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Daily briefing: weather, bird activity and system status
    Briefing {
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Predict bird activity from the last 24 hours of detections
    Birds,

    /// Identify a pest from a photo
    Pest {
        /// Photo file (jpg, png, webp, gif, heic)
        #[arg(long)]
        image: PathBuf,

        /// Where it was found, what it was doing
        #[arg(long)]
        notes: Option<String>,
    },

    /// Ask the farm assistant a question
    Ask {
        question: String,

        /// Write the spoken answer to this WAV file
        #[arg(long)]
        save_audio: Option<PathBuf>,

        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// WAV utilities
    Wav {
        #[command(subcommand)]
        command: commands::wav::WavCommand,
    },

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let ctx = commands::Context::new(cli.config, cli.verbose);

    match cli.command {
        Commands::Onboard => commands::onboard::run(&ctx)?,
        Commands::Doctor => commands::doctor::run(&ctx).await?,
        Commands::Flows => commands::flows::run(&ctx)?,
        Commands::Run {
            flow,
            input,
            input_file,
        } => commands::run::run(&ctx, &flow, input, input_file).await?,
        Commands::Weather { lat, lon } => commands::farm::weather(&ctx, lat, lon).await?,
        Commands::Briefing { lat, lon } => commands::farm::briefing(&ctx, lat, lon).await?,
        Commands::Birds => commands::farm::birds(&ctx).await?,
        Commands::Pest { image, notes } => commands::farm::pest(&ctx, &image, notes).await?,
        Commands::Ask {
            question,
            save_audio,
            lat,
            lon,
        } => commands::farm::ask(&ctx, question, save_audio, lat, lon).await?,
        Commands::Wav { command } => commands::wav::run(command)?,
        Commands::Serve { port } => commands::serve::run(&ctx, port).await?,
    }

    Ok(())
}
