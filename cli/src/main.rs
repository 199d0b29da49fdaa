//! ChainRelay CLI — inspect relay configuration and run simulated chains
//! through the relay.
//!
//! # Commands
//! ```text
//! chainrelay info
//! chainrelay config   --config relay.json
//! chainrelay simulate --blocks 20 --start-block 5 --txs-per-block 3
//! chainrelay simulate --sink kinesis --stream chain-events --region us-east-1
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chainrelay_core::{RelayBuilder, RelayConfig, StreamSink};
use chainrelay_kinesis::KinesisSink;
use clap::{Parser, Subcommand, ValueEnum};

mod logging;
mod simulate;
mod sink;

use logging::{init_tracing, LogConfig};
use simulate::Simulation;
use sink::LogSink;

#[derive(Parser)]
#[command(
    name = "chainrelay",
    about = "Forward chain events to an append-only stream — ChainRelay CLI",
    long_about = "
ChainRelay CLI: validate relay configuration and drive a simulated chain
through the relay pipeline.

ENVIRONMENT VARIABLES:
  RUST_LOG                 Overrides --log-level (tracing EnvFilter syntax)
  AWS_PROFILE / AWS_*      Credentials for --sink kinesis
",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the defaults of every relay option
    Info,

    /// Load, validate and print the effective configuration
    Config {
        /// JSON config file (kebab-case keys)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Feed a synthetic chain through the relay and print the final metrics
    Simulate {
        /// JSON config file (kebab-case keys)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of blocks to produce
        #[arg(long, default_value_t = 20)]
        blocks: u32,
        /// Override start-block from the config
        #[arg(long)]
        start_block: Option<u32>,
        /// Transactions per block
        #[arg(long, default_value_t = 3)]
        txs_per_block: u32,
        /// Where forwarded payloads go
        #[arg(long, value_enum, default_value_t = SinkKind::Log)]
        sink: SinkKind,
        /// Override stream-name from the config
        #[arg(long)]
        stream: Option<String>,
        /// Override region from the config
        #[arg(long)]
        region: Option<String>,
        /// Global log level
        #[arg(long, default_value = "info")]
        log_level: String,
        /// Emit JSON structured logs
        #[arg(long)]
        json_logs: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SinkKind {
    /// Write payloads to the log
    Log,
    /// Put records on an AWS Kinesis stream
    Kinesis,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info => cmd_info(),
        Commands::Config { config } => cmd_config(config),
        Commands::Simulate {
            config,
            blocks,
            start_block,
            txs_per_block,
            sink,
            stream,
            region,
            log_level,
            json_logs,
        } => {
            init_tracing(&LogConfig {
                level: log_level,
                json: json_logs,
                ..LogConfig::default()
            });

            let mut builder = RelayBuilder::from_config(load_config(config)?);
            if let Some(block) = start_block {
                builder = builder.start_block(block);
            }
            if let Some(stream) = stream {
                builder = builder.stream_name(stream);
            }
            if let Some(region) = region {
                builder = builder.region(region);
            }
            let config = builder.build_config()?;

            let sink: Box<dyn StreamSink> = match sink {
                SinkKind::Log => Box::new(LogSink::new()),
                SinkKind::Kinesis => Box::new(KinesisSink::new()),
            };

            let snapshot = Simulation {
                blocks,
                txs_per_block,
            }
            .run(config, sink)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<RelayConfig> {
    match path {
        Some(path) => RelayConfig::from_json_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(RelayConfig::default()),
    }
}

fn cmd_info() -> Result<()> {
    let defaults = RelayConfig::default();
    println!("ChainRelay v{}", env!("CARGO_PKG_VERSION"));
    println!("  region:          {}", defaults.region);
    println!("  stream-name:     {}", defaults.stream_name);
    println!("  start-block:     {} (0 = forward from startup)", defaults.start_block);
    println!("  queue-capacity:  {} per event kind (soft)", defaults.queue_capacity);
    println!(
        "  backpressure:    {}ms step, {}ms max",
        defaults.backpressure.step_ms, defaults.backpressure.max_ms
    );
    println!(
        "  forwarding:      applied-transactions={} accepted-transactions={} accepted-blocks={} irreversible-blocks={}",
        defaults.forward.applied_transactions,
        defaults.forward.accepted_transactions,
        defaults.forward.accepted_blocks,
        defaults.forward.irreversible_blocks,
    );
    println!("  sinks:           log, kinesis");
    Ok(())
}

fn cmd_config(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
