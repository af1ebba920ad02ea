//! limitd-proto - encode and decode limitd wire messages
//!
//! Converts between the JSON shape limitd clients use and the binary wire
//! format, and lists the raw fields of captured bytes.

mod commands;
mod config;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "limitd-proto")]
#[command(about = "Encode and decode limitd wire protocol messages")]
#[command(version)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, env = "LIMITD_PROTO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Which top-level message the bytes hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MessageKind {
    Request,
    Response,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a JSON message and print the wire bytes as hex
    Encode {
        /// Message type
        kind: MessageKind,

        /// Message JSON (or @file.json to read from file)
        json: String,

        /// Prefix the message with its varint length
        #[arg(short, long)]
        delimited: bool,
    },

    /// Decode wire bytes and print the message as JSON
    Decode {
        /// Message type
        kind: MessageKind,

        /// Hex-encoded bytes (or @file to read raw bytes from file)
        input: String,

        /// Input is a stream of length-prefixed messages
        #[arg(short, long)]
        delimited: bool,
    },

    /// List the raw fields of a message without a schema
    Inspect {
        /// Hex-encoded bytes (or @file to read raw bytes from file)
        input: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    tracing::debug!(
        max_message_size = config.codec.max_message_size,
        pretty = config.output.pretty,
        "configuration loaded"
    );

    match commands::execute(cli.command, &config) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
