//! chordsmith - learn chord voicings from MIDI and harmonize melodies
//!
//! Subcommands:
//! - `chordsmith train <dir>` - Build a corpus from a directory of MIDI files and save a model
//! - `chordsmith harmonize <input>` - Add a predicted chord track to a melody
//! - `chordsmith inspect <input>` - Show the tracks and timing chordsmith sees in a file
//! - `chordsmith config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smithconf::ChordsmithConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "chordsmith")]
#[command(about = "Learn chord voicings from MIDI files and harmonize melodies")]
#[command(version)]
struct Cli {
    /// Config file used in place of ./chordsmith.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a chord model from every .mid/.midi file in a directory
    Train {
        /// Directory of training files (not searched recursively)
        dir: PathBuf,

        /// Where to write the model artifact
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Melody notes per window
        #[arg(short, long)]
        seq_length: Option<usize>,

        /// Share of rows held out for accuracy reporting (0 disables)
        #[arg(long)]
        holdout: Option<f64>,

        /// Print the corpus report, row counts and holdout accuracy as JSON
        #[arg(long)]
        json: bool,
    },

    /// Predict chords for a melody and write them as a new track
    Harmonize {
        /// Input MIDI file
        input: PathBuf,

        /// Model artifact to use
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Output MIDI file (default: <input>.chords.mid)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List instrument tracks, track selection and downbeats of a file
    Inspect {
        /// Input MIDI file
        input: PathBuf,
    },

    /// Show the effective configuration and where it came from
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = ChordsmithConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let level = match cli.verbose {
        0 => config.telemetry.log_level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Train {
            dir,
            model,
            seq_length,
            holdout,
            json,
        } => {
            let model = model.unwrap_or_else(|| config.paths.model.clone());
            commands::train(
                &dir,
                &model,
                seq_length.unwrap_or(config.sequence.seq_length),
                holdout.unwrap_or(config.training.holdout_fraction),
                json,
            )?;
        }
        Commands::Harmonize {
            input,
            model,
            output,
        } => {
            let model = model.unwrap_or_else(|| config.paths.model.clone());
            let output = output.or_else(|| config.paths.output.clone());
            commands::harmonize(&input, &model, output, &config)?;
        }
        Commands::Inspect { input } => {
            commands::inspect(&input)?;
        }
        Commands::Config => {
            commands::show_config(&config, &sources);
        }
    }

    Ok(())
}
