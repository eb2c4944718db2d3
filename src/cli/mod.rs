//! CLI module for ClipMix
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

pub use args::{CombinationsArgs, EstimateArgs, GenerateArgs, PlanArgs};

/// ClipMix video variant generator
///
/// Recombines a project's clip pool into many distinct output videos and
/// encodes them with an external encoder.
#[derive(Parser, Debug)]
#[command(name = "clipmix")]
#[command(about = "ClipMix - generate distinct video variants from a clip pool")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (.toml, .yaml or .yml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Encoder binary to run instead of the configured one
    #[arg(long, global = true)]
    pub encoder: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one generation job end to end
    Generate(GenerateArgs),
    /// Show every variant's plan and encoder arguments without encoding
    Plan(PlanArgs),
    /// Estimate combinations, duration and anti-fingerprint strength for a project
    Estimate(EstimateArgs),
    /// Count the distinct orderings of a clip pool
    Combinations(CombinationsArgs),
}
