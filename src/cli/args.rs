//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Job payload: { generationId, projectId, settings, totalVideos }
    #[arg(short, long)]
    pub job: PathBuf,

    /// Seed for the mixing generator (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Job payload: { generationId, projectId, settings, totalVideos }
    #[arg(short, long)]
    pub job: PathBuf,

    /// Seed for the mixing generator (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the estimate command
#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Project id in the project store
    #[arg(short, long)]
    pub project: String,

    /// Generation settings file (JSON)
    #[arg(short, long)]
    pub settings: PathBuf,

    /// Number of videos that would be generated
    #[arg(long, default_value = "1")]
    pub videos: usize,
}

/// Arguments for the combinations command
#[derive(Args, Debug)]
pub struct CombinationsArgs {
    /// Number of clips in the pool
    #[arg(long)]
    pub clips: usize,

    /// Number of clip groups
    #[arg(long, default_value = "0")]
    pub groups: usize,

    /// Group mixing is enabled
    #[arg(long)]
    pub group_mixing: bool,
}
