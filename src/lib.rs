//! ClipMix video variant generator library
//!
//! Plans, fits and encodes distinct video variants from a pool of clips.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod error;
pub mod planner;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use domain::model::{
    ClipGroup, ClipRef, GenerationJob, GenerationResult, GenerationSettings, GenerationStatus,
    ProgressUpdate, ProjectRecord, VariantPlan,
};
pub use error::{MixerError, MixerResult};
