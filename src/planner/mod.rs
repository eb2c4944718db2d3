//! Variant planning and duration fitting module
//!
//! The planner turns a clip pool into one ordered [`VariantPlan`] per output
//! index; the fitter then annotates that plan so the rendered video matches a
//! fixed target duration.

pub mod duration;
pub mod variant;

pub use duration::{distribute, DurationFitter, FitStrategy};
pub use variant::{rotate, VariantPlanner};

pub use crate::domain::model::{PlannedClip, VariantPlan};
