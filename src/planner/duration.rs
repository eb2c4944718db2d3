//! Fitting a variant plan to a fixed target duration

use tracing::{info, warn};

use crate::domain::model::{DistributionMode, GenerationSettings, VariantPlan};

/// Plans within this many seconds of the target are left alone
pub const FIT_TOLERANCE_SECS: f64 = 0.1;

/// Uniform speed factors outside this range are flagged as a quality risk
pub const SAFE_SPEED_RANGE: (f64, f64) = (0.5, 2.0);

/// Exponent applied to clip length in weighted distribution
const WEIGHT_EXPONENT: f64 = 1.5;

/// Strategy the fitter applied to a plan
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitStrategy {
    /// Original duration kept, or already within tolerance
    Unchanged,
    /// Per-clip trims set by Smart Distribution
    Trim(DistributionMode),
    /// One speed factor set on every clip
    Speed(f64),
}

/// Per-clip trim lengths for `durations` so the output lasts about `target` seconds.
///
/// `equal` caps each share at the clip's own length, so a pool with short
/// clips renders shorter than `target`.
pub fn distribute(durations: &[f64], target: f64, mode: DistributionMode) -> Vec<f64> {
    if durations.is_empty() {
        return Vec::new();
    }

    match mode {
        DistributionMode::Equal => {
            let share = target / durations.len() as f64;
            durations.iter().map(|d| share.min(*d)).collect()
        }
        DistributionMode::Proportional => {
            let total: f64 = durations.iter().sum();
            if total <= 0.0 {
                return vec![0.0; durations.len()];
            }
            durations.iter().map(|d| d / total * target).collect()
        }
        DistributionMode::Weighted => {
            let weights: Vec<f64> = durations.iter().map(|d| d.powf(WEIGHT_EXPONENT)).collect();
            let total_weight: f64 = weights.iter().sum();
            if total_weight <= 0.0 {
                return vec![0.0; durations.len()];
            }
            weights.iter().map(|w| w / total_weight * target).collect()
        }
    }
}

/// Annotates plans with trims or a uniform speed
pub struct DurationFitter<'a> {
    settings: &'a GenerationSettings,
}

impl<'a> DurationFitter<'a> {
    pub fn new(settings: &'a GenerationSettings) -> Self {
        Self { settings }
    }

    /// Fit `plan` in place and report the strategy used.
    pub fn fit(&self, plan: &mut VariantPlan) -> FitStrategy {
        let target = match self.settings.target_duration() {
            Some(target) => target,
            None => return FitStrategy::Unchanged,
        };

        for planned in &mut plan.clips {
            planned.trim_duration_seconds = None;
            planned.speed_factor = None;
        }

        let total_original = plan.total_original_duration();
        info!(
            "Variant {}: fitting {:.2}s of clips to {:.2}s",
            plan.index, total_original, target
        );

        if (total_original - target).abs() < FIT_TOLERANCE_SECS {
            info!("Variant {}: duration already fits", plan.index);
            return FitStrategy::Unchanged;
        }

        if total_original <= 0.0 {
            let note = "Clips have no measurable duration; leaving plan unfitted".to_string();
            warn!("Variant {}: {}", plan.index, note);
            plan.warnings.push(note);
            return FitStrategy::Unchanged;
        }

        if self.settings.smart_distribution {
            let mode = self.settings.distribution_mode;
            let durations: Vec<f64> = plan.clips.iter().map(|c| c.clip.duration_seconds).collect();
            let trims = distribute(&durations, target, mode);
            for (planned, trim) in plan.clips.iter_mut().zip(trims) {
                planned.trim_duration_seconds = Some(trim);
            }
            info!("Variant {}: smart distribution ({:?})", plan.index, mode);
            return FitStrategy::Trim(mode);
        }

        let speed_factor = total_original / target;
        let (lo, hi) = SAFE_SPEED_RANGE;
        if speed_factor < lo || speed_factor > hi {
            let note = format!(
                "Speed factor {:.2}x is outside {:.1}x-{:.1}x; output quality may suffer",
                speed_factor, lo, hi
            );
            warn!("Variant {}: {}", plan.index, note);
            plan.warnings.push(note);
        }
        for planned in &mut plan.clips {
            planned.speed_factor = Some(speed_factor);
        }
        info!(
            "Variant {}: speed adjustment {:.3}x ({})",
            plan.index,
            speed_factor,
            if speed_factor > 1.0 { "faster" } else { "slower" }
        );
        FitStrategy::Speed(speed_factor)
    }
}
