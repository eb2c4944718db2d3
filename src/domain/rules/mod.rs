// Domain rules - Estimates shown to the user before a generation is queued

use serde::{Deserialize, Serialize};

use crate::domain::model::*;

/// Above this many clips (or groups) the ordering count is reported as unbounded
pub const COMBINATION_LIMIT: usize = 10;

/// Labels for the 0..=5 anti-fingerprint strength scale
pub const STRENGTH_LABELS: [&str; 6] = ["None", "Weak", "Fair", "Good", "Strong", "Excellent"];

/// Number of distinct orderings a clip pool can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum CombinationEstimate {
    Exact(u64),
    Unbounded,
}

impl CombinationEstimate {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, CombinationEstimate::Unbounded)
    }
}

impl std::fmt::Display for CombinationEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombinationEstimate::Exact(n) => write!(f, "{}", n),
            CombinationEstimate::Unbounded => write!(f, "unbounded"),
        }
    }
}

fn factorial(n: usize) -> u64 {
    (1..=n as u64).product()
}

/// Estimate distinct orderings: `clips!`, times `groups!` when group mixing spans several groups.
pub fn estimate_combinations(
    clip_count: usize,
    group_count: usize,
    group_mixing: bool,
) -> CombinationEstimate {
    if clip_count == 0 {
        return CombinationEstimate::Exact(0);
    }
    if clip_count > COMBINATION_LIMIT {
        return CombinationEstimate::Unbounded;
    }

    let mut combinations = factorial(clip_count);

    if group_mixing && group_count > 1 {
        if group_count > COMBINATION_LIMIT {
            return CombinationEstimate::Unbounded;
        }
        combinations = match combinations.checked_mul(factorial(group_count)) {
            Some(n) => n,
            None => return CombinationEstimate::Unbounded,
        };
    }

    CombinationEstimate::Exact(combinations)
}

/// Anti-fingerprint strength on a 0..=5 scale
pub fn anti_fingerprint_strength(settings: &GenerationSettings) -> u8 {
    let mut score = 0u8;

    if settings.enable_order_mixing {
        score += 1;
    }
    if settings.enable_different_start {
        score += 1;
    }
    if settings.enable_group_mixing {
        score += match settings.group_mixing_mode {
            GroupMixingMode::Random => 2,
            GroupMixingMode::Sequential => 1,
        };
    }
    if settings.enable_speed_variations {
        score += 1;
    }

    score.min(5)
}

pub fn strength_label(strength: u8) -> &'static str {
    STRENGTH_LABELS[(strength as usize).min(STRENGTH_LABELS.len() - 1)]
}

/// Expected length of each generated video for a pool whose clips sum to `total_duration`
pub fn estimated_duration(settings: &GenerationSettings, total_duration: f64) -> f64 {
    if let Some(target) = settings.target_duration() {
        return target;
    }
    if settings.enable_speed_variations {
        let (lo, hi) = settings.speed_range();
        return total_duration / ((lo + hi) / 2.0);
    }
    total_duration
}

/// Pre-generation summary for a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationEstimate {
    pub total_source_clips: usize,
    pub total_groups: usize,
    pub estimated_duration_per_video: f64,
    pub total_videos_to_generate: usize,
    pub possible_combinations: CombinationEstimate,
    pub strength: u8,
    pub strength_label: String,
}

impl GenerationEstimate {
    pub fn for_project(
        project: &ProjectRecord,
        settings: &GenerationSettings,
        total_videos: usize,
    ) -> Self {
        let strength = anti_fingerprint_strength(settings);
        Self {
            total_source_clips: project.clips.len(),
            total_groups: project.groups.len(),
            estimated_duration_per_video: estimated_duration(settings, project.total_duration()),
            total_videos_to_generate: total_videos,
            possible_combinations: estimate_combinations(
                project.clips.len(),
                project.groups.len(),
                settings.enable_group_mixing,
            ),
            strength,
            strength_label: strength_label(strength).to_string(),
        }
    }
}

#[cfg(test)]
mod tests;
