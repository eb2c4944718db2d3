//! Per-variant clip selection and ordering

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::domain::model::{
    ClipGroup, ClipRef, GenerationSettings, GroupMixingMode, PlannedClip, VariantPlan,
};
use crate::error::{MixerError, MixerResult};

/// Rotate `items` left by `positions`; a no-op when `positions % len == 0`.
pub fn rotate<T>(items: &mut [T], positions: usize) {
    if items.is_empty() {
        return;
    }
    let shift = positions % items.len();
    items.rotate_left(shift);
}

/// Builds the ordered clip list for each requested output index
pub struct VariantPlanner<'a> {
    clips: &'a [ClipRef],
    groups: &'a [ClipGroup],
    settings: &'a GenerationSettings,
}

impl<'a> VariantPlanner<'a> {
    /// Create a planner over a clip pool (in pool order) and its groups (in group order)
    pub fn new(
        clips: &'a [ClipRef],
        groups: &'a [ClipGroup],
        settings: &'a GenerationSettings,
    ) -> Self {
        Self {
            clips,
            groups,
            settings,
        }
    }

    /// Plan variant `index`.
    ///
    /// Randomness (shuffles, random group picks, speed variation) is drawn
    /// from `rng` so callers can seed it.
    pub fn plan<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> MixerResult<VariantPlan> {
        let mut selected = self.select_clips(index, rng);

        if self.settings.enable_order_mixing {
            selected.shuffle(rng);
            debug!("Variant {}: order mixed", index);
        }

        if self.settings.enable_different_start && index > 0 {
            rotate(&mut selected, index);
            debug!("Variant {}: rotated start by {}", index, index);
        }

        if index == 0 {
            if let Some(fixed_id) = self.settings.fixed_start_clip_id.as_deref() {
                move_to_front(&mut selected, fixed_id);
            }
        }

        if selected.is_empty() {
            return Err(MixerError::EmptyPlan { variant: index });
        }

        let clips = selected
            .into_iter()
            .enumerate()
            .map(|(position, clip)| PlannedClip::new(clip, position))
            .collect();

        let speed_variation = if self.settings.enable_speed_variations {
            let (lo, hi) = self.settings.speed_range();
            Some(rng.gen_range(lo..=hi))
        } else {
            None
        };

        Ok(VariantPlan {
            index,
            clips,
            speed_variation,
            warnings: Vec::new(),
        })
    }

    fn select_clips<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Vec<ClipRef> {
        if !(self.settings.enable_group_mixing && !self.groups.is_empty()) {
            return self.clips.to_vec();
        }

        // Ungrouped clips are left out entirely in group mode.
        self.groups
            .iter()
            .filter(|group| !group.clips.is_empty())
            .map(|group| {
                let pick = match self.settings.group_mixing_mode {
                    GroupMixingMode::Sequential => index % group.clips.len(),
                    GroupMixingMode::Random => rng.gen_range(0..group.clips.len()),
                };
                debug!(
                    "Variant {}: group \"{}\" -> clip {}/{}",
                    index,
                    group.name,
                    pick + 1,
                    group.clips.len()
                );
                let mut clip = group.clips[pick].clone();
                if clip.group_id.is_none() {
                    clip.group_id = Some(group.id.clone());
                }
                clip
            })
            .collect()
    }
}

fn move_to_front(clips: &mut Vec<ClipRef>, clip_id: &str) {
    if let Some(position) = clips.iter().position(|c| c.id == clip_id) {
        if position > 0 {
            let clip = clips.remove(position);
            clips.insert(0, clip);
        }
    }
}
