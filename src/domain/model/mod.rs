// Domain models - Core types and data structures

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MixerError, MixerResult};

/// Immutable reference to a source clip, owned by the project store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRef {
    pub id: String,
    #[serde(rename = "filePath", alias = "path")]
    pub path: PathBuf,
    #[serde(alias = "duration")]
    pub duration_seconds: f64,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub group_id: Option<String>,
}

impl ClipRef {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, duration_seconds: f64) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            duration_seconds: duration_seconds.max(0.0),
            order: 0,
            group_id: None,
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// A named group of clips; group mixing takes exactly one clip per group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default, alias = "videos")]
    pub clips: Vec<ClipRef>,
}

/// Project record as loaded from the project store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, alias = "videos")]
    pub clips: Vec<ClipRef>,
    #[serde(default)]
    pub groups: Vec<ClipGroup>,
}

impl ProjectRecord {
    /// Clips and groups sorted by their `order` hints, as the pipeline consumes them.
    pub fn into_sorted(mut self) -> Self {
        self.clips.sort_by_key(|c| c.order);
        self.groups.sort_by_key(|g| g.order);
        for group in &mut self.groups {
            group.clips.sort_by_key(|c| c.order);
        }
        self
    }

    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.duration_seconds).sum()
    }

    /// True when neither the pool nor any group holds a clip
    pub fn has_no_clips(&self) -> bool {
        self.clips.is_empty() && self.groups.iter().all(|g| g.clips.is_empty())
    }
}

/// A clip placed in a variant plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedClip {
    pub clip: ClipRef,
    /// Final 0-based position in the plan
    pub order: usize,
    /// Cut the clip to this length, starting at 0
    pub trim_duration_seconds: Option<f64>,
    /// Timeline is scaled by `1 / speed_factor`
    pub speed_factor: Option<f64>,
}

impl PlannedClip {
    pub fn new(clip: ClipRef, order: usize) -> Self {
        Self {
            clip,
            order,
            trim_duration_seconds: None,
            speed_factor: None,
        }
    }

    /// Length of this clip in the rendered output
    pub fn effective_duration(&self) -> f64 {
        let base = self
            .trim_duration_seconds
            .unwrap_or(self.clip.duration_seconds);
        match self.speed_factor {
            Some(speed) if speed > 0.0 => base / speed,
            _ => base,
        }
    }
}

/// Ordered plan for one output video
#[derive(Debug, Clone, PartialEq)]
pub struct VariantPlan {
    pub index: usize,
    pub clips: Vec<PlannedClip>,
    /// Random playback speed picked for anti-fingerprinting
    pub speed_variation: Option<f64>,
    /// Non-fatal notes recorded while fitting
    pub warnings: Vec<String>,
}

impl VariantPlan {
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn total_original_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.clip.duration_seconds).sum()
    }

    pub fn has_trims(&self) -> bool {
        self.clips.iter().any(|c| c.trim_duration_seconds.is_some())
    }

    /// The uniform duration-fit speed, if the fitter chose that strategy
    pub fn uniform_speed(&self) -> Option<f64> {
        self.clips.first().and_then(|c| c.speed_factor)
    }

    pub fn renumber(&mut self) {
        for (position, planned) in self.clips.iter_mut().enumerate() {
            planned.order = position;
        }
    }
}

/// Group mixing selection mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMixingMode {
    #[default]
    Sequential,
    Random,
}

/// Video bitrate tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitrateTier {
    Low,
    #[default]
    Medium,
    High,
}

impl BitrateTier {
    pub fn video_bitrate(&self) -> &'static str {
        match self {
            BitrateTier::Low => "1000k",
            BitrateTier::Medium => "2500k",
            BitrateTier::High => "5000k",
        }
    }
}

/// Whether source audio is carried into the output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioOption {
    #[default]
    Keep,
    Mute,
}

/// Container metadata profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataProfile {
    Capcut,
    Tiktok,
    Instagram,
    Youtube,
}

impl MetadataProfile {
    /// (encoder, comment) container tags
    pub fn tags(&self) -> (&'static str, &'static str) {
        match self {
            MetadataProfile::Capcut => ("CapCut", "Made with CapCut"),
            MetadataProfile::Tiktok => ("TikTok", "TikTok Video"),
            MetadataProfile::Instagram => ("Instagram", "Instagram Reels"),
            MetadataProfile::Youtube => ("YouTube", "YouTube Video"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationType {
    #[default]
    Original,
    Fixed,
}

/// How Smart Distribution splits the target duration across clips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    Equal,
    #[default]
    Proportional,
    Weighted,
}

/// Output resolution; fixes the short edge of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    P480,
    P720,
    P1080,
    Uhd4k,
}

impl Resolution {
    pub fn short_edge(&self) -> u32 {
        match self {
            Resolution::P480 => 480,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
            Resolution::Uhd4k => 2160,
        }
    }
}

impl FromStr for Resolution {
    type Err = MixerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "480p" => Ok(Resolution::P480),
            "720p" => Ok(Resolution::P720),
            "1080p" => Ok(Resolution::P1080),
            "4k" | "2160p" => Ok(Resolution::Uhd4k),
            _ => Err(MixerError::unsupported("resolution", s)),
        }
    }
}

/// Output frame shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Portrait9x16,
    Landscape16x9,
    Square,
    Portrait4x5,
}

impl AspectRatio {
    /// (width, height) ratio terms
    pub fn terms(&self) -> (u32, u32) {
        match self {
            AspectRatio::Portrait9x16 => (9, 16),
            AspectRatio::Landscape16x9 => (16, 9),
            AspectRatio::Square => (1, 1),
            AspectRatio::Portrait4x5 => (4, 5),
        }
    }

    /// Frame size for a resolution: the shorter side gets the resolution's edge.
    pub fn frame_size(&self, resolution: Resolution) -> (u32, u32) {
        let (w, h) = self.terms();
        let short = resolution.short_edge() as f64;
        let (width, height) = if w <= h {
            (short, short * h as f64 / w as f64)
        } else {
            (short * w as f64 / h as f64, short)
        };
        (even(width), even(height))
    }
}

fn even(value: f64) -> u32 {
    let rounded = value.round() as u32;
    rounded - rounded % 2
}

impl FromStr for AspectRatio {
    type Err = MixerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "9:16" => Ok(AspectRatio::Portrait9x16),
            "16:9" => Ok(AspectRatio::Landscape16x9),
            "1:1" => Ok(AspectRatio::Square),
            "4:5" => Ok(AspectRatio::Portrait4x5),
            _ => Err(MixerError::unsupported("aspect ratio", s)),
        }
    }
}

/// Frame rates the encoder is driven at
pub const SUPPORTED_FRAME_RATES: [u32; 3] = [24, 30, 60];

fn default_speed_min() -> f64 {
    0.5
}

fn default_speed_max() -> f64 {
    2.0
}

fn default_resolution() -> String {
    "720p".to_string()
}

fn default_frame_rate() -> u32 {
    30
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

/// Immutable configuration for a whole generation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    // Mixing (anti-fingerprinting)
    #[serde(default)]
    pub enable_order_mixing: bool,
    #[serde(default)]
    pub enable_different_start: bool,
    #[serde(default, alias = "fixedStartVideoId")]
    pub fixed_start_clip_id: Option<String>,
    #[serde(default)]
    pub enable_group_mixing: bool,
    #[serde(default)]
    pub group_mixing_mode: GroupMixingMode,
    #[serde(default)]
    pub enable_speed_variations: bool,
    #[serde(default = "default_speed_min")]
    pub speed_min: f64,
    #[serde(default = "default_speed_max")]
    pub speed_max: f64,

    // Quality
    #[serde(default = "default_resolution", alias = "videoResolution")]
    pub resolution: String,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default, alias = "videoBitrate")]
    pub bitrate_tier: BitrateTier,
    #[serde(default)]
    pub audio_option: AudioOption,
    #[serde(default, alias = "metadataSource")]
    pub metadata_profile: Option<MetadataProfile>,

    // Duration
    #[serde(default)]
    pub duration_type: DurationType,
    #[serde(default, alias = "fixedDuration")]
    pub fixed_duration_seconds: Option<f64>,
    #[serde(default)]
    pub smart_distribution: bool,
    #[serde(default)]
    pub distribution_mode: DistributionMode,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            enable_order_mixing: false,
            enable_different_start: false,
            fixed_start_clip_id: None,
            enable_group_mixing: false,
            group_mixing_mode: GroupMixingMode::Sequential,
            enable_speed_variations: false,
            speed_min: default_speed_min(),
            speed_max: default_speed_max(),
            resolution: default_resolution(),
            frame_rate: default_frame_rate(),
            aspect_ratio: default_aspect_ratio(),
            bitrate_tier: BitrateTier::Medium,
            audio_option: AudioOption::Keep,
            metadata_profile: None,
            duration_type: DurationType::Original,
            fixed_duration_seconds: None,
            smart_distribution: false,
            distribution_mode: DistributionMode::Proportional,
        }
    }
}

impl GenerationSettings {
    /// Target output duration, when the job asks for a fixed one
    pub fn target_duration(&self) -> Option<f64> {
        match (self.duration_type, self.fixed_duration_seconds) {
            (DurationType::Fixed, Some(target)) if target > 0.0 => Some(target),
            _ => None,
        }
    }

    pub fn keeps_audio(&self) -> bool {
        self.audio_option == AudioOption::Keep
    }

    /// Speed range normalised so that min <= max and both are positive
    pub fn speed_range(&self) -> (f64, f64) {
        let lo = self.speed_min.min(self.speed_max).max(0.01);
        let hi = self.speed_min.max(self.speed_max).max(lo);
        (lo, hi)
    }
}

/// Job payload delivered by the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub generation_id: String,
    pub project_id: String,
    #[serde(default)]
    pub settings: GenerationSettings,
    pub total_videos: usize,
}

/// Generation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    /// pending -> processing -> {completed | failed}; a pending job may also fail
    /// and a failed job may be picked up again by a queue retry
    pub fn can_transition_to(&self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Processing)
        )
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Progress pushed to the job status collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// 1-based index of the variant being encoded
    pub current_video: usize,
    pub total_videos: usize,
    pub video_progress: u32,
    pub overall_progress: u32,
}

impl ProgressUpdate {
    /// `(i / total) * 100 + variant_progress / total`, rounded and clamped
    pub fn for_variant(index: usize, total: usize, variant_progress: f64) -> Self {
        let variant_progress = variant_progress.clamp(0.0, 100.0);
        let total_f = total.max(1) as f64;
        let overall = (index as f64 / total_f) * 100.0 + variant_progress / total_f;
        Self {
            current_video: index + 1,
            total_videos: total,
            video_progress: variant_progress.round() as u32,
            overall_progress: overall.clamp(0.0, 100.0).round() as u32,
        }
    }
}

/// Terminal (or in-flight) status record for a generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub generation_id: String,
    pub status: GenerationStatus,
    #[serde(default)]
    pub output_paths: Vec<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub progress: Option<ProgressUpdate>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationResult {
    pub fn new(generation_id: impl Into<String>, status: GenerationStatus) -> Self {
        Self {
            generation_id: generation_id.into(),
            status,
            output_paths: Vec::new(),
            error_message: None,
            progress: None,
            updated_at: Utc::now(),
        }
    }
}

/// Validate the numeric quality settings that have no enum representation.
pub fn validate_frame_rate(frame_rate: u32) -> MixerResult<u32> {
    if SUPPORTED_FRAME_RATES.contains(&frame_rate) {
        Ok(frame_rate)
    } else {
        Err(MixerError::unsupported("frame rate", frame_rate))
    }
}
