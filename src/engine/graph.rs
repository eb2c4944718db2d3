//! Graph builder: turns an annotated variant plan into an encoder invocation

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::domain::model::{
    validate_frame_rate, AspectRatio, GenerationSettings, Resolution, VariantPlan,
};
use crate::error::{MixerError, MixerResult};
use crate::utils::path::PathUtils;

const VIDEO_CODEC: &str = "libx264";
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "128k";
const SUPPORTED_CONTAINERS: [&str; 2] = ["mp4", "mov"];

const THUMBNAIL_OFFSET_SECS: f64 = 1.0;
const THUMBNAIL_SIZE: (u32, u32) = (640, 360);

/// Bounds a single `atempo` stage accepts
const ATEMPO_RANGE: (f64, f64) = (0.5, 2.0);

/// Concat manifest the encoder reads in list-concat mode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub path: PathBuf,
    pub contents: String,
}

/// Everything needed to run the encoder once
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncoderInvocation {
    pub inputs: Vec<PathBuf>,
    /// Video filter graph text (`-filter_complex` or `-vf`)
    pub filter_graph: String,
    /// Full argument list, excluding the program name
    pub args: Vec<String>,
    pub output_path: PathBuf,
    /// Written by the supervisor before launch
    pub manifest: Option<Manifest>,
    /// Deleted by the supervisor on every exit path
    pub temp_files: Vec<PathBuf>,
    /// Expected output length, used to turn timestamps into a percentage
    pub expected_duration_secs: f64,
}

/// Output characteristics shared by both concat strategies
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub video_bitrate: &'static str,
    pub keep_audio: bool,
    pub metadata: Option<(&'static str, &'static str)>,
    pub container: String,
    pub threads: Option<usize>,
    /// Hard truncation applied in list-concat mode
    pub fixed_duration: Option<f64>,
}

impl OutputFormat {
    /// Validate the enumerated quality settings and resolve the frame size.
    pub fn from_settings(
        settings: &GenerationSettings,
        container: &str,
        threads: Option<usize>,
    ) -> MixerResult<Self> {
        let resolution: Resolution = settings.resolution.parse()?;
        let aspect: AspectRatio = settings.aspect_ratio.parse()?;
        let frame_rate = validate_frame_rate(settings.frame_rate)?;
        let container = container.trim().to_lowercase();
        if !SUPPORTED_CONTAINERS.contains(&container.as_str()) {
            return Err(MixerError::unsupported("container", container));
        }
        let (width, height) = aspect.frame_size(resolution);

        Ok(Self {
            width,
            height,
            frame_rate,
            video_bitrate: settings.bitrate_tier.video_bitrate(),
            keep_audio: settings.keeps_audio(),
            metadata: settings.metadata_profile.map(|p| p.tags()),
            container,
            threads: threads.filter(|t| *t > 0),
            fixed_duration: settings.target_duration(),
        })
    }

    /// `scale` to fit inside the frame, then pad to it, centred
    fn fit_filter(&self, pad_color: Option<&str>) -> String {
        let mut filter = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = self.width,
            h = self.height
        );
        if let Some(color) = pad_color {
            filter.push(':');
            filter.push_str(color);
        }
        filter
    }

    /// Codec, rate, audio, container and metadata options
    fn output_args(&self) -> Vec<String> {
        let mut args = strings(&["-c:v", VIDEO_CODEC, "-b:v", self.video_bitrate]);
        args.push("-r".into());
        args.push(self.frame_rate.to_string());

        if self.keep_audio {
            args.extend(strings(&["-c:a", AUDIO_CODEC, "-b:a", AUDIO_BITRATE]));
        } else {
            args.push("-an".into());
        }

        args.extend(strings(&[
            "-movflags",
            "+faststart",
            "-preset",
            "fast",
            "-pix_fmt",
            "yuv420p",
            "-max_muxing_queue_size",
            "1024",
        ]));

        if let Some((encoder, comment)) = self.metadata {
            args.push("-metadata".into());
            args.push(format!("encoder={}", encoder));
            args.push("-metadata".into());
            args.push(format!("comment={}", comment));
        }

        if let Some(threads) = self.threads {
            args.push("-threads".into());
            args.push(threads.to_string());
        }

        args.push("-f".into());
        args.push(self.container.clone());
        args
    }
}

/// How the clips of a plan are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStrategy {
    /// Per-clip trim stages feeding a concat filter
    TrimThenConcat,
    /// Manifest fed to the concat demuxer, with a uniform speed transform
    ListConcat,
}

impl ConcatStrategy {
    /// Trim-then-concat whenever any clip carries a trim length
    pub fn select(plan: &VariantPlan) -> Self {
        if plan.has_trims() {
            ConcatStrategy::TrimThenConcat
        } else {
            ConcatStrategy::ListConcat
        }
    }

    pub fn build_invocation(
        &self,
        plan: &VariantPlan,
        format: &OutputFormat,
        output_path: &Path,
    ) -> MixerResult<EncoderInvocation> {
        if plan.is_empty() {
            return Err(MixerError::EmptyPlan {
                variant: plan.index,
            });
        }

        let mut clips: Vec<_> = plan.clips.iter().collect();
        clips.sort_by_key(|c| c.order);

        match self {
            ConcatStrategy::TrimThenConcat => {
                let inputs: Vec<PathBuf> = clips.iter().map(|c| c.clip.path.clone()).collect();
                let n = inputs.len();
                let mut graph = String::new();

                for (i, planned) in clips.iter().enumerate() {
                    match planned.trim_duration_seconds {
                        Some(trim) => {
                            graph.push_str(&format!(
                                "[{i}:v]trim=duration={t},setpts=PTS-STARTPTS[v{i}];",
                                i = i,
                                t = fmt_secs(trim)
                            ));
                            if format.keep_audio {
                                graph.push_str(&format!(
                                    "[{i}:a]atrim=duration={t},asetpts=PTS-STARTPTS[a{i}];",
                                    i = i,
                                    t = fmt_secs(trim)
                                ));
                            }
                        }
                        None => {
                            graph.push_str(&format!("[{i}:v]null[v{i}];", i = i));
                            if format.keep_audio {
                                graph.push_str(&format!("[{i}:a]anull[a{i}];", i = i));
                            }
                        }
                    }
                }

                for i in 0..n {
                    graph.push_str(&format!("[v{}]", i));
                    if format.keep_audio {
                        graph.push_str(&format!("[a{}]", i));
                    }
                }
                if format.keep_audio {
                    graph.push_str(&format!("concat=n={}:v=1:a=1[v][a];", n));
                } else {
                    graph.push_str(&format!("concat=n={}:v=1:a=0[v];", n));
                }
                graph.push_str(&format!("[v]{}[outv]", format.fit_filter(None)));

                let mut args = preamble();
                for input in &inputs {
                    args.push("-i".into());
                    args.push(input.to_string_lossy().into_owned());
                }
                args.push("-filter_complex".into());
                args.push(graph.clone());
                args.extend(strings(&["-map", "[outv]"]));
                if format.keep_audio {
                    args.extend(strings(&["-map", "[a]"]));
                }
                args.extend(format.output_args());
                args.push(output_path.to_string_lossy().into_owned());

                let expected: f64 = clips.iter().map(|c| c.effective_duration()).sum();

                Ok(EncoderInvocation {
                    inputs,
                    filter_graph: graph,
                    args,
                    output_path: output_path.to_path_buf(),
                    manifest: None,
                    temp_files: Vec::new(),
                    expected_duration_secs: expected,
                })
            }
            ConcatStrategy::ListConcat => {
                let manifest_path = PathUtils::manifest_path_for(output_path);
                let mut lines = Vec::with_capacity(clips.len());
                for planned in &clips {
                    let absolute = PathUtils::absolutize(&planned.clip.path)?;
                    lines.push(manifest_line(&absolute));
                }
                let manifest = Manifest {
                    path: manifest_path.clone(),
                    contents: lines.join("\n"),
                };

                // the duration-fit speed wins over the anti-fingerprint variation
                let speed = plan
                    .uniform_speed()
                    .or(plan.speed_variation)
                    .filter(|s| *s > 0.0);

                let mut video_filters = vec![format.fit_filter(Some("black"))];
                let mut audio_filter = None;
                if let Some(speed) = speed {
                    video_filters.push(format!("setpts={:.3}*PTS", 1.0 / speed));
                    if format.keep_audio {
                        audio_filter = Some(atempo_chain(speed));
                    }
                }
                let graph = video_filters.join(",");

                let mut args = preamble();
                args.extend(strings(&["-f", "concat", "-safe", "0", "-i"]));
                args.push(manifest_path.to_string_lossy().into_owned());
                args.push("-vf".into());
                args.push(graph.clone());
                if let Some(af) = audio_filter {
                    args.push("-af".into());
                    args.push(af);
                }
                if let Some(limit) = format.fixed_duration {
                    args.push("-t".into());
                    args.push(fmt_secs(limit));
                }
                args.extend(format.output_args());
                args.push(output_path.to_string_lossy().into_owned());

                let total = plan.total_original_duration();
                let mut expected = match speed {
                    Some(speed) => total / speed,
                    None => total,
                };
                if let Some(limit) = format.fixed_duration {
                    expected = expected.min(limit);
                }

                Ok(EncoderInvocation {
                    inputs: clips.iter().map(|c| c.clip.path.clone()).collect(),
                    filter_graph: graph,
                    args,
                    output_path: output_path.to_path_buf(),
                    manifest: Some(manifest),
                    temp_files: vec![manifest_path],
                    expected_duration_secs: expected,
                })
            }
        }
    }
}

/// Builds encoder invocations for one job's settings
pub struct GraphBuilder {
    format: OutputFormat,
}

impl GraphBuilder {
    pub fn new(
        settings: &GenerationSettings,
        container: &str,
        threads: Option<usize>,
    ) -> MixerResult<Self> {
        Ok(Self {
            format: OutputFormat::from_settings(settings, container, threads)?,
        })
    }

    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    pub fn build(&self, plan: &VariantPlan, output_path: &Path) -> MixerResult<EncoderInvocation> {
        let strategy = ConcatStrategy::select(plan);
        debug!(
            "Variant {}: {:?} over {} clips -> {}",
            plan.index,
            strategy,
            plan.len(),
            output_path.display()
        );
        strategy.build_invocation(plan, &self.format, output_path)
    }
}

/// Single frame at 1s, scaled to 640x360
pub fn thumbnail_invocation(video: &Path, output: &Path, threads: Option<usize>) -> EncoderInvocation {
    let (w, h) = THUMBNAIL_SIZE;
    let filter = format!("scale={}:{}", w, h);
    let mut args = preamble();
    args.push("-ss".into());
    args.push(fmt_secs(THUMBNAIL_OFFSET_SECS));
    args.push("-i".into());
    args.push(video.to_string_lossy().into_owned());
    args.extend(strings(&["-frames:v", "1", "-vf"]));
    args.push(filter.clone());
    if let Some(threads) = threads.filter(|t| *t > 0) {
        args.push("-threads".into());
        args.push(threads.to_string());
    }
    args.push(output.to_string_lossy().into_owned());

    EncoderInvocation {
        inputs: vec![video.to_path_buf()],
        filter_graph: filter,
        args,
        output_path: output.to_path_buf(),
        manifest: None,
        temp_files: Vec::new(),
        expected_duration_secs: 0.0,
    }
}

/// `atempo` stages whose product is `speed`, each within the single-stage bounds
pub fn atempo_chain(speed: f64) -> String {
    let (lo, hi) = ATEMPO_RANGE;
    let mut remaining = speed;
    let mut stages = Vec::new();
    while remaining > hi {
        stages.push(hi);
        remaining /= hi;
    }
    while remaining < lo {
        stages.push(lo);
        remaining /= lo;
    }
    stages.push(remaining);
    stages
        .iter()
        .map(|s| format!("atempo={:.3}", s))
        .collect::<Vec<_>>()
        .join(",")
}

/// Overwrite, progress on stdout, quiet stderr
fn preamble() -> Vec<String> {
    strings(&["-hide_banner", "-y", "-progress", "pipe:1", "-nostats"])
}

fn manifest_line(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', "/")
        .replace('\'', "'\\''");
    format!("file '{}'", escaped)
}

fn fmt_secs(secs: f64) -> String {
    let text = format!("{:.3}", secs);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() {
        "0".to_string()
    } else {
        text.to_string()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
