//! Command implementations

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::adapters::{ConfigLoader, MixerConfig};
use crate::app::container::AppContainer;
use crate::app::{GenerationOutcome, VariantPreview};
use crate::cli::args::{CombinationsArgs, EstimateArgs, GenerateArgs, PlanArgs};
use crate::cli::Cli;
use crate::domain::model::{GenerationJob, GenerationSettings};
use crate::domain::rules::estimate_combinations;
use crate::utils::logging::{LogFormat, LogLevel};
use crate::utils::Utils;

/// Resolve the worker configuration: CLI > environment > file > defaults.
pub fn load_config(cli: &Cli) -> Result<MixerConfig> {
    let level = cli
        .log_level
        .as_deref()
        .map(str::parse::<LogLevel>)
        .transpose()
        .context("Invalid --log-level")?;
    let format = cli
        .log_format
        .as_deref()
        .map(str::parse::<LogFormat>)
        .transpose()
        .context("Invalid --log-format")?;
    let encoder = cli.encoder.clone();

    let config = ConfigLoader::new()
        .with_file(cli.config.as_deref())
        .context("Failed to read configuration file")?
        .with_env()
        .context("Invalid CLIPMIX_* environment override")?
        .with_override(|c| {
            if let Some(level) = level {
                c.logging.level = level;
            }
            if let Some(format) = format {
                c.logging.format = format;
            }
            if let Some(encoder) = encoder {
                c.encoder_path = encoder;
            }
        })
        .build()
        .context("Invalid configuration")?;
    Ok(config)
}

/// Execute the generate command
pub async fn generate(
    container: &dyn AppContainer,
    config: &MixerConfig,
    args: GenerateArgs,
) -> Result<()> {
    let job = read_job(&args.job)?;
    let interactor = container.generation_interactor();
    let registry = container.registry();
    interactor.sweep_stale_manifests();

    let mut shutdown = ShutdownSignal::install().context("Failed to install signal handlers")?;
    let started = Instant::now();
    let mut rng = seeded_rng(args.seed);
    let run = interactor.execute_with_rng(&job, &mut rng);
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        signal = shutdown.recv() => {
            warn!("Received {}, cancelling active encoders", signal);
            let grace = config.shutdown_grace();
            registry.cancel_all(grace).await;
            // let the job record its failure; give up if it starts another encode
            match tokio::time::timeout(grace + Duration::from_secs(1), &mut run).await {
                Ok(result) => result,
                Err(_) => {
                    registry.cancel_all(Duration::ZERO).await;
                    interactor.abandon(&job.generation_id, "interrupted").await;
                    anyhow::bail!("Generation {} interrupted", job.generation_id);
                }
            }
        }
    };

    let outcome = result.with_context(|| format!("Generation {} failed", job.generation_id))?;
    info!(
        "Generation {} finished in {}",
        outcome.generation_id,
        Utils::format_duration(started.elapsed())
    );
    print_outcome(&outcome, args.json)?;
    Ok(())
}

/// Execute the plan command
pub async fn plan(container: &dyn AppContainer, args: PlanArgs) -> Result<()> {
    let job = read_job(&args.job)?;
    let mut rng = seeded_rng(args.seed);
    let previews = container
        .generation_interactor()
        .preview(&job, &mut rng)
        .await
        .with_context(|| format!("Could not plan generation {}", job.generation_id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&previews)?);
    } else {
        for preview in &previews {
            print_preview(preview);
        }
    }
    Ok(())
}

/// Execute the estimate command
pub async fn estimate(container: &dyn AppContainer, args: EstimateArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.settings)
        .with_context(|| format!("Failed to read settings {}", args.settings.display()))?;
    let settings: GenerationSettings = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid settings in {}", args.settings.display()))?;

    let estimate = container
        .estimate_interactor()
        .estimate(&args.project, &settings, args.videos)
        .await
        .with_context(|| format!("Could not estimate project {}", args.project))?;
    println!("{}", serde_json::to_string_pretty(&estimate)?);
    Ok(())
}

/// Execute the combinations command
pub fn combinations(args: CombinationsArgs) -> Result<()> {
    let estimate = estimate_combinations(args.clips, args.groups, args.group_mixing);
    println!("{}", estimate);
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
struct ShutdownSignal {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "Ctrl-C"
    }
}

fn read_job(path: &Path) -> Result<GenerationJob> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job {}", path.display()))?;
    let job: GenerationJob = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid job payload in {}", path.display()))?;
    info!(
        "Loaded job {} for project {} ({} videos)",
        job.generation_id, job.project_id, job.total_videos
    );
    Ok(job)
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn print_outcome(outcome: &GenerationOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    println!("Generation {} completed", outcome.generation_id);
    for path in &outcome.output_paths {
        println!("  {}", path);
    }
    if let Some(thumbnail) = &outcome.thumbnail {
        println!("Thumbnail: {}", thumbnail.display());
    }
    for warning in &outcome.warnings {
        println!("Warning: {}", warning);
    }
    Ok(())
}

fn print_preview(preview: &VariantPreview) {
    println!(
        "Variant {}: {}",
        preview.index + 1,
        preview.clip_ids.join(" -> ")
    );
    println!("  Fit: {}  Strategy: {}", preview.fit, preview.strategy);
    if let Some(speed) = preview.speed_variation {
        println!("  Speed variation: {:.2}x", speed);
    }
    for warning in &preview.warnings {
        println!("  Warning: {}", warning);
    }
    println!(
        "  Output: {} ({})",
        preview.invocation.output_path.display(),
        Utils::format_duration(Utils::seconds(preview.invocation.expected_duration_secs))
    );
    println!("  Args: {}", preview.invocation.args.join(" "));
}
