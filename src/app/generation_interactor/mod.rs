// Generation interactor - Drives one generation job from plan to finished files

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use walkdir::WalkDir;

use crate::adapters::toml_config::MixerConfig;
use crate::domain::model::{GenerationJob, ProgressUpdate, ProjectRecord, VariantPlan};
use crate::engine::graph::{thumbnail_invocation, ConcatStrategy, EncoderInvocation, GraphBuilder};
use crate::engine::progress::{noop_sink, ProgressSink, ProgressThrottle};
use crate::engine::registry::remove_temp_file;
use crate::error::{MixerError, MixerResult};
use crate::planner::{DurationFitter, FitStrategy, VariantPlanner};
use crate::ports::{EncodePort, JobStatusPort, ProjectStorePort};
use crate::utils::path::PathUtils;

/// Settings the orchestrator needs from the worker configuration
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub output_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub thumbnail_feature: String,
    pub container: String,
    pub threads: Option<usize>,
    pub progress_step: f64,
}

impl From<&MixerConfig> for GenerationOptions {
    fn from(config: &MixerConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            upload_dir: config.upload_dir.clone(),
            thumbnail_feature: config.thumbnail_feature.clone(),
            container: config.container.clone(),
            threads: config.threads(),
            progress_step: config.progress_step,
        }
    }
}

/// Result of a completed job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub generation_id: String,
    pub output_paths: Vec<String>,
    pub thumbnail: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Dry-run view of one variant
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantPreview {
    pub index: usize,
    pub clip_ids: Vec<String>,
    pub fit: String,
    pub strategy: String,
    pub speed_variation: Option<f64>,
    pub warnings: Vec<String>,
    pub invocation: EncoderInvocation,
}

/// Interactor for the generation use case
pub struct GenerationInteractor {
    projects: Arc<dyn ProjectStorePort>,
    status: Arc<dyn JobStatusPort>,
    encoder: Arc<dyn EncodePort>,
    options: GenerationOptions,
}

impl GenerationInteractor {
    pub fn new(
        projects: Arc<dyn ProjectStorePort>,
        status: Arc<dyn JobStatusPort>,
        encoder: Arc<dyn EncodePort>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            projects,
            status,
            encoder,
            options,
        }
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Run `job` with an entropy-seeded generator.
    pub async fn execute(&self, job: &GenerationJob) -> MixerResult<GenerationOutcome> {
        let mut rng = StdRng::from_entropy();
        self.execute_with_rng(job, &mut rng).await
    }

    /// Run `job`: pending -> processing -> completed | failed.
    ///
    /// Any variant failure aborts the job; the failure is reported once and
    /// then returned to the caller. Nothing is retried here.
    pub async fn execute_with_rng<R: Rng + Send>(
        &self,
        job: &GenerationJob,
        rng: &mut R,
    ) -> MixerResult<GenerationOutcome> {
        info!(
            "Starting generation {} for project {} ({} videos)",
            job.generation_id, job.project_id, job.total_videos
        );
        self.status.mark_processing(&job.generation_id).await?;

        match self.generate(job, rng).await {
            Ok(outcome) => {
                self.status
                    .mark_completed(&job.generation_id, &outcome.output_paths)
                    .await?;
                info!(
                    "Generation {} completed: {} video(s)",
                    job.generation_id,
                    outcome.output_paths.len()
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Generation {} failed: {}", job.generation_id, e);
                if let Err(status_err) = self.status.mark_failed(&job.generation_id, &e.to_string()).await {
                    warn!(
                        "Could not record failure of generation {}: {}",
                        job.generation_id, status_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Record a job that was dropped before it could settle on its own.
    pub async fn abandon(&self, generation_id: &str, reason: &str) {
        if let Err(e) = self.status.mark_failed(generation_id, reason).await {
            warn!("Could not record failure of generation {}: {}", generation_id, e);
        }
    }

    /// Build every variant's plan and invocation without launching the encoder.
    pub async fn preview<R: Rng + Send>(
        &self,
        job: &GenerationJob,
        rng: &mut R,
    ) -> MixerResult<Vec<VariantPreview>> {
        let project = self.load_project(&job.project_id).await?;
        let builder = self.builder(job)?;
        let planner = VariantPlanner::new(&project.clips, &project.groups, &job.settings);
        let fitter = DurationFitter::new(&job.settings);

        let mut previews = Vec::with_capacity(job.total_videos);
        for index in 0..job.total_videos {
            let output_path = self.output_path(job, index, rng);
            let (plan, fit, invocation) =
                prepare_variant(index, &planner, &fitter, &builder, &output_path, rng)?;
            previews.push(VariantPreview {
                index,
                clip_ids: plan.clips.iter().map(|c| c.clip.id.clone()).collect(),
                fit: format!("{:?}", fit),
                strategy: format!("{:?}", ConcatStrategy::select(&plan)),
                speed_variation: plan.speed_variation,
                warnings: plan.warnings,
                invocation,
            });
        }
        Ok(previews)
    }

    /// Delete `*_concat.txt` manifests left in the output directory by a crashed run.
    pub fn sweep_stale_manifests(&self) -> usize {
        let dir = &self.options.output_dir;
        if !dir.is_dir() {
            return 0;
        }

        let mut removed = 0;
        for entry in WalkDir::new(dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && PathUtils::is_manifest(e.path()))
        {
            match remove_temp_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("{}", e),
            }
        }
        if removed > 0 {
            info!("Removed {} stale manifest(s) from {}", removed, dir.display());
        }
        removed
    }

    async fn generate<R: Rng + Send>(
        &self,
        job: &GenerationJob,
        rng: &mut R,
    ) -> MixerResult<GenerationOutcome> {
        if job.total_videos == 0 {
            return Err(MixerError::unsupported("total videos", 0));
        }

        let project = self.load_project(&job.project_id).await?;
        let builder = self.builder(job)?;
        let planner = VariantPlanner::new(&project.clips, &project.groups, &job.settings);
        let fitter = DurationFitter::new(&job.settings);

        let total = job.total_videos;
        let mut output_paths = Vec::with_capacity(total);
        let mut warnings = Vec::new();

        for index in 0..total {
            let span = info_span!("variant", generation_id = %job.generation_id, variant = index + 1);
            let output_path = self.output_path(job, index, rng);
            let (plan, _fit, invocation) = span.in_scope(|| {
                prepare_variant(index, &planner, &fitter, &builder, &output_path, rng)
            })?;
            warnings.extend(plan.warnings.iter().cloned());

            self.encode_variant(job, index, &invocation)
                .instrument(span)
                .await?;
            output_paths.push(output_path.to_string_lossy().into_owned());
        }

        let thumbnail = match output_paths.first() {
            Some(first) => self.write_thumbnail(job, &project, Path::new(first)).await,
            None => None,
        };

        Ok(GenerationOutcome {
            generation_id: job.generation_id.clone(),
            output_paths,
            thumbnail,
            warnings,
        })
    }

    async fn encode_variant(
        &self,
        job: &GenerationJob,
        index: usize,
        invocation: &EncoderInvocation,
    ) -> MixerResult<()> {
        let (tx, rx) = mpsc::unbounded_channel::<f64>();
        let sink: ProgressSink = Arc::new(move |percent| {
            let _ = tx.send(percent);
        });

        // the sink is dropped when encode returns, which ends the forwarder
        let (result, ()) = tokio::join!(
            self.encoder.encode(&job.generation_id, invocation, sink),
            self.forward_progress(&job.generation_id, index, job.total_videos, rx)
        );

        if let Err(e) = result {
            if let Err(cleanup) = remove_temp_file(&invocation.output_path) {
                warn!("{}", cleanup);
            }
            return Err(e);
        }
        debug!("Variant {} written to {}", index + 1, invocation.output_path.display());
        Ok(())
    }

    async fn forward_progress(
        &self,
        generation_id: &str,
        index: usize,
        total: usize,
        mut rx: mpsc::UnboundedReceiver<f64>,
    ) {
        let mut throttle = ProgressThrottle::new(self.options.progress_step);
        while let Some(percent) = rx.recv().await {
            if !throttle.admit(percent) {
                continue;
            }
            let update = ProgressUpdate::for_variant(index, total, percent);
            if let Err(e) = self.status.report_progress(generation_id, update).await {
                warn!("Progress update for {} failed: {}", generation_id, e);
            }
        }
    }

    /// Best effort: failures are logged and never fail the job.
    async fn write_thumbnail(
        &self,
        job: &GenerationJob,
        project: &ProjectRecord,
        first_output: &Path,
    ) -> Option<PathBuf> {
        let user = if project.user_id.is_empty() {
            "anonymous"
        } else {
            project.user_id.as_str()
        };
        let path = PathUtils::thumbnail_path(
            &self.options.upload_dir,
            &self.options.thumbnail_feature,
            user,
            &job.generation_id,
        );
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Thumbnail directory {} unavailable: {}", parent.display(), e);
                return None;
            }
        }

        let invocation = thumbnail_invocation(first_output, &path, self.options.threads);
        match self
            .encoder
            .encode(&job.generation_id, &invocation, noop_sink())
            .await
        {
            Ok(()) => {
                info!("Thumbnail written to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Thumbnail generation failed: {}", e);
                None
            }
        }
    }

    async fn load_project(&self, project_id: &str) -> MixerResult<ProjectRecord> {
        let project = self.projects.load_project(project_id).await.map_err(|e| {
            warn!("Could not load project {}: {}", project_id, e);
            MixerError::NoClips {
                project_id: project_id.to_string(),
            }
        })?;
        if project.has_no_clips() {
            return Err(MixerError::NoClips {
                project_id: project_id.to_string(),
            });
        }
        info!(
            "Project {}: {} clips, {} groups",
            project_id,
            project.clips.len(),
            project.groups.len()
        );
        Ok(project)
    }

    fn builder(&self, job: &GenerationJob) -> MixerResult<GraphBuilder> {
        GraphBuilder::new(&job.settings, &self.options.container, self.options.threads)
    }

    fn output_path<R: Rng + ?Sized>(&self, job: &GenerationJob, index: usize, rng: &mut R) -> PathBuf {
        PathUtils::variant_output_path(
            &self.options.output_dir,
            &job.generation_id,
            index,
            &self.options.container,
            rng,
        )
    }
}

/// Planner -> fitter -> builder for one variant
fn prepare_variant<R: Rng + ?Sized>(
    index: usize,
    planner: &VariantPlanner<'_>,
    fitter: &DurationFitter<'_>,
    builder: &GraphBuilder,
    output_path: &Path,
    rng: &mut R,
) -> MixerResult<(VariantPlan, FitStrategy, EncoderInvocation)> {
    let mut plan = planner.plan(index, rng)?;
    let fit = fitter.fit(&mut plan);
    plan.renumber();
    let invocation = builder.build(&plan, output_path)?;
    Ok((plan, fit, invocation))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interactor_for(dir: &Path) -> GenerationInteractor {
        use crate::adapters::{FileStatusSink, JsonProjectStore};
        use crate::engine::{ProcessRegistry, ProcessSupervisor, SupervisorConfig};

        let registry = Arc::new(ProcessRegistry::new());
        GenerationInteractor::new(
            Arc::new(JsonProjectStore::new(dir, dir)),
            Arc::new(FileStatusSink::new(dir)),
            Arc::new(ProcessSupervisor::new(SupervisorConfig::default(), registry)),
            GenerationOptions {
                output_dir: dir.to_path_buf(),
                upload_dir: dir.to_path_buf(),
                thumbnail_feature: "video-mixer".into(),
                container: "mp4".into(),
                threads: None,
                progress_step: 10.0,
            },
        )
    }

    #[test]
    fn test_sweep_removes_only_manifests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("g_1_1_aa_concat.txt"), "file 'x'").unwrap();
        std::fs::write(dir.path().join("g_1_1_aa.mp4"), "video").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/old_concat.txt"), "x").unwrap();

        let interactor = interactor_for(dir.path());
        assert_eq!(interactor.sweep_stale_manifests(), 1);
        assert!(!dir.path().join("g_1_1_aa_concat.txt").exists());
        assert!(dir.path().join("g_1_1_aa.mp4").exists());
        assert!(dir.path().join("nested/old_concat.txt").exists());
    }

    #[test]
    fn test_sweep_on_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let interactor = interactor_for(&dir.path().join("absent"));
        assert_eq!(interactor.sweep_stale_manifests(), 0);
    }
}
