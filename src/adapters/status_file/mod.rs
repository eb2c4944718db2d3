// File status adapter - Generation status records as JSON files

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::adapters::json_store::validate_id;
use crate::domain::model::{GenerationResult, GenerationStatus, ProgressUpdate};
use crate::error::{MixerError, MixerResult};
use crate::ports::JobStatusPort;

/// Writes `{status_dir}/{generation_id}.json` on every transition
pub struct FileStatusSink {
    status_dir: PathBuf,
    // serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStatusSink {
    pub fn new(status_dir: impl Into<PathBuf>) -> Self {
        Self {
            status_dir: status_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn record_path(&self, generation_id: &str) -> MixerResult<PathBuf> {
        validate_id(generation_id)?;
        Ok(self.status_dir.join(format!("{}.json", generation_id)))
    }

    /// Current record, if one was written
    pub fn load(&self, generation_id: &str) -> MixerResult<Option<GenerationResult>> {
        let path = self.record_path(generation_id)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, record: &GenerationResult) -> MixerResult<()> {
        let path = self.record_path(&record.generation_id)?;
        std::fs::create_dir_all(&self.status_dir)?;
        let json = serde_json::to_string_pretty(record)?;

        // write-then-rename so readers never see a partial record
        let mut temp = tempfile::NamedTempFile::new_in(&self.status_dir)?;
        temp.write_all(json.as_bytes())?;
        temp.persist(&path).map_err(|e| MixerError::Io(e.error))?;
        Ok(())
    }

    /// Apply `edit` to the current record after checking the status transition.
    async fn update<F>(&self, generation_id: &str, next: GenerationStatus, edit: F) -> MixerResult<()>
    where
        F: FnOnce(&mut GenerationResult),
    {
        let _lock = self.write_lock.lock().await;
        let mut record = self
            .load(generation_id)?
            .unwrap_or_else(|| GenerationResult::new(generation_id, GenerationStatus::Pending));

        if record.status != next && !record.status.can_transition_to(next) {
            return Err(MixerError::store(format!(
                "generation {} cannot move from {} to {}",
                generation_id, record.status, next
            )));
        }

        record.status = next;
        record.updated_at = Utc::now();
        edit(&mut record);
        self.store(&record)
    }
}

#[async_trait]
impl JobStatusPort for FileStatusSink {
    async fn mark_processing(&self, generation_id: &str) -> MixerResult<()> {
        self.update(generation_id, GenerationStatus::Processing, |record| {
            record.error_message = None;
            record.output_paths.clear();
            record.progress = None;
        })
        .await?;
        info!("Generation {} is processing", generation_id);
        Ok(())
    }

    async fn report_progress(
        &self,
        generation_id: &str,
        update: ProgressUpdate,
    ) -> MixerResult<()> {
        self.update(generation_id, GenerationStatus::Processing, |record| {
            record.progress = Some(update);
        })
        .await?;
        info!(
            "Generation {}: video {}/{} at {}% (overall {}%)",
            generation_id,
            update.current_video,
            update.total_videos,
            update.video_progress,
            update.overall_progress
        );
        Ok(())
    }

    async fn mark_completed(&self, generation_id: &str, output_paths: &[String]) -> MixerResult<()> {
        self.update(generation_id, GenerationStatus::Completed, |record| {
            record.output_paths = output_paths.to_vec();
            record.error_message = None;
        })
        .await?;
        info!(
            "Generation {} completed with {} output(s)",
            generation_id,
            output_paths.len()
        );
        Ok(())
    }

    async fn mark_failed(&self, generation_id: &str, message: &str) -> MixerResult<()> {
        self.update(generation_id, GenerationStatus::Failed, |record| {
            record.output_paths.clear();
            record.error_message = Some(message.to_string());
        })
        .await?;
        warn!("Generation {} failed: {}", generation_id, message);
        Ok(())
    }
}
