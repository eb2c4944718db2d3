// Ports - Interface definitions (contracts)

use async_trait::async_trait;

use crate::domain::model::{ProgressUpdate, ProjectRecord};
use crate::engine::graph::EncoderInvocation;
use crate::error::MixerResult;

pub use crate::engine::progress::ProgressSink;

/// Port for loading a project's clip pool and groups
#[async_trait]
pub trait ProjectStorePort: Send + Sync {
    async fn load_project(&self, project_id: &str) -> MixerResult<ProjectRecord>;
}

/// Port for persisting generation status transitions
#[async_trait]
pub trait JobStatusPort: Send + Sync {
    async fn mark_processing(&self, generation_id: &str) -> MixerResult<()>;

    async fn report_progress(&self, generation_id: &str, update: ProgressUpdate)
        -> MixerResult<()>;

    async fn mark_completed(&self, generation_id: &str, output_paths: &[String])
        -> MixerResult<()>;

    async fn mark_failed(&self, generation_id: &str, message: &str) -> MixerResult<()>;
}

/// Port for running one encoder invocation
#[async_trait]
pub trait EncodePort: Send + Sync {
    /// Run `invocation` for `job_id`, forwarding percentages in [0, 100] to `progress`
    async fn encode(
        &self,
        job_id: &str,
        invocation: &EncoderInvocation,
        progress: ProgressSink,
    ) -> MixerResult<()>;
}
