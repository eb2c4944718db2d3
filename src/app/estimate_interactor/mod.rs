// Estimate interactor - Pre-generation summary for a project

use std::sync::Arc;

use tracing::info;

use crate::domain::model::GenerationSettings;
use crate::domain::rules::GenerationEstimate;
use crate::error::MixerResult;
use crate::ports::ProjectStorePort;

pub struct EstimateInteractor {
    projects: Arc<dyn ProjectStorePort>,
}

impl EstimateInteractor {
    pub fn new(projects: Arc<dyn ProjectStorePort>) -> Self {
        Self { projects }
    }

    pub async fn estimate(
        &self,
        project_id: &str,
        settings: &GenerationSettings,
        total_videos: usize,
    ) -> MixerResult<GenerationEstimate> {
        let project = self.projects.load_project(project_id).await?;
        let estimate = GenerationEstimate::for_project(&project, settings, total_videos);
        info!(
            "Project {}: {} combinations, strength {} ({})",
            project_id, estimate.possible_combinations, estimate.strength, estimate.strength_label
        );
        Ok(estimate)
    }
}
