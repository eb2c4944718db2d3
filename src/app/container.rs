use std::sync::Arc;

use crate::adapters::{FileStatusSink, JsonProjectStore, MixerConfig};
use crate::app::{
    estimate_interactor::EstimateInteractor,
    generation_interactor::{GenerationInteractor, GenerationOptions},
};
use crate::engine::{ProcessRegistry, ProcessSupervisor};
use crate::error::MixerResult;
use crate::ports::{EncodePort, JobStatusPort, ProjectStorePort};

pub trait AppContainer: Send + Sync {
    fn generation_interactor(&self) -> Arc<GenerationInteractor>;
    fn estimate_interactor(&self) -> Arc<EstimateInteractor>;
    fn registry(&self) -> Arc<ProcessRegistry>;
}

/// Wires the file-backed adapters and the process supervisor from a [`MixerConfig`]
pub struct DefaultAppContainer {
    generation_interactor: Arc<GenerationInteractor>,
    estimate_interactor: Arc<EstimateInteractor>,
    registry: Arc<ProcessRegistry>,
}

impl DefaultAppContainer {
    pub fn new(config: &MixerConfig) -> MixerResult<Self> {
        config.validate()?;

        let registry = Arc::new(ProcessRegistry::new());
        let project_store = Arc::new(JsonProjectStore::new(
            config.projects_dir.clone(),
            config.upload_dir.clone(),
        ));
        let status_sink = Arc::new(FileStatusSink::new(config.status_dir.clone()));
        let supervisor = Arc::new(ProcessSupervisor::new(
            config.supervisor_config(),
            Arc::clone(&registry),
        ));

        let generation_interactor = Arc::new(GenerationInteractor::new(
            Arc::clone(&project_store) as Arc<dyn ProjectStorePort>,
            Arc::clone(&status_sink) as Arc<dyn JobStatusPort>,
            Arc::clone(&supervisor) as Arc<dyn EncodePort>,
            GenerationOptions::from(config),
        ));

        let estimate_interactor = Arc::new(EstimateInteractor::new(
            Arc::clone(&project_store) as Arc<dyn ProjectStorePort>,
        ));

        Ok(Self {
            generation_interactor,
            estimate_interactor,
            registry,
        })
    }
}

impl AppContainer for DefaultAppContainer {
    fn generation_interactor(&self) -> Arc<GenerationInteractor> {
        Arc::clone(&self.generation_interactor)
    }

    fn estimate_interactor(&self) -> Arc<EstimateInteractor> {
        Arc::clone(&self.estimate_interactor)
    }

    fn registry(&self) -> Arc<ProcessRegistry> {
        Arc::clone(&self.registry)
    }
}
