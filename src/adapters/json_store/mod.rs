// JSON project store adapter - One project record per file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::model::{ClipRef, ProjectRecord};
use crate::error::{MixerError, MixerResult};
use crate::ports::ProjectStorePort;
use crate::utils::path::PathUtils;

/// Reads `{projects_dir}/{project_id}.json`; relative clip paths are resolved against `upload_dir`
pub struct JsonProjectStore {
    projects_dir: PathBuf,
    upload_dir: PathBuf,
}

impl JsonProjectStore {
    pub fn new(projects_dir: impl Into<PathBuf>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            upload_dir: upload_dir.into(),
        }
    }

    fn record_path(&self, project_id: &str) -> MixerResult<PathBuf> {
        validate_id(project_id)?;
        Ok(self.projects_dir.join(format!("{}.json", project_id)))
    }

    fn resolve(&self, clip: &mut ClipRef) {
        clip.path = PathUtils::resolve_against(&self.upload_dir, &clip.path);
    }
}

#[async_trait]
impl ProjectStorePort for JsonProjectStore {
    async fn load_project(&self, project_id: &str) -> MixerResult<ProjectRecord> {
        let path = self.record_path(project_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MixerError::store(format!("project {} not found", project_id)));
            }
            Err(e) => return Err(e.into()),
        };

        let mut project: ProjectRecord = serde_json::from_str(&content)?;
        if project.id.is_empty() {
            project.id = project_id.to_string();
        }
        for clip in &mut project.clips {
            self.resolve(clip);
        }
        for group in &mut project.groups {
            for clip in &mut group.clips {
                self.resolve(clip);
            }
        }

        debug!(
            "Loaded project {} from {} ({} clips, {} groups)",
            project_id,
            path.display(),
            project.clips.len(),
            project.groups.len()
        );
        Ok(project.into_sorted())
    }
}

/// Ids become file names, so they must be a single plain path component
pub(crate) fn validate_id(id: &str) -> MixerResult<()> {
    let plain = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && Path::new(id).file_name().map(|n| n == id).unwrap_or(false);
    if plain {
        Ok(())
    } else {
        Err(MixerError::store(format!("invalid id: {:?}", id)))
    }
}
