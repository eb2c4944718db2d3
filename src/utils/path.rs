//! Path helpers for output naming and encoder manifests

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::MixerResult;

/// Suffix appended to an output's stem to name its concat manifest
pub const MANIFEST_SUFFIX: &str = "_concat.txt";

/// File name of the per-generation thumbnail
pub const THUMBNAIL_FILE: &str = "thumb.jpg";

/// Path utilities for pipeline artifacts
pub struct PathUtils;

impl PathUtils {
    /// `{generation_id}_{index+1}_{timestamp_ms}_{suffix}.{container}`
    pub fn output_file_name(
        generation_id: &str,
        index: usize,
        timestamp_ms: i64,
        suffix: &str,
        container: &str,
    ) -> String {
        format!(
            "{}_{}_{}_{}.{}",
            generation_id,
            index + 1,
            timestamp_ms,
            suffix,
            container
        )
    }

    /// Fresh output path for variant `index`, unique across reruns of the same job.
    pub fn variant_output_path<R: Rng + ?Sized>(
        output_dir: &Path,
        generation_id: &str,
        index: usize,
        container: &str,
        rng: &mut R,
    ) -> PathBuf {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let suffix = format!("{:08x}", rng.gen::<u32>());
        output_dir.join(Self::output_file_name(
            generation_id,
            index,
            timestamp_ms,
            &suffix,
            container,
        ))
    }

    /// Manifest written next to `output`: `clip.mp4` -> `clip_concat.txt`
    pub fn manifest_path_for(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        output.with_file_name(format!("{}{}", stem, MANIFEST_SUFFIX))
    }

    pub fn is_manifest(path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy().ends_with(MANIFEST_SUFFIX))
            .unwrap_or(false)
    }

    /// `{upload_dir}/{feature}/{user_id}/{generation_id}/thumb.jpg`
    pub fn thumbnail_path(
        upload_dir: &Path,
        feature: &str,
        user_id: &str,
        generation_id: &str,
    ) -> PathBuf {
        upload_dir
            .join(feature)
            .join(user_id)
            .join(generation_id)
            .join(THUMBNAIL_FILE)
    }

    /// Resolve `path` against the current directory unless it is already absolute
    pub fn absolutize(path: &Path) -> MixerResult<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(std::env::current_dir()?.join(path))
        }
    }

    /// Resolve `path` against `base` unless it is already absolute
    pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }
}
