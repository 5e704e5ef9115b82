use super::error::EngineError;
use crate::core::context::ExecutionContext;
use crate::core::io::checkpoint::{CHECKPOINT_EXTENSION, load_surrogate, read_checkpoint};
use crate::core::models::architecture::{Architecture, ArchitectureOverride};
use crate::core::nn::network::Surrogate;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// A surrogate loaded from disk together with the file it came from.
#[derive(Debug)]
pub struct LoadedModel {
    pub model: Surrogate,
    pub checkpoint: PathBuf,
}

fn modified(path: &Path) -> Result<SystemTime, EngineError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| EngineError::io(path, e))
}

fn is_checkpoint(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == CHECKPOINT_EXTENSION)
}

/// The most recently modified checkpoint directly inside `dir`, with its
/// modification time.
fn newest_checkpoint(dir: &Path) -> Result<Option<(SystemTime, PathBuf)>, EngineError> {
    let entries = fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let path = entry.map_err(|e| EngineError::io(dir, e))?.path();
        if !is_checkpoint(&path) {
            continue;
        }
        let time = modified(&path)?;
        if newest.as_ref().is_none_or(|(best, _)| time > *best) {
            newest = Some((time, path));
        }
    }
    Ok(newest)
}

pub fn latest_checkpoint_in(dir: &Path) -> Result<Option<PathBuf>, EngineError> {
    Ok(newest_checkpoint(dir)?.map(|(_, path)| path))
}

/// Picks `dir/name` when it exists, otherwise the newest checkpoint in `dir`.
pub fn resolve_checkpoint(dir: &Path, name: Option<&str>) -> Result<PathBuf, EngineError> {
    if let Some(name) = name {
        let preferred = dir.join(name);
        if preferred.is_file() {
            return Ok(preferred);
        }
        debug!(path = %preferred.display(), "Configured checkpoint not found; falling back to newest.");
    }
    latest_checkpoint_in(dir)?.ok_or_else(|| EngineError::MissingArtifact {
        dir: dir.to_string_lossy().to_string(),
    })
}

/// The subdirectory of `base` holding the most recently written checkpoint.
pub fn find_latest_model_dir(base: &Path) -> Result<PathBuf, EngineError> {
    let entries = fs::read_dir(base).map_err(|e| EngineError::io(base, e))?;
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let path = entry.map_err(|e| EngineError::io(base, e))?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some((time, _)) = newest_checkpoint(&path)? {
            if latest.as_ref().is_none_or(|(best, _)| time > *best) {
                latest = Some((time, path));
            }
        }
    }
    latest
        .map(|(_, dir)| dir)
        .ok_or_else(|| EngineError::MissingArtifact {
            dir: base.to_string_lossy().to_string(),
        })
}

/// Loads the surrogate stored in `dir`.
///
/// The architecture starts from `base` (or the one recorded in the
/// checkpoint) and takes layer count, width and activation from the
/// directory name when it follows the `<layers>-<hidden>-<activation>`
/// convention.
pub fn load_model(
    dir: &Path,
    checkpoint_name: Option<&str>,
    base: Option<&Architecture>,
    ctx: &ExecutionContext,
) -> Result<LoadedModel, EngineError> {
    let checkpoint = resolve_checkpoint(dir, checkpoint_name)?;
    let base = match base {
        Some(arch) => *arch,
        None => read_checkpoint(&checkpoint)?.architecture,
    };
    let stem = dir.file_name().and_then(|s| s.to_str()).unwrap_or_default();
    let architecture = match ArchitectureOverride::from_stem(stem) {
        Some(ovr) => {
            debug!(stem, "Architecture taken from model directory name.");
            base.with_override(&ovr)
        }
        None => base,
    };

    let model = load_surrogate(&checkpoint, Some(architecture), ctx)?;
    info!(
        checkpoint = %checkpoint.display(),
        architecture = %architecture,
        "Loaded surrogate model."
    );
    Ok(LoadedModel { model, checkpoint })
}
