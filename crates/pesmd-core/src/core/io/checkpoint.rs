use crate::core::context::ExecutionContext;
use crate::core::models::architecture::{Architecture, ArchitectureError};
use crate::core::nn::network::{Dense, Surrogate};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;
pub const CHECKPOINT_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Checkpoint '{path}' has unsupported format version {found}")]
    UnsupportedVersion { path: String, found: u32 },
    #[error("Checkpoint is missing layer '{layer}'")]
    MissingLayer { layer: String },
    #[error("Checkpoint contains unexpected layer '{layer}'")]
    UnexpectedLayer { layer: String },
    #[error("Shape mismatch in '{layer}': expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        layer: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Checkpoint was trained with {found}, model uses {expected}")]
    ArchitectureMismatch { expected: String, found: String },
    #[error("Invalid architecture in checkpoint: {0}")]
    Architecture(#[from] ArchitectureError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub weight: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointDocument {
    pub format_version: u32,
    pub architecture: Architecture,
    pub layers: BTreeMap<String, LayerRecord>,
}

impl CheckpointDocument {
    pub fn from_model(model: &Surrogate) -> Self {
        let layers = model
            .layers()
            .iter()
            .enumerate()
            .map(|(i, layer)| (model.layer_key(i), LayerRecord::from(layer)))
            .collect();
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            architecture: *model.architecture(),
            layers,
        }
    }

    /// Copies the stored parameters into `model`, which must already have the
    /// same shape and activation.
    pub fn apply_to(&self, model: &mut Surrogate) -> Result<(), CheckpointError> {
        if self.architecture.activation != model.activation() {
            return Err(CheckpointError::ArchitectureMismatch {
                expected: model.activation().to_string(),
                found: self.architecture.activation.to_string(),
            });
        }

        let keys: Vec<String> = (0..model.layers().len()).map(|i| model.layer_key(i)).collect();
        if let Some(extra) = self.layers.keys().find(|k| !keys.contains(*k)) {
            return Err(CheckpointError::UnexpectedLayer {
                layer: extra.clone(),
            });
        }

        let mut loaded = Vec::with_capacity(keys.len());
        for (key, layer) in keys.iter().zip(model.layers()) {
            let record = self
                .layers
                .get(key)
                .ok_or_else(|| CheckpointError::MissingLayer { layer: key.clone() })?;
            loaded.push(record.to_dense(key, layer)?);
        }

        for (slot, layer) in model.layers_mut().iter_mut().zip(loaded) {
            *slot = layer;
        }
        Ok(())
    }
}

impl From<&Dense> for LayerRecord {
    fn from(layer: &Dense) -> Self {
        let weight = layer
            .weight
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect();
        Self {
            weight,
            bias: layer.bias.iter().copied().collect(),
        }
    }
}

impl LayerRecord {
    fn to_dense(&self, key: &str, like: &Dense) -> Result<Dense, CheckpointError> {
        let expected = (like.weight.nrows(), like.weight.ncols());
        let rows = self.weight.len();
        let bad_row = self.weight.iter().find(|r| r.len() != expected.1);
        if rows != expected.0 || bad_row.is_some() {
            let cols = bad_row
                .or_else(|| self.weight.first())
                .map_or(0, Vec::len);
            return Err(CheckpointError::ShapeMismatch {
                layer: format!("{key}.weight"),
                expected,
                found: (rows, cols),
            });
        }
        if self.bias.len() != like.bias.len() {
            return Err(CheckpointError::ShapeMismatch {
                layer: format!("{key}.bias"),
                expected: (like.bias.len(), 1),
                found: (self.bias.len(), 1),
            });
        }
        Ok(Dense {
            weight: DMatrix::from_fn(expected.0, expected.1, |r, c| self.weight[r][c]),
            bias: DVector::from_column_slice(&self.bias),
        })
    }
}

/// Destination for the best-so-far parameters during training.
pub trait CheckpointStore {
    fn save(&mut self, model: &Surrogate) -> Result<(), CheckpointError>;

    fn location(&self) -> &Path;
}

/// Writes checkpoints to a single JSON file, replacing it atomically.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CheckpointStore for FileCheckpoint {
    fn save(&mut self, model: &Surrogate) -> Result<(), CheckpointError> {
        save_checkpoint(model, &self.path)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CheckpointError {
    CheckpointError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

/// Serializes `model` into a temporary file beside `path` and renames it
/// into place.
pub fn save_checkpoint(model: &Surrogate, path: &Path) -> Result<(), CheckpointError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, &CheckpointDocument::from_model(model)).map_err(|e| {
            CheckpointError::Json {
                path: path.to_string_lossy().to_string(),
                source: e,
            }
        })?;
        writer.flush().map_err(|e| io_error(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| io_error(path, e))?;
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    debug!(path = %path.display(), "Checkpoint written.");
    Ok(())
}

pub fn read_checkpoint(path: &Path) -> Result<CheckpointDocument, CheckpointError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let doc: CheckpointDocument =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| CheckpointError::Json {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
    if doc.format_version != CHECKPOINT_FORMAT_VERSION {
        return Err(CheckpointError::UnsupportedVersion {
            path: path.to_string_lossy().to_string(),
            found: doc.format_version,
        });
    }
    Ok(doc)
}

/// Builds a model for `architecture` (or the stored one) and fills it from
/// the checkpoint at `path`.
pub fn load_surrogate(
    path: &Path,
    architecture: Option<Architecture>,
    ctx: &ExecutionContext,
) -> Result<Surrogate, CheckpointError> {
    let doc = read_checkpoint(path)?;
    let architecture = architecture.unwrap_or(doc.architecture);
    let mut model = Surrogate::new(architecture, ctx)?;
    doc.apply_to(&mut model)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::sample::DistancePair;
    use crate::core::nn::activation::Activation;
    use std::fs;
    use tempfile::tempdir;

    fn model(hidden: usize, layers: usize, activation: Activation, seed: u64) -> Surrogate {
        let ctx = ExecutionContext::new(None, seed);
        Surrogate::new(Architecture::new(hidden, layers, activation), &ctx).unwrap()
    }

    #[test]
    fn save_and_load_preserve_predictions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let original = model(8, 2, Activation::Mish, 1);
        save_checkpoint(&original, &path).unwrap();

        let loaded = load_surrogate(&path, None, &ExecutionContext::new(None, 99)).unwrap();
        for p in [DistancePair::new(1.0, 1.0), DistancePair::new(3.5, 0.6)] {
            assert_eq!(original.predict(p), loaded.predict(p));
        }
    }

    #[test]
    fn reloaded_weights_are_bit_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let original = model(16, 3, Activation::Gelu, 7);
        save_checkpoint(&original, &path).unwrap();

        let loaded = load_surrogate(&path, None, &ExecutionContext::new(None, 3)).unwrap();
        for (a, b) in original.layers().iter().zip(loaded.layers()) {
            for (x, y) in a.weight.iter().zip(b.weight.iter()) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
            for (x, y) in a.bias.iter().zip(b.bias.iter()) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[test]
    fn document_uses_named_layer_keys() {
        let doc = CheckpointDocument::from_model(&model(4, 2, Activation::Gelu, 1));
        let keys: Vec<_> = doc.layers.keys().cloned().collect();
        assert_eq!(keys, vec!["layers.0", "layers.1", "output_layer"]);
        assert_eq!(doc.layers["layers.0"].weight.len(), 4);
        assert_eq!(doc.layers["layers.0"].weight[0].len(), 2);
    }

    #[test]
    fn no_temporary_files_remain_after_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let m = model(4, 1, Activation::Mish, 1);
        save_checkpoint(&m, &path).unwrap();
        save_checkpoint(&m, &path).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn shape_mismatch_names_the_layer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        save_checkpoint(&model(8, 2, Activation::Mish, 1), &path).unwrap();

        let mut target = model(4, 2, Activation::Mish, 2);
        let err = read_checkpoint(&path).unwrap().apply_to(&mut target).unwrap_err();
        match err {
            CheckpointError::ShapeMismatch {
                layer,
                expected,
                found,
            } => {
                assert_eq!(layer, "layers.0.weight");
                assert_eq!(expected, (4, 2));
                assert_eq!(found, (8, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_layer_is_reported() {
        let mut doc = CheckpointDocument::from_model(&model(4, 2, Activation::Mish, 1));
        doc.layers.remove("layers.1");
        let mut target = model(4, 2, Activation::Mish, 2);
        assert!(matches!(
            doc.apply_to(&mut target),
            Err(CheckpointError::MissingLayer { layer }) if layer == "layers.1"
        ));
    }

    #[test]
    fn deeper_checkpoint_has_unexpected_layer() {
        let doc = CheckpointDocument::from_model(&model(4, 3, Activation::Mish, 1));
        let mut target = model(4, 2, Activation::Mish, 2);
        assert!(matches!(
            doc.apply_to(&mut target),
            Err(CheckpointError::UnexpectedLayer { .. })
        ));
    }

    #[test]
    fn activation_mismatch_is_rejected() {
        let doc = CheckpointDocument::from_model(&model(4, 2, Activation::Mish, 1));
        let mut target = model(4, 2, Activation::Relu, 2);
        assert!(matches!(
            doc.apply_to(&mut target),
            Err(CheckpointError::ArchitectureMismatch { .. })
        ));
    }

    #[test]
    fn failed_load_leaves_model_untouched() {
        let mut doc = CheckpointDocument::from_model(&model(4, 2, Activation::Mish, 1));
        doc.layers.remove("output_layer");
        let mut target = model(4, 2, Activation::Mish, 2);
        let before = target.layers().to_vec();
        assert!(doc.apply_to(&mut target).is_err());
        assert_eq!(target.layers(), before.as_slice());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut doc = CheckpointDocument::from_model(&model(4, 1, Activation::Mish, 1));
        doc.format_version = 7;
        fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
        assert!(matches!(
            read_checkpoint(&path),
            Err(CheckpointError::UnsupportedVersion { found: 7, .. })
        ));
    }

    #[test]
    fn malformed_json_is_reported_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        let err = read_checkpoint(&path).unwrap_err();
        assert!(matches!(err, CheckpointError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
