// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores FerNet weights with Burn's gzip MessagePack
// recorder at full precision, so a reloaded checkpoint holds the
// exact f32 weights that were evaluated.
//
// Two weight files are kept per run:
//
//   latest  — overwritten after every epoch
//   best    — overwritten whenever validation accuracy improves
//
// File layout:
//   checkpoints/
//     model_latest.mpk.gz   ← weights after the last epoch
//     model_best.mpk.gz     ← weights with the best val accuracy
//     checkpoint.json       ← epoch counters and best accuracy
//     train_config.json     ← run configuration
//     metrics.csv           ← written by MetricsLogger
//
// train_config.json lets `test` rebuild the same network and
// data pipeline before loading the weights into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::FerNet;

type CheckpointRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Which of the two weight files to read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    Latest,
    Best,
}

impl CheckpointKind {
    fn stem(self) -> &'static str {
        match self {
            Self::Latest => "model_latest",
            Self::Best   => "model_best",
        }
    }
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Best   => write!(f, "best"),
        }
    }
}

/// Progress of a run, stored next to the weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub epoch:        usize,
    pub best_epoch:   usize,
    pub best_val_acc: f64,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the weights to `{dir}/model_{kind}.mpk.gz`.
    pub fn save_model<B: Backend>(&self, model: &FerNet<B>, kind: CheckpointKind) -> Result<()> {
        // the recorder adds the extension
        let path = self.dir.join(kind.stem());

        CheckpointRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved {} checkpoint to '{}'", kind, path.display());
        Ok(())
    }

    /// Load saved weights into `model`, which must have the same architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  FerNet<B>,
        kind:   CheckpointKind,
        device: &B::Device,
    ) -> Result<FerNet<B>> {
        let path = self.dir.join(kind.stem());
        tracing::info!("Loading {} checkpoint from '{}'", kind, path.display());

        let record = CheckpointRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display()
                )
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_state(&self, state: &CheckpointState) -> Result<()> {
        let path = self.dir.join("checkpoint.json");
        fs::write(&path, serde_json::to_string_pretty(state)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_state(&self) -> Result<CheckpointState> {
        let path = self.dir.join("checkpoint.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'. Have you run 'train' first?", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed checkpoint state in '{}'", path.display()))
    }

    /// Save the run configuration before training starts.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'test'.",
                path.display()
            )
        })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::ml::model::FerNetConfig;

    type TestBackend = NdArray;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("ckpt")).unwrap();
        let cfg = TrainConfig { epochs: 3, mixup: false, ..TrainConfig::default() };
        manager.save_config(&cfg).unwrap();

        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.epochs, 3);
        assert!(!loaded.mixup);
    }

    #[test]
    fn test_missing_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let err = manager.load_state().unwrap_err();
        assert!(err.to_string().contains("checkpoint.json"));
    }

    #[test]
    fn test_weights_survive_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();

        let model: FerNet<TestBackend> = FerNetConfig::new().init(&device);
        manager.save_model(&model, CheckpointKind::Best).unwrap();
        manager.save_state(&CheckpointState { epoch: 4, best_epoch: 2, best_val_acc: 61.5 }).unwrap();

        let fresh: FerNet<TestBackend> = FerNetConfig::new().init(&device);
        let loaded = manager.load_model(fresh, CheckpointKind::Best, &device).unwrap();
        loaded
            .fc
            .weight
            .val()
            .into_data()
            .assert_approx_eq(&model.fc.weight.val().into_data(), 6);

        assert_eq!(manager.load_state().unwrap().best_epoch, 2);
        assert!(manager.load_model(model, CheckpointKind::Latest, &device).is_err());
    }
}
