// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the FER2013 CSV          (Layer 4 - data)
//   Step 2: Split by Usage column         (Layer 4 - data)
//   Step 3: Build train/val/test loaders  (Layer 4 - data)
//   Step 4: Save config                   (Layer 6 - infra)
//   Step 5: Epoch loop                    (Layer 5 - ml)
//             train → validate → LR schedule → metrics row
//             → latest / best checkpoints
//   Step 6: Test report on the best model (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    module::AutodiffModule,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    loader::load_data,
    loaders::{get_dataloaders, LoaderConfig},
    splitter::{split_by_usage, DataSplits},
    transforms::Normalize,
};
use crate::domain::emotion::NUM_CLASSES;
use crate::infra::{
    checkpoint::{CheckpointKind, CheckpointManager, CheckpointState},
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    evaluator::evaluate,
    model::{FerNet, FerNetConfig},
    report::ClassificationReport,
    scaler::GradScaler,
    scheduler::ReduceLrOnPlateau,
    tester::test,
    trainer::{sgd_config, train_epoch},
};

// ─── Device ──────────────────────────────────────────────────────────────────
/// Where tensors live: `cpu` runs on ndarray, `gpu` on wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

impl FromStr for DeviceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" | "wgpu" => Ok(Self::Gpu),
            other => bail!("unknown device '{other}' (expected cpu or gpu)"),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved next to the checkpoints so `test` can rebuild the same
// model and data pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:          String,
    pub checkpoint_dir:     String,
    pub device:             DeviceKind,
    pub epochs:             usize,
    pub batch_size:         usize,
    pub eval_batch_size:    usize,
    pub num_workers:        usize,
    pub lr:                 f64,
    pub momentum:           f64,
    pub weight_decay:       f64,
    pub lr_factor:          f64,
    pub lr_patience:        usize,
    pub seed:               u64,
    pub augment:            bool,
    pub ncrop:              bool,
    pub mixup:              bool,
    pub mixup_alpha:        f64,
    pub label_smooth:       bool,
    pub label_smooth_value: f32,
    pub amp:                bool,
    pub num_classes:        usize,
    pub normalize:          Normalize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:          "data/fer2013.csv".to_string(),
            checkpoint_dir:     "checkpoints".to_string(),
            device:             DeviceKind::Gpu,
            epochs:             300,
            batch_size:         64,
            eval_batch_size:    64,
            num_workers:        4,
            lr:                 0.01,
            momentum:           0.9,
            weight_decay:       1e-4,
            lr_factor:          0.75,
            lr_patience:        5,
            seed:               42,
            augment:            true,
            ncrop:              true,
            mixup:              true,
            mixup_alpha:        0.2,
            label_smooth:       true,
            label_smooth_value: 0.1,
            amp:                true,
            num_classes:        NUM_CLASSES,
            normalize:          Normalize::default(),
        }
    }
}

impl TrainConfig {
    /// The batching and augmentation subset used by the loader factory.
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            batch_size:      self.batch_size,
            eval_batch_size: self.eval_batch_size,
            num_workers:     self.num_workers,
            seed:            self.seed,
            augment:         self.augment,
            ncrop:           self.ncrop,
            normalize:       self.normalize,
        }
    }

    pub fn model_config(&self) -> FerNetConfig {
        FerNetConfig::new().with_num_classes(self.num_classes)
    }
}

/// Read the CSV and partition it into train / validation / test.
pub fn load_splits(data_path: &str) -> Result<DataSplits> {
    tracing::info!("Loading dataset from '{}'", data_path);
    let (records, mapping) = load_data(data_path)?;
    tracing::info!("Loaded {} records", records.len());
    tracing::debug!("Class mapping: {:?}", mapping);

    let splits = split_by_usage(records)?;
    tracing::info!(
        "Split: {} train, {} validation, {} test",
        splits.train.len(),
        splits.val.len(),
        splits.test.len(),
    );
    tracing::debug!("Train class counts: {:?}", splits.train.class_counts(NUM_CLASSES));
    Ok(splits)
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train end to end and return the test report of the best model.
    pub fn execute(&self) -> Result<ClassificationReport> {
        let cfg = &self.config;
        match cfg.device {
            DeviceKind::Cpu => {
                let device = NdArrayDevice::default();
                tracing::info!("Using ndarray device: {:?}", device);
                run_training::<Autodiff<NdArray>>(cfg, device)
            }
            DeviceKind::Gpu => {
                let device = WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                run_training::<Autodiff<Wgpu>>(cfg, device)
            }
        }
    }
}

fn run_training<B: AutodiffBackend>(cfg: &TrainConfig, device: B::Device) -> Result<ClassificationReport> {
    // ── Steps 1-3: data ───────────────────────────────────────────────────────
    let splits  = load_splits(&cfg.data_path)?;
    let loaders = get_dataloaders::<B>(splits, &cfg.loader_config(), &device);

    // ── Step 4: persist config ────────────────────────────────────────────────
    let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
    ckpt_manager.save_config(cfg)?;
    let logger = MetricsLogger::new(&cfg.checkpoint_dir)?;
    tracing::info!(
        "Checkpoints in '{}', metrics in '{}'",
        ckpt_manager.dir().display(),
        logger.csv_path().display(),
    );

    // ── Model, optimiser, scaler, schedule ────────────────────────────────────
    let mut model: FerNet<B> = cfg.model_config().init(&device);
    let mut optim     = sgd_config(cfg).init::<B, FerNet<B>>();
    let mut scaler    = GradScaler::new(cfg.amp);
    let mut scheduler = ReduceLrOnPlateau::new(cfg.lr)
        .with_factor(cfg.lr_factor)
        .with_patience(cfg.lr_patience);
    let mut rng   = StdRng::seed_from_u64(cfg.seed);
    let mut state = CheckpointState::default();

    tracing::info!(
        "Training for {} epochs (mixup={}, label_smooth={}, amp={}, ncrop={})",
        cfg.epochs, cfg.mixup, cfg.label_smooth, scaler.is_enabled(), cfg.ncrop,
    );

    // ── Step 5: epoch loop ────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let lr = scheduler.lr();
        let (trained, train) = train_epoch(
            model, &loaders.train, &mut optim, &mut scaler, lr, cfg, &mut rng,
        );
        model = trained;

        // model.valid() → FerNet<B::InnerBackend>, batch norm in inference mode
        let val = evaluate(&model.valid(), &loaders.val);
        scheduler.step(val.acc);

        let metrics = EpochMetrics::new(epoch, lr, train.loss, train.acc, val.loss, val.acc);
        logger.log(&metrics)?;

        println!(
            "Epoch {:>3}/{} | lr={:.6} | train_loss={:.4} | train_acc={:.2}% | val_loss={:.4} | val_acc={:.2}%",
            epoch, cfg.epochs, lr, train.loss, train.acc, val.loss, val.acc,
        );

        state.epoch = epoch;
        if state.best_epoch == 0 || metrics.is_improvement(state.best_val_acc) {
            state.best_epoch   = epoch;
            state.best_val_acc = val.acc;
            ckpt_manager.save_model(&model, CheckpointKind::Best)?;
            tracing::info!("New best model at epoch {} (val_acc={:.2}%)", epoch, val.acc);
        }
        ckpt_manager.save_model(&model, CheckpointKind::Latest)?;
        ckpt_manager.save_state(&state)?;
    }

    // ── Step 6: test the best model ───────────────────────────────────────────
    let final_model = model.valid();
    let best = if state.best_epoch > 0 {
        ckpt_manager.load_model(final_model, CheckpointKind::Best, &device)?
    } else {
        final_model
    };

    let report = test(&best, &loaders.test, cfg.num_classes)?;
    tracing::info!(
        "Training complete! Best val_acc={:.2}% at epoch {}, test accuracy {:.2}%",
        state.best_val_acc,
        state.best_epoch,
        report.accuracy,
    );
    Ok(report)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::IMAGE_PIXELS;
    use std::io::Write;

    fn write_csv(path: &std::path::Path, rows: &[(usize, u8, &str)]) {
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(f, "emotion,pixels,Usage").unwrap();
        for (label, value, usage) in rows {
            let pixels = vec![value.to_string(); IMAGE_PIXELS].join(" ");
            writeln!(f, "{label},{pixels},{usage}").unwrap();
        }
    }

    #[test]
    fn test_device_kind_parsing() {
        assert_eq!("CPU".parse::<DeviceKind>().unwrap(), DeviceKind::Cpu);
        assert_eq!("wgpu".parse::<DeviceKind>().unwrap(), DeviceKind::Gpu);
        assert!("tpu".parse::<DeviceKind>().is_err());
        assert_eq!(DeviceKind::Gpu.to_string(), "gpu");
    }

    #[test]
    fn test_loader_config_mirrors_train_config() {
        let cfg = TrainConfig { batch_size: 16, ncrop: false, seed: 7, ..TrainConfig::default() };
        let lc = cfg.loader_config();
        assert_eq!(lc.batch_size, 16);
        assert!(!lc.ncrop);
        assert_eq!(lc.seed, 7);
    }

    #[test]
    fn test_load_splits_by_usage() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("fer.csv");
        write_csv(&csv, &[(0, 10, "Training"), (3, 20, "PrivateTest"), (6, 30, "PublicTest"), (1, 40, "Training")]);

        let splits = load_splits(csv.to_str().unwrap()).unwrap();
        assert_eq!(splits.train.labels, vec![0, 1]);
        assert_eq!(splits.val.labels, vec![3]);
        assert_eq!(splits.test.labels, vec![6]);
    }

    #[test]
    fn test_one_epoch_on_cpu_writes_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("fer.csv");
        write_csv(&csv, &[
            (0, 10, "Training"), (1, 90, "Training"), (2, 170, "Training"), (3, 250, "Training"),
            (0, 10, "PrivateTest"), (3, 250, "PrivateTest"),
            (1, 90, "PublicTest"), (2, 170, "PublicTest"),
        ]);
        let ckpt = dir.path().join("ckpt");

        let cfg = TrainConfig {
            data_path:       csv.to_str().unwrap().to_string(),
            checkpoint_dir:  ckpt.to_str().unwrap().to_string(),
            device:          DeviceKind::Cpu,
            epochs:          1,
            batch_size:      2,
            eval_batch_size: 2,
            num_workers:     0,
            ncrop:           false,
            ..TrainConfig::default()
        };
        let report = TrainUseCase::new(cfg).execute().unwrap();
        assert_eq!(report.total, 2);

        let manager = CheckpointManager::new(&ckpt).unwrap();
        let state = manager.load_state().unwrap();
        assert_eq!(state.epoch, 1);
        assert_eq!(state.best_epoch, 1);
        assert!(ckpt.join("metrics.csv").exists());
        assert_eq!(manager.load_config().unwrap().epochs, 1);
    }
}
