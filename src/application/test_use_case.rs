// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Re-runs the final evaluation of a finished training run:
//
//   Step 1: Read train_config.json from the checkpoint dir
//   Step 2: Load the CSV and keep the PublicTest split
//   Step 3: Rebuild FerNet and load the chosen checkpoint
//   Step 4: Crop-averaged predictions → ClassificationReport

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};

use crate::application::train_use_case::{load_splits, DeviceKind, TrainConfig};
use crate::data::{loaders::build_loader, transforms::TransformPipeline};
use crate::infra::checkpoint::{CheckpointKind, CheckpointManager};
use crate::ml::{model::FerNet, report::ClassificationReport, tester::test};

pub struct TestUseCase {
    checkpoint_dir: String,
    /// Overrides the CSV path stored in the run config
    data_path:      Option<String>,
    device:         Option<DeviceKind>,
    kind:           CheckpointKind,
}

impl TestUseCase {
    pub fn new(checkpoint_dir: impl Into<String>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            data_path:      None,
            device:         None,
            kind:           CheckpointKind::Best,
        }
    }

    pub fn with_data_path(mut self, data_path: Option<String>) -> Self {
        self.data_path = data_path;
        self
    }

    pub fn with_device(mut self, device: Option<DeviceKind>) -> Self {
        self.device = device;
        self
    }

    pub fn with_checkpoint(mut self, kind: CheckpointKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn execute(&self) -> Result<ClassificationReport> {
        let ckpt_manager = CheckpointManager::new(&self.checkpoint_dir)?;
        let mut cfg = ckpt_manager.load_config()?;
        if let Some(path) = &self.data_path {
            cfg.data_path = path.clone();
        }
        match ckpt_manager.load_state() {
            Ok(state) => tracing::info!(
                "Run trained {} epochs, best val_acc={:.2}% at epoch {}",
                state.epoch, state.best_val_acc, state.best_epoch,
            ),
            Err(e) => tracing::warn!("No run state found: {e:#}"),
        }

        match self.device.unwrap_or(cfg.device) {
            DeviceKind::Cpu => run_test::<NdArray>(&cfg, &ckpt_manager, self.kind, NdArrayDevice::default()),
            DeviceKind::Gpu => run_test::<Wgpu>(&cfg, &ckpt_manager, self.kind, WgpuDevice::default()),
        }
    }
}

fn run_test<B: Backend>(
    cfg:          &TrainConfig,
    ckpt_manager: &CheckpointManager,
    kind:         CheckpointKind,
    device:       B::Device,
) -> Result<ClassificationReport> {
    let splits = load_splits(&cfg.data_path)?;

    let loader_cfg = cfg.loader_config();
    let pipeline   = TransformPipeline::eval(cfg.ncrop, cfg.normalize);
    let loader     = build_loader::<B>(
        splits.test, pipeline, cfg.eval_batch_size, &loader_cfg, &device,
    );

    let model: FerNet<B> = cfg.model_config().init(&device);
    let model = ckpt_manager.load_model(model, kind, &device)?;

    test(&model, &loader, cfg.num_classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::IMAGE_PIXELS;
    use std::io::Write;

    #[test]
    fn test_missing_run_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = TestUseCase::new(dir.path().to_str().unwrap()).execute().unwrap_err();
        assert!(err.to_string().contains("train_config.json"));
    }

    #[test]
    fn test_report_from_saved_run() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("fer.csv");
        let mut f = std::fs::File::create(&csv).unwrap();
        writeln!(f, "emotion,pixels,Usage").unwrap();
        for (label, usage) in [(4, "PublicTest"), (5, "PublicTest"), (2, "Training")] {
            writeln!(f, "{label},{},{usage}", vec!["128"; IMAGE_PIXELS].join(" ")).unwrap();
        }

        let manager = CheckpointManager::new(dir.path().join("ckpt")).unwrap();
        let cfg = TrainConfig {
            data_path: csv.to_str().unwrap().to_string(),
            device:    DeviceKind::Cpu,
            ncrop:     false,
            ..TrainConfig::default()
        };
        manager.save_config(&cfg).unwrap();
        let model: FerNet<NdArray> = cfg.model_config().init(&NdArrayDevice::default());
        manager.save_model(&model, CheckpointKind::Best).unwrap();

        let report = TestUseCase::new(manager.dir().to_str().unwrap()).execute().unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.support(4) + report.support(5), 2);
    }
}
