// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `test`, and their
// flags. On/off switches take an explicit value so defaults
// can be turned off: `--mixup false`.

use clap::{ArgAction, Args, Subcommand};

use crate::application::train_use_case::{DeviceKind, TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train FerNet on the FER2013 CSV, then report on the test split
    Train(TrainArgs),

    /// Evaluate a saved checkpoint on the test split
    Test(TestArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// FER2013 CSV with emotion,pixels,Usage columns
    #[arg(long, default_value = "data/fer2013.csv")]
    pub data_path: String,

    /// Directory for checkpoints, config and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// cpu (ndarray) or gpu (wgpu)
    #[arg(long, default_value = "gpu")]
    pub device: DeviceKind,

    #[arg(long, default_value_t = 300)]
    pub epochs: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Batch size for validation and test
    #[arg(long, default_value_t = 64)]
    pub eval_batch_size: usize,

    /// Background loader threads; 0 loads on the training thread
    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    /// Initial learning rate
    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    #[arg(long, default_value_t = 1e-4)]
    pub weight_decay: f64,

    /// Multiplier applied when validation accuracy plateaus
    #[arg(long, default_value_t = 0.75)]
    pub lr_factor: f64,

    /// Epochs without improvement before the LR is reduced
    #[arg(long, default_value_t = 5)]
    pub lr_patience: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Random crops, jitter, affine, flips and rotations on training faces
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub augment: bool,

    /// Train on five 40×40 crops and evaluate on ten
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub ncrop: bool,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub mixup: bool,

    /// α of the Beta(α, α) mixing distribution
    #[arg(long, default_value_t = 0.2)]
    pub mixup_alpha: f64,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub label_smooth: bool,

    /// Probability mass moved off the true class
    #[arg(long, default_value_t = 0.1)]
    pub label_smooth_value: f32,

    /// Dynamic loss scaling
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub amp: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:          a.data_path,
            checkpoint_dir:     a.checkpoint_dir,
            device:             a.device,
            epochs:             a.epochs,
            batch_size:         a.batch_size,
            eval_batch_size:    a.eval_batch_size,
            num_workers:        a.num_workers,
            lr:                 a.lr,
            momentum:           a.momentum,
            weight_decay:       a.weight_decay,
            lr_factor:          a.lr_factor,
            lr_patience:        a.lr_patience,
            seed:               a.seed,
            augment:            a.augment,
            ncrop:              a.ncrop,
            mixup:              a.mixup,
            mixup_alpha:        a.mixup_alpha,
            label_smooth:       a.label_smooth,
            label_smooth_value: a.label_smooth_value,
            amp:                a.amp,
            ..TrainConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Directory written by `train`
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Use a different CSV than the one recorded at training time
    #[arg(long)]
    pub data_path: Option<String>,

    /// Override the device recorded at training time
    #[arg(long)]
    pub device: Option<DeviceKind>,

    /// Evaluate the last epoch instead of the best one
    #[arg(long)]
    pub latest: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config() {
        let cli = Cli::try_parse_from(["fer-train", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let default = TrainConfig::default();
        assert_eq!(cfg.epochs, default.epochs);
        assert_eq!(cfg.device, DeviceKind::Gpu);
        assert!(cfg.mixup && cfg.label_smooth && cfg.amp && cfg.ncrop);
    }

    #[test]
    fn test_switches_can_be_turned_off() {
        let cli = Cli::try_parse_from([
            "fer-train", "train", "--mixup", "false", "--amp", "false", "--device", "cpu",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert!(!args.mixup);
        assert!(!args.amp);
        assert!(args.label_smooth);
        assert_eq!(args.device, DeviceKind::Cpu);
    }

    #[test]
    fn test_test_command_flags() {
        let cli = Cli::try_parse_from(["fer-train", "test", "--latest", "--device", "cpu"]).unwrap();
        let Commands::Test(args) = cli.command else { panic!("expected test") };
        assert!(args.latest);
        assert_eq!(args.device, Some(DeviceKind::Cpu));
        assert_eq!(args.data_path, None);
    }
}
