// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
//   1. `train` — trains FerNet and prints the test report
//   2. `test`  — loads a saved checkpoint and prints the report
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TestArgs, TrainArgs};

use crate::infra::checkpoint::CheckpointKind;

#[derive(Parser, Debug)]
#[command(
    name = "fer-train",
    version = "0.1.0",
    about = "Train and evaluate a facial expression classifier on FER2013."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Test(args)  => run_test(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.data_path);
    let report = TrainUseCase::new(args.into()).execute()?;

    println!("\n{report}");
    Ok(())
}

fn run_test(args: TestArgs) -> Result<()> {
    use crate::application::test_use_case::TestUseCase;

    let kind = if args.latest { CheckpointKind::Latest } else { CheckpointKind::Best };
    tracing::info!("Testing {} checkpoint in '{}'", kind, args.checkpoint_dir);

    let report = TestUseCase::new(args.checkpoint_dir)
        .with_data_path(args.data_path)
        .with_device(args.device)
        .with_checkpoint(kind)
        .execute()?;

    println!("{report}");
    Ok(())
}
