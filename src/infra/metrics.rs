// ============================================================
// Layer 6 — Metrics: running averages and the epoch CSV log
// ============================================================
// AverageMeter keeps a sample-weighted running mean, used by the
// training and evaluation loops for loss and accuracy:
//
//   update(v, n):  sum += v * n;  count += n;  avg = sum / count
//
// MetricsLogger appends one CSV row per epoch:
//
//   epoch,lr,train_loss,train_acc,val_loss,val_acc
//   1,0.010000,1.702311,31.250000,1.534270,40.912800
//   2,0.010000,1.491007,42.018000,1.380654,47.032600
//
// Accuracies are percentages.
//
// Output file: <checkpoint_dir>/metrics.csv

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

// ─── AverageMeter ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct AverageMeter {
    pub val:   f64,
    pub sum:   f64,
    pub count: usize,
    pub avg:   f64,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `val` as the mean over `n` samples.
    pub fn update(&mut self, val: f64, n: usize) {
        self.val    = val;
        self.sum   += val * n as f64;
        self.count += n;
        self.avg    = if self.count > 0 { self.sum / self.count as f64 } else { 0.0 };
    }
}

// ─── EpochMetrics ─────────────────────────────────────────────────────────────
/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Learning rate used during this epoch
    pub lr: f64,

    pub train_loss: f64,

    /// Top-1 accuracy (%) on the training batches, as seen by the model
    pub train_acc: f64,

    pub val_loss: f64,

    /// Top-1 accuracy (%) on the validation set with crop averaging
    pub val_acc: f64,
}

impl EpochMetrics {
    pub fn new(
        epoch:      usize,
        lr:         f64,
        train_loss: f64,
        train_acc:  f64,
        val_loss:   f64,
        val_acc:    f64,
    ) -> Self {
        Self { epoch, lr, train_loss, train_acc, val_loss, val_acc }
    }

    /// Returns true if this epoch beat the previous best validation accuracy
    pub fn is_improvement(&self, best_val_acc: f64) -> bool {
        self.val_acc > best_val_acc
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet,
    /// otherwise rows are appended to the existing log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,lr,train_loss,train_acc,val_loss,val_acc")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.lr,
            m.train_loss,
            m.train_acc,
            m.val_loss,
            m.val_acc,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_acc={:.2}%",
            m.epoch,
            m.train_loss,
            m.val_acc,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
