// ============================================================
// Layer 5 — Reduce-on-Plateau Learning Rate Schedule
// ============================================================
// Stepped once per epoch with the validation accuracy. When the
// accuracy has not improved (relative threshold) for more than
// `patience` epochs, the learning rate is multiplied by `factor`.
//
//   mode      max   (higher accuracy is better)
//   factor    0.75
//   patience  5
//   threshold 1e-4  (relative: better means > best * (1 + threshold))

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceLrOnPlateau {
    lr:         f64,
    factor:     f64,
    patience:   usize,
    threshold:  f64,
    min_lr:     f64,
    best:       Option<f64>,
    bad_epochs: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            factor:     0.75,
            patience:   5,
            threshold:  1e-4,
            min_lr:     0.0,
            best:       None,
            bad_epochs: 0,
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Record one epoch's metric; returns the learning rate to use next.
    pub fn step(&mut self, metric: f64) -> f64 {
        let improved = match self.best {
            None       => true,
            Some(best) => metric > best * (1.0 + self.threshold),
        };

        if improved {
            self.best = Some(metric);
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.bad_epochs > self.patience {
            let new_lr = (self.lr * self.factor).max(self.min_lr);
            if new_lr < self.lr {
                tracing::info!("Reducing learning rate {:.6} → {:.6}", self.lr, new_lr);
            }
            self.lr = new_lr;
            self.bad_epochs = 0;
        }
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduces_after_patience_is_exceeded() {
        let mut s = ReduceLrOnPlateau::new(0.1).with_patience(2);
        assert_eq!(s.step(50.0), 0.1);
        assert_eq!(s.step(49.0), 0.1);
        assert_eq!(s.step(50.0), 0.1);
        // third epoch without improvement
        assert!((s.step(48.0) - 0.075).abs() < 1e-12);
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut s = ReduceLrOnPlateau::new(0.01).with_patience(1);
        s.step(10.0);
        s.step(9.0);
        s.step(11.0);
        assert_eq!(s.step(10.5), 0.01);
        assert!(s.step(10.0) < 0.01);
    }

    #[test]
    fn test_tiny_gain_is_not_improvement() {
        let mut s = ReduceLrOnPlateau::new(1.0).with_patience(0).with_factor(0.5);
        s.step(100.0);
        assert_eq!(s.step(100.005), 0.5);
    }
}
