// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds or runs the network lives here.
//
//   model.rs     — FerNet, a residual CNN over 48×48 / 40×40
//                  grayscale faces producing 7 emotion logits
//
//   loss.rs      — hard and soft-target cross entropy,
//                  label smoothing, mixup
//
//   scaler.rs    — dynamic loss scaling for mixed precision
//
//   scheduler.rs — reduce-on-plateau learning rate
//
//   trainer.rs   — one training epoch: crop fusion, mixup,
//                  scaled backward, guarded SGD step
//
//   evaluator.rs — validation pass with crop-averaged logits
//
//   tester.rs    — test pass collecting predictions
//
//   report.rs    — accuracy, precision / recall / F1 and the
//                  confusion matrix
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            He et al. (2016) Deep Residual Learning

/// Residual network
pub mod model;

/// Criteria, label smoothing and mixup
pub mod loss;

/// Mixed-precision loss scaler
pub mod scaler;

/// Reduce-on-plateau schedule
pub mod scheduler;

/// One epoch of training
pub mod trainer;

/// Validation loop
pub mod evaluator;

/// Test loop
pub mod tester;

/// Classification metrics
pub mod report;
