// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Concerns shared by the workflows and the training loops:
//
//   checkpoint.rs — model weights (latest and best) through
//                   Burn's full-precision recorder, plus the run
//                   configuration and progress as JSON so
//                   `test` can rebuild the same model
//
//   metrics.rs    — AverageMeter running means and the
//                   per-epoch metrics CSV
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Running averages and the epoch metrics CSV
pub mod metrics;
