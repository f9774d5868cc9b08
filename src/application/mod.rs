// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only. The use cases tell the data, ml
// and infra layers what to do in which order:
//
//   train_use_case.rs — load, split, train, checkpoint, report
//   test_use_case.rs  — reload a finished run and report
//
// No model code and no printing live here; the CLI layer
// prints the returned reports.

/// The training workflow
pub mod train_use_case;

/// The evaluation workflow for a saved run
pub mod test_use_case;
