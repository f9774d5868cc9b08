// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from the FER2013 CSV file
// all the way to device-ready tensor batches.
//
// The pipeline flows in this order:
//
//   fer2013.csv
//       │
//       ▼
//   CsvLoader          → parses rows into FerRecords
//       │
//       ▼
//   split_by_usage     → Training / PrivateTest / PublicTest
//       │
//       ▼
//   prepare_data       → 48x48 GrayImages + integer labels
//       │
//       ▼
//   FerDataset         → Burn Dataset, runs the transform pipeline per item
//       │
//       ▼
//   FerBatcher         → stacks crops into [N, C, 1, S, S] tensors
//       │
//       ▼
//   get_dataloaders    → shuffled, multi-worker train/val/test loaders
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the FER2013 CSV with the csv crate
pub mod loader;

/// Converts records into image / label arrays
pub mod preprocessor;

/// Partitions records by the Usage column
pub mod splitter;

/// Augmentation, multi-crop and normalisation
pub mod transforms;

/// Implements Burn's Dataset trait over images and labels
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Builds the train / validation / test data loaders
pub mod loaders;
