// ============================================================
// Layer 4 — Loader Factory
// ============================================================
// Builds the three Burn data loaders used by the workflows:
//
//   train → train policy, batch_size, autodiff backend
//   val   → eval policy,  eval_batch_size, inner backend
//   test  → eval policy,  eval_batch_size, inner backend
//
// All three are shuffled with the run seed. Validation and test
// batches are created on the inner (non-autodiff) backend so the
// forward pass records no graph.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::sync::Arc;

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{FerBatch, FerBatcher},
    dataset::FerDataset,
    preprocessor::Split,
    splitter::DataSplits,
    transforms::{Normalize, TransformPipeline},
};

/// Everything the factory needs to know about batching and augmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub batch_size:      usize,
    pub eval_batch_size: usize,
    /// 0 loads batches on the calling thread
    pub num_workers:     usize,
    pub seed:            u64,
    pub augment:         bool,
    pub ncrop:           bool,
    pub normalize:       Normalize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size:      64,
            eval_batch_size: 64,
            num_workers:     0,
            seed:            42,
            augment:         true,
            ncrop:           true,
            normalize:       Normalize::default(),
        }
    }
}

pub type FerLoader<B> = Arc<dyn DataLoader<FerBatch<B>>>;

/// Train / validation / test loaders for one run
pub struct FerLoaders<B: AutodiffBackend> {
    pub train: FerLoader<B>,
    pub val:   FerLoader<B::InnerBackend>,
    pub test:  FerLoader<B::InnerBackend>,
}

/// Build a single loader over `split` with the given pipeline.
pub fn build_loader<B: Backend>(
    split:      Split,
    pipeline:   TransformPipeline,
    batch_size: usize,
    cfg:        &LoaderConfig,
    device:     &B::Device,
) -> FerLoader<B> {
    let dataset = FerDataset::from_split(split, pipeline);
    let batcher = FerBatcher::<B>::new(device.clone());

    let mut builder = DataLoaderBuilder::new(batcher)
        .batch_size(batch_size.max(1))
        .shuffle(cfg.seed);
    if cfg.num_workers > 0 {
        builder = builder.num_workers(cfg.num_workers);
    }
    builder.build(dataset)
}

/// Build the train, validation and test loaders.
pub fn get_dataloaders<B: AutodiffBackend>(
    splits: DataSplits,
    cfg:    &LoaderConfig,
    device: &B::Device,
) -> FerLoaders<B> {
    let train_pipeline = TransformPipeline::train(cfg.augment, cfg.ncrop, cfg.normalize);
    let eval_pipeline  = TransformPipeline::eval(cfg.ncrop, cfg.normalize);

    tracing::info!(
        "Loaders: train={} ({} views), val={}, test={} ({} views)",
        splits.train.len(),
        train_pipeline.crop_count(),
        splits.val.len(),
        splits.test.len(),
        eval_pipeline.crop_count(),
    );

    FerLoaders {
        train: build_loader::<B>(splits.train, train_pipeline, cfg.batch_size, cfg, device),
        val:   build_loader::<B::InnerBackend>(
            splits.val, eval_pipeline.clone(), cfg.eval_batch_size, cfg, device,
        ),
        test:  build_loader::<B::InnerBackend>(
            splits.test, eval_pipeline, cfg.eval_batch_size, cfg, device,
        ),
    }
}
