// ============================================================
// Layer 5 — Evaluation Loop
// ============================================================
// Runs the validation loader through a model on the inner
// (non-autodiff) backend. Every sample arrives as n views:
//
//   [bs, n, 1, h, w] → forward on [bs·n, 1, h, w]
//                    → logits [bs, n, k] → sum over n / n → [bs, k]
//
// so loss and accuracy are per sample, not per crop.

use burn::prelude::*;

use crate::data::loaders::FerLoader;
use crate::infra::metrics::AverageMeter;
use crate::ml::{
    loss::{criterion, Targets},
    model::FerNet,
    trainer::EpochStats,
};

/// Forward every view and average the logits per sample.
pub fn forward_crops<B: Backend>(model: &FerNet<B>, images: Tensor<B, 5>) -> Tensor<B, 2> {
    let [bs, ncrops, c, h, w] = images.dims();
    let logits  = model.forward(images.reshape([bs * ncrops, c, h, w]));
    let classes = logits.dims()[1];
    logits
        .reshape([bs, ncrops, classes])
        .sum_dim(1)
        .div_scalar(ncrops as f32)
        .reshape([bs, classes])
}

/// Predicted class per row — shape: [batch]
pub fn predict<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1, Int> {
    // argmax(1) returns [batch, 1]
    logits.argmax(1).flatten::<1>(0, 1)
}

/// Number of rows whose argmax equals the target.
pub fn top1_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    predict(logits)
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

pub fn evaluate<B: Backend>(model: &FerNet<B>, loader: &FerLoader<B>) -> EpochStats {
    let mut loss_meter = AverageMeter::new();
    let mut acc_meter  = AverageMeter::new();

    for batch in loader.iter() {
        let n       = batch.batch_size();
        let logits  = forward_crops(model, batch.images);
        let correct = top1_correct(logits.clone(), batch.targets.clone());
        let loss    = criterion(logits, Targets::Hard(batch.targets))
            .into_scalar()
            .elem::<f64>();

        loss_meter.update(loss, n);
        acc_meter.update(100.0 * correct as f64 / n as f64, n);
    }

    EpochStats { loss: loss_meter.avg, acc: acc_meter.avg }
}
