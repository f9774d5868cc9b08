// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One pass over the training loader. Per batch:
//
//   1. fuse crops      [bs, n, 1, h, w] → [bs·n, 1, h, w]
//                      targets repeated n times per sample
//   2. mixup           optional, λ ~ Beta(α, α)
//   3. forward         logits [bs·n, classes]
//   4. loss            CE / smoothed / mixup / mixup + smoothed
//   5. backward        on loss · scale, then unscale
//                      non-finite gradients skip the SGD step
//   6. meters          loss and top-1 accuracy weighted by rows
//
// The train loader yields autodiff tensors; validation runs on
// model.valid() with the inner backend (see evaluator.rs).
//
// Reference: Burn Book §5 (Training)
//            Sutskever et al. (2013) Nesterov momentum

use burn::{
    optim::{
        decay::WeightDecayConfig,
        momentum::MomentumConfig,
        GradientsParams,
        Optimizer,
        SgdConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::Rng;

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::FerBatch, loaders::FerLoader};
use crate::infra::metrics::AverageMeter;
use crate::ml::{
    evaluator::top1_correct,
    loss::{criterion, make_targets, mixup_criterion, mixup_data},
    model::FerNet,
    scaler::GradScaler,
};

/// Averages over one pass of a loader
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub loss: f64,
    /// Top-1 accuracy in percent
    pub acc:  f64,
}

/// SGD with Nesterov momentum and L2 weight decay.
pub fn sgd_config(cfg: &TrainConfig) -> SgdConfig {
    let momentum = MomentumConfig::new()
        .with_momentum(cfg.momentum as _)
        .with_dampening(0.0)
        .with_nesterov(true);
    SgdConfig::new()
        .with_momentum(Some(momentum))
        .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as _)))
}

/// Train `model` for one epoch at learning rate `lr`.
pub fn train_epoch<B, O, R>(
    mut model: FerNet<B>,
    loader:    &FerLoader<B>,
    optim:     &mut O,
    scaler:    &mut GradScaler,
    lr:        f64,
    cfg:       &TrainConfig,
    rng:       &mut R,
) -> (FerNet<B>, EpochStats)
where
    B: AutodiffBackend,
    O: Optimizer<FerNet<B>, B>,
    R: Rng,
{
    let mut loss_meter = AverageMeter::new();
    let mut acc_meter  = AverageMeter::new();
    let mut skipped    = 0usize;
    let smoothing      = cfg.label_smooth.then_some(cfg.label_smooth_value);

    for batch in loader.iter() {
        let labels = batch.crop_labels();
        let FerBatch { images, crop_targets, .. } = batch;

        // ── Fuse crops into the batch dimension ───────────────────────────────
        let [bs, ncrops, c, h, w] = images.dims();
        let rows   = bs * ncrops;
        let images = images.reshape([rows, c, h, w]);
        let device = images.device();

        // ── Forward + loss ────────────────────────────────────────────────────
        let (logits, loss) = if cfg.mixup {
            let mix    = mixup_data(images, &labels, cfg.mixup_alpha, rng);
            let logits = model.forward(mix.images);
            let k      = logits.dims()[1];
            let loss   = mixup_criterion(
                logits.clone(),
                make_targets(&mix.labels_a, k, smoothing, &device),
                make_targets(&mix.labels_b, k, smoothing, &device),
                mix.lam,
            );
            (logits, loss)
        } else {
            let logits = model.forward(images);
            let k      = logits.dims()[1];
            let loss   = criterion(logits.clone(), make_targets(&labels, k, smoothing, &device));
            (logits, loss)
        };

        let loss_val = loss.clone().into_scalar().elem::<f64>();
        let correct  = top1_correct(logits.inner(), crop_targets.inner());

        // ── Scaled backward + guarded SGD step ────────────────────────────────
        let grads     = scaler.scale(loss).backward();
        let mut grads = GradientsParams::from_grads(grads, &model);
        let found_inf = scaler.unscale::<B, _>(&model, &mut grads);
        if found_inf {
            skipped += 1;
        } else {
            model = optim.step(lr, model, grads);
        }
        scaler.update(found_inf);

        loss_meter.update(loss_val, rows);
        acc_meter.update(100.0 * correct as f64 / rows as f64, rows);
    }

    if skipped > 0 {
        tracing::warn!(
            "Skipped {} optimiser steps on non-finite gradients, loss scale now {}",
            skipped,
            scaler.scale_value(),
        );
    }

    (model, EpochStats { loss: loss_meter.avg, acc: acc_meter.avg })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use image::GrayImage;
    use rand::{rngs::StdRng, SeedableRng};

    use crate::data::{
        loaders::build_loader,
        preprocessor::Split,
        transforms::{Normalize, TransformPipeline},
    };
    use crate::data::loaders::LoaderConfig;
    use crate::ml::model::FerNetConfig;

    type TestBackend = Autodiff<NdArray>;

    fn tiny_loader(ncrop: bool) -> FerLoader<TestBackend> {
        tiny_loader_with(ncrop, LoaderConfig::default().normalize)
    }

    fn tiny_loader_with(ncrop: bool, normalize: Normalize) -> FerLoader<TestBackend> {
        let split = Split {
            images: (0..4u8).map(|i| GrayImage::from_pixel(48, 48, image::Luma([i * 60]))).collect(),
            labels: vec![0, 3, 5, 6],
        };
        let cfg = LoaderConfig { batch_size: 2, ncrop, ..LoaderConfig::default() };
        let pipeline = TransformPipeline::train(false, ncrop, normalize);
        build_loader::<TestBackend>(split, pipeline, cfg.batch_size, &cfg, &Default::default())
    }

    fn run(cfg: &TrainConfig, ncrop: bool) -> EpochStats {
        let device = Default::default();
        let model: FerNet<TestBackend> = FerNetConfig::new().init(&device);
        let mut optim  = sgd_config(cfg).init::<TestBackend, FerNet<TestBackend>>();
        let mut scaler = GradScaler::new(cfg.amp);
        let mut rng    = StdRng::seed_from_u64(cfg.seed);
        let loader     = tiny_loader(ncrop);
        let (_, stats) = train_epoch(model, &loader, &mut optim, &mut scaler, cfg.lr, cfg, &mut rng);
        stats
    }

    #[test]
    fn test_plain_epoch_reports_finite_stats() {
        let cfg = TrainConfig { mixup: false, label_smooth: false, amp: false, ..TrainConfig::default() };
        let stats = run(&cfg, false);
        assert!(stats.loss.is_finite() && stats.loss > 0.0);
        assert!((0.0..=100.0).contains(&stats.acc));
    }

    #[test]
    fn test_mixup_smoothing_and_scaling_together() {
        let cfg = TrainConfig { mixup: true, label_smooth: true, amp: true, ..TrainConfig::default() };
        let stats = run(&cfg, true);
        assert!(stats.loss.is_finite());
        assert!((0.0..=100.0).contains(&stats.acc));
    }

    #[test]
    fn test_non_finite_gradients_skip_the_step() {
        let cfg = TrainConfig { mixup: false, label_smooth: false, amp: true, ..TrainConfig::default() };
        let device = Default::default();
        let model: FerNet<TestBackend> = FerNetConfig::new().init(&device);
        let before = model.fc.weight.val().into_data();

        // zero std turns every pixel into NaN or inf
        let loader     = tiny_loader_with(false, Normalize { mean: 0.0, std: 0.0 });
        let mut optim  = sgd_config(&cfg).init::<TestBackend, FerNet<TestBackend>>();
        let mut scaler = GradScaler::new(true);
        let mut rng    = StdRng::seed_from_u64(cfg.seed);
        let (model, _) = train_epoch(model, &loader, &mut optim, &mut scaler, cfg.lr, &cfg, &mut rng);

        model.fc.weight.val().into_data().assert_eq(&before, true);
        // two batches, two backoffs from 65536
        assert_eq!(scaler.scale_value(), 16384.0);
    }
}
