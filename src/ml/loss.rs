// ============================================================
// Layer 5 — Losses: label smoothing and mixup
// ============================================================
// The training loop chooses between four criteria:
//
//   mixup  smoothing   loss
//   ─────  ─────────   ──────────────────────────────────────────
//   off    off         CE(z, y)
//   off    on          softCE(z, smooth(y))
//   on     off         λ·CE(z, y_a) + (1-λ)·CE(z, y_b)
//   on     on          λ·softCE(z, smooth(y_a)) + (1-λ)·softCE(z, smooth(y_b))
//
// smooth(y) puts 1 - ε on the true class and ε / (K - 1) on
// every other class, so each row still sums to 1.
//
// Reference: Szegedy et al. (2016) label smoothing
//            Zhang et al. (2018) mixup

use burn::{
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::activation::log_softmax,
};
use rand::{seq::SliceRandom, Rng};
use rand_distr::{Beta, Distribution};

/// Which targets a loss is computed against.
#[derive(Debug, Clone)]
pub enum Targets<B: Backend> {
    /// Class indices — shape: [batch]
    Hard(Tensor<B, 1, Int>),
    /// Probability rows — shape: [batch, classes]
    Soft(Tensor<B, 2>),
}

/// [batch] tensor of class indices.
pub fn label_tensor<B: Backend>(labels: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let ints: Vec<i32> = labels.iter().map(|&l| l as i32).collect();
    Tensor::<B, 1, Int>::from_ints(ints.as_slice(), device)
}

/// Hard indices, or smoothed probability rows when `smoothing` is set.
pub fn make_targets<B: Backend>(
    labels:    &[usize],
    classes:   usize,
    smoothing: Option<f32>,
    device:    &B::Device,
) -> Targets<B> {
    match smoothing {
        Some(eps) => Targets::Soft(smooth_targets(labels, classes, eps, device)),
        None      => Targets::Hard(label_tensor(labels, device)),
    }
}

/// Label-smoothed one-hot rows, flattened row-major.
pub fn smooth_one_hot(labels: &[usize], classes: usize, smoothing: f32) -> Vec<f32> {
    let confidence = 1.0 - smoothing;
    let off = if classes > 1 { smoothing / (classes - 1) as f32 } else { 0.0 };
    let mut rows = vec![off; labels.len() * classes];
    for (i, &l) in labels.iter().enumerate() {
        rows[i * classes + l] = confidence;
    }
    rows
}

/// [batch, classes] tensor of smoothed targets.
pub fn smooth_targets<B: Backend>(
    labels:    &[usize],
    classes:   usize,
    smoothing: f32,
    device:    &B::Device,
) -> Tensor<B, 2> {
    let rows = smooth_one_hot(labels, classes, smoothing);
    Tensor::<B, 1>::from_floats(rows.as_slice(), device).reshape([labels.len(), classes])
}

/// Cross entropy against probability targets:
/// mean over rows of `-Σ_k t_k · log_softmax(z)_k`.
pub fn soft_cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (log_probs * targets).sum_dim(1).neg().mean()
}

/// Cross entropy for either kind of target.
pub fn criterion<B: Backend>(logits: Tensor<B, 2>, targets: Targets<B>) -> Tensor<B, 1> {
    match targets {
        Targets::Hard(t) => CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, t),
        Targets::Soft(t) => soft_cross_entropy(logits, t),
    }
}

/// `λ · crit(z, a) + (1 - λ) · crit(z, b)`
pub fn mixup_criterion<B: Backend>(
    logits: Tensor<B, 2>,
    a:      Targets<B>,
    b:      Targets<B>,
    lam:    f32,
) -> Tensor<B, 1> {
    criterion(logits.clone(), a).mul_scalar(lam) + criterion(logits, b).mul_scalar(1.0 - lam)
}

/// A mixed batch: `λ·x + (1-λ)·x[perm]`, with targets `y` and `y[perm]`.
#[derive(Debug, Clone)]
pub struct Mixup<B: Backend> {
    pub images:   Tensor<B, 4>,
    pub labels_a: Vec<usize>,
    pub labels_b: Vec<usize>,
    pub lam:      f32,
}

/// Draw `λ ~ Beta(α, α)`; `α <= 0` disables mixing (`λ = 1`).
pub fn sample_lambda<R: Rng + ?Sized>(alpha: f64, rng: &mut R) -> f32 {
    if alpha <= 0.0 {
        return 1.0;
    }
    match Beta::new(alpha, alpha) {
        Ok(beta) => beta.sample(rng) as f32,
        Err(_)   => 1.0,
    }
}

pub fn mixup_data<B: Backend, R: Rng + ?Sized>(
    images: Tensor<B, 4>,
    labels: &[usize],
    alpha:  f64,
    rng:    &mut R,
) -> Mixup<B> {
    let lam = sample_lambda(alpha, rng);
    let mut permutation: Vec<usize> = (0..labels.len()).collect();
    permutation.shuffle(rng);

    let index: Vec<i32> = permutation.iter().map(|&i| i as i32).collect();
    let index = Tensor::<B, 1, Int>::from_ints(index.as_slice(), &images.device());
    let shuffled = images.clone().select(0, index);
    let images = images.mul_scalar(lam) + shuffled.mul_scalar(1.0 - lam);

    let labels_b = permutation.iter().map(|&i| labels[i]).collect();
    Mixup {
        images,
        labels_a: labels.to_vec(),
        labels_b,
        lam,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_smooth_one_hot_rows() {
        let rows = smooth_one_hot(&[2, 0], 4, 0.3);
        assert_eq!(rows.len(), 8);
        assert!((rows[2] - 0.7).abs() < 1e-6);
        assert!((rows[0] - 0.1).abs() < 1e-6);
        assert!((rows[4] - 0.7).abs() < 1e-6);
        for row in rows.chunks(4) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_smoothing_soft_ce_matches_hard_ce() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[2.0, -1.0, 0.5], [0.1, 0.2, 3.0]], &device);
        let labels = [0usize, 2];
        let hard = Tensor::<TestBackend, 1, Int>::from_ints([0, 2], &device);

        let soft = smooth_targets::<TestBackend>(&labels, 3, 0.0, &device);
        let a = scalar(criterion(logits.clone(), Targets::Soft(soft)));
        let b = scalar(criterion(logits, Targets::Hard(hard)));
        assert!((a - b).abs() < 1e-5);
    }

    #[test]
    fn test_mixup_criterion_with_full_lambda() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [0.0, 1.0]], &device);
        let a = Tensor::<TestBackend, 1, Int>::from_ints([0, 1], &device);
        let b = Tensor::<TestBackend, 1, Int>::from_ints([1, 0], &device);

        let mixed = scalar(mixup_criterion(
            logits.clone(), Targets::Hard(a.clone()), Targets::Hard(b), 1.0,
        ));
        let plain = scalar(criterion(logits, Targets::Hard(a)));
        assert!((mixed - plain).abs() < 1e-6);
    }

    #[test]
    fn test_mixup_without_alpha_keeps_images() {
        let device = Default::default();
        let images = Tensor::<TestBackend, 4>::from_floats(
            [[[[1.0]]], [[[2.0]]], [[[3.0]]]],
            &device,
        );
        let mut rng = StdRng::seed_from_u64(5);
        let mix = mixup_data(images, &[0, 1, 2], 0.0, &mut rng);
        assert_eq!(mix.lam, 1.0);
        let values = mix.images.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        // labels 0..3 make labels_b the permutation itself
        let mut sorted = mix.labels_b.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);
    }

    #[test]
    fn test_mixup_blends_with_permuted_rows() {
        let device = Default::default();
        let images = Tensor::<TestBackend, 4>::from_floats([[[[0.0]]], [[[10.0]]]], &device);
        let mut rng = StdRng::seed_from_u64(9);
        let mix = mixup_data(images, &[0, 1], 0.4, &mut rng);
        assert!(mix.lam > 0.0 && mix.lam < 1.0);
        let values = mix.images.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let originals = [0.0f32, 10.0];
        for (i, v) in values.iter().enumerate() {
            let expected = mix.lam * originals[i] + (1.0 - mix.lam) * originals[mix.labels_b[i]];
            assert!((v - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_sample_lambda_range() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let lam = sample_lambda(0.2, &mut rng);
            assert!((0.0..=1.0).contains(&lam));
        }
    }
}
