// ============================================================
// Layer 5 — Dynamic Loss Scaler
// ============================================================
// Mixed-precision training multiplies the loss by a large scale
// before backward so small gradients survive reduced precision,
// then divides the gradients by the same scale before the
// optimiser step.
//
// Per step:
//   1. backward on  loss * scale
//   2. unscale every gradient; note any NaN / Inf
//   3. skip the optimiser step if anything overflowed
//   4. update the scale:
//        overflow          → scale *= backoff_factor, reset counter
//        `growth_interval` clean steps in a row → scale *= growth_factor
//
// A disabled scaler keeps scale = 1 and never skips a step.
//
// Reference: Micikevicius et al. (2018) Mixed Precision Training

use std::marker::PhantomData;

use burn::{
    module::{ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

#[derive(Debug, Clone)]
pub struct GradScaler {
    scale:           f32,
    growth_factor:   f32,
    backoff_factor:  f32,
    growth_interval: usize,
    growth_tracker:  usize,
    enabled:         bool,
}

impl Default for GradScaler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl GradScaler {
    pub fn new(enabled: bool) -> Self {
        Self {
            scale:           if enabled { 65536.0 } else { 1.0 },
            growth_factor:   2.0,
            backoff_factor:  0.5,
            growth_interval: 2000,
            growth_tracker:  0,
            enabled,
        }
    }

    #[cfg(test)]
    pub fn with_init_scale(mut self, scale: f32) -> Self {
        if self.enabled {
            self.scale = scale.min(f32::MAX);
        }
        self
    }

    #[cfg(test)]
    pub fn with_growth_interval(mut self, interval: usize) -> Self {
        self.growth_interval = interval.max(1);
        self
    }

    pub fn is_enabled(&self) -> bool { self.enabled }

    pub fn scale_value(&self) -> f32 { self.scale }

    /// `loss * scale`
    pub fn scale<B: Backend>(&self, loss: Tensor<B, 1>) -> Tensor<B, 1> {
        if self.enabled {
            loss.mul_scalar(self.scale)
        } else {
            loss
        }
    }

    /// Divide every gradient of `model` by the scale, in place.
    /// Returns true when any gradient holds a NaN or an infinity.
    pub fn unscale<B, M>(&self, model: &M, grads: &mut GradientsParams) -> bool
    where
        B: AutodiffBackend,
        M: Module<B>,
    {
        if !self.enabled {
            return false;
        }
        let mut visitor = Unscale::<B> {
            grads,
            inv_scale: 1.0 / self.scale,
            found_inf: false,
            _backend:  PhantomData,
        };
        model.visit(&mut visitor);
        visitor.found_inf
    }

    /// Adjust the scale after a step.
    pub fn update(&mut self, found_inf: bool) {
        if !self.enabled {
            return;
        }
        if found_inf {
            self.scale = (self.scale * self.backoff_factor).min(f32::MAX);
            self.growth_tracker = 0;
            tracing::debug!("Gradient overflow, loss scale reduced to {}", self.scale);
        } else {
            self.growth_tracker += 1;
            if self.growth_tracker >= self.growth_interval {
                self.scale = (self.scale * self.growth_factor).min(f32::MAX);
                self.growth_tracker = 0;
            }
        }
    }
}

struct Unscale<'a, B: AutodiffBackend> {
    grads:     &'a mut GradientsParams,
    inv_scale: f32,
    found_inf: bool,
    _backend:  PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Unscale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id.clone()) {
            let grad = grad.mul_scalar(self.inv_scale);
            // NaN and ±Inf both make the sum non-finite
            let total = grad.clone().sum().into_scalar().elem::<f32>();
            if !total.is_finite() {
                self.found_inf = true;
            }
            self.grads.register::<B::InnerBackend, D>(id, grad);
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::{Linear, LinearConfig};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_backoff_on_overflow() {
        let mut scaler = GradScaler::new(true);
        scaler.update(true);
        assert_eq!(scaler.scale_value(), 32768.0);
    }

    #[test]
    fn test_growth_after_interval() {
        let mut scaler = GradScaler::new(true).with_init_scale(4.0).with_growth_interval(3);
        scaler.update(false);
        scaler.update(false);
        assert_eq!(scaler.scale_value(), 4.0);
        scaler.update(false);
        assert_eq!(scaler.scale_value(), 8.0);
        // an overflow resets the clean-step counter
        scaler.update(false);
        scaler.update(true);
        scaler.update(false);
        scaler.update(false);
        assert_eq!(scaler.scale_value(), 4.0);
    }

    #[test]
    fn test_disabled_is_identity() {
        let mut scaler = GradScaler::new(false).with_init_scale(1024.0);
        scaler.update(true);
        assert_eq!(scaler.scale_value(), 1.0);
        assert!(!scaler.is_enabled());
    }

    #[test]
    fn test_unscale_recovers_true_gradients() {
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(2, 1).with_bias(false).init(&device);
        let x = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0]], &device);
        let scaler = GradScaler::new(true).with_init_scale(8.0);

        let loss = model.forward(x).sum();
        let grads = scaler.scale(loss).backward();
        let mut grads = GradientsParams::from_grads(grads, &model);
        let found_inf = scaler.unscale::<TestBackend, _>(&model, &mut grads);
        assert!(!found_inf);

        // d(sum(w·x))/dw = x
        let g = grads
            .get::<NdArray, 2>(model.weight.id.clone())
            .unwrap()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        assert!((g[0] - 1.0).abs() < 1e-5);
        assert!((g[1] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_unscale_detects_overflow() {
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(1, 1).with_bias(false).init(&device);
        let x = Tensor::<TestBackend, 2>::from_floats([[1e30]], &device);
        let scaler = GradScaler::new(true).with_init_scale(f32::MAX);

        let loss = model.forward(x).sum();
        let grads = scaler.scale(loss).backward();
        let mut grads = GradientsParams::from_grads(grads, &model);
        assert!(scaler.unscale::<TestBackend, _>(&model, &mut grads));
    }

    #[test]
    fn test_scale_stays_finite() {
        let mut scaler = GradScaler::new(true).with_init_scale(f32::INFINITY);
        assert_eq!(scaler.scale_value(), f32::MAX);
        scaler.update(true);
        assert!(scaler.scale_value().is_finite());
        assert_eq!(scaler.scale_value(), f32::MAX * 0.5);

        let mut scaler = GradScaler::new(true).with_init_scale(f32::MAX).with_growth_interval(1);
        scaler.update(false);
        assert_eq!(scaler.scale_value(), f32::MAX);
    }
}
