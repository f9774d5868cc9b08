// ============================================================
// Layer 5 — Residual Network (FerNet)
// ============================================================
// A ResNet-18 style classifier for single-channel face crops.
//
//   input                     [N,   1, 40, 40]
//   head  conv3x3 + BN + ReLU [N,  64, 40, 40]
//   stage 1 (2 blocks)        [N,  64, 40, 40]
//   stage 2 (2 blocks, /2)    [N, 128, 20, 20]
//   stage 3 (2 blocks, /2)    [N, 256, 10, 10]
//   stage 4 (2 blocks, /2)    [N, 512,  5,  5]
//   avg pool 4x4 stride 4     [N, 512,  1,  1]
//   flatten + linear          [N, num_classes]
//
// Whole 48x48 images go through the same stack and reach
// [N, 512, 6, 6] before pooling, which still pools to 1x1.
//
// BasicBlock:
//
//   x ──conv3x3(stride)─BN─ReLU──conv3x3─BN──(+)──ReLU──▶
//   │                                         ▲
//   └────────── identity or conv1x1(stride)─BN┘
//
// The shortcut gets a projection whenever the block changes the
// stride or the channel count.
//
// Reference: He et al. (2016) Deep Residual Learning
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig},
        BatchNorm, BatchNormConfig,
        Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

/// Channel width and first-block stride of each stage
const STAGES: [(usize, usize); 4] = [(64, 1), (128, 2), (256, 2), (512, 2)];

const BLOCKS_PER_STAGE: usize = 2;

#[derive(Config, Debug)]
pub struct FerNetConfig {
    #[config(default = 7)]
    pub num_classes: usize,
}

impl FerNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FerNet<B> {
        let head = ConvBn::new(1, 64, 3, 1, device);

        let mut blocks  = Vec::with_capacity(STAGES.len() * BLOCKS_PER_STAGE);
        let mut inplanes = 64;
        for (planes, stride) in STAGES {
            blocks.push(BasicBlock::new(inplanes, planes, stride, device));
            for _ in 1..BLOCKS_PER_STAGE {
                blocks.push(BasicBlock::new(planes, planes, 1, device));
            }
            inplanes = planes;
        }

        let pool = AvgPool2dConfig::new([4, 4]).with_strides([4, 4]).init();
        let fc   = LinearConfig::new(inplanes, self.num_classes).init(device);

        FerNet { head, blocks, pool, fc }
    }
}

// ─── ConvBn ───────────────────────────────────────────────────────────────────
/// Bias-free convolution followed by batch normalisation.
#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn:   BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    fn new(inplanes: usize, planes: usize, kernel: usize, stride: usize, device: &B::Device) -> Self {
        let pad  = kernel / 2;
        let conv = Conv2dConfig::new([inplanes, planes], [kernel, kernel])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(planes).init(device);
        Self { conv, bn }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

// ─── BasicBlock ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub bb1:        ConvBn<B>,
    pub bb2:        ConvBn<B>,
    pub downsample: Option<ConvBn<B>>,
}

impl<B: Backend> BasicBlock<B> {
    fn new(inplanes: usize, planes: usize, stride: usize, device: &B::Device) -> Self {
        let downsample = (stride != 1 || inplanes != planes)
            .then(|| ConvBn::new(inplanes, planes, 1, stride, device));
        Self {
            bb1: ConvBn::new(inplanes, planes, 3, stride, device),
            bb2: ConvBn::new(planes, planes, 3, 1, device),
            downsample,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = match &self.downsample {
            Some(proj) => proj.forward(x.clone()),
            None       => x.clone(),
        };
        let out = relu(self.bb1.forward(x));
        let out = self.bb2.forward(out);
        relu(out + residual)
    }
}

// ─── FerNet ───────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct FerNet<B: Backend> {
    pub head:   ConvBn<B>,
    pub blocks: Vec<BasicBlock<B>>,
    pub pool:   AvgPool2d,
    pub fc:     Linear<B>,
}

impl<B: Backend> FerNet<B> {
    /// images: [batch, 1, H, W] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = relu(self.head.forward(images));
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.pool.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);
        self.fc.forward(x)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_logits_shape_for_crops_and_whole_images() {
        let device = Default::default();
        let model: FerNet<TestBackend> = FerNetConfig::new().init(&device);

        let crops = Tensor::<TestBackend, 4>::zeros([2, 1, 40, 40], &device);
        assert_eq!(model.forward(crops).dims(), [2, 7]);

        let whole = Tensor::<TestBackend, 4>::zeros([1, 1, 48, 48], &device);
        assert_eq!(model.forward(whole).dims(), [1, 7]);
    }

    #[test]
    fn test_block_layout() {
        let device = Default::default();
        let model: FerNet<TestBackend> = FerNetConfig::new().with_num_classes(3).init(&device);
        assert_eq!(model.blocks.len(), 8);
        // projection only where a stage starts with a stride or width change
        let projected: Vec<bool> = model.blocks.iter().map(|b| b.downsample.is_some()).collect();
        assert_eq!(projected, vec![false, false, true, false, true, false, true, false]);
        assert_eq!(model.fc.weight.dims(), [512, 3]);
    }
}
