// ============================================================
// Layer 4 — FER Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<FerItem> into
// device tensors.
//
// How batching works here:
//   Input:  N items, each with C crops of S x S floats
//   Output: images [N, C, 1, S, S]
//           targets      [N]      one label per image
//           crop_targets [N * C]  each label repeated C times
//
//   The flat float buffer is laid out item-major then crop-major,
//   so reshaping to [N * C, 1, S, S] later fuses crops into the
//   batch dimension with crop_targets lining up row by row:
//
//     item0/crop0, item0/crop1, ..., item1/crop0, ...
//
// All items in a batch come from the same pipeline, so C and S
// are the same for every item.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::FerItem;

// ─── FerBatch ─────────────────────────────────────────────────────────────────
/// A batch of transformed faces ready for the forward pass.
#[derive(Debug, Clone)]
pub struct FerBatch<B: Backend> {
    /// Views — shape: [batch_size, ncrops, 1, side, side]
    pub images: Tensor<B, 5>,

    /// Class labels — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,

    /// Labels repeated once per crop — shape: [batch_size * ncrops]
    pub crop_targets: Tensor<B, 1, Int>,

    /// Host copy of `targets`, used for one-hot targets and reports
    pub labels: Vec<usize>,
}

impl<B: Backend> FerBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.images.dims()[0]
    }

    pub fn crop_count(&self) -> usize {
        self.images.dims()[1]
    }

    /// Host copy of `crop_targets`
    pub fn crop_labels(&self) -> Vec<usize> {
        let n = self.crop_count();
        self.labels
            .iter()
            .flat_map(|&l| std::iter::repeat(l).take(n))
            .collect()
    }
}

// ─── FerBatcher ───────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct FerBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> FerBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<FerItem, FerBatch<B>> for FerBatcher<B> {
    fn batch(&self, items: Vec<FerItem>) -> FerBatch<B> {
        let batch_size = items.len();
        let ncrops     = items.first().map(FerItem::crop_count).unwrap_or(0);
        let side       = items.first().map(|i| i.side).unwrap_or(0);

        // ── Flatten views ─────────────────────────────────────────────────────
        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.crops.iter().flatten().copied())
            .collect();

        // ── Labels ────────────────────────────────────────────────────────────
        let labels: Vec<usize> = items.iter().map(|i| i.label).collect();
        let targets: Vec<i32> = labels.iter().map(|&l| l as i32).collect();
        let crop_targets: Vec<i32> = targets
            .iter()
            .flat_map(|&l| std::iter::repeat(l).take(ncrops))
            .collect();

        // ── Create tensors ────────────────────────────────────────────────────
        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, ncrops, 1, side, side]);

        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);
        let crop_targets = Tensor::<B, 1, Int>::from_ints(crop_targets.as_slice(), &self.device);

        FerBatch { images, targets, crop_targets, labels }
    }
}
