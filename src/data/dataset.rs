// ============================================================
// Layer 4 — Dataset Adapter
// ============================================================
// Implements Burn's Dataset trait over prepared images so the
// DataLoader can call .get(index) and .len().
//
// Reference: Burn Book §4 (Datasets)

use burn::data::dataset::Dataset;
use image::GrayImage;

use crate::data::preprocessor::Split;
use crate::data::transforms::TransformPipeline;

/// One transformed sample: `crops.len()` views of `side x side` floats.
#[derive(Debug, Clone)]
pub struct FerItem {
    pub crops: Vec<Vec<f32>>,
    pub side:  usize,
    pub label: usize,
}

impl FerItem {
    pub fn crop_count(&self) -> usize {
        self.crops.len()
    }
}

/// In-memory images and labels with a per-item transform.
/// The pipeline runs on every `get`, so random augmentation
/// differs between epochs and between loader workers.
pub struct FerDataset {
    images:   Vec<GrayImage>,
    labels:   Vec<usize>,
    pipeline: TransformPipeline,
}

impl FerDataset {
    pub fn new(images: Vec<GrayImage>, labels: Vec<usize>, pipeline: TransformPipeline) -> Self {
        debug_assert_eq!(images.len(), labels.len());
        Self { images, labels, pipeline }
    }

    pub fn from_split(split: Split, pipeline: TransformPipeline) -> Self {
        Self::new(split.images, split.labels, pipeline)
    }
}

impl Dataset<FerItem> for FerDataset {
    fn get(&self, index: usize) -> Option<FerItem> {
        let img   = self.images.get(index)?;
        let label = *self.labels.get(index)?;
        let out   = self.pipeline.apply(img, &mut rand::thread_rng());
        Some(FerItem { crops: out.crops, side: out.side, label })
    }

    fn len(&self) -> usize {
        self.images.len()
    }
}
