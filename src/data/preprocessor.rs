// ============================================================
// Layer 4 — Image Preparation
// ============================================================
// Turns validated FerRecords into the in-memory arrays the
// dataset adapter wraps:
//
//   Vec<FerRecord>  →  images: Vec<GrayImage>   (48x48 each)
//                      labels: Vec<usize>
//
// Order is preserved: images[i] and labels[i] come from the
// same CSV row.
//
// Reference: image crate documentation (ImageBuffer::from_raw)

use anyhow::{anyhow, Result};
use image::GrayImage;

use crate::domain::record::{FerRecord, IMAGE_SIDE};

/// Parallel image / label arrays for one split.
#[derive(Debug, Clone, Default)]
pub struct Split {
    pub images: Vec<GrayImage>,
    pub labels: Vec<usize>,
}

impl Split {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Number of samples per class label
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for &l in &self.labels {
            if l < num_classes {
                counts[l] += 1;
            }
        }
        counts
    }
}

/// Build image and label arrays from records.
pub fn prepare_data(records: &[FerRecord]) -> Result<Split> {
    let mut split = Split {
        images: Vec::with_capacity(records.len()),
        labels: Vec::with_capacity(records.len()),
    };

    for (i, r) in records.iter().enumerate() {
        let img = GrayImage::from_raw(IMAGE_SIDE as u32, IMAGE_SIDE as u32, r.pixels.clone())
            .ok_or_else(|| anyhow!("record {i}: pixel buffer does not fill a 48x48 image"))?;
        split.images.push(img);
        split.labels.push(r.label);
    }

    Ok(split)
}
