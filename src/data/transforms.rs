// ============================================================
// Layer 4 — Image Transform Pipeline
// ============================================================
// Per-item augmentation applied by the dataset adapter every
// time a sample is fetched, so each epoch sees a different
// random view of the same face.
//
// The pipeline has four stages:
//
//   GrayImage ──ops──▶ GrayImage ──crop──▶ Vec<GrayImage>
//             ──to_tensor + normalise──▶ Vec<Vec<f32>>
//             ──random erasing (per crop)──▶ Vec<Vec<f32>>
//
// Train policy (augment on):
//   RandomResizedCrop(48, scale 0.8..1.2)
//   RandomApply(ColorJitter(0.5, 0.5, 0.5), p = 0.5)
//   RandomApply(RandomAffine(translate 0.2, 0.2), p = 0.5)
//   RandomHorizontalFlip(p = 0.5)
//   RandomApply(RandomRotation(10°), p = 0.5)
//   FiveCrop(40) → normalise → RandomErasing
//
// Eval policy (validation / test):
//   TenCrop(40) → normalise
//
// Every random operation takes the RNG explicitly so tests can
// use a seeded StdRng and get reproducible output.
//
// Reference: Krizhevsky et al. (2012) ten-crop evaluation
//            Zhong et al. (2017) Random Erasing
//            image crate documentation (imageops)

use image::{imageops, imageops::FilterType, GrayImage, Luma};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

/// Side length of the training / evaluation crops.
pub const CROP_SIZE: u32 = 40;

/// Side length images are resized to by RandomResizedCrop.
pub const RESIZE_SIZE: u32 = 48;

// ─── Image operations ─────────────────────────────────────────────────────────
/// A single image → image operation.
#[derive(Debug, Clone)]
pub enum ImageOp {
    /// Crop a random area / aspect ratio box and resize it to `size`
    RandomResizedCrop { size: u32, scale: (f64, f64), ratio: (f64, f64) },

    /// Random brightness / contrast / saturation factors in `[1-x, 1+x]`
    ColorJitter { brightness: f64, contrast: f64, saturation: f64 },

    /// Random integer shift of up to `translate * dimension` pixels
    RandomAffine { translate: (f64, f64) },

    RandomHorizontalFlip { p: f64 },

    /// Rotation by an angle drawn from `[-degrees, degrees]`
    RandomRotation { degrees: f64 },

    /// Apply `op` with probability `p`
    RandomApply { p: f64, op: Box<ImageOp> },
}

impl ImageOp {
    pub fn random_apply(p: f64, op: ImageOp) -> Self {
        ImageOp::RandomApply { p, op: Box::new(op) }
    }

    pub fn apply<R: Rng + ?Sized>(&self, img: GrayImage, rng: &mut R) -> GrayImage {
        match self {
            ImageOp::RandomResizedCrop { size, scale, ratio } => {
                let (x, y, w, h) = resized_crop_box(img.width(), img.height(), *scale, *ratio, rng);
                let cropped = imageops::crop_imm(&img, x, y, w, h).to_image();
                imageops::resize(&cropped, *size, *size, FilterType::Triangle)
            }
            ImageOp::ColorJitter { brightness, contrast, saturation } => {
                let b = jitter_factor(*brightness, rng);
                let c = jitter_factor(*contrast, rng);
                // saturation is a no-op on one channel
                let _s = jitter_factor(*saturation, rng);

                let mut order = [0u8, 1, 2];
                order.shuffle(rng);
                let mut out = img;
                for step in order {
                    out = match step {
                        0 => adjust_brightness(&out, b),
                        1 => adjust_contrast(&out, c),
                        _ => out,
                    };
                }
                out
            }
            ImageOp::RandomAffine { translate } => {
                let max_dx = translate.0 * img.width() as f64;
                let max_dy = translate.1 * img.height() as f64;
                let dx = rng.gen_range(-max_dx..=max_dx).round();
                let dy = rng.gen_range(-max_dy..=max_dy).round();
                warp(&img, 0.0, dx, dy)
            }
            ImageOp::RandomHorizontalFlip { p } => {
                if rng.gen::<f64>() < *p {
                    imageops::flip_horizontal(&img)
                } else {
                    img
                }
            }
            ImageOp::RandomRotation { degrees } => {
                let angle = rng.gen_range(-*degrees..=*degrees);
                warp(&img, angle, 0.0, 0.0)
            }
            ImageOp::RandomApply { p, op } => {
                if rng.gen::<f64>() < *p {
                    op.apply(img, rng)
                } else {
                    img
                }
            }
        }
    }
}

fn jitter_factor<R: Rng + ?Sized>(amount: f64, rng: &mut R) -> f64 {
    if amount <= 0.0 {
        return 1.0;
    }
    let lo = (1.0 - amount).max(0.0);
    rng.gen_range(lo..=1.0 + amount)
}

/// Sample the `(x, y, width, height)` box for a random resized crop.
///
/// Up to ten attempts are made at a box whose area is `scale` times the
/// image area and whose aspect ratio is log-uniform in `ratio`. When no
/// attempt fits, the whole image is centre-cropped to the nearest
/// allowed aspect ratio.
pub fn resized_crop_box<R: Rng + ?Sized>(
    width:  u32,
    height: u32,
    scale:  (f64, f64),
    ratio:  (f64, f64),
    rng:    &mut R,
) -> (u32, u32, u32, u32) {
    let area = (width * height) as f64;
    let (log_lo, log_hi) = (ratio.0.ln(), ratio.1.ln());

    for _ in 0..10 {
        let target_area = area * rng.gen_range(scale.0..=scale.1);
        let aspect = rng.gen_range(log_lo..=log_hi).exp();
        let w = (target_area * aspect).sqrt().round() as u32;
        let h = (target_area / aspect).sqrt().round() as u32;
        if w > 0 && h > 0 && w <= width && h <= height {
            let x = rng.gen_range(0..=width - w);
            let y = rng.gen_range(0..=height - h);
            return (x, y, w, h);
        }
    }

    let in_ratio = width as f64 / height as f64;
    let (w, h) = if in_ratio < ratio.0 {
        (width, ((width as f64 / ratio.0).round() as u32).min(height))
    } else if in_ratio > ratio.1 {
        (((height as f64 * ratio.1).round() as u32).min(width), height)
    } else {
        (width, height)
    };
    ((width - w) / 2, (height - h) / 2, w, h)
}

/// Multiply every pixel by `factor`, saturating at 255.
pub fn adjust_brightness(img: &GrayImage, factor: f64) -> GrayImage {
    map_pixels(img, |v| v * factor)
}

/// Blend every pixel toward the image mean: `f * v + (1 - f) * mean`.
pub fn adjust_contrast(img: &GrayImage, factor: f64) -> GrayImage {
    let n = (img.width() * img.height()).max(1) as f64;
    let mean = img.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
    map_pixels(img, |v| factor * v + (1.0 - factor) * mean)
}

fn map_pixels(img: &GrayImage, f: impl Fn(f64) -> f64) -> GrayImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = f(p.0[0] as f64).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Rotate by `angle` degrees about the image centre, then shift by
/// `(dx, dy)` pixels. Nearest-neighbour sampling, uncovered pixels are 0.
pub fn warp(img: &GrayImage, angle: f64, dx: f64, dy: f64) -> GrayImage {
    let (w, h) = img.dimensions();
    let cx = (w as f64 - 1.0) / 2.0;
    let cy = (h as f64 - 1.0) / 2.0;
    let (sin, cos) = angle.to_radians().sin_cos();

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let ox = x as f64 - cx - dx;
            let oy = y as f64 - cy - dy;
            let sx = (cos * ox + sin * oy + cx).round();
            let sy = (-sin * ox + cos * oy + cy).round();
            if sx >= 0.0 && sy >= 0.0 && sx < w as f64 && sy < h as f64 {
                out.put_pixel(x, y, *img.get_pixel(sx as u32, sy as u32));
            }
        }
    }
    out
}

// ─── Multi-crop ───────────────────────────────────────────────────────────────
/// How many views of an image the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropPolicy {
    /// The whole image as a single view
    Whole,
    /// Four corners and the centre
    FiveCrop(u32),
    /// Five crops of the image, then five of its mirror image
    TenCrop(u32),
}

impl CropPolicy {
    pub fn crop_count(self) -> usize {
        match self {
            CropPolicy::Whole       => 1,
            CropPolicy::FiveCrop(_) => 5,
            CropPolicy::TenCrop(_)  => 10,
        }
    }

    pub fn apply(self, img: GrayImage) -> Vec<GrayImage> {
        match self {
            CropPolicy::Whole          => vec![img],
            CropPolicy::FiveCrop(size) => five_crop(&img, size),
            CropPolicy::TenCrop(size)  => {
                let mut crops = five_crop(&img, size);
                crops.extend(five_crop(&imageops::flip_horizontal(&img), size));
                crops
            }
        }
    }
}

/// Crops in order: top-left, top-right, bottom-left, bottom-right, centre.
pub fn five_crop(img: &GrayImage, size: u32) -> Vec<GrayImage> {
    let img = if img.width() < size || img.height() < size {
        imageops::resize(img, size.max(img.width()), size.max(img.height()), FilterType::Triangle)
    } else {
        img.clone()
    };
    let (w, h) = img.dimensions();
    let cx = ((w - size) as f64 / 2.0).round() as u32;
    let cy = ((h - size) as f64 / 2.0).round() as u32;

    [(0, 0), (w - size, 0), (0, h - size), (w - size, h - size), (cx, cy)]
        .iter()
        .map(|&(x, y)| imageops::crop_imm(&img, x, y, size, size).to_image())
        .collect()
}

// ─── Tensor stage ─────────────────────────────────────────────────────────────
/// Applied after scaling pixels to `[0, 1]`: `(v - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalize {
    pub mean: f32,
    pub std:  f32,
}

impl Default for Normalize {
    fn default() -> Self {
        Self { mean: 0.0, std: 255.0 }
    }
}

/// Flatten an image to row-major floats, scaled and normalised.
pub fn to_tensor(img: &GrayImage, norm: Normalize) -> Vec<f32> {
    img.pixels()
        .map(|p: &Luma<u8>| (p.0[0] as f32 / 255.0 - norm.mean) / norm.std)
        .collect()
}

/// Erase a random rectangle of a normalised view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomErasing {
    pub p:     f64,
    pub scale: (f64, f64),
    pub ratio: (f64, f64),
    pub value: f32,
}

impl Default for RandomErasing {
    fn default() -> Self {
        Self { p: 0.5, scale: (0.02, 0.33), ratio: (0.3, 3.3), value: 0.0 }
    }
}

impl RandomErasing {
    /// `data` is a `side x side` row-major view. Returns whether a
    /// rectangle was erased.
    pub fn apply<R: Rng + ?Sized>(&self, data: &mut [f32], side: usize, rng: &mut R) -> bool {
        if rng.gen::<f64>() >= self.p {
            return false;
        }
        let area = (side * side) as f64;
        let (log_lo, log_hi) = (self.ratio.0.ln(), self.ratio.1.ln());

        for _ in 0..10 {
            let erase_area = area * rng.gen_range(self.scale.0..=self.scale.1);
            let aspect = rng.gen_range(log_lo..=log_hi).exp();
            let eh = (erase_area * aspect).sqrt().round() as usize;
            let ew = (erase_area / aspect).sqrt().round() as usize;
            if eh == 0 || ew == 0 || eh >= side || ew >= side {
                continue;
            }
            let top  = rng.gen_range(0..=side - eh);
            let left = rng.gen_range(0..=side - ew);
            for row in data[top * side..(top + eh) * side].chunks_mut(side) {
                row[left..left + ew].fill(self.value);
            }
            return true;
        }
        false
    }
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────
/// Output of the pipeline for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedImage {
    /// One `side * side` vector per view
    pub crops: Vec<Vec<f32>>,
    pub side:  usize,
}

/// The full per-item transform.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    pub ops:       Vec<ImageOp>,
    pub crop:      CropPolicy,
    pub normalize: Normalize,
    pub erasing:   Option<RandomErasing>,
}

impl TransformPipeline {
    /// Training policy. Without augmentation this is the eval policy.
    pub fn train(augment: bool, ncrop: bool, normalize: Normalize) -> Self {
        if !augment {
            return Self::eval(ncrop, normalize);
        }
        let ops = vec![
            ImageOp::RandomResizedCrop {
                size:  RESIZE_SIZE,
                scale: (0.8, 1.2),
                ratio: (3.0 / 4.0, 4.0 / 3.0),
            },
            ImageOp::random_apply(0.5, ImageOp::ColorJitter {
                brightness: 0.5,
                contrast:   0.5,
                saturation: 0.5,
            }),
            ImageOp::random_apply(0.5, ImageOp::RandomAffine { translate: (0.2, 0.2) }),
            ImageOp::RandomHorizontalFlip { p: 0.5 },
            ImageOp::random_apply(0.5, ImageOp::RandomRotation { degrees: 10.0 }),
        ];
        Self {
            ops,
            crop: if ncrop { CropPolicy::FiveCrop(CROP_SIZE) } else { CropPolicy::Whole },
            normalize,
            erasing: Some(RandomErasing::default()),
        }
    }

    /// Validation / test policy: deterministic ten-crop.
    pub fn eval(ncrop: bool, normalize: Normalize) -> Self {
        Self {
            ops:  Vec::new(),
            crop: if ncrop { CropPolicy::TenCrop(CROP_SIZE) } else { CropPolicy::Whole },
            normalize,
            erasing: None,
        }
    }

    pub fn crop_count(&self) -> usize {
        self.crop.crop_count()
    }

    pub fn apply<R: Rng + ?Sized>(&self, img: &GrayImage, rng: &mut R) -> TransformedImage {
        let mut out = img.clone();
        for op in &self.ops {
            out = op.apply(out, rng);
        }

        let views = self.crop.apply(out);
        let side = views.first().map(|v| v.width() as usize).unwrap_or(0);

        let crops = views
            .iter()
            .map(|v| {
                let mut data = to_tensor(v, self.normalize);
                if let Some(erasing) = &self.erasing {
                    erasing.apply(&mut data, side, rng);
                }
                data
            })
            .collect();

        TransformedImage { crops, side }
    }
}
