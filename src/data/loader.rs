// ============================================================
// Layer 4 — FER2013 CSV Loader
// ============================================================
// Reads the FER2013 CSV file with the csv crate.
//
// File layout (header row required, extra columns ignored):
//
//   emotion,pixels,Usage
//   0,"70 80 82 72 ... 2304 values",Training
//   2,"151 150 147 ...",PublicTest
//
// Each `pixels` cell is a space-separated list of exactly
// 48 * 48 = 2304 intensities in 0..=255, row-major.
//
// Validation per row:
//   - label must be a known emotion (0..7)       → error
//   - pixel count / value must be valid          → error
//   - unknown Usage value                        → row skipped, counted
//
// Errors name the 1-based data row so a corrupt file can be
// fixed by hand.
//
// Reference: csv crate documentation (serde deserialisation)
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::emotion::{Emotion, NUM_CLASSES};
use crate::domain::record::{FerRecord, Usage, IMAGE_PIXELS};
use crate::domain::traits::RecordSource;

/// Raw CSV row before validation
#[derive(Debug, Deserialize)]
struct CsvRow {
    emotion: usize,
    pixels:  String,
    #[serde(rename = "Usage")]
    usage:   String,
}

/// Loads FER2013 records from a CSV file.
/// Implements the RecordSource trait from Layer 3.
pub struct CsvLoader {
    path: PathBuf,
}

impl CsvLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl RecordSource for CsvLoader {
    fn load_all(&self) -> Result<Vec<FerRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open dataset '{}'", self.path.display()))?;

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row_no = i + 1;
            let row = row.with_context(|| format!("Malformed CSV at data row {row_no}"))?;

            let usage = match row.usage.parse::<Usage>() {
                Ok(u)  => u,
                Err(e) => {
                    tracing::debug!("Skipping data row {}: {}", row_no, e);
                    skipped += 1;
                    continue;
                }
            };

            if row.emotion >= NUM_CLASSES {
                bail!("Data row {row_no}: label {} is not in 0..{NUM_CLASSES}", row.emotion);
            }

            let pixels = parse_pixels(&row.pixels)
                .with_context(|| format!("Data row {row_no}: invalid pixel data"))?;

            records.push(FerRecord::new(row.emotion, pixels, usage));
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} rows with an unknown Usage value", skipped);
        }
        tracing::info!(
            "Loaded {} records from '{}'",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

/// Parse one `pixels` cell into exactly `IMAGE_PIXELS` bytes.
pub fn parse_pixels(cell: &str) -> Result<Vec<u8>> {
    let pixels = cell
        .split_whitespace()
        .map(|tok| {
            tok.parse::<u8>()
                .with_context(|| format!("'{tok}' is not a pixel value in 0..=255"))
        })
        .collect::<Result<Vec<u8>>>()?;

    if pixels.len() != IMAGE_PIXELS {
        bail!("expected {IMAGE_PIXELS} pixels, found {}", pixels.len());
    }
    Ok(pixels)
}

/// Load the dataset together with the label → emotion name table.
pub fn load_data(path: impl AsRef<Path>) -> Result<(Vec<FerRecord>, Vec<(usize, &'static str)>)> {
    let records = CsvLoader::new(path).load_all()?;
    Ok((records, Emotion::mapping()))
}
