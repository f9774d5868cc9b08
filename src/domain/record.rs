// ============================================================
// Layer 3 — FER Record Domain Type
// ============================================================
// One row of the FER2013 CSV after parsing:
//   - the emotion label
//   - a 48x48 grid of 8-bit grayscale pixels (row-major)
//   - the `Usage` column that assigns the row to a split
//
// The split assignment used throughout training:
//   Training    → train set
//   PrivateTest → validation set
//   PublicTest  → test set

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Side length of every FER2013 image.
pub const IMAGE_SIDE: usize = 48;

/// Number of pixels in one image.
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;

/// The value of the `Usage` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Usage {
    Training,
    PublicTest,
    PrivateTest,
}

impl FromStr for Usage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Training"    => Ok(Usage::Training),
            "PublicTest"  => Ok(Usage::PublicTest),
            "PrivateTest" => Ok(Usage::PrivateTest),
            other         => Err(format!("unknown usage '{other}'")),
        }
    }
}

/// A parsed, validated dataset row.
#[derive(Debug, Clone)]
pub struct FerRecord {
    /// Class label in `0..NUM_CLASSES`
    pub label: usize,

    /// Row-major pixel intensities, exactly `IMAGE_PIXELS` long
    pub pixels: Vec<u8>,

    pub usage: Usage,
}

impl FerRecord {
    pub fn new(label: usize, pixels: Vec<u8>, usage: Usage) -> Self {
        Self { label, pixels, usage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_parses_known_values() {
        assert_eq!("Training".parse::<Usage>(), Ok(Usage::Training));
        assert_eq!(" PrivateTest ".parse::<Usage>(), Ok(Usage::PrivateTest));
        assert_eq!("PublicTest".parse::<Usage>(), Ok(Usage::PublicTest));
    }

    #[test]
    fn test_usage_rejects_unknown() {
        assert!("Validation".parse::<Usage>().is_err());
    }
}
