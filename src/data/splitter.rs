// ============================================================
// Layer 4 — Usage Splitter
// ============================================================
// Partitions records by their `Usage` column into the three
// sets used by the training workflow:
//
//   Training    → train      (weights are updated on this)
//   PrivateTest → validation (model selection, LR schedule)
//   PublicTest  → test       (final report only)
//
// Relative order inside each split follows the CSV.

use anyhow::Result;

use crate::data::preprocessor::{prepare_data, Split};
use crate::domain::record::{FerRecord, Usage};

/// Train / validation / test arrays
#[derive(Debug, Clone, Default)]
pub struct DataSplits {
    pub train: Split,
    pub val:   Split,
    pub test:  Split,
}

/// Partition `records` by usage and prepare image arrays for each split.
pub fn split_by_usage(records: Vec<FerRecord>) -> Result<DataSplits> {
    let mut train = Vec::new();
    let mut val   = Vec::new();
    let mut test  = Vec::new();

    for r in records {
        match r.usage {
            Usage::Training    => train.push(r),
            Usage::PrivateTest => val.push(r),
            Usage::PublicTest  => test.push(r),
        }
    }

    tracing::debug!(
        "Usage split: {} training, {} validation, {} test",
        train.len(),
        val.len(),
        test.len(),
    );

    Ok(DataSplits {
        train: prepare_data(&train)?,
        val:   prepare_data(&val)?,
        test:  prepare_data(&test)?,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::IMAGE_PIXELS;

    fn record(label: usize, usage: Usage) -> FerRecord {
        FerRecord::new(label, vec![label as u8; IMAGE_PIXELS], usage)
    }

    #[test]
    fn test_private_test_is_validation() {
        let splits = split_by_usage(vec![
            record(0, Usage::Training),
            record(1, Usage::PrivateTest),
            record(2, Usage::PublicTest),
            record(3, Usage::Training),
        ])
        .unwrap();
        assert_eq!(splits.train.labels, vec![0, 3]);
        assert_eq!(splits.val.labels,   vec![1]);
        assert_eq!(splits.test.labels,  vec![2]);
    }

    #[test]
    fn test_all_items_preserved() {
        let records: Vec<FerRecord> = (0..21)
            .map(|i| {
                let usage = match i % 3 {
                    0 => Usage::Training,
                    1 => Usage::PublicTest,
                    _ => Usage::PrivateTest,
                };
                record(i % 7, usage)
            })
            .collect();
        let splits = split_by_usage(records).unwrap();
        assert_eq!(splits.train.len() + splits.val.len() + splits.test.len(), 21);
    }

    #[test]
    fn test_empty_dataset() {
        let splits = split_by_usage(Vec::new()).unwrap();
        assert!(splits.train.is_empty());
        assert!(splits.val.is_empty());
        assert!(splits.test.is_empty());
    }
}
