// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Dataset sources implement RecordSource, so a different source
// (e.g. a folder of PNGs) only has to produce FerRecords.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::record::FerRecord;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that can produce labelled face images.
///
/// Implementations:
///   - CsvLoader → reads the FER2013 CSV file
pub trait RecordSource {
    /// Load every valid record from this source.
    fn load_all(&self) -> Result<Vec<FerRecord>>;
}
