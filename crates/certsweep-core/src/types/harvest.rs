//! Result of one collection pass.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::CertificateRecord;
use crate::error::SweepError;

/// An item the collector found but could not turn into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Item identity within the source (path, endpoint, ARN, secret name)
    pub item: String,
    /// Why it was skipped
    pub reason: String,
}

/// Records gathered from one source, plus the items that were skipped.
///
/// A failure on one item never aborts the pass; it lands in `skipped`
/// and is logged at `warn`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Harvest {
    /// Collector that produced the harvest
    pub source: String,
    records: Vec<CertificateRecord>,
    skipped: Vec<SkippedItem>,
}

impl Harvest {
    /// Empty harvest for `source`
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Add a record
    pub fn push(&mut self, record: CertificateRecord) {
        self.records.push(record);
    }

    /// Record an item as skipped
    pub fn skip(&mut self, item: impl Into<String>, reason: impl ToString) {
        let item = item.into();
        let reason = reason.to_string();
        warn!(collector = %self.source, item = %item, error = %reason, "skipping item");
        self.skipped.push(SkippedItem { item, reason });
    }

    /// Fold one item result in, skipping it on error
    pub fn absorb(&mut self, item: impl Into<String>, result: Result<CertificateRecord, SweepError>) {
        match result {
            Ok(record) => self.push(record),
            Err(e) => self.skip(item, e),
        }
    }

    /// Fold a multi-record item in (a keystore); an error skips the whole item
    pub fn absorb_many(
        &mut self,
        item: impl Into<String>,
        result: Result<Vec<CertificateRecord>, SweepError>,
    ) {
        match result {
            Ok(records) => self.records.extend(records),
            Err(e) => self.skip(item, e),
        }
    }

    /// Merge another harvest into this one
    pub fn extend(&mut self, other: Self) {
        self.records.extend(other.records);
        self.skipped.extend(other.skipped);
    }

    /// Keep only the records matching `keep`
    pub fn retain(&mut self, keep: impl FnMut(&CertificateRecord) -> bool) {
        self.records.retain(keep);
    }

    /// Records collected so far
    #[must_use]
    pub fn records(&self) -> &[CertificateRecord] {
        &self.records
    }

    /// Items that were skipped
    #[must_use]
    pub fn skipped(&self) -> &[SkippedItem] {
        &self.skipped
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no records were collected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume into the record list
    #[must_use]
    pub fn into_records(self) -> Vec<CertificateRecord> {
        self.records
    }
}

impl IntoIterator for Harvest {
    type Item = CertificateRecord;
    type IntoIter = std::vec::IntoIter<CertificateRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
