//! Replay of recorded position fixes
//!
//! A fixes file is CSV with a header row and the columns
//! `source,latitude,longitude,accuracy`, where `source` is `gps` or
//! `network`. Replaying feeds the fixes, one at a time, into the cached
//! sources the tracker reads from.

use crate::fusion::CachedPositionSource;
use crate::types::{PositionReading, SourceKind};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

#[cfg(feature = "csv")]
use crate::{Result, TrackerError};
#[cfg(feature = "csv")]
use std::path::Path;
#[cfg(feature = "csv")]
use tracing::debug;

/// Read all fixes from a CSV file
#[cfg(feature = "csv")]
pub fn read_fixes_file(path: &Path) -> Result<Vec<PositionReading>> {
    use anyhow::Context;

    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open fixes file: {:?}", path))?;
    read_fixes(file)
}

/// Read all fixes from CSV data
#[cfg(feature = "csv")]
pub fn read_fixes<R: std::io::Read>(reader: R) -> Result<Vec<PositionReading>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut fixes = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        // Row 1 is the header
        let row = index + 2;
        let record = record.map_err(|e| TrackerError::InvalidFix(format!("row {}: {}", row, e)))?;
        fixes.push(parse_fix(&record, row)?);
    }

    debug!(fixes = fixes.len(), "Loaded position fixes");
    Ok(fixes)
}

#[cfg(feature = "csv")]
fn fix_field<'a>(record: &'a csv::StringRecord, index: usize, name: &str, row: usize) -> Result<&'a str> {
    record
        .get(index)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TrackerError::InvalidFix(format!("row {}: missing {}", row, name)))
}

#[cfg(feature = "csv")]
fn fix_number(record: &csv::StringRecord, index: usize, name: &str, row: usize) -> Result<f64> {
    let raw = fix_field(record, index, name, row)?;
    raw.parse::<f64>().map_err(|_| {
        TrackerError::InvalidFix(format!("row {}: {} '{}' is not a number", row, name, raw))
    })
}

#[cfg(feature = "csv")]
fn parse_fix(record: &csv::StringRecord, row: usize) -> Result<PositionReading> {
    let label = fix_field(record, 0, "source", row)?;
    let source = SourceKind::from_label(label).ok_or_else(|| {
        TrackerError::InvalidFix(format!("row {}: unknown source '{}'", row, label))
    })?;

    Ok(PositionReading::new(
        source,
        fix_number(record, 1, "latitude", row)?,
        fix_number(record, 2, "longitude", row)?,
        fix_number(record, 3, "accuracy", row)?,
    ))
}

/// Feeds fixes into cached position sources in order
pub struct FixReplayer {
    pending: VecDeque<PositionReading>,
    sources: HashMap<SourceKind, Arc<CachedPositionSource>>,
}

impl FixReplayer {
    pub fn new(fixes: Vec<PositionReading>) -> Self {
        Self {
            pending: fixes.into(),
            sources: HashMap::new(),
        }
    }

    /// Route fixes of `source.kind()` into `source`
    pub fn with_source(mut self, source: Arc<CachedPositionSource>) -> Self {
        use crate::fusion::PositionSource;

        self.sources.insert(source.kind(), source);
        self
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deliver the next fix to its source
    ///
    /// Fixes for a kind with no registered source are dropped.
    pub fn feed_next(&mut self) -> Option<PositionReading> {
        let fix = self.pending.pop_front()?;
        match self.sources.get(&fix.source) {
            Some(source) => source.update(fix.latitude, fix.longitude, fix.accuracy),
            None => trace!(source = %fix.source, "No source registered for fix"),
        }
        Some(fix)
    }
}
