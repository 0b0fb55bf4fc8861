//! Result recording
//!
//! Sinks that append one record per tick result to a file. Ticks without a
//! result are not recorded.

#[cfg(any(feature = "csv", feature = "json"))]
use crate::tracker::ResultSink;
#[cfg(any(feature = "csv", feature = "json"))]
use crate::types::TrackingResult;
#[cfg(any(feature = "csv", feature = "json"))]
use crate::Result;
#[cfg(any(feature = "csv", feature = "json"))]
use std::fs::File;
#[cfg(any(feature = "csv", feature = "json"))]
use std::path::Path;
#[cfg(any(feature = "csv", feature = "json"))]
use std::sync::{Mutex, PoisonError};
#[cfg(any(feature = "csv", feature = "json"))]
use tracing::warn;

/// Column names written by [`CsvResultSink`]
pub const CSV_HEADER: [&str; 7] = [
    "tick",
    "waypoint_index",
    "distance_m",
    "bearing_deg",
    "latitude",
    "longitude",
    "route_name",
];

/// Create `path`'s parent directory if needed and open the file for writing
#[cfg(any(feature = "csv", feature = "json"))]
fn create_output_file(path: &Path) -> Result<File> {
    use anyhow::Context;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    Ok(file)
}

/// Writes tick results as CSV rows
#[cfg(feature = "csv")]
pub struct CsvResultSink {
    writer: Mutex<csv::Writer<File>>,
}

#[cfg(feature = "csv")]
impl CsvResultSink {
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(create_output_file(path)?);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    fn write(&self, result: &TrackingResult) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_record([
            result.tick.to_string(),
            result.waypoint_index.to_string(),
            format!("{:.3}", result.distance_m),
            format!("{:.3}", result.bearing_deg),
            format!("{:.7}", result.position.latitude),
            format!("{:.7}", result.position.longitude),
            result.route_name.clone().unwrap_or_default(),
        ])?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(feature = "csv")]
impl ResultSink for CsvResultSink {
    fn publish(&self, result: Option<&TrackingResult>) {
        if let Some(result) = result {
            if let Err(e) = self.write(result) {
                warn!(error = %e, tick = result.tick, "Failed to record result as CSV");
            }
        }
    }
}

/// Writes tick results as one JSON object per line
#[cfg(feature = "json")]
pub struct JsonLinesSink {
    file: Mutex<File>,
}

#[cfg(feature = "json")]
impl JsonLinesSink {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            file: Mutex::new(create_output_file(path)?),
        })
    }

    fn write(&self, result: &TrackingResult) -> Result<()> {
        use std::io::Write;

        let line = serde_json::to_string(result)?;
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

#[cfg(feature = "json")]
impl ResultSink for JsonLinesSink {
    fn publish(&self, result: Option<&TrackingResult>) {
        if let Some(result) = result {
            if let Err(e) = self.write(result) {
                warn!(error = %e, tick = result.tick, "Failed to record result as JSON");
            }
        }
    }
}
