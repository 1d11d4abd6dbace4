//! # Grid Snapshot Store
//!
//! An assembled area grid is expensive to rebuild: one request per parameter
//! batch, with multi-second pauses in between. The last successful fetch is
//! therefore persisted as gzip-compressed JSON together with the request that
//! produced it.
//!
//! ## Cache Strategy
//!
//! - **Format**: JSON, gzip-compressed (`*.json.gz`)
//! - **Validity**: by file modification time against a caller-supplied TTL
//! - **Failure handling**: a missing, stale or corrupt snapshot is an error the
//!   caller answers by fetching again

use crate::grid::AssembledGrid;
use crate::GridPoint;
use chrono::{DateTime, Utc};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot IO: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot is {age_secs}s old, limit is {ttl_secs}s")]
    Stale { age_secs: u64, ttl_secs: u64 },
}

/// Describes the request a snapshot was built from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub collection: String,
    /// Parameters that made it into the grid, failed batches excluded
    pub parameters: Vec<String>,
    pub bbox: String,
    pub fetched_at: DateTime<Utc>,
    pub format: String,
    pub timestamps: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub metadata: SnapshotMetadata,
    pub points: Vec<GridPoint>,
}

impl GridSnapshot {
    pub fn from_grid(
        grid: AssembledGrid,
        collection: &str,
        parameters: Vec<String>,
        bbox: &str,
        format: &str,
    ) -> Self {
        Self {
            metadata: SnapshotMetadata {
                collection: collection.to_string(),
                parameters,
                bbox: bbox.to_string(),
                fetched_at: Utc::now(),
                format: format.to_string(),
                timestamps: grid.timestamps,
            },
            points: grid.points,
        }
    }

    pub fn into_grid(self) -> AssembledGrid {
        AssembledGrid {
            timestamps: self.metadata.timestamps,
            points: self.points,
        }
    }
}

/// Write `snapshot` to `path` as gzip-compressed JSON.
pub fn save_snapshot<P: AsRef<Path>>(path: P, snapshot: &GridSnapshot) -> Result<(), SnapshotError> {
    let file = File::create(&path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, snapshot)?;
    encoder.finish()?.flush()?;

    log::info!(
        "Saved {} points to {}",
        snapshot.points.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Load a snapshot written by [`save_snapshot`] if it is younger than `ttl`.
pub fn load_snapshot<P: AsRef<Path>>(path: P, ttl: Duration) -> Result<GridSnapshot, SnapshotError> {
    let meta = fs::metadata(&path)?;

    // mtime in the future counts as fresh
    let age = SystemTime::now()
        .duration_since(meta.modified()?)
        .unwrap_or(Duration::ZERO);

    if age >= ttl {
        return Err(SnapshotError::Stale {
            age_secs: age.as_secs(),
            ttl_secs: ttl.as_secs(),
        });
    }

    let decoder = GzDecoder::new(BufReader::new(File::open(&path)?));
    Ok(serde_json::from_reader(decoder)?)
}
