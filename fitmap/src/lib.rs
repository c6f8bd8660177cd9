//! FIT activity conversion: decode GPS records, export them as CSV and draw
//! speed-colored route maps.

use std::path::PathBuf;

use thiserror::Error;

pub mod colormap;
pub mod decode;
pub mod export;
pub mod geo;
pub mod params;
pub mod pipeline;
pub mod render;
pub mod track;

#[cfg(test)]
mod test_fit;

pub use colormap::{ColorScale, Rgb};
pub use decode::{decode_samples, read_track, scan_records, RawRecord, RawSample};
pub use export::{write_track_csv, write_track_rows};
pub use params::{parse_max_speed, Params};
pub use pipeline::{
    process, process_multiple, MapOutput, MultiOutputs, MultiSummary, SingleOutputs,
    SingleSummary, Skipped,
};
pub use render::{Basemap, RouteMap};
pub use track::{track_name, PointRecord, Track, TrackSet};

#[derive(Error, Debug)]
pub enum MapError {
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("failed to parse FIT data: {0}")]
    FitParse(String),
    #[error("no valid GPS records found")]
    EmptyTrack,
    #[error("no valid data to map")]
    NoTracks,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl MapError {
    /// True for errors that only invalidate one input file.
    pub fn is_per_track(&self) -> bool {
        matches!(
            self,
            MapError::Decode { .. } | MapError::FitParse(_) | MapError::EmptyTrack
        )
    }

    pub(crate) fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        MapError::Write {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
