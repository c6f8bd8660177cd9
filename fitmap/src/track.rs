use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::MapError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub speed_kmh: f64,
}

/// Non-empty, time-ordered sequence of points from one activity file.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    points: Vec<PointRecord>,
}

impl Track {
    pub fn new(points: Vec<PointRecord>) -> Result<Self, MapError> {
        if points.is_empty() {
            return Err(MapError::EmptyTrack);
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn speeds(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.speed_kmh)
    }
}

/// Named tracks rendered together. Insertion order is layer order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackSet {
    entries: Vec<(String, Track)>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, track: Track) {
        self.entries.push((name.into(), track));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Track)> {
        self.entries.iter().map(|(name, track)| (name.as_str(), track))
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.entries.iter().map(|(_, track)| track)
    }

    /// The track of a one-track set.
    pub fn only(&self) -> Option<&Track> {
        match self.entries.as_slice() {
            [(_, track)] => Some(track),
            _ => None,
        }
    }
}

/// Track name derived from the source file stem (`ride.fit` -> `ride`).
pub fn track_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string())
}
