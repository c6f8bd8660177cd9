//! FIT record decoding.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use fitparser::profile::MesgNum;
use fitparser::Value as FitValue;
use serde::{Deserialize, Serialize};

use crate::geo::normalize;
use crate::track::Track;
use crate::MapError;

/// One FIT `record` message with the fields this crate cares about.
/// Latitude and longitude stay in semicircles, speed in m/s.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub position_lat: Option<f64>,
    pub position_long: Option<f64>,
    pub speed_mps: Option<f64>,
}

/// A record with every required field present.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSample {
    pub timestamp: DateTime<Utc>,
    pub position_lat: f64,
    pub position_long: f64,
    pub speed_mps: f64,
}

impl RawRecord {
    pub fn resolve(&self) -> Option<RawSample> {
        Some(RawSample {
            timestamp: self.timestamp?,
            position_lat: self.position_lat?,
            position_long: self.position_long?,
            speed_mps: self.speed_mps?,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.resolve().is_some()
    }
}

/// Parse FIT bytes into `record` messages, in file order.
pub fn scan_records(input: &[u8]) -> Result<Vec<RawRecord>, MapError> {
    let messages =
        fitparser::de::from_bytes(input).map_err(|e| MapError::FitParse(e.to_string()))?;
    let mut out = Vec::new();

    for message in messages.into_iter() {
        if message.kind() != MesgNum::Record {
            continue;
        }
        let mut row = RawRecord::default();
        let mut enhanced_speed: Option<f64> = None;
        for field in message.fields() {
            match field.name() {
                "timestamp" => {
                    if let FitValue::Timestamp(ts) = field.value() {
                        row.timestamp = Some(ts.with_timezone(&Utc));
                    }
                }
                "position_lat" => row.position_lat = fit_value_to_f64(field.value()),
                "position_long" => row.position_long = fit_value_to_f64(field.value()),
                "speed" => row.speed_mps = fit_value_to_f64(field.value()),
                "enhanced_speed" => enhanced_speed = fit_value_to_f64(field.value()),
                _ => {}
            }
        }
        row.speed_mps = pick_speed(row.speed_mps, enhanced_speed);
        out.push(row);
    }

    Ok(out)
}

/// Complete samples only; records missing a field are skipped without error.
pub fn decode_samples(input: &[u8]) -> Result<Vec<RawSample>, MapError> {
    Ok(scan_records(input)?
        .iter()
        .filter_map(RawRecord::resolve)
        .collect())
}

/// Read, decode and normalize one activity file.
pub fn read_track(path: &Path) -> Result<Track, MapError> {
    let data = fs::read(path).map_err(|e| MapError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let samples = decode_samples(&data).map_err(|e| match e {
        MapError::FitParse(reason) => MapError::Decode {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })?;
    Track::new(samples.iter().map(normalize).collect())
}

// `speed` when present, else `enhanced_speed`.
fn pick_speed(speed: Option<f64>, enhanced_speed: Option<f64>) -> Option<f64> {
    speed.or(enhanced_speed)
}

fn fit_value_to_f64(value: &FitValue) -> Option<f64> {
    match value {
        FitValue::Float32(v) => Some(*v as f64),
        FitValue::Float64(v) => Some(*v),
        FitValue::SInt8(v) => Some(*v as f64),
        FitValue::SInt16(v) => Some(*v as f64),
        FitValue::SInt32(v) => Some(*v as f64),
        FitValue::SInt64(v) => Some(*v as f64),
        FitValue::UInt8(v) => Some(*v as f64),
        FitValue::UInt16(v) => Some(*v as f64),
        FitValue::UInt32(v) => Some(*v as f64),
        FitValue::UInt64(v) => Some(*v as f64),
        FitValue::Array(values) => values.iter().find_map(fit_value_to_f64),
        _ => None,
    }
}
