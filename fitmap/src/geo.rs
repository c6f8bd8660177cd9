//! Unit conversions from raw FIT values.

use crate::decode::RawSample;
use crate::track::PointRecord;

/// Degrees per semicircle: 2^31 semicircles span 180 degrees.
pub const DEGREES_PER_SEMICIRCLE: f64 = 180.0 / 2_147_483_648.0;

pub const KMH_PER_MPS: f64 = 3.6;

pub fn semicircles_to_degrees(value: f64) -> f64 {
    value * DEGREES_PER_SEMICIRCLE
}

pub fn degrees_to_semicircles(degrees: f64) -> f64 {
    degrees / DEGREES_PER_SEMICIRCLE
}

pub fn mps_to_kmh(speed_mps: f64) -> f64 {
    speed_mps * KMH_PER_MPS
}

/// Convert a complete raw sample into a point in degrees and km/h.
pub fn normalize(sample: &RawSample) -> PointRecord {
    PointRecord {
        timestamp: sample.timestamp,
        lat: semicircles_to_degrees(sample.position_lat),
        lon: semicircles_to_degrees(sample.position_long),
        speed_kmh: mps_to_kmh(sample.speed_mps),
    }
}
