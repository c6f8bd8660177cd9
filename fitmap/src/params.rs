use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::MapError;

pub const DEFAULT_MAX_SPEED_KMH: f64 = 100.0;
pub const DEFAULT_ZOOM: u8 = 13;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Upper bound of the speeds used to size the color scale (km/h).
    /// Faster points are still drawn, clamped to the top color.
    pub max_speed: f64,
    pub zoom_start: u8,
    /// Inject a "toggle all" checkbox into multi-track layer controls.
    pub toggle_all: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED_KMH,
            zoom_start: DEFAULT_ZOOM,
            toggle_all: true,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), MapError> {
        if !self.max_speed.is_finite() || self.max_speed <= 0.0 {
            return Err(MapError::InvalidParameter(format!(
                "max speed must be a positive number, got {}",
                self.max_speed
            )));
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self, MapError> {
        let text = fs::read_to_string(path).map_err(|e| {
            MapError::InvalidParameter(format!("failed to read {}: {}", path.display(), e))
        })?;
        let params: Params = serde_json::from_str(&text).map_err(|e| {
            MapError::InvalidParameter(format!("{} is not valid JSON: {}", path.display(), e))
        })?;
        params.validate()?;
        Ok(params)
    }
}

/// Parse a user-entered speed ceiling.
pub fn parse_max_speed(input: &str) -> Result<f64, MapError> {
    let value: f64 = input.trim().parse().map_err(|_| {
        MapError::InvalidParameter(format!("max speed '{}' is not a number", input.trim()))
    })?;
    Params {
        max_speed: value,
        ..Params::default()
    }
    .validate()?;
    Ok(value)
}
