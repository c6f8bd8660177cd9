//! CSV export of a normalized track.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::track::Track;
use crate::MapError;

pub const CSV_HEADER: [&str; 4] = ["timestamp", "lat", "lon", "speed_kmh"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Write `track` to `path`, replacing any existing file.
pub fn write_track_csv(track: &Track, path: &Path) -> Result<(), MapError> {
    let file = File::create(path).map_err(|e| MapError::write(path, e))?;
    let mut writer = csv::Writer::from_writer(file);
    write_track_rows(track, &mut writer).map_err(|e| MapError::write(path, e))
}

pub fn write_track_rows<W: Write>(
    track: &Track,
    writer: &mut csv::Writer<W>,
) -> Result<(), csv::Error> {
    writer.write_record(CSV_HEADER)?;
    for point in track.points() {
        writer.write_record([
            point.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            point.lat.to_string(),
            point.lon.to_string(),
            point.speed_kmh.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
