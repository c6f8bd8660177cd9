//! Single- and multi-track runs: decode, export CSV, render maps.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::colormap::ColorScale;
use crate::decode::read_track;
use crate::export::write_track_csv;
use crate::params::Params;
use crate::render::{Basemap, RouteMap};
use crate::track::{track_name, TrackSet};
use crate::MapError;

/// One HTML document and the base layers it offers (first one active).
#[derive(Clone, Debug, PartialEq)]
pub struct MapOutput {
    pub path: PathBuf,
    pub basemaps: Vec<Basemap>,
}

impl MapOutput {
    pub fn street(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            basemaps: vec![Basemap::street()],
        }
    }

    pub fn satellite(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            basemaps: vec![Basemap::satellite()],
        }
    }

    /// Street and satellite layers in one document.
    pub fn combined(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            basemaps: vec![Basemap::street(), Basemap::satellite()],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SingleOutputs {
    pub csv: PathBuf,
    pub maps: Vec<MapOutput>,
}

impl SingleOutputs {
    /// `<out_dir>/<stem>/<stem>_data.csv` plus street and satellite maps
    /// next to it.
    pub fn for_input(out_dir: &Path, input: &Path) -> Self {
        let stem = track_name(input);
        let dir = out_dir.join(&stem);
        Self {
            csv: dir.join(format!("{}_data.csv", stem)),
            maps: vec![
                MapOutput::street(dir.join(format!("{}_street.html", stem))),
                MapOutput::satellite(dir.join(format!("{}_satellite.html", stem))),
            ],
        }
    }
}

#[derive(Clone, Debug)]
pub struct SingleSummary {
    pub points: usize,
    pub segments: usize,
    pub scale: ColorScale,
    pub csv: PathBuf,
    pub maps: Vec<PathBuf>,
}

/// Decode one file and write its CSV and maps. An empty track is fatal.
pub fn process(
    input: &Path,
    outputs: &SingleOutputs,
    params: &Params,
) -> Result<SingleSummary, MapError> {
    params.validate()?;
    let track = read_track(input)?;
    debug!("{}: {} valid points", input.display(), track.len());

    write_track_csv(&track, &outputs.csv)?;
    info!("CSV written to {}", outputs.csv.display());

    let scale = ColorScale::for_track(&track, params.max_speed);
    let mut written = Vec::with_capacity(outputs.maps.len());
    for output in &outputs.maps {
        RouteMap::single(&track, params, &output.basemaps).save(&output.path)?;
        info!("Map written to {}", output.path.display());
        written.push(output.path.clone());
    }
    debug!("color scale {:.2}..{:.2} km/h", scale.min, scale.max);

    Ok(SingleSummary {
        points: track.len(),
        segments: track.len() - 1,
        scale,
        csv: outputs.csv.clone(),
        maps: written,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct MultiOutputs {
    /// Directory receiving one `<name>_data.csv` per track.
    pub csv_dir: PathBuf,
    pub maps: Vec<MapOutput>,
}

impl MultiOutputs {
    pub fn csv_path(&self, name: &str) -> PathBuf {
        self.csv_dir.join(format!("{}_data.csv", name))
    }
}

#[derive(Clone, Debug)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct MultiSummary {
    /// Track names and point counts, in input order.
    pub tracks: Vec<(String, usize)>,
    pub skipped: Vec<Skipped>,
    pub scale: ColorScale,
    pub maps: Vec<PathBuf>,
}

/// Decode every input, skipping unreadable or empty files, then draw the
/// surviving tracks together. Fails only when nothing survives or a write
/// fails.
pub fn process_multiple(
    inputs: &[PathBuf],
    outputs: &MultiOutputs,
    params: &Params,
) -> Result<MultiSummary, MapError> {
    params.validate()?;

    let mut set = TrackSet::new();
    let mut tracks = Vec::new();
    let mut skipped = Vec::new();
    let mut used_names = HashSet::new();

    for input in inputs {
        let track = match read_track(input) {
            Ok(track) => track,
            Err(err) if err.is_per_track() => {
                warn!("Skipping {}: {}", input.display(), err);
                skipped.push(Skipped {
                    path: input.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
            Err(err) => return Err(err),
        };

        let name = unique_name(track_name(input), &mut used_names);
        let csv_path = outputs.csv_path(&name);
        write_track_csv(&track, &csv_path)?;
        info!("CSV written to {}", csv_path.display());
        tracks.push((name.clone(), track.len()));
        set.push(name, track);
    }

    if set.is_empty() {
        return Err(MapError::NoTracks);
    }

    let scale = ColorScale::for_track_set(&set, params.max_speed);
    let mut written = Vec::with_capacity(outputs.maps.len());
    for output in &outputs.maps {
        let map = RouteMap::multi(&set, params, &output.basemaps)?;
        map.save(&output.path)?;
        info!("Map written to {} ({} tracks)", output.path.display(), set.len());
        written.push(output.path.clone());
    }

    Ok(MultiSummary {
        tracks,
        skipped,
        scale,
        maps: written,
    })
}

/// `ride`, `ride_2`, `ride_3`, ... so layers and CSV files never collide.
fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fit::{FitBuilder, TestRecord};
    use std::fs;

    fn kmh(v: f64) -> f64 {
        v / 3.6
    }

    fn write_fit(dir: &Path, name: &str, builder: FitBuilder) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, builder.build()).unwrap();
        path
    }

    fn three_point_ride() -> FitBuilder {
        FitBuilder::new()
            .record(TestRecord::full(0, 0.0, 0.0, kmh(10.0)))
            .record(TestRecord::full(1, 0.001, 0.001, kmh(20.0)))
            .record(TestRecord::full(2, 0.002, 0.002, kmh(30.0)))
    }

    fn polylines(path: &Path) -> usize {
        fs::read_to_string(path)
            .unwrap()
            .matches("L.polyline(")
            .count()
    }

    #[test]
    fn test_single_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fit(dir.path(), "ride.fit", three_point_ride());
        let outputs = SingleOutputs {
            csv: dir.path().join("ride_data.csv"),
            maps: vec![
                MapOutput::street(dir.path().join("street.html")),
                MapOutput::satellite(dir.path().join("sat.html")),
            ],
        };

        let summary = process(&input, &outputs, &Params::default()).unwrap();
        assert_eq!(summary.points, 3);
        assert_eq!(summary.segments, 2);
        assert!((summary.scale.min - 10.0).abs() < 0.01);
        assert!((summary.scale.max - 30.0).abs() < 0.01);

        let csv = fs::read_to_string(&outputs.csv).unwrap();
        assert_eq!(csv.lines().count(), 4);
        assert_eq!(csv.lines().next(), Some("timestamp,lat,lon,speed_kmh"));
        assert!(csv.lines().nth(1).unwrap().starts_with("2021-09-08T01:46:40,0,0,"));

        assert_eq!(polylines(&outputs.maps[0].path), 2);
        assert_eq!(polylines(&outputs.maps[1].path), 2);
        let sat = fs::read_to_string(&outputs.maps[1].path).unwrap();
        assert!(sat.contains("World_Imagery"));
    }

    #[test]
    fn test_single_empty_track_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fit(
            dir.path(),
            "trainer.fit",
            FitBuilder::new().record(TestRecord::without_position(0, 4.0)),
        );
        let outputs = SingleOutputs::for_input(dir.path(), &input);
        let err = process(&input, &outputs, &Params::default()).unwrap_err();
        assert!(matches!(err, MapError::EmptyTrack));
        assert!(!outputs.csv.exists());
    }

    #[test]
    fn test_invalid_params_rejected_before_decode() {
        let params = Params {
            max_speed: 0.0,
            ..Params::default()
        };
        let outputs = SingleOutputs::for_input(Path::new("/out"), Path::new("/missing.fit"));
        let err = process(Path::new("/missing.fit"), &outputs, &params).unwrap_err();
        assert!(matches!(err, MapError::InvalidParameter(_)));
    }

    #[test]
    fn test_output_layout() {
        let outputs = SingleOutputs::for_input(Path::new("/out"), Path::new("/data/ride.fit"));
        assert_eq!(outputs.csv, Path::new("/out/ride/ride_data.csv"));
        assert_eq!(outputs.maps[0].path, Path::new("/out/ride/ride_street.html"));
        assert_eq!(outputs.maps[1].path, Path::new("/out/ride/ride_satellite.html"));
        assert_eq!(outputs.maps[1].basemaps, vec![Basemap::satellite()]);
    }

    #[test]
    fn test_multi_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let good_a = write_fit(dir.path(), "a.fit", three_point_ride());
        let garbage = dir.path().join("broken.fit");
        fs::write(&garbage, b"not a fit file at all").unwrap();
        let empty = write_fit(
            dir.path(),
            "indoor.fit",
            FitBuilder::new().record(TestRecord::without_speed(0, 1.0, 1.0)),
        );
        let good_b = write_fit(
            dir.path(),
            "b.fit",
            FitBuilder::new()
                .record(TestRecord::full(0, 0.01, 0.01, kmh(40.0)))
                .record(TestRecord::full(1, 0.011, 0.011, kmh(50.0))),
        );
        let missing = dir.path().join("missing.fit");

        let outputs = MultiOutputs {
            csv_dir: dir.path().to_path_buf(),
            maps: vec![MapOutput::combined(dir.path().join("all.html"))],
        };
        let inputs = vec![good_a, garbage, empty, good_b, missing];
        let summary = process_multiple(&inputs, &outputs, &Params::default()).unwrap();

        let names: Vec<&str> = summary.tracks.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(summary.skipped.len(), 3);
        assert!(dir.path().join("a_data.csv").exists());
        assert!(dir.path().join("b_data.csv").exists());
        assert!(!dir.path().join("indoor_data.csv").exists());
        assert!((summary.scale.max - 50.0).abs() < 0.01);

        let html = fs::read_to_string(dir.path().join("all.html")).unwrap();
        // two outlined segments for a, one for b
        assert_eq!(html.matches("L.polyline(").count(), 6);
        assert!(html.contains("overlays[\"a\"]"));
        assert!(html.contains("overlays[\"b\"]"));
        assert!(html.contains("Esri World Imagery"));
        assert!(html.find("overlays[\"a\"]") < html.find("overlays[\"b\"]"));
    }

    #[test]
    fn test_multi_all_empty_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("broken.fit");
        fs::write(&garbage, b"nope").unwrap();
        let outputs = MultiOutputs {
            csv_dir: dir.path().to_path_buf(),
            maps: vec![MapOutput::street(dir.path().join("all.html"))],
        };
        let err = process_multiple(&[garbage], &outputs, &Params::default()).unwrap_err();
        assert!(matches!(err, MapError::NoTracks));
        assert!(!dir.path().join("all.html").exists());
    }

    #[test]
    fn test_multi_single_survivor_matches_single_render() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fit(dir.path(), "ride.fit", three_point_ride());
        let multi = MultiOutputs {
            csv_dir: dir.path().to_path_buf(),
            maps: vec![MapOutput::street(dir.path().join("multi.html"))],
        };
        process_multiple(&[input.clone()], &multi, &Params::default()).unwrap();
        let single = SingleOutputs {
            csv: dir.path().join("single.csv"),
            maps: vec![MapOutput::street(dir.path().join("single.html"))],
        };
        process(&input, &single, &Params::default()).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("multi.html")).unwrap(),
            fs::read_to_string(dir.path().join("single.html")).unwrap()
        );
    }

    #[test]
    fn test_duplicate_stems_get_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("other");
        fs::create_dir(&sub).unwrap();
        let first = write_fit(dir.path(), "ride.fit", three_point_ride());
        let second = write_fit(&sub, "ride.fit", three_point_ride());
        let outputs = MultiOutputs {
            csv_dir: dir.path().to_path_buf(),
            maps: Vec::new(),
        };
        let summary = process_multiple(&[first, second], &outputs, &Params::default()).unwrap();
        let names: Vec<&str> = summary.tracks.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ride", "ride_2"]);
        assert!(dir.path().join("ride_2_data.csv").exists());
    }
}
