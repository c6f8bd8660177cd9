//! Leaflet route maps with speed-colored segments.
//!
//! A [`RouteMap`] is assembled in a fixed order: center, base tile layers,
//! legend, then one layer per track. Each consecutive pair of points becomes
//! its own polyline colored by the speed at the segment's first point, so the
//! last point of a track never sets a segment color.
//!
//! The map center is the plain mean of all latitudes and longitudes. That is
//! fine at city scale but drifts near the poles and across the antimeridian.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::colormap::{ColorScale, Rgb};
use crate::params::Params;
use crate::track::{Track, TrackSet};
use crate::MapError;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

/// Outline colors for multi-track maps, picked by `track_index % len`.
pub const OUTLINE_PALETTE: [&str; 5] = ["white", "yellow", "lime", "magenta", "cyan"];

const SINGLE_WEIGHT: u32 = 6;
const SINGLE_OPACITY: f64 = 0.8;
const OUTLINE_WEIGHT: u32 = 8;
const INNER_WEIGHT: u32 = 6;
const MULTI_OPACITY: f64 = 1.0;

const PAGE_STYLE: &str = r#"
html, body { width: 100%; height: 100%; margin: 0; padding: 0; }
#map { position: absolute; top: 0; bottom: 0; left: 0; right: 0; }
.legend { background: rgba(255, 255, 255, 0.8); padding: 6px 8px; border-radius: 4px; }
.legend svg text {
    stroke: white !important;
    stroke-width: 2px !important;
    paint-order: stroke fill !important;
}
.speed-tooltip {
    color: black;
    text-shadow: -1px -1px 0 white, 1px -1px 0 white, -1px 1px 0 white, 1px 1px 0 white;
}
.toggle-all { font-weight: bold; padding: 6px 8px; }
"#;

// Lives in its own control: the layers control rebuilds its overlay list on
// every layer add/remove, which would drop anything inserted into it.
const TOGGLE_ALL_SCRIPT: &str = r#"
var toggleAll = L.control({ position: "topright" });
toggleAll.onAdd = function () {
    var div = L.DomUtil.create("div", "leaflet-control-layers leaflet-control toggle-all");
    var label = L.DomUtil.create("label", "", div);
    var box = L.DomUtil.create("input", "", label);
    box.type = "checkbox";
    box.checked = true;
    label.appendChild(document.createTextNode(" Toggle all"));
    L.DomEvent.disableClickPropagation(div);
    L.DomEvent.on(box, "change", function () {
        Object.keys(overlays).forEach(function (name) {
            if (box.checked) { map.addLayer(overlays[name]); } else { map.removeLayer(overlays[name]); }
        });
    });
    return div;
};
toggleAll.addTo(map);
"#;

#[derive(Clone, Debug, PartialEq)]
pub struct Basemap {
    pub name: String,
    pub url: String,
    pub attribution: String,
}

impl Basemap {
    pub fn street() -> Self {
        Self {
            name: "OpenStreetMap".to_string(),
            url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors"
                .to_string(),
        }
    }

    pub fn satellite() -> Self {
        Self {
            name: "Esri World Imagery".to_string(),
            url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
                .to_string(),
            attribution: "Tiles &copy; Esri".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub speed_kmh: f64,
    pub color: Rgb,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackLayer {
    /// `None` for the single-track map, where segments sit directly on the map.
    pub name: Option<String>,
    pub outline: Option<&'static str>,
    pub segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteMap {
    pub center: (f64, f64),
    pub zoom: u8,
    pub basemaps: Vec<Basemap>,
    pub scale: ColorScale,
    pub layers: Vec<TrackLayer>,
    pub toggle_all: bool,
}

impl RouteMap {
    pub fn single(track: &Track, params: &Params, basemaps: &[Basemap]) -> Self {
        let scale = ColorScale::for_track(track, params.max_speed);
        Self {
            center: mean_center(std::iter::once(track)),
            zoom: params.zoom_start,
            basemaps: basemaps_or_default(basemaps),
            scale,
            layers: vec![TrackLayer {
                name: None,
                outline: None,
                segments: segments(track, &scale),
            }],
            toggle_all: false,
        }
    }

    /// Shared scale and center across every track. A set with one track
    /// yields exactly the single-track map.
    pub fn multi(set: &TrackSet, params: &Params, basemaps: &[Basemap]) -> Result<Self, MapError> {
        if set.is_empty() {
            return Err(MapError::NoTracks);
        }
        if let Some(track) = set.only() {
            return Ok(Self::single(track, params, basemaps));
        }

        let scale = ColorScale::for_track_set(set, params.max_speed);
        let layers = set
            .iter()
            .enumerate()
            .map(|(idx, (name, track))| TrackLayer {
                name: Some(name.to_string()),
                outline: Some(OUTLINE_PALETTE[idx % OUTLINE_PALETTE.len()]),
                segments: segments(track, &scale),
            })
            .collect();

        Ok(Self {
            center: mean_center(set.tracks()),
            zoom: params.zoom_start,
            basemaps: basemaps_or_default(basemaps),
            scale,
            layers,
            toggle_all: params.toggle_all,
        })
    }

    pub fn segment_count(&self) -> usize {
        self.layers.iter().map(|l| l.segments.len()).sum()
    }

    pub fn to_html(&self) -> String {
        let title = self
            .basemaps
            .first()
            .map(|b| format!("Speed map ({})", b.name))
            .unwrap_or_else(|| "Speed map".to_string());

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n");
        html.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\"/>\n",
        );
        html.push_str(&format!("<title>{}</title>\n", escape_html(&title)));
        html.push_str(&format!("<link rel=\"stylesheet\" href=\"{}\"/>\n", LEAFLET_CSS));
        html.push_str(&format!("<script src=\"{}\"></script>\n", LEAFLET_JS));
        html.push_str(&format!("<style>{}</style>\n", PAGE_STYLE));
        html.push_str("</head>\n<body>\n<div id=\"map\"></div>\n<script>\n");
        html.push_str(&self.script());
        html.push_str("</script>\n</body>\n</html>\n");
        html
    }

    /// Write the document to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), MapError> {
        fs::write(path, self.to_html()).map_err(|e| MapError::write(path, e))
    }

    fn script(&self) -> String {
        let mut js = String::new();
        js.push_str(&format!(
            "var map = L.map(\"map\", {});\n",
            json!({ "center": [self.center.0, self.center.1], "zoom": self.zoom })
        ));

        js.push_str("var baseLayers = {};\n");
        for (idx, basemap) in self.basemaps.iter().enumerate() {
            js.push_str(&format!(
                "var tile_{idx} = L.tileLayer({url}, {opts});\n",
                idx = idx,
                url = js_string(&basemap.url),
                opts = js_value(&json!({ "attribution": basemap.attribution, "maxZoom": 19 })),
            ));
            if idx == 0 {
                js.push_str(&format!("tile_{}.addTo(map);\n", idx));
            }
            js.push_str(&format!(
                "baseLayers[{}] = tile_{};\n",
                js_string(&basemap.name),
                idx
            ));
        }

        js.push_str("var legend = L.control({ position: \"topright\" });\n");
        js.push_str(&format!(
            "legend.onAdd = function () {{ var div = L.DomUtil.create(\"div\", \"legend\"); div.innerHTML = {}; return div; }};\n",
            js_string(&self.scale.legend_svg())
        ));
        js.push_str("legend.addTo(map);\n");

        js.push_str("var overlays = {};\n");
        for (idx, layer) in self.layers.iter().enumerate() {
            match (&layer.name, layer.outline) {
                (Some(name), outline) => {
                    let group = format!("group_{}", idx);
                    js.push_str(&format!("var {} = L.featureGroup();\n", group));
                    if let Some(outline) = outline {
                        for segment in &layer.segments {
                            push_polyline(
                                &mut js,
                                segment,
                                json!({ "color": outline, "weight": OUTLINE_WEIGHT, "opacity": MULTI_OPACITY }),
                                false,
                                &group,
                            );
                        }
                    }
                    for segment in &layer.segments {
                        push_polyline(
                            &mut js,
                            segment,
                            json!({
                                "color": segment.color.to_string(),
                                "weight": INNER_WEIGHT,
                                "opacity": MULTI_OPACITY,
                            }),
                            true,
                            &group,
                        );
                    }
                    js.push_str(&format!("{}.addTo(map);\n", group));
                    js.push_str(&format!("overlays[{}] = {};\n", js_string(name), group));
                }
                (None, _) => {
                    for segment in &layer.segments {
                        push_polyline(
                            &mut js,
                            segment,
                            json!({
                                "color": segment.color.to_string(),
                                "weight": SINGLE_WEIGHT,
                                "opacity": SINGLE_OPACITY,
                            }),
                            true,
                            "map",
                        );
                    }
                }
            }
        }

        js.push_str("var layerControl = L.control.layers(baseLayers, overlays).addTo(map);\n");
        if self.toggle_all && self.layers.iter().any(|l| l.name.is_some()) {
            js.push_str(TOGGLE_ALL_SCRIPT);
        }
        js
    }
}

fn push_polyline(
    js: &mut String,
    segment: &Segment,
    options: serde_json::Value,
    tooltip: bool,
    target: &str,
) {
    js.push_str(&format!(
        "L.polyline([[{}, {}], [{}, {}]], {})",
        segment.from.0, segment.from.1, segment.to.0, segment.to.1, options
    ));
    if tooltip {
        js.push_str(&format!(
            ".bindTooltip({}, {{ className: \"speed-tooltip\", sticky: true }})",
            js_string(&format!("{:.1} km/h", segment.speed_kmh))
        ));
    }
    js.push_str(&format!(".addTo({});\n", target));
}

fn segments(track: &Track, scale: &ColorScale) -> Vec<Segment> {
    track
        .points()
        .windows(2)
        .map(|pair| Segment {
            from: (pair[0].lat, pair[0].lon),
            to: (pair[1].lat, pair[1].lon),
            speed_kmh: pair[0].speed_kmh,
            color: scale.color(pair[0].speed_kmh),
        })
        .collect()
}

fn mean_center<'a>(tracks: impl Iterator<Item = &'a Track>) -> (f64, f64) {
    let (mut lat, mut lon, mut count) = (0.0, 0.0, 0usize);
    for point in tracks.flat_map(Track::points) {
        lat += point.lat;
        lon += point.lon;
        count += 1;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    (lat / count as f64, lon / count as f64)
}

fn basemaps_or_default(basemaps: &[Basemap]) -> Vec<Basemap> {
    if basemaps.is_empty() {
        vec![Basemap::street()]
    } else {
        basemaps.to_vec()
    }
}

/// JSON literal that cannot terminate the surrounding script element.
fn js_value(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn js_string(value: &str) -> String {
    js_value(&serde_json::Value::String(value.to_string()))
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
