//! Linear blue-to-red speed scale and its legend.

use std::fmt;

use crate::track::{Track, TrackSet};

pub const LEGEND_CAPTION: &str = "Speed (km/h)";
const LEGEND_TICKS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const RED: Rgb = Rgb(255, 0, 0);

    fn lerp(self, other: Rgb, frac: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
        Rgb(
            mix(self.0, other.0),
            mix(self.1, other.1),
            mix(self.2, other.2),
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    /// Bounds come from speeds within `[0, max_speed]` only; an empty
    /// selection falls back to `(0, max_speed)`.
    pub fn from_speeds<I>(speeds: I, max_speed: f64) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut bounds: Option<(f64, f64)> = None;
        for speed in speeds {
            if !(0.0..=max_speed).contains(&speed) {
                continue;
            }
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(speed), hi.max(speed)),
                None => (speed, speed),
            });
        }
        let (min, max) = bounds.unwrap_or((0.0, max_speed));
        Self { min, max }
    }

    pub fn for_track(track: &Track, max_speed: f64) -> Self {
        Self::from_speeds(track.speeds(), max_speed)
    }

    pub fn for_track_set(set: &TrackSet, max_speed: f64) -> Self {
        Self::from_speeds(set.tracks().flat_map(Track::speeds), max_speed)
    }

    /// Color for `speed`, clamped to the end stops.
    pub fn color(&self, speed: f64) -> Rgb {
        let span = self.max - self.min;
        if span <= 0.0 || speed.is_nan() {
            return Rgb::BLUE;
        }
        let frac = ((speed - self.min) / span).clamp(0.0, 1.0);
        Rgb::BLUE.lerp(Rgb::RED, frac)
    }

    pub fn ticks(&self) -> Vec<f64> {
        if self.max <= self.min {
            return vec![self.min];
        }
        let step = (self.max - self.min) / (LEGEND_TICKS - 1) as f64;
        (0..LEGEND_TICKS)
            .map(|i| self.min + step * i as f64)
            .collect()
    }

    /// Horizontal gradient bar with tick labels and caption.
    pub fn legend_svg(&self) -> String {
        const WIDTH: f64 = 400.0;
        const PAD: f64 = 20.0;
        let bar = WIDTH - 2.0 * PAD;
        let span = self.max - self.min;

        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg width=\"{w}\" height=\"50\" xmlns=\"http://www.w3.org/2000/svg\">\
             <defs><linearGradient id=\"speed-gradient\" x1=\"0%\" x2=\"100%\">\
             <stop offset=\"0%\" stop-color=\"{lo}\"/>\
             <stop offset=\"100%\" stop-color=\"{hi}\"/>\
             </linearGradient></defs>\
             <rect x=\"{pad}\" y=\"4\" width=\"{bar}\" height=\"10\" fill=\"url(#speed-gradient)\"/>",
            w = WIDTH,
            lo = Rgb::BLUE,
            hi = Rgb::RED,
            pad = PAD,
            bar = bar,
        ));
        for tick in self.ticks() {
            let frac = if span > 0.0 {
                (tick - self.min) / span
            } else {
                0.0
            };
            let x = PAD + bar * frac;
            svg.push_str(&format!(
                "<line x1=\"{x:.1}\" x2=\"{x:.1}\" y1=\"14\" y2=\"19\" stroke=\"black\"/>\
                 <text x=\"{x:.1}\" y=\"30\" text-anchor=\"middle\" font-size=\"11\">{label}</text>",
                x = x,
                label = tick_label(tick),
            ));
        }
        svg.push_str(&format!(
            "<text x=\"{pad}\" y=\"46\" font-size=\"12\">{caption}</text></svg>",
            pad = PAD,
            caption = LEGEND_CAPTION,
        ));
        svg
    }
}

fn tick_label(value: f64) -> String {
    let text = format!("{:.1}", value);
    text.strip_suffix(".0").map(str::to_string).unwrap_or(text)
}
