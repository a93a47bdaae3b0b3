use serde::Deserialize;

use crate::paths;
use crate::timeline::{SnapSettings, SnapTo, TempoMap, TimelineSettings, Viewport};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    timeline: TimelineConfig,
    #[serde(default)]
    journal: JournalConfig,
}

#[derive(Deserialize, Default)]
struct TimelineConfig {
    sample_rate: Option<u32>,
    bpm: Option<f64>,
    beats_per_bar: Option<u32>,
    snap_to: Option<String>,
    snap_magnetic: Option<bool>,
    snap_pixels: Option<u32>,
    frames_per_pixel: Option<f64>,
    nudge_ratio: Option<f64>,
    control_nudge: Option<f32>,
}

#[derive(Deserialize, Default)]
struct JournalConfig {
    undo_depth: Option<usize>,
}

pub struct Config {
    timeline: TimelineConfig,
    journal: JournalConfig,
}

impl Config {
    /// Embedded defaults merged with `~/.config/furrow/config.toml` when present.
    pub fn load() -> Self {
        let mut config = Self::embedded();

        if let Some(path) = paths::user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => config.merge_str(&contents, &path.display().to_string()),
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        config
    }

    /// Only the built-in defaults.
    pub fn embedded() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            timeline: base.timeline,
            journal: base.journal,
        }
    }

    /// Overlay user settings from TOML text. Malformed input is logged and ignored.
    pub fn merge_str(&mut self, contents: &str, origin: &str) {
        match toml::from_str::<ConfigFile>(contents) {
            Ok(user) => {
                merge_timeline(&mut self.timeline, user.timeline);
                merge_journal(&mut self.journal, user.journal);
            }
            Err(e) => {
                log::warn!(target: "config", "ignoring malformed config {}: {}", origin, e)
            }
        }
    }

    pub fn settings(&self) -> TimelineSettings {
        let fallback = TimelineSettings::default();
        let t = &self.timeline;
        let sample_rate = t.sample_rate.unwrap_or(fallback.tempo.sample_rate).max(1);

        TimelineSettings {
            tempo: TempoMap {
                sample_rate,
                bpm: t
                    .bpm
                    .filter(|b| *b > 0.0)
                    .unwrap_or(fallback.tempo.bpm),
                beats_per_bar: t
                    .beats_per_bar
                    .filter(|b| *b > 0)
                    .unwrap_or(fallback.tempo.beats_per_bar),
            },
            snap: SnapSettings {
                snap_to: t
                    .snap_to
                    .as_deref()
                    .and_then(parse_snap_to)
                    .unwrap_or(fallback.snap.snap_to),
                magnetic: t.snap_magnetic.unwrap_or(fallback.snap.magnetic),
                pixels: t.snap_pixels.unwrap_or(fallback.snap.pixels),
            },
            viewport: Viewport {
                frames_per_pixel: t
                    .frames_per_pixel
                    .filter(|f| *f > 0.0)
                    .unwrap_or(fallback.viewport.frames_per_pixel),
                xoffset: 0,
            },
            nudge_ratio: t
                .nudge_ratio
                .map(|r| r.clamp(0.0, 1.0))
                .unwrap_or(fallback.nudge_ratio),
            control_nudge: t
                .control_nudge
                .map(|c| c.clamp(0.0, 1.0))
                .unwrap_or(fallback.control_nudge),
        }
    }

    /// Maximum number of undo steps kept (clamped to 1..100000).
    pub fn undo_depth(&self) -> usize {
        self.journal.undo_depth.unwrap_or(500).clamp(1, 100_000)
    }
}

fn merge_timeline(base: &mut TimelineConfig, user: TimelineConfig) {
    if user.sample_rate.is_some() {
        base.sample_rate = user.sample_rate;
    }
    if user.bpm.is_some() {
        base.bpm = user.bpm;
    }
    if user.beats_per_bar.is_some() {
        base.beats_per_bar = user.beats_per_bar;
    }
    if user.snap_to.is_some() {
        base.snap_to = user.snap_to;
    }
    if user.snap_magnetic.is_some() {
        base.snap_magnetic = user.snap_magnetic;
    }
    if user.snap_pixels.is_some() {
        base.snap_pixels = user.snap_pixels;
    }
    if user.frames_per_pixel.is_some() {
        base.frames_per_pixel = user.frames_per_pixel;
    }
    if user.nudge_ratio.is_some() {
        base.nudge_ratio = user.nudge_ratio;
    }
    if user.control_nudge.is_some() {
        base.control_nudge = user.control_nudge;
    }
}

fn merge_journal(base: &mut JournalConfig, user: JournalConfig) {
    if user.undo_depth.is_some() {
        base.undo_depth = user.undo_depth;
    }
}

fn parse_snap_to(s: &str) -> Option<SnapTo> {
    match s.to_lowercase().as_str() {
        "bars" | "bar" => Some(SnapTo::Bars),
        "beats" | "beat" => Some(SnapTo::Beats),
        "none" | "off" => Some(SnapTo::None),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_embedded_config() {
        let config = Config::embedded();
        let settings = config.settings();
        assert_eq!(settings.tempo.sample_rate, 48000);
        assert!((settings.tempo.bpm - 120.0).abs() < f64::EPSILON);
        assert_eq!(settings.tempo.beats_per_bar, 4);
        assert_eq!(settings.snap.snap_to, SnapTo::Bars);
        assert!(settings.snap.magnetic);
        assert_eq!(settings.snap.pixels, 10);
        assert!((settings.viewport.frames_per_pixel - 256.0).abs() < f64::EPSILON);
        assert_eq!(config.undo_depth(), 500);
    }

    #[test]
    fn test_user_override_merges() {
        let mut config = Config::embedded();
        config.merge_str(
            "[timeline]\nbpm = 90.0\nsnap_to = \"beats\"\n\n[journal]\nundo_depth = 20\n",
            "test",
        );
        let settings = config.settings();
        assert!((settings.tempo.bpm - 90.0).abs() < f64::EPSILON);
        assert_eq!(settings.snap.snap_to, SnapTo::Beats);
        // untouched keys keep the embedded value
        assert_eq!(settings.tempo.sample_rate, 48000);
        assert_eq!(config.undo_depth(), 20);
    }

    #[test]
    fn test_malformed_override_is_ignored() {
        let mut config = Config::embedded();
        config.merge_str("[timeline\nbpm = ", "test");
        assert!((config.settings().tempo.bpm - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_snap_to() {
        assert_eq!(parse_snap_to("Bars"), Some(SnapTo::Bars));
        assert_eq!(parse_snap_to("BEAT"), Some(SnapTo::Beats));
        assert_eq!(parse_snap_to("off"), Some(SnapTo::None));
        assert_eq!(parse_snap_to("grid"), None);
    }
}
