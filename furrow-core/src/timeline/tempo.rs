//! Musical grid, snapping preferences and the horizontal viewport.

use serde::{Deserialize, Serialize};

use furrow_types::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapTo {
    Bars,
    Beats,
    /// No snapping at all, magnetic included.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapSettings {
    pub snap_to: SnapTo,
    /// Snap to neighbouring widget edges before falling back to the grid.
    pub magnetic: bool,
    /// Magnetic tolerance in pixels.
    pub pixels: u32,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            snap_to: SnapTo::Bars,
            magnetic: true,
            pixels: 10,
        }
    }
}

/// Constant-tempo grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    pub sample_rate: u32,
    pub bpm: f64,
    pub beats_per_bar: u32,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            bpm: 120.0,
            beats_per_bar: 4,
        }
    }
}

impl TempoMap {
    pub fn frames_per_beat(&self) -> f64 {
        self.sample_rate as f64 * 60.0 / self.bpm
    }

    pub fn frames_per_bar(&self) -> f64 {
        self.frames_per_beat() * self.beats_per_bar as f64
    }

    /// Closest bar or beat line to `frame`. `None` when snapping is off.
    pub fn nearest_line(&self, frame: Frame, snap_to: SnapTo) -> Option<Frame> {
        let step = match snap_to {
            SnapTo::Bars => self.frames_per_bar(),
            SnapTo::Beats => self.frames_per_beat(),
            SnapTo::None => return None,
        };
        if !(step.is_finite() && step >= 1.0) {
            return None;
        }
        let line = (frame as f64 / step).round() * step;
        Some(line.round() as Frame)
    }
}

/// Maps lane pixels to frames and back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub frames_per_pixel: f64,
    /// Frame shown at the left edge of every lane.
    pub xoffset: Frame,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            frames_per_pixel: 256.0,
            xoffset: 0,
        }
    }
}

impl Viewport {
    /// Width in pixels to a duration in frames. Negative widths are zero.
    pub fn x_to_ts(&self, x: i32) -> Frame {
        (x.max(0) as f64 * self.frames_per_pixel).round() as Frame
    }

    /// Duration in frames to a width in pixels.
    pub fn ts_to_x(&self, ts: Frame) -> i32 {
        (ts as f64 / self.frames_per_pixel).round() as i32
    }

    /// Absolute frame under pixel `x` of a lane starting at `lane_x`.
    pub fn frame_at(&self, x: i32, lane_x: i32) -> Frame {
        self.xoffset.saturating_add(self.x_to_ts(x - lane_x))
    }

    /// Pixel column of `frame` in a lane starting at `lane_x`.
    pub fn x_of(&self, frame: Frame, lane_x: i32) -> i32 {
        let px = (frame as f64 - self.xoffset as f64) / self.frames_per_pixel;
        lane_x + px.round() as i32
    }
}
