//! # furrow-types
//!
//! Plain data shared by the furrow timeline core and the layers around it:
//! frame positions and timing ranges, journal entries, lane geometry,
//! toolkit-neutral input events and waveform peaks.
//!
//! Nothing in here knows about locking or journaling; see `furrow-core`.

mod event;
mod geometry;
mod log_entry;
mod range;

pub use event::{Button, Event, Key, Modifiers};
pub use geometry::Rect;
pub use log_entry::LogEntry;
pub use range::{Frame, Range};

use serde::{Deserialize, Serialize};

/// Journal identity shared by sequences and the widgets placed in them.
///
/// Ids are rendered as `0x`-prefixed hexadecimal inside journal entries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Parse the hex form written by `Display`. The `0x` prefix is optional.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u32::from_str_radix(digits, 16).ok().map(Self)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// One min/max pair of a waveform column for a single channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub min: f32,
    pub max: f32,
}

impl Peak {
    /// Widen this peak to include `sample`.
    pub fn accumulate(&mut self, sample: f32) {
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_hex_roundtrip() {
        let id = ObjectId::new(0x2A);
        assert_eq!(id.to_string(), "0x2A");
        assert_eq!(ObjectId::from_hex("0x2A"), Some(id));
        assert_eq!(ObjectId::from_hex("2a"), Some(id));
        assert_eq!(ObjectId::from_hex("zz"), None);
    }

    #[test]
    fn peak_accumulates_extremes() {
        let mut p = Peak::default();
        for s in [0.25, -0.5, 0.75, 0.1] {
            p.accumulate(s);
        }
        assert_eq!(p.min, -0.5);
        assert_eq!(p.max, 0.75);
    }
}
