#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use furrow_core::audio_file::AudioFileCache;
use furrow_core::journal::Journal;
use furrow_core::timeline::{SequenceId, SequenceKind, SnapTo, Timeline, TimelineSettings};
use furrow_types::{Button, Event, Modifiers, Rect};

pub const LANE_HEIGHT: i32 = 50;

/// One pixel per frame and no snapping, so pointer x equals frame.
pub fn settings() -> TimelineSettings {
    let mut s = TimelineSettings::default();
    s.viewport.frames_per_pixel = 1.0;
    s.snap.snap_to = SnapTo::None;
    s
}

pub fn timeline() -> Timeline {
    Timeline::with_cache(settings(), Journal::new(100), Arc::new(AudioFileCache::new()))
}

pub fn lane(tl: &mut Timeline, kind: SequenceKind, y: i32) -> SequenceId {
    let seq = tl.add_sequence("lane", kind);
    tl.set_lane_geometry(seq, Rect::new(0, y, 100_000, LANE_HEIGHT));
    seq
}

pub fn push(x: i32, y: i32) -> Event {
    Event::Push {
        x,
        y,
        button: Button::Left,
        modifiers: Modifiers::NONE,
    }
}

pub fn push_with(x: i32, y: i32, button: Button, modifiers: Modifiers) -> Event {
    Event::Push {
        x,
        y,
        button,
        modifiers,
    }
}

pub fn drag(x: i32, y: i32) -> Event {
    drag_with(x, y, Modifiers::NONE)
}

pub fn drag_with(x: i32, y: i32, modifiers: Modifiers) -> Event {
    Event::Drag {
        x,
        y,
        button: Button::Left,
        modifiers,
    }
}

pub fn release(x: i32, y: i32) -> Event {
    Event::Release { x, y }
}

/// Mono 16-bit WAV of `frames` samples ramping up from zero.
pub fn write_wav(path: &Path, frames: usize) {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).unwrap();
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        w.write_sample((i % 32768) as i16).unwrap();
    }
    w.finalize().unwrap();
}
