//! # furrow-core
//!
//! Editing core for the Furrow multi-track timeline. Provides lanes of
//! regions and control points, pointer and keyboard editing, a journal with
//! undo/redo and replay, and the shared audio source cache. Independent of
//! any UI toolkit: events come in as [`furrow_types::Event`], repaint
//! requests go out through [`timeline::Timeline::take_damage`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use furrow_core::config::Config;
//! use furrow_core::timeline::{SequenceKind, Timeline};
//! use furrow_types::{Event, Rect};
//!
//! // 1. Timeline with settings from config (embedded + user override)
//! let config = Config::load();
//! let mut timeline = Timeline::from_config(&config);
//!
//! // 2. Lanes and their screen geometry
//! let drums = timeline.add_sequence("drums", SequenceKind::Audio);
//! timeline.set_lane_geometry(drums, Rect::new(0, 0, 1200, 60));
//! timeline.add_audio_region(drums, "kick.wav".as_ref(), 0);
//!
//! // 3. The audio thread keeps a reader; it only ever sees committed edits
//! let reader = timeline.reader();
//!
//! // 4. Feed toolkit events, then repaint whatever lanes changed
//! timeline.handle(drums, &event);
//! for lane in timeline.take_damage() { /* redraw lane */ }
//!
//! // 5. Undo/redo whole gestures
//! timeline.undo();
//! ```
//!
//! ## Module Overview
//!
//! - [`timeline`] — `Timeline`, `Sequence`, `SequenceWidget`, selection,
//!   drag/snap/nudge editing, event dispatch, and the `SequenceLock` that
//!   publishes committed timing to the audio thread
//! - [`journal`] — `Loggable`, transactions, undo history, the append-only
//!   journal file and replay
//! - [`audio_file`] — `AudioFileCache` (reference-counted, shared per path)
//!   and peak computation for waveform display
//! - [`config`] — TOML configuration loading (embedded defaults + user override)
//! - [`paths`] — project source and user file locations

pub mod audio_file;
pub mod config;
pub mod journal;
pub mod paths;
pub mod timeline;
