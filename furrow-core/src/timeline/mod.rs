//! The editable timeline.
//!
//! [`Timeline`] owns every [`Sequence`] and [`SequenceWidget`], the
//! [`InteractionContext`] (selection and pointer identities), the
//! [`Journal`] and the [`SequenceLock`] through which committed timing is
//! published to the audio thread.
//!
//! Editing happens on the GUI thread against the owned model. A drag moves a
//! widget's staged range only; the audio-visible [`TimingMap`] changes when
//! the drag ends, when widgets are added, moved between lanes or removed,
//! and on nudges. Each of those publishes whole lanes under one write lock.
//!
//! The operations are split over a few files:
//!
//! - `drag` — staging, selection-wide motion, snapping, duplication
//! - `edit` — nudges, range selection, deletion and the deferred queue
//! - `dispatch` — routing of toolkit-neutral [`Event`]s
//! - `undo` — undo/redo, snapshots and journal replay
//!
//! [`Event`]: furrow_types::Event

mod dispatch;
mod drag;
mod edit;
pub mod lock;
pub mod selection;
pub mod sequence;
pub mod tempo;
mod undo;
pub mod widget;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use furrow_types::{Frame, LogEntry, ObjectId, Range, Rect};

use crate::audio_file::AudioFileCache;
use crate::config::Config;
use crate::journal::{Journal, Loggable};
use crate::paths;

pub use lock::{Placement, SequenceLock, TimingMap, TimingReader};
pub use selection::InteractionContext;
pub use sequence::{Sequence, SequenceKind, WidgetArena};
pub use tempo::{SnapSettings, SnapTo, TempoMap, Viewport};
pub use widget::{Drag, RangeState, SequenceWidget, WidgetKind};

pub type SequenceId = ObjectId;
pub type WidgetId = ObjectId;

/// Something the rendering layer lays out and repaints. The core never draws.
pub trait Drawable {
    fn bounds(&self) -> Rect;
    fn mark_dirty(&mut self);
    fn is_dirty(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineSettings {
    pub tempo: TempoMap,
    pub snap: SnapSettings,
    pub viewport: Viewport,
    /// Horizontal nudge step as a fraction of a second.
    pub nudge_ratio: f64,
    /// Vertical nudge step for control points.
    pub control_nudge: f32,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            tempo: TempoMap::default(),
            snap: SnapSettings::default(),
            viewport: Viewport::default(),
            nudge_ratio: 0.01,
            control_nudge: 0.01,
        }
    }
}

impl TimelineSettings {
    pub fn nudge_frames(&self) -> Frame {
        (self.tempo.sample_rate as f64 * self.nudge_ratio).round() as Frame
    }
}

/// Work requested while an event is being dispatched, run once it unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredCommand {
    Delete(WidgetId),
}

pub struct Timeline {
    sequences: BTreeMap<SequenceId, Sequence>,
    widgets: WidgetArena,
    context: InteractionContext,
    journal: Journal,
    lock: SequenceLock,
    settings: TimelineSettings,
    audio_files: Arc<AudioFileCache>,
    project_dir: PathBuf,
    playhead: Frame,
    deferred_tx: Sender<DeferredCommand>,
    deferred_rx: Receiver<DeferredCommand>,
    nudging: bool,
}

impl Timeline {
    /// A timeline sharing the process-wide audio file cache.
    pub fn new(settings: TimelineSettings, journal: Journal) -> Self {
        Self::with_cache(settings, journal, AudioFileCache::shared())
    }

    pub fn with_cache(
        settings: TimelineSettings,
        journal: Journal,
        audio_files: Arc<AudioFileCache>,
    ) -> Self {
        let (deferred_tx, deferred_rx) = crossbeam_channel::unbounded();
        Self {
            sequences: BTreeMap::new(),
            widgets: WidgetArena::new(),
            context: InteractionContext::new(),
            journal,
            lock: SequenceLock::new(),
            settings,
            audio_files,
            project_dir: PathBuf::from("."),
            playhead: 0,
            deferred_tx,
            deferred_rx,
            nudging: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.settings(), Journal::new(config.undo_depth()))
    }

    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TimelineSettings {
        &mut self.settings
    }

    /// Change zoom or scroll; every lane is laid out again.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.settings.viewport = viewport;
        for s in self.sequences.values_mut() {
            s.layout(&mut self.widgets, &self.settings.viewport);
            s.mark_dirty();
        }
    }

    pub fn lock(&self) -> &SequenceLock {
        &self.lock
    }

    /// Read handle for the audio thread.
    pub fn reader(&self) -> TimingReader {
        self.lock.reader()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    pub fn context(&self) -> &InteractionContext {
        &self.context
    }

    pub fn audio_files(&self) -> &Arc<AudioFileCache> {
        &self.audio_files
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Directory relative audio source names resolve against.
    pub fn set_project_dir(&mut self, dir: impl Into<PathBuf>) {
        self.project_dir = dir.into();
    }

    pub fn playhead(&self) -> Frame {
        self.playhead
    }

    pub fn set_playhead(&mut self, frame: Frame) {
        self.playhead = frame;
    }

    pub fn sequence(&self, id: SequenceId) -> Option<&Sequence> {
        self.sequences.get(&id)
    }

    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    pub fn widget(&self, id: WidgetId) -> Option<&SequenceWidget> {
        self.widgets.get(&id)
    }

    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_selected(&self, id: WidgetId) -> bool {
        self.context.is_selected(id)
    }

    pub fn add_sequence(&mut self, name: &str, kind: SequenceKind) -> SequenceId {
        let id = self.journal.allocate_id();
        self.install_sequence(Sequence::new(id, name, kind));
        id
    }

    fn install_sequence(&mut self, seq: Sequence) {
        let id = seq.id();
        let mut e = LogEntry::new();
        seq.get(&mut e);
        self.journal.log_create(id, seq.class_name(), e);
        log::debug!(target: "sequence", "created {:?} sequence {} \"{}\"", seq.kind(), id, seq.name);
        self.sequences.insert(id, seq);
        self.lock.write().publish_lane(id, Vec::new());
    }

    pub fn set_lane_geometry(&mut self, seq: SequenceId, rect: Rect) {
        if let Some(s) = self.sequences.get_mut(&seq) {
            s.set_geometry(rect);
            s.layout(&mut self.widgets, &self.settings.viewport);
        }
    }

    pub fn add_region(&mut self, seq: SequenceId, start: Frame, length: Frame) -> Option<WidgetId> {
        let id = self.journal.allocate_id();
        self.insert_widget(seq, SequenceWidget::region(id, Range::new(start, 0, length), None))
    }

    /// A region playing `name` (resolved against the project's sources
    /// directory) from its beginning, as long as the file.
    pub fn add_audio_region(&mut self, seq: SequenceId, name: &Path, start: Frame) -> Option<WidgetId> {
        let accepts = self
            .sequences
            .get(&seq)
            .map_or(false, |s| s.kind() == SequenceKind::Audio);
        if !accepts {
            log::warn!(target: "sequence", "sequence {} cannot hold audio regions", seq);
            return None;
        }
        let path = paths::resolve_source(&self.project_dir, name);
        let file = self.audio_files.from_file(&path);
        let range = Range::new(start, 0, file.frames());
        let id = self.journal.allocate_id();
        self.insert_widget(seq, SequenceWidget::region(id, range, Some(file)))
    }

    pub fn add_control_point(&mut self, seq: SequenceId, start: Frame, control: f32) -> Option<WidgetId> {
        let id = self.journal.allocate_id();
        self.insert_widget(seq, SequenceWidget::control_point(id, start, control))
    }

    fn insert_widget(&mut self, seq: SequenceId, mut widget: SequenceWidget) -> Option<WidgetId> {
        let accepts = self
            .sequences
            .get(&seq)
            .map(|s| s.kind().accepts(widget.kind()));
        if accepts != Some(true) {
            log::warn!(
                target: "sequence",
                "cannot place {} {} in sequence {}",
                widget.class_name(),
                widget.id(),
                seq
            );
            if let Some(src) = widget.replace_source(None) {
                self.audio_files.release(src);
            }
            return None;
        }

        let id = widget.id();
        let class = widget.class_name();
        widget.set_sequence(Some(seq));
        self.widgets.insert(id, widget);
        if let Some(s) = self.sequences.get_mut(&seq) {
            s.attach(id);
        }
        if let Some(e) = self.widget_entry(id) {
            self.journal.log_create(id, class, e);
        }
        self.handle_widget_change(seq);
        Some(id)
    }

    /// Move `id` into `seq`, taking it out of its current sequence first.
    pub fn add_to(&mut self, seq: SequenceId, id: WidgetId) -> bool {
        let Some(w) = self.widgets.get(&id) else {
            return false;
        };
        let from = w.sequence();
        if from == Some(seq) {
            log::warn!(target: "sequence", "widget {} is already in sequence {}", id, seq);
            return false;
        }
        let accepts = self
            .sequences
            .get(&seq)
            .map_or(false, |s| s.kind().accepts(w.kind()));
        if !accepts {
            return false;
        }

        // a drag in progress records the move when it ends
        let logging = !self.journal.is_held(id);
        if logging {
            self.log_widget_start(id);
        }
        if let Some(s) = from.and_then(|f| self.sequences.get_mut(&f)) {
            s.detach(id);
        }
        if let Some(s) = self.sequences.get_mut(&seq) {
            s.attach(id);
        }
        if let Some(w) = self.widgets.get_mut(&id) {
            w.set_sequence(Some(seq));
        }
        if logging {
            self.log_widget_end(id);
        }

        log::debug!(target: "sequence", "moved widget {} from {:?} to {}", id, from, seq);
        self.publish_lanes(from.into_iter().chain([seq]));
        true
    }

    /// Take `id` out of `seq` without destroying it, as one undo step.
    ///
    /// The widget is left unowned and unselected until [`Timeline::add_to`]
    /// places it again; undo puts it back where it was.
    pub fn remove(&mut self, seq: SequenceId, id: WidgetId) -> bool {
        let owned = self.widgets.get(&id).and_then(|w| w.sequence()) == Some(seq);
        if !owned || !self.sequences.contains_key(&seq) {
            return false;
        }

        let logging = !self.journal.is_held(id);
        if logging {
            self.log_widget_start(id);
        }
        if let Some(s) = self.sequences.get_mut(&seq) {
            s.detach(id);
        }
        if let Some(w) = self.widgets.get_mut(&id) {
            w.set_sequence(None);
        }
        self.deselect(id);
        if logging {
            self.log_widget_end(id);
        }

        log::debug!(target: "sequence", "detached widget {} from {}", id, seq);
        self.handle_widget_change(seq);
        true
    }

    /// Destroy a widget right away. Inside event dispatch use
    /// [`Timeline::queue_delete`] instead.
    pub fn destroy_widget(&mut self, id: WidgetId) -> bool {
        let mut touched = BTreeSet::new();
        let destroyed = self.destroy_quiet(id, &mut touched);
        self.publish_lanes(touched);
        destroyed
    }

    /// Destroy without publishing; the lanes needing a publish are added to
    /// `touched`.
    fn destroy_quiet(&mut self, id: WidgetId, touched: &mut BTreeSet<SequenceId>) -> bool {
        let Some(entry) = self.widget_entry(id) else {
            return false;
        };
        let Some(mut w) = self.widgets.remove(&id) else {
            return false;
        };
        self.journal.log_destroy(id, w.class_name(), entry);
        if let Some(seq) = w.sequence() {
            if let Some(s) = self.sequences.get_mut(&seq) {
                s.detach(id);
            }
            touched.insert(seq);
        }
        self.context.forget(id);
        if let Some(src) = w.replace_source(None) {
            self.audio_files.release(src);
        }
        true
    }

    /// Re-sort, lay out and publish one lane.
    pub fn handle_widget_change(&mut self, seq: SequenceId) {
        self.publish_lanes([seq]);
    }

    /// Re-sort and lay out every lane in `seqs`, then publish them all under a
    /// single write lock.
    pub(crate) fn publish_lanes(&mut self, seqs: impl IntoIterator<Item = SequenceId>) {
        let seqs: BTreeSet<SequenceId> = seqs.into_iter().collect();
        let mut lanes = Vec::with_capacity(seqs.len());
        for seq in seqs {
            let Some(s) = self.sequences.get_mut(&seq) else {
                continue;
            };
            s.sort(&self.widgets);
            s.layout(&mut self.widgets, &self.settings.viewport);
            s.mark_dirty();
            lanes.push((seq, s.placements(&self.widgets)));
        }
        self.context.resort(&self.widgets);

        let mut map = self.lock.write();
        for (seq, placements) in lanes {
            map.publish_lane(seq, placements);
        }
    }

    /// A widget's journal entry, selection state included.
    pub fn widget_entry(&self, id: WidgetId) -> Option<LogEntry> {
        let w = self.widgets.get(&id)?;
        let mut e = LogEntry::new();
        w.get(&mut e);
        e.add_bool(":selected", self.context.is_selected(id));
        Some(e)
    }

    fn log_widget_start(&mut self, id: WidgetId) {
        if let Some(e) = self.widget_entry(id) {
            self.journal.log_start(id, e);
        }
    }

    fn log_widget_end(&mut self, id: WidgetId) {
        let Some(class) = self.widgets.get(&id).map(|w| w.class_name()) else {
            return;
        };
        if let Some(e) = self.widget_entry(id) {
            self.journal.log_end(id, class, e);
        }
    }

    pub fn select(&mut self, id: WidgetId) -> bool {
        if !self.widgets.contains_key(&id) {
            return false;
        }
        let selected = self.context.select(id, &self.widgets);
        if let Some(w) = self.widgets.get_mut(&id) {
            w.mark_dirty();
        }
        selected
    }

    pub fn deselect(&mut self, id: WidgetId) -> bool {
        let deselected = self.context.deselect(id);
        if let Some(w) = self.widgets.get_mut(&id) {
            w.mark_dirty();
        }
        deselected
    }

    /// Clear the selection as one journaled step.
    pub fn select_none(&mut self) {
        if self.context.selection_len() == 0 {
            return;
        }
        self.journal.block_start();
        for id in self.context.selection().to_vec() {
            let logging = !self.journal.is_held(id);
            if logging {
                self.log_widget_start(id);
            }
            self.deselect(id);
            if logging {
                self.log_widget_end(id);
            }
        }
        self.journal.block_end();
    }

    /// Move the playhead to the next widget start in `seq`.
    pub fn locate_next(&mut self, seq: SequenceId) -> Option<Frame> {
        let frame = self.sequences.get(&seq)?.next(&self.widgets, self.playhead)?;
        self.playhead = frame;
        Some(frame)
    }

    pub fn locate_prev(&mut self, seq: SequenceId) -> Option<Frame> {
        let frame = self.sequences.get(&seq)?.prev(&self.widgets, self.playhead)?;
        self.playhead = frame;
        Some(frame)
    }

    /// Lanes that need repainting since the last call.
    pub fn take_damage(&mut self) -> Vec<SequenceId> {
        let mut damaged = Vec::new();
        for (id, s) in self.sequences.iter_mut() {
            let mut dirty = s.is_dirty();
            for w in s.widgets() {
                if let Some(w) = self.widgets.get_mut(w) {
                    dirty |= w.is_dirty();
                    w.clear_dirty();
                }
            }
            s.clear_dirty();
            if dirty {
                damaged.push(*id);
            }
        }
        damaged
    }
}

impl Drop for Timeline {
    fn drop(&mut self) {
        for s in self.sequences.values_mut() {
            s.detach_all();
        }
        for (_, mut w) in self.widgets.drain() {
            if let Some(src) = w.replace_source(None) {
                self.audio_files.release(src);
            }
        }
    }
}
