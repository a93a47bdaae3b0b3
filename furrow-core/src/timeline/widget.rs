//! Placed objects: audio regions and automation control points.

use std::sync::Arc;

use furrow_types::{Frame, LogEntry, Range, Rect};

use super::lock::Placement;
use super::tempo::Viewport;
use super::{Drawable, SequenceId, WidgetId};
use crate::audio_file::AudioFile;
use crate::journal::Loggable;

/// Side of the square drawn for a control point.
pub const CONTROL_POINT_SIZE: i32 = 8;

/// Loudest gain a region may be given.
pub const MAX_SCALE: f32 = 10.0;

/// Which range reads and drag motion go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeState {
    Committed,
    /// A drag is in progress; the committed range stays untouched (and
    /// published) until the drag ends.
    Staged(Range),
}

/// Pointer state captured when a drag starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drag {
    pub x: i32,
    pub y: i32,
    /// Distance in frames from the widget start to the grab point.
    pub offset: Frame,
    /// The duplicate-on-drag latch has fired for this drag.
    pub duplicated: bool,
}

#[derive(Debug)]
pub enum WidgetKind {
    Region {
        source: Option<Arc<AudioFile>>,
        /// Playback gain, 1.0 is unity.
        scale: f32,
    },
    ControlPoint { control: f32 },
}

impl WidgetKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            WidgetKind::Region { .. } => "Region",
            WidgetKind::ControlPoint { .. } => "ControlPoint",
        }
    }
}

#[derive(Debug)]
pub struct SequenceWidget {
    id: WidgetId,
    sequence: Option<SequenceId>,
    range: Range,
    state: RangeState,
    drag: Option<Drag>,
    kind: WidgetKind,
    pub box_color: u32,
    pub color: u32,
    pub label: Option<String>,
    bounds: Rect,
    dirty: bool,
}

impl SequenceWidget {
    fn new(id: WidgetId, range: Range, kind: WidgetKind) -> Self {
        Self {
            id,
            sequence: None,
            range,
            state: RangeState::Committed,
            drag: None,
            kind,
            box_color: 0x7a7a7aff,
            color: 0xffffffff,
            label: None,
            bounds: Rect::default(),
            dirty: true,
        }
    }

    pub fn region(id: WidgetId, range: Range, source: Option<Arc<AudioFile>>) -> Self {
        let mut w = Self::new(id, range, WidgetKind::Region { source, scale: 1.0 });
        w.box_color = 0x4f6d8fff;
        w
    }

    pub fn control_point(id: WidgetId, start: Frame, control: f32) -> Self {
        let mut w = Self::new(
            id,
            Range::at(start),
            WidgetKind::ControlPoint {
                control: control.clamp(0.0, 1.0),
            },
        );
        w.box_color = 0xd4a13aff;
        w
    }

    /// A copy under a new identity, outside any sequence. The caller supplies
    /// the source handle so it can be accounted for in the cache.
    pub fn duplicate(&self, id: WidgetId, source: Option<Arc<AudioFile>>) -> Self {
        let kind = match &self.kind {
            WidgetKind::Region { scale, .. } => WidgetKind::Region {
                source,
                scale: *scale,
            },
            WidgetKind::ControlPoint { control } => WidgetKind::ControlPoint { control: *control },
        };
        let mut w = Self::new(id, self.range, kind);
        w.box_color = self.box_color;
        w.color = self.color;
        w.label = self.label.clone();
        w
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn sequence(&self) -> Option<SequenceId> {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, seq: Option<SequenceId>) {
        self.sequence = seq;
    }

    pub fn kind(&self) -> &WidgetKind {
        &self.kind
    }

    pub fn is_control_point(&self) -> bool {
        matches!(self.kind, WidgetKind::ControlPoint { .. })
    }

    /// The range everyone should see right now: staged while dragging.
    pub fn range(&self) -> Range {
        match self.state {
            RangeState::Committed => self.range,
            RangeState::Staged(r) => r,
        }
    }

    /// The range last published to the audio thread.
    pub fn committed(&self) -> Range {
        self.range
    }

    pub fn state(&self) -> RangeState {
        self.state
    }

    pub fn is_staged(&self) -> bool {
        matches!(self.state, RangeState::Staged(_))
    }

    pub fn start(&self) -> Frame {
        self.range().start
    }

    pub fn length(&self) -> Frame {
        self.range().length
    }

    pub fn end(&self) -> Frame {
        self.range().end()
    }

    pub fn offset(&self) -> Frame {
        self.range().offset
    }

    fn active_range(&mut self) -> &mut Range {
        match &mut self.state {
            RangeState::Committed => &mut self.range,
            RangeState::Staged(r) => r,
        }
    }

    /// Move the active range, staged or committed, without any selection logic.
    pub(crate) fn set_start_raw(&mut self, start: Frame) {
        self.active_range().start = start;
        self.dirty = true;
    }

    pub(crate) fn set_offset_raw(&mut self, offset: Frame) {
        self.active_range().offset = offset;
        self.dirty = true;
    }

    /// Start staging from `base`. No-op when already staged.
    pub(crate) fn stage(&mut self, base: Range) {
        if !self.is_staged() {
            self.state = RangeState::Staged(base);
        }
    }

    /// Promote the staged range. Returns whether anything was staged.
    pub(crate) fn commit(&mut self) -> bool {
        self.drag = None;
        match self.state {
            RangeState::Staged(r) => {
                self.range = r;
                self.state = RangeState::Committed;
                self.dirty = true;
                true
            }
            RangeState::Committed => false,
        }
    }

    pub fn drag(&self) -> Option<Drag> {
        self.drag
    }

    pub(crate) fn set_drag(&mut self, drag: Option<Drag>) {
        self.drag = drag;
    }

    pub fn control(&self) -> Option<f32> {
        match self.kind {
            WidgetKind::ControlPoint { control } => Some(control),
            WidgetKind::Region { .. } => None,
        }
    }

    /// Set the automation value, clamped to `[0, 1]`. Regions ignore it.
    pub fn set_control(&mut self, value: f32) {
        if let WidgetKind::ControlPoint { control } = &mut self.kind {
            *control = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
            self.dirty = true;
        }
    }

    pub fn scale(&self) -> Option<f32> {
        match self.kind {
            WidgetKind::Region { scale, .. } => Some(scale),
            WidgetKind::ControlPoint { .. } => None,
        }
    }

    /// Set a region's gain, clamped to `[0, MAX_SCALE]`. Control points ignore it.
    pub fn set_scale(&mut self, value: f32) {
        if let WidgetKind::Region { scale, .. } = &mut self.kind {
            *scale = if value.is_nan() { 1.0 } else { value.clamp(0.0, MAX_SCALE) };
            self.dirty = true;
        }
    }

    pub fn source(&self) -> Option<&Arc<AudioFile>> {
        match &self.kind {
            WidgetKind::Region { source, .. } => source.as_ref(),
            WidgetKind::ControlPoint { .. } => None,
        }
    }

    /// Swap the source handle, returning the previous one for release.
    pub(crate) fn replace_source(
        &mut self,
        new: Option<Arc<AudioFile>>,
    ) -> Option<Arc<AudioFile>> {
        match &mut self.kind {
            WidgetKind::Region { source, .. } => std::mem::replace(source, new),
            WidgetKind::ControlPoint { .. } => new,
        }
    }

    pub(crate) fn placement(&self) -> Placement {
        Placement {
            id: self.id,
            range: self.range,
            control: self.control(),
            scale: self.scale(),
            source: self.source().cloned(),
        }
    }

    /// Recompute the screen box inside `lane`.
    pub(crate) fn layout(&mut self, lane: Rect, viewport: &Viewport) {
        let x = viewport.x_of(self.start(), lane.x);
        self.bounds = match self.kind {
            WidgetKind::Region { .. } => Rect::new(
                x,
                lane.y,
                viewport.ts_to_x(self.length()).max(1),
                lane.h,
            ),
            WidgetKind::ControlPoint { control } => {
                let cy = lane.y + ((1.0 - control) * lane.h as f32).round() as i32;
                let half = CONTROL_POINT_SIZE / 2;
                Rect::new(x - half, cy - half, CONTROL_POINT_SIZE, CONTROL_POINT_SIZE)
            }
        };
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

impl Drawable for SequenceWidget {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Loggable for SequenceWidget {
    fn id(&self) -> WidgetId {
        self.id
    }

    fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    fn get(&self, e: &mut LogEntry) {
        e.add(":start", self.range.start);
        e.add_id(":sequence", self.sequence);
        match &self.kind {
            WidgetKind::Region { source, scale } => {
                e.add(":offset", self.range.offset);
                e.add(":length", self.range.length);
                e.add(":scale", scale);
                if let Some(file) = source {
                    e.add(":source", file.path().display());
                }
            }
            WidgetKind::ControlPoint { control } => {
                e.add(":y", control);
            }
        }
    }

    /// Applies timing and value fields. Sequence, selection and source
    /// references need the timeline to resolve and are handled there.
    fn set(&mut self, e: &LogEntry) {
        if let Some(start) = e.parse(":start") {
            self.range.start = start;
        }
        match self.kind {
            WidgetKind::Region { .. } => {
                if let Some(offset) = e.parse(":offset") {
                    self.range.offset = offset;
                }
                if let Some(length) = e.parse(":length") {
                    self.range.length = length;
                }
                if let Some(scale) = e.parse::<f32>(":scale") {
                    self.set_scale(scale);
                }
            }
            WidgetKind::ControlPoint { .. } => {
                if let Some(y) = e.parse::<f32>(":y") {
                    self.set_control(y);
                }
            }
        }
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_types::ObjectId;

    #[test]
    fn staged_range_shadows_committed() {
        let mut w = SequenceWidget::region(ObjectId::new(1), Range::new(100, 0, 50), None);
        w.stage(w.committed());
        w.set_start_raw(400);
        assert_eq!(w.start(), 400);
        assert_eq!(w.committed().start, 100);
        assert_eq!(w.placement().range.start, 100);
        assert!(w.commit());
        assert_eq!(w.committed().start, 400);
        assert!(!w.commit());
    }

    #[test]
    fn control_is_clamped() {
        let mut w = SequenceWidget::control_point(ObjectId::new(2), 0, 3.0);
        assert_eq!(w.control(), Some(1.0));
        w.set_control(-0.5);
        assert_eq!(w.control(), Some(0.0));
        w.set_control(f32::NAN);
        assert_eq!(w.control(), Some(0.0));
    }

    #[test]
    fn control_point_entry_roundtrip() {
        let mut w = SequenceWidget::control_point(ObjectId::new(3), 480, 0.25);
        w.set_sequence(Some(ObjectId::new(0x1F)));
        let mut e = LogEntry::new();
        w.get(&mut e);
        assert_eq!(e.to_string(), ":start 480 :sequence 0x1F :y 0.25");

        let mut other = SequenceWidget::control_point(ObjectId::new(4), 0, 0.0);
        other.set(&e);
        assert_eq!(other.start(), 480);
        assert_eq!(other.control(), Some(0.25));
    }

    #[test]
    fn scale_is_clamped_and_copied() {
        let mut w = SequenceWidget::region(ObjectId::new(7), Range::new(0, 0, 10), None);
        assert_eq!(w.scale(), Some(1.0));
        w.set_scale(42.0);
        assert_eq!(w.scale(), Some(MAX_SCALE));
        w.set_scale(-1.0);
        assert_eq!(w.scale(), Some(0.0));
        w.set_scale(0.5);
        assert_eq!(w.duplicate(ObjectId::new(8), None).scale(), Some(0.5));
        assert_eq!(w.placement().scale, Some(0.5));

        let mut point = SequenceWidget::control_point(ObjectId::new(9), 0, 0.5);
        point.set_scale(2.0);
        assert_eq!(point.scale(), None);
    }

    #[test]
    fn region_entry_logs_trim() {
        let w = SequenceWidget::region(ObjectId::new(5), Range::new(10, 20, 30), None);
        let mut e = LogEntry::new();
        w.get(&mut e);
        assert_eq!(e.to_string(), ":start 10 :sequence 0x0 :offset 20 :length 30 :scale 1");
    }

    #[test]
    fn layout_places_control_point_by_value() {
        let mut w = SequenceWidget::control_point(ObjectId::new(6), 1000, 1.0);
        let lane = Rect::new(0, 100, 500, 40);
        let v = Viewport {
            frames_per_pixel: 10.0,
            xoffset: 0,
        };
        w.layout(lane, &v);
        assert_eq!(w.bounds(), Rect::new(96, 96, 8, 8));
        w.set_control(0.0);
        w.layout(lane, &v);
        assert_eq!(w.bounds().y, 136);
    }
}
