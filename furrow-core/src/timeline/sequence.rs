//! An ordered lane of widgets.
//!
//! A `Sequence` only lists the ids of its widgets; the widgets themselves live
//! in the timeline's arena. Every query therefore takes the arena alongside.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use furrow_types::{Frame, LogEntry, Rect};

use super::lock::Placement;
use super::tempo::{SnapTo, Viewport};
use super::widget::{SequenceWidget, WidgetKind, CONTROL_POINT_SIZE};
use super::{Drawable, SequenceId, TimelineSettings, WidgetId};
use crate::journal::Loggable;

pub type WidgetArena = HashMap<WidgetId, SequenceWidget>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceKind {
    Audio,
    Control,
}

impl SequenceKind {
    pub fn accepts(self, kind: &WidgetKind) -> bool {
        matches!(
            (self, kind),
            (SequenceKind::Audio, WidgetKind::Region { .. })
                | (SequenceKind::Control, WidgetKind::ControlPoint { .. })
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            SequenceKind::Audio => "audio",
            SequenceKind::Control => "control",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(SequenceKind::Audio),
            "control" => Some(SequenceKind::Control),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Sequence {
    id: SequenceId,
    pub name: String,
    kind: SequenceKind,
    geometry: Rect,
    widgets: Vec<WidgetId>,
    dirty: bool,
}

impl Sequence {
    pub fn new(id: SequenceId, name: impl Into<String>, kind: SequenceKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            geometry: Rect::default(),
            widgets: Vec::new(),
            dirty: true,
        }
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    pub(crate) fn set_geometry(&mut self, rect: Rect) {
        self.geometry = rect;
        self.dirty = true;
    }

    /// Widget ids in display order (after the last sort).
    pub fn widgets(&self) -> &[WidgetId] {
        &self.widgets
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.widgets.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub(crate) fn attach(&mut self, id: WidgetId) {
        self.widgets.push(id);
        self.dirty = true;
    }

    /// Remove by identity. Returns whether it was listed.
    pub(crate) fn detach(&mut self, id: WidgetId) -> bool {
        let before = self.widgets.len();
        self.widgets.retain(|w| *w != id);
        let removed = self.widgets.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Forget every widget at once; used when tearing the whole timeline down.
    pub(crate) fn detach_all(&mut self) -> Vec<WidgetId> {
        std::mem::take(&mut self.widgets)
    }

    /// Stable sort by start position.
    pub fn sort(&mut self, arena: &WidgetArena) {
        self.widgets
            .sort_by_key(|id| arena.get(id).map(|w| w.start()).unwrap_or(0));
    }

    fn members<'a>(&'a self, arena: &'a WidgetArena) -> impl DoubleEndedIterator<Item = &'a SequenceWidget> + 'a {
        self.widgets.iter().filter_map(move |id| arena.get(id))
    }

    /// First other widget whose inclusive span intersects that of `id`.
    pub fn overlaps(&self, arena: &WidgetArena, id: WidgetId) -> Option<WidgetId> {
        let r = arena.get(&id)?.range();
        self.members(arena)
            .find(|w| w.id() != id && w.range().overlaps(&r))
            .map(|w| w.id())
    }

    /// Hit test by frame. Later widgets win; control points are matched
    /// within a few pixels and, when `y` is given, against their box.
    pub fn widget_at(
        &self,
        arena: &WidgetArena,
        viewport: &Viewport,
        frame: Frame,
        y: Option<i32>,
    ) -> Option<WidgetId> {
        let slop = viewport.x_to_ts(CONTROL_POINT_SIZE / 2);
        self.members(arena)
            .rev()
            .find(|w| {
                if w.is_control_point() {
                    w.start().abs_diff(frame) <= slop
                        && y.map_or(true, |y| w.bounds().contains_y(y))
                } else {
                    w.range().contains(frame)
                }
            })
            .map(|w| w.id())
    }

    /// Hit test by pointer position.
    pub fn event_widget(
        &self,
        arena: &WidgetArena,
        viewport: &Viewport,
        x: i32,
        y: i32,
    ) -> Option<WidgetId> {
        if !self.geometry.contains_y(y) {
            return None;
        }
        self.widget_at(arena, viewport, self.x_to_offset(viewport, x), Some(y))
    }

    /// Timeline frame under pixel column `x`.
    pub fn x_to_offset(&self, viewport: &Viewport, x: i32) -> Frame {
        viewport.frame_at(x, self.geometry.x)
    }

    /// End of the rightmost widget.
    pub fn length(&self, arena: &WidgetArena) -> Frame {
        self.members(arena).map(|w| w.end()).max().unwrap_or(0)
    }

    /// Start of the first widget after `from`, else of the last widget.
    pub fn next(&self, arena: &WidgetArena, from: Frame) -> Option<Frame> {
        let mut last = None;
        for w in self.members(arena) {
            if w.start() > from {
                return Some(w.start());
            }
            last = Some(w.start());
        }
        last
    }

    /// Start of the last widget before `from`, else of the first widget.
    pub fn prev(&self, arena: &WidgetArena, from: Frame) -> Option<Frame> {
        let mut first = None;
        for w in self.members(arena).rev() {
            if w.start() < from {
                return Some(w.start());
            }
            first = Some(w.start());
        }
        first
    }

    /// Where `id` would land after snapping, or `None` if it stays put.
    ///
    /// Magnetic snapping to a neighbour's edge takes priority over the grid.
    pub fn snap_position(
        &self,
        arena: &WidgetArena,
        id: WidgetId,
        settings: &TimelineSettings,
    ) -> Option<Frame> {
        let snap = &settings.snap;
        if snap.snap_to == SnapTo::None {
            return None;
        }
        let w = arena.get(&id)?;
        let start = w.start();

        if snap.magnetic {
            let tolerance = settings.viewport.x_to_ts(snap.pixels as i32);
            for other in self.members(arena).filter(|o| o.id() != id) {
                if start.abs_diff(other.end()) < tolerance {
                    return Some(other.end() + 1);
                }
                if w.end().abs_diff(other.start()) < tolerance {
                    return Some(
                        other
                            .start()
                            .saturating_sub(w.length())
                            .saturating_sub(1),
                    );
                }
            }
        }

        settings.tempo.nearest_line(start, snap.snap_to)
    }

    /// Widgets whose span meets `[from, to]`, optionally only those whose box
    /// meets the vertical band `(y, h)`.
    pub fn range_query(
        &self,
        arena: &WidgetArena,
        from: Frame,
        to: Frame,
        band: Option<(i32, i32)>,
    ) -> Vec<WidgetId> {
        self.members(arena)
            .filter(|w| w.start() <= to && w.end() >= from)
            .filter(|w| band.map_or(true, |(y, h)| w.bounds().intersects_band(y, h)))
            .map(|w| w.id())
            .collect()
    }

    pub(crate) fn placements(&self, arena: &WidgetArena) -> Vec<Placement> {
        self.members(arena).map(SequenceWidget::placement).collect()
    }

    pub(crate) fn layout(&self, arena: &mut WidgetArena, viewport: &Viewport) {
        for id in &self.widgets {
            if let Some(w) = arena.get_mut(id) {
                w.layout(self.geometry, viewport);
            }
        }
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

impl Drawable for Sequence {
    fn bounds(&self) -> Rect {
        self.geometry
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Loggable for Sequence {
    fn id(&self) -> SequenceId {
        self.id
    }

    fn class_name(&self) -> &'static str {
        "Sequence"
    }

    fn get(&self, e: &mut LogEntry) {
        e.add(":name", &self.name);
        e.add(":kind", self.kind.as_str());
    }

    fn set(&mut self, e: &LogEntry) {
        if let Some(name) = e.get(":name") {
            self.name = name.to_string();
        }
        if let Some(kind) = e.get(":kind").and_then(SequenceKind::parse) {
            self.kind = kind;
        }
    }
}

impl Drop for Sequence {
    fn drop(&mut self) {
        if !self.widgets.is_empty() && !std::thread::panicking() {
            panic!(
                "sequence {} dropped with {} widget(s) still attached",
                self.id,
                self.widgets.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_types::{ObjectId, Range};

    fn arena_with(regions: &[(u32, Frame, Frame)]) -> (Sequence, WidgetArena) {
        let mut seq = Sequence::new(ObjectId::new(1), "lane", SequenceKind::Audio);
        let mut arena = WidgetArena::new();
        for &(id, start, length) in regions {
            let id = ObjectId::new(id);
            let mut w = SequenceWidget::region(id, Range::new(start, 0, length), None);
            w.set_sequence(Some(seq.id()));
            arena.insert(id, w);
            seq.attach(id);
        }
        (seq, arena)
    }

    fn teardown(mut seq: Sequence) {
        seq.detach_all();
    }

    #[test]
    fn sort_is_stable_for_equal_starts() {
        let (mut seq, arena) = arena_with(&[(10, 500, 1), (11, 100, 1), (12, 500, 1), (13, 100, 1)]);
        for _ in 0..3 {
            seq.sort(&arena);
            let ids: Vec<u32> = seq.widgets().iter().map(|w| w.get()).collect();
            assert_eq!(ids, vec![11, 13, 10, 12]);
        }
        teardown(seq);
    }

    #[test]
    fn next_and_prev_fall_back_to_the_ends() {
        let (mut seq, arena) = arena_with(&[(2, 100, 10), (3, 300, 10), (4, 200, 10)]);
        seq.sort(&arena);
        assert_eq!(seq.next(&arena, 150), Some(200));
        assert_eq!(seq.next(&arena, 300), Some(300));
        assert_eq!(seq.prev(&arena, 150), Some(100));
        assert_eq!(seq.prev(&arena, 50), Some(100));
        teardown(seq);

        let empty = Sequence::new(ObjectId::new(9), "empty", SequenceKind::Audio);
        assert_eq!(empty.next(&WidgetArena::new(), 0), None);
        assert_eq!(empty.prev(&WidgetArena::new(), 0), None);
    }

    #[test]
    fn overlap_is_inclusive() {
        let (seq, arena) = arena_with(&[(2, 0, 100), (3, 100, 10), (4, 200, 10)]);
        assert_eq!(seq.overlaps(&arena, ObjectId::new(3)), Some(ObjectId::new(2)));
        assert_eq!(seq.overlaps(&arena, ObjectId::new(4)), None);
        assert_eq!(seq.length(&arena), 210);
        teardown(seq);
    }

    #[test]
    fn last_widget_wins_hit_test() {
        let (seq, arena) = arena_with(&[(2, 0, 100), (3, 50, 100)]);
        let v = Viewport::default();
        assert_eq!(seq.widget_at(&arena, &v, 75, None), Some(ObjectId::new(3)));
        assert_eq!(seq.widget_at(&arena, &v, 25, None), Some(ObjectId::new(2)));
        assert_eq!(seq.widget_at(&arena, &v, 500, None), None);
        teardown(seq);
    }

    #[test]
    fn magnetic_snap_beats_grid() {
        let (mut seq, arena) = arena_with(&[(2, 0, 1001), (3, 1005, 100), (4, 1003, 10)]);
        seq.sort(&arena);
        let mut settings = TimelineSettings::default();
        settings.viewport.frames_per_pixel = 1.0;
        settings.snap.pixels = 10;
        // 1003 is 3 frames from the end of #2 (1001)
        assert_eq!(seq.snap_position(&arena, ObjectId::new(4), &settings), Some(1002));

        settings.snap.magnetic = false;
        assert_eq!(seq.snap_position(&arena, ObjectId::new(4), &settings), Some(0));

        settings.snap.snap_to = SnapTo::None;
        settings.snap.magnetic = true;
        assert_eq!(seq.snap_position(&arena, ObjectId::new(4), &settings), None);
        teardown(seq);
    }

    #[test]
    fn sequence_entry_roundtrip() {
        let seq = Sequence::new(ObjectId::new(1), "drums", SequenceKind::Control);
        let mut e = LogEntry::new();
        seq.get(&mut e);
        let mut other = Sequence::new(ObjectId::new(2), "", SequenceKind::Audio);
        other.set(&e);
        assert_eq!(other.name, "drums");
        assert_eq!(other.kind(), SequenceKind::Control);
    }

    #[test]
    #[should_panic(expected = "still attached")]
    fn dropping_a_populated_sequence_panics() {
        let (seq, _arena) = arena_with(&[(2, 0, 10)]);
        drop(seq);
    }
}
