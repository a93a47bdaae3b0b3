use std::collections::BTreeSet;

use furrow_types::Frame;

use super::widget::Drag;
use super::{SequenceId, Timeline, WidgetId};
use crate::journal::Loggable;

impl Timeline {
    /// Start dragging `id`. Its committed range is copied, as published, into
    /// the staged slot; motion only touches the copy until [`Timeline::end_drag`].
    pub fn begin_drag(&mut self, id: WidgetId, drag: Drag) {
        match self.widgets.get(&id) {
            Some(w) if w.drag().is_none() => {}
            _ => return,
        }
        self.stage(id);
        if let Some(w) = self.widgets.get_mut(&id) {
            w.set_drag(Some(drag));
        }
    }

    fn stage(&mut self, id: WidgetId) {
        let Some(w) = self.widgets.get(&id) else {
            return;
        };
        if w.is_staged() {
            return;
        }
        let committed = w.committed();
        let base = self.lock.read().range(id).unwrap_or(committed);
        self.log_widget_start(id);
        if let Some(w) = self.widgets.get_mut(&id) {
            w.stage(base);
        }
    }

    /// Move a widget to `start`.
    ///
    /// An unselected widget just moves. In a selection only the drag
    /// initiator acts, and it carries every member by the same delta; moving
    /// left stops when the earliest member reaches frame 0.
    pub fn set_start(&mut self, id: WidgetId, start: Frame) {
        let Some(w) = self.widgets.get_mut(&id) else {
            return;
        };
        if !self.context.is_selected(id) {
            w.set_start_raw(start);
            return;
        }
        if self.context.current() != Some(id) {
            return;
        }

        let old = w.start();
        let dragging = w.is_staged();
        if start == old {
            return;
        }

        let members = self.context.selection().to_vec();
        if dragging {
            for m in &members {
                self.stage(*m);
            }
        }

        if start < old {
            let earliest = members
                .iter()
                .filter_map(|m| self.widgets.get(m))
                .map(|w| w.start())
                .min()
                .unwrap_or(0);
            let delta = (old - start).min(earliest);
            for m in &members {
                if let Some(w) = self.widgets.get_mut(m) {
                    w.set_start_raw(w.start() - delta);
                }
            }
        } else {
            let delta = start - old;
            for m in &members {
                if let Some(w) = self.widgets.get_mut(m) {
                    w.set_start_raw(w.start().saturating_add(delta));
                }
            }
        }
    }

    /// Snap `id` to a neighbour edge or the grid.
    pub fn snap(&mut self, id: WidgetId) {
        let Some(seq) = self.widgets.get(&id).and_then(|w| w.sequence()) else {
            return;
        };
        let Some(s) = self.sequences.get(&seq) else {
            return;
        };
        if let Some(start) = s.snap_position(&self.widgets, id, &self.settings) {
            self.set_start(id, start);
        }
    }

    /// Finish a drag: staged ranges become committed and are published.
    ///
    /// When the initiator of a selection drag ends, any member still staged
    /// is committed along with it.
    pub fn end_drag(&mut self, id: WidgetId) {
        let mut ids = vec![id];
        if self.context.current() == Some(id) && self.context.is_selected(id) {
            ids.extend(self.context.selection().iter().filter(|m| **m != id));
        }

        let mut touched = BTreeSet::new();
        for id in ids {
            let Some(w) = self.widgets.get_mut(&id) else {
                continue;
            };
            if !w.commit() {
                continue;
            }
            if let Some(seq) = w.sequence() {
                touched.insert(seq);
            }
            self.log_widget_end(id);
        }
        if !touched.is_empty() {
            self.publish_lanes(touched);
        }
    }

    /// Clone `id` into its own sequence under a fresh identity.
    pub fn duplicate(&mut self, id: WidgetId) -> Option<WidgetId> {
        let w = self.widgets.get(&id)?;
        let seq = w.sequence()?;
        let source = w.source().map(|f| self.audio_files.duplicate(f));
        let copy = w.duplicate(self.journal.allocate_id(), source);
        log::debug!(target: "sequence", "duplicating {} {} as {}", copy.class_name(), id, copy.id());
        self.insert_widget(seq, copy)
    }

    /// The lane whose vertical extent contains `y`.
    pub fn track_under(&self, y: i32) -> Option<SequenceId> {
        self.sequences
            .values()
            .find(|s| s.geometry().contains_y(y))
            .map(|s| s.id())
    }
}
