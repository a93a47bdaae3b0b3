use std::collections::BTreeSet;

use furrow_types::{Frame, LogEntry};

use super::sequence::Sequence;
use super::{DeferredCommand, SequenceId, Timeline, WidgetId};
use crate::journal::Loggable;

fn shifted(value: Frame, step: Frame, direction: i32) -> Frame {
    if direction < 0 {
        value.saturating_sub(step)
    } else {
        value.saturating_add(step)
    }
}

impl Timeline {
    /// Selected widgets belonging to `seq`, in position order.
    fn selected_in(&self, seq: SequenceId) -> Vec<WidgetId> {
        self.context
            .selection()
            .iter()
            .copied()
            .filter(|id| self.widgets.get(id).and_then(|w| w.sequence()) == Some(seq))
            .collect()
    }

    /// Open the transaction for a run of nudges. Key repeats keep adding to
    /// it until [`Timeline::log_nudge_end`].
    fn begin_nudge(&mut self) {
        if !self.nudging {
            self.journal.block_start();
            self.nudging = true;
        }
    }

    pub fn log_nudge_end(&mut self) {
        if self.nudging {
            self.nudging = false;
            self.journal.block_end();
        }
    }

    pub fn is_nudging(&self) -> bool {
        self.nudging
    }

    fn nudge_start(&mut self, id: WidgetId, direction: i32) {
        let step = self.settings.nudge_frames();
        self.log_widget_start(id);
        if let Some(w) = self.widgets.get_mut(&id) {
            w.set_start_raw(shifted(w.start(), step, direction));
        }
        self.log_widget_end(id);
    }

    fn nudge_offset(&mut self, id: WidgetId, direction: i32) {
        let step = self.settings.nudge_frames();
        self.log_widget_start(id);
        if let Some(w) = self.widgets.get_mut(&id) {
            if !w.is_control_point() {
                w.set_offset_raw(shifted(w.offset(), step, direction));
            }
        }
        self.log_widget_end(id);
    }

    fn nudge_value(&mut self, id: WidgetId, direction: i32) {
        let step = self.settings.control_nudge * direction.signum() as f32;
        self.log_widget_start(id);
        if let Some(w) = self.widgets.get_mut(&id) {
            if let Some(c) = w.control() {
                w.set_control(c + step);
            }
        }
        self.log_widget_end(id);
    }

    /// Move every selected widget of `seq` one nudge step left (`direction < 0`)
    /// or right, stopping at frame 0.
    pub fn nudge_selected(&mut self, seq: SequenceId, direction: i32) -> bool {
        let ids = self.selected_in(seq);
        if ids.is_empty() {
            return false;
        }
        self.begin_nudge();
        for id in ids {
            self.nudge_start(id, direction);
        }
        self.handle_widget_change(seq);
        true
    }

    /// Shift the source offset of every selected region of `seq`.
    pub fn pan_selected(&mut self, seq: SequenceId, direction: i32) -> bool {
        let ids = self.selected_in(seq);
        if ids.is_empty() {
            return false;
        }
        self.begin_nudge();
        for id in ids {
            self.nudge_offset(id, direction);
        }
        self.handle_widget_change(seq);
        true
    }

    /// Raise (`direction > 0`) or lower every selected control point of `seq`.
    pub fn nudge_control_selected(&mut self, seq: SequenceId, direction: i32) -> bool {
        let ids = self.selected_in(seq);
        if ids.is_empty() {
            return false;
        }
        self.begin_nudge();
        for id in ids {
            self.nudge_value(id, direction);
        }
        self.handle_widget_change(seq);
        true
    }

    /// Nudge a single widget.
    pub fn nudge_some(&mut self, id: WidgetId, direction: i32) -> bool {
        let Some(seq) = self.widgets.get(&id).and_then(|w| w.sequence()) else {
            return false;
        };
        self.begin_nudge();
        self.nudge_start(id, direction);
        self.handle_widget_change(seq);
        true
    }

    pub fn pan_some(&mut self, id: WidgetId, direction: i32) -> bool {
        let Some(seq) = self.widgets.get(&id).and_then(|w| w.sequence()) else {
            return false;
        };
        self.begin_nudge();
        self.nudge_offset(id, direction);
        self.handle_widget_change(seq);
        true
    }

    pub fn nudge_control(&mut self, id: WidgetId, direction: i32) -> bool {
        let Some(seq) = self.widgets.get(&id).and_then(|w| w.sequence()) else {
            return false;
        };
        self.begin_nudge();
        self.nudge_value(id, direction);
        self.handle_widget_change(seq);
        true
    }

    /// Set the gain of region `id` as one undo step. Returns false for
    /// control points, unowned widgets and unchanged values.
    pub fn set_scale(&mut self, id: WidgetId, scale: f32) -> bool {
        let Some(w) = self.widgets.get(&id) else {
            return false;
        };
        let (Some(seq), Some(old)) = (w.sequence(), w.scale()) else {
            return false;
        };
        self.log_widget_start(id);
        if let Some(w) = self.widgets.get_mut(&id) {
            w.set_scale(scale);
        }
        self.log_widget_end(id);
        let changed = self.widgets.get(&id).and_then(|w| w.scale()) != Some(old);
        if changed {
            log::debug!(target: "sequence", "region {} gain {} -> {}", id, old, scale);
            self.handle_widget_change(seq);
        }
        changed
    }

    /// Select every widget of `seq` in the pixel span `[x, x + w]`. With a
    /// band `(y, h)` only widgets whose box meets it vertically are taken.
    pub fn select_range(
        &mut self,
        seq: SequenceId,
        x: i32,
        w: i32,
        band: Option<(i32, i32)>,
    ) -> usize {
        let Some(s) = self.sequences.get(&seq) else {
            return 0;
        };
        let viewport = &self.settings.viewport;
        let from = s.x_to_offset(viewport, x);
        let to = s.x_to_offset(viewport, x + w.max(0));
        let ids = s.range_query(&self.widgets, from, to, band);
        ids.into_iter().filter(|id| self.select(*id)).count()
    }

    /// Delete every selected widget of `seq` as one undo step.
    pub fn remove_selected(&mut self, seq: SequenceId) -> usize {
        let ids = self.selected_in(seq);
        self.destroy_all(&ids)
    }

    /// Delete every widget of `seq` as one undo step.
    pub fn clear(&mut self, seq: SequenceId) -> usize {
        let Some(s) = self.sequences.get(&seq) else {
            return 0;
        };
        let ids = s.widgets().to_vec();
        self.destroy_all(&ids)
    }

    fn destroy_all(&mut self, ids: &[WidgetId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let mut touched = BTreeSet::new();
        self.journal.block_start();
        let n = ids
            .iter()
            .filter(|id| self.destroy_quiet(**id, &mut touched))
            .count();
        self.journal.block_end();
        self.publish_lanes(touched);
        n
    }

    /// Empty `seq` and take it out of the timeline, both in one undo step.
    pub fn remove_sequence(&mut self, seq: SequenceId) -> Option<Sequence> {
        if !self.sequences.contains_key(&seq) {
            return None;
        }
        self.journal.block_start();
        self.clear(seq);
        let removed = self.sequences.remove(&seq);
        if let Some(s) = &removed {
            let mut e = LogEntry::new();
            s.get(&mut e);
            self.journal.log_destroy(seq, s.class_name(), e);
        }
        self.journal.block_end();
        self.lock.write().remove_lane(seq);
        log::debug!(target: "sequence", "removed sequence {}", seq);
        removed
    }

    /// Ask for `id` to be deleted once the current dispatch unwinds.
    pub fn queue_delete(&mut self, id: WidgetId) {
        if self.deferred_tx.send(DeferredCommand::Delete(id)).is_err() {
            log::warn!(target: "sequence", "deferred queue closed; dropping delete of {}", id);
        }
    }

    /// Run queued commands. All deletions form one undo step and one publish.
    pub fn flush_deferred(&mut self) -> usize {
        let commands: Vec<DeferredCommand> = self.deferred_rx.try_iter().collect();
        if commands.is_empty() {
            return 0;
        }
        self.context.set_pushed(None);
        self.context.set_below_mouse(None);

        let mut touched = BTreeSet::new();
        let mut n = 0;
        self.journal.block_start();
        for cmd in commands {
            match cmd {
                DeferredCommand::Delete(id) => {
                    if self.destroy_quiet(id, &mut touched) {
                        n += 1;
                    }
                }
            }
        }
        self.journal.block_end();
        self.publish_lanes(touched);
        n
    }
}
