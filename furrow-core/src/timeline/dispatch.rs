//! Event routing from the UI layer into lanes and widgets.

use furrow_types::{Button, Event, Key, Modifiers};

use super::widget::Drag;
use super::{Drawable, SequenceId, Timeline, WidgetId};

impl Timeline {
    /// Feed an event that happened over lane `seq`. Returns whether it was
    /// consumed. Deletions requested on the way are carried out before this
    /// returns.
    pub fn handle(&mut self, seq: SequenceId, event: &Event) -> bool {
        if !self.sequences.contains_key(&seq) {
            return false;
        }
        let handled = self.handle_event(seq, event);
        self.flush_deferred();
        handled
    }

    fn event_widget(&self, seq: SequenceId, x: i32, y: i32) -> Option<WidgetId> {
        self.sequences
            .get(&seq)?
            .event_widget(&self.widgets, &self.settings.viewport, x, y)
    }

    fn handle_event(&mut self, seq: SequenceId, event: &Event) -> bool {
        match *event {
            Event::Key(key) => self.handle_key(seq, key),
            Event::KeyUp(key) => {
                if key.is_nudge() {
                    self.log_nudge_end();
                    true
                } else {
                    false
                }
            }
            Event::Enter => self.adopt_pushed(seq),
            Event::Leave => {
                self.context.set_below_mouse(None);
                true
            }
            Event::Move { x, y } => {
                let below = self.event_widget(seq, x, y);
                self.context.set_below_mouse(below);
                true
            }
            Event::Push { x, y, button, .. } => {
                let Some(id) = self.event_widget(seq, x, y) else {
                    self.context.set_pushed(None);
                    if button == Button::Left {
                        self.select_none();
                    }
                    return false;
                };
                self.context.set_pushed(Some(id));
                self.dispatch(id, event)
            }
            // motion and release belong to the widget the press landed on;
            // a press on empty space starts no drag
            Event::Drag { y, .. } => {
                let Some(id) = self.context.pushed() else {
                    return false;
                };
                let handled = self.dispatch(id, event);
                if !handled {
                    // the pointer left the lane; offer the widget to the lane under it
                    if let Some(to) = self.track_under(y) {
                        if to != seq {
                            self.handle_event(to, &Event::Enter);
                        }
                    }
                }
                handled
            }
            Event::Release { .. } => {
                let Some(id) = self.context.pushed() else {
                    return false;
                };
                let handled = self.dispatch(id, event);
                self.context.set_pushed(None);
                handled
            }
        }
    }

    fn handle_key(&mut self, seq: SequenceId, key: Key) -> bool {
        match key {
            Key::NextWidget => self.locate_next(seq).is_some(),
            Key::PrevWidget => self.locate_prev(seq).is_some(),
            Key::ToggleSelect => {
                let Some(id) = self.sequences.get(&seq).and_then(|s| {
                    s.widget_at(&self.widgets, &self.settings.viewport, self.playhead, None)
                }) else {
                    return false;
                };
                if self.is_selected(id) {
                    self.deselect(id)
                } else {
                    self.select(id)
                }
            }
            Key::DeleteSelected => self.remove_selected(seq) > 0,
            Key::DeleteWidget => match self.context.below_mouse() {
                Some(id) => self.dispatch(id, &Event::Key(key)),
                None => false,
            },
            Key::NudgeLeft => self.nudge_selected_or_hovered(seq, -1),
            Key::NudgeRight => self.nudge_selected_or_hovered(seq, 1),
            Key::PanLeft => self.pan_selected(seq, -1),
            Key::PanRight => self.pan_selected(seq, 1),
            Key::NudgeUp => self.nudge_control_selected(seq, 1),
            Key::NudgeDown => self.nudge_control_selected(seq, -1),
        }
    }

    fn nudge_selected_or_hovered(&mut self, seq: SequenceId, direction: i32) -> bool {
        if self.nudge_selected(seq, direction) {
            return true;
        }
        match self.context.below_mouse() {
            Some(id) => self.nudge_some(id, direction),
            None => false,
        }
    }

    /// A widget dragged in from another lane is moved here if it fits.
    fn adopt_pushed(&mut self, seq: SequenceId) -> bool {
        let Some(id) = self.context.pushed() else {
            return false;
        };
        let Some(w) = self.widgets.get(&id) else {
            return false;
        };
        if w.sequence() == Some(seq) {
            return false;
        }
        let fits = self
            .sequences
            .get(&seq)
            .map_or(false, |s| s.kind().accepts(w.kind()));
        fits && self.add_to(seq, id)
    }

    /// Deliver `event` to `id`, and to the rest of the selection when `id` is
    /// selected, all within one journal transaction.
    pub fn dispatch(&mut self, id: WidgetId, event: &Event) -> bool {
        if !self.widgets.contains_key(&id) {
            return false;
        }
        self.context.set_current(Some(id));

        if !self.context.is_selected(id) {
            return self.handle_widget(id, event);
        }

        self.journal.block_start();
        let others: Vec<WidgetId> = self
            .context
            .selection()
            .iter()
            .copied()
            .filter(|m| *m != id)
            .collect();
        for m in others {
            if self.widgets.contains_key(&m) {
                self.handle_widget(m, event);
            }
        }
        let handled = self.handle_widget(id, event);
        self.journal.block_end();
        handled
    }

    fn handle_widget(&mut self, id: WidgetId, event: &Event) -> bool {
        match *event {
            Event::Key(Key::DeleteWidget) => {
                self.queue_delete(id);
                true
            }
            Event::Push {
                button, modifiers, ..
            } => {
                if button == Button::Right && modifiers.ctrl {
                    self.queue_delete(id);
                    return true;
                }
                if button == Button::Left && self.context.current() == Some(id) {
                    if modifiers.ctrl {
                        if self.is_selected(id) {
                            self.deselect(id);
                        } else {
                            self.select(id);
                        }
                    } else if !self.is_selected(id) {
                        self.select_none();
                        self.select(id);
                    }
                }
                true
            }
            Event::Release { .. } => {
                self.end_drag(id);
                true
            }
            Event::Drag {
                x,
                y,
                button: Button::Left,
                modifiers,
            } => self.drag_widget(id, x, y, modifiers),
            Event::Drag { .. } => true,
            _ => false,
        }
    }

    /// One tick of a left-button drag. Returns false when the pointer has
    /// left the lane of a widget that may change lanes.
    fn drag_widget(&mut self, id: WidgetId, x: i32, y: i32, modifiers: Modifiers) -> bool {
        let Some(w) = self.widgets.get(&id) else {
            return false;
        };
        let Some(seq) = w.sequence() else {
            return false;
        };
        let Some(lane) = self.sequences.get(&seq).map(|s| s.geometry()) else {
            return false;
        };
        let pointer = self.settings.viewport.frame_at(x, lane.x);

        let drag = match w.drag() {
            Some(d) => d,
            None => {
                let d = Drag {
                    x,
                    y,
                    offset: pointer.saturating_sub(w.start()),
                    duplicated: false,
                };
                self.begin_drag(id, d);
                d
            }
        };

        if modifiers.ctrl && !drag.duplicated {
            // the copy stays behind; later ticks move the original
            self.duplicate(id);
            if let Some(w) = self.widgets.get_mut(&id) {
                w.set_drag(Some(Drag {
                    duplicated: true,
                    ..drag
                }));
            }
            return true;
        }

        self.set_start(id, pointer.saturating_sub(drag.offset));
        if self.context.current() == Some(id) {
            self.snap(id);
        }

        let alone = !self.is_selected(id) || self.context.selection_len() == 1;
        if (alone || modifiers.alt) && lane.h > 0 {
            if let Some(w) = self.widgets.get_mut(&id) {
                if w.is_control_point() {
                    w.set_control(1.0 - (y - lane.y) as f32 / lane.h as f32);
                }
            }
        }

        if let Some(s) = self.sequences.get_mut(&seq) {
            s.layout(&mut self.widgets, &self.settings.viewport);
            s.mark_dirty();
        }

        !(alone && !lane.contains_y(y))
    }
}
