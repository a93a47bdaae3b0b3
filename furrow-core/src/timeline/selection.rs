use super::sequence::WidgetArena;
use super::WidgetId;

/// Pointer identities and the selection, owned by one timeline.
///
/// The selection is kept sorted by start position so that operations on it
/// visit members left to right.
#[derive(Debug, Default)]
pub struct InteractionContext {
    selection: Vec<WidgetId>,
    current: Option<WidgetId>,
    pushed: Option<WidgetId>,
    below_mouse: Option<WidgetId>,
}

impl InteractionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &[WidgetId] {
        &self.selection
    }

    pub fn is_selected(&self, id: WidgetId) -> bool {
        self.selection.contains(&id)
    }

    pub fn selection_len(&self) -> usize {
        self.selection.len()
    }

    /// Insert in position order. Returns false if already selected.
    pub(crate) fn select(&mut self, id: WidgetId, arena: &WidgetArena) -> bool {
        if self.is_selected(id) {
            return false;
        }
        let start = |w: &WidgetId| arena.get(w).map(|w| w.start()).unwrap_or(0);
        let at = start(&id);
        let pos = self.selection.partition_point(|w| start(w) <= at);
        self.selection.insert(pos, id);
        true
    }

    pub(crate) fn deselect(&mut self, id: WidgetId) -> bool {
        let before = self.selection.len();
        self.selection.retain(|w| *w != id);
        self.selection.len() != before
    }

    /// Restore position order after members moved.
    pub(crate) fn resort(&mut self, arena: &WidgetArena) {
        self.selection
            .sort_by_key(|w| arena.get(w).map(|w| w.start()).unwrap_or(0));
    }

    /// The widget that initiated the current drag.
    pub fn current(&self) -> Option<WidgetId> {
        self.current
    }

    pub(crate) fn set_current(&mut self, id: Option<WidgetId>) {
        self.current = id;
    }

    /// The widget that received the last press.
    pub fn pushed(&self) -> Option<WidgetId> {
        self.pushed
    }

    pub(crate) fn set_pushed(&mut self, id: Option<WidgetId>) {
        self.pushed = id;
    }

    pub fn below_mouse(&self) -> Option<WidgetId> {
        self.below_mouse
    }

    pub(crate) fn set_below_mouse(&mut self, id: Option<WidgetId>) {
        self.below_mouse = id;
    }

    /// Drop every reference to a widget that is going away.
    pub(crate) fn forget(&mut self, id: WidgetId) {
        self.deselect(id);
        for slot in [&mut self.current, &mut self.pushed, &mut self.below_mouse] {
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }
}
