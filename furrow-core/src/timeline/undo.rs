use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use furrow_types::{LogEntry, Range};

use super::sequence::{Sequence, SequenceKind};
use super::widget::SequenceWidget;
use super::{Drawable, Timeline, TimelineSettings, WidgetId};
use crate::audio_file::AudioFileCache;
use crate::journal::{
    read_transactions, Journal, JournalError, JournalWriter, LogAction, LogRecord, Loggable,
    Transaction,
};
use crate::paths;

impl Timeline {
    /// Revert the last transaction. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.log_nudge_end();
        let Some(tx) = self.journal.pop_undo() else {
            return false;
        };
        let inverse = tx.inverted();
        self.journal.suspend();
        self.apply(&inverse);
        self.journal.resume();
        // the file stays replayable front to back
        self.journal.write(&inverse);
        log::debug!(target: "journal", "undid transaction of {} record(s)", tx.len());
        self.journal.push_redo(tx);
        true
    }

    pub fn redo(&mut self) -> bool {
        self.log_nudge_end();
        let Some(tx) = self.journal.pop_redo() else {
            return false;
        };
        self.journal.suspend();
        self.apply(&tx);
        self.journal.resume();
        self.journal.write(&tx);
        log::debug!(target: "journal", "redid transaction of {} record(s)", tx.len());
        self.journal.push_redone(tx);
        true
    }

    /// Apply every record of `tx` forward, in order.
    pub fn apply(&mut self, tx: &Transaction) {
        for record in &tx.records {
            self.apply_record(record);
        }
    }

    fn apply_record(&mut self, r: &LogRecord) {
        match r.action {
            LogAction::Create => {
                let Some(entry) = r.new.as_ref() else {
                    log::warn!(target: "journal", "create of {} without an entry", r.id);
                    return;
                };
                self.journal.reserve_id(r.id);
                self.recreate(r.id, &r.class, entry);
            }
            LogAction::Destroy => self.destroy_object(r.id, &r.class),
            LogAction::Modify => {
                if let Some(entry) = r.new.as_ref() {
                    self.modify_object(r.id, &r.class, entry);
                }
            }
        }
    }

    fn recreate(&mut self, id: WidgetId, class: &str, entry: &LogEntry) {
        if self.sequences.contains_key(&id) || self.widgets.contains_key(&id) {
            log::warn!(target: "journal", "{} {} already exists", class, id);
            return;
        }
        let widget = match class {
            "Sequence" => {
                let mut seq = Sequence::new(id, "", SequenceKind::Audio);
                seq.set(entry);
                self.install_sequence(seq);
                return;
            }
            "Region" => SequenceWidget::region(id, Range::default(), None),
            "ControlPoint" => SequenceWidget::control_point(id, 0, 0.0),
            other => {
                log::warn!(target: "journal", "unknown class {} for {}", other, id);
                return;
            }
        };
        self.widgets.insert(id, widget);
        self.apply_widget_entry(id, entry);
        if let Some(e) = self.widget_entry(id) {
            self.journal.log_create(id, class, e);
        }
    }

    fn destroy_object(&mut self, id: WidgetId, class: &str) {
        if class != "Sequence" {
            self.destroy_widget(id);
            return;
        }
        if self.sequence(id).map_or(false, |s| !s.is_empty()) {
            log::warn!(target: "journal", "destroying sequence {} that still has widgets", id);
        }
        self.remove_sequence(id);
    }

    fn modify_object(&mut self, id: WidgetId, class: &str, entry: &LogEntry) {
        if class == "Sequence" {
            match self.sequences.get_mut(&id) {
                Some(s) => {
                    s.set(entry);
                    s.mark_dirty();
                }
                None => panic!("No such object ID {}", id),
            }
            return;
        }
        assert!(self.widgets.contains_key(&id), "No such object ID {}", id);
        self.apply_widget_entry(id, entry);
    }

    /// Restore a widget from a journal entry, resolving its sequence,
    /// selection state and audio source.
    ///
    /// # Panics
    ///
    /// If `:sequence` names an object that does not exist.
    pub fn apply_widget_entry(&mut self, id: WidgetId, entry: &LogEntry) {
        // an absent key leaves ownership alone; `0x0` means unowned
        let target = entry
            .get(":sequence")
            .map(|_| entry.id(":sequence"));
        if let Some(Some(seq)) = target {
            assert!(self.sequences.contains_key(&seq), "No such object ID {}", seq);
        }

        let Some(w) = self.widgets.get_mut(&id) else {
            return;
        };
        w.set(entry);
        let from = w.sequence();

        if let Some(name) = entry.get(":source").filter(|s| !s.is_empty()) {
            let path = paths::resolve_source(&self.project_dir, Path::new(name));
            let canonical = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            let same = w.source().map_or(false, |f| f.path() == canonical);
            if !same {
                let file = self.audio_files.from_file(&path);
                if let Some(old) = w.replace_source(Some(file)) {
                    self.audio_files.release(old);
                }
            }
        }

        let to = target.unwrap_or(from);
        if to != from {
            w.set_sequence(to);
            if let Some(s) = from.and_then(|f| self.sequences.get_mut(&f)) {
                s.detach(id);
            }
            if let Some(s) = to.and_then(|t| self.sequences.get_mut(&t)) {
                s.attach(id);
            }
        }

        match entry.bool(":selected") {
            Some(true) => {
                self.context.select(id, &self.widgets);
            }
            Some(false) => {
                self.context.deselect(id);
            }
            None => {}
        }

        self.publish_lanes(from.into_iter().chain(to));
    }

    /// A transaction recreating the whole timeline: every sequence, then
    /// every widget lane by lane.
    pub fn snapshot(&self) -> Transaction {
        let mut records = Vec::new();
        for s in self.sequences.values() {
            let mut e = LogEntry::new();
            s.get(&mut e);
            records.push(LogRecord {
                id: s.id(),
                class: s.class_name().to_string(),
                action: LogAction::Create,
                old: None,
                new: Some(e),
            });
        }
        for s in self.sequences.values() {
            for id in s.widgets() {
                let (Some(w), Some(e)) = (self.widgets.get(id), self.widget_entry(*id)) else {
                    continue;
                };
                records.push(LogRecord {
                    id: *id,
                    class: w.class_name().to_string(),
                    action: LogAction::Create,
                    old: None,
                    new: Some(e),
                });
            }
        }
        Transaction { records }
    }

    /// Write [`Timeline::snapshot`] to `path`, replacing its contents.
    pub fn write_snapshot(&self, path: &Path) -> Result<(), JournalError> {
        JournalWriter::write_snapshot(path, &self.snapshot())
    }

    /// Apply every transaction stored in `path`. Returns how many were applied.
    pub fn replay_file(&mut self, path: &Path) -> Result<usize, JournalError> {
        let transactions = read_transactions(path)?;
        self.journal.suspend();
        for tx in &transactions {
            self.apply(tx);
        }
        self.journal.resume();
        log::info!(
            target: "journal",
            "replayed {} transaction(s) from {}",
            transactions.len(),
            path.display()
        );
        Ok(transactions.len())
    }

    /// Rebuild a timeline from a journal file.
    pub fn replay(
        path: &Path,
        settings: TimelineSettings,
        journal: Journal,
        audio_files: Arc<AudioFileCache>,
    ) -> Result<Timeline, JournalError> {
        let mut timeline = Timeline::with_cache(settings, journal, audio_files);
        timeline.replay_file(path)?;
        Ok(timeline)
    }

    /// Re-sort, lay out and publish every lane.
    pub fn publish_all(&mut self) {
        let all: BTreeSet<_> = self.sequences.keys().copied().collect();
        self.publish_lanes(all);
    }
}
