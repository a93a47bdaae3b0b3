//! Generic reflect-and-replay journal underlying undo/redo and persistence.
//!
//! Entities implement [`Loggable`] to serialize their state into a
//! [`LogEntry`] and restore it again. The [`Journal`] hands out object ids,
//! groups records into transactions between [`Journal::block_start`] and
//! [`Journal::block_end`], keeps the undo/redo history and optionally appends
//! every committed transaction to a JSONL file.
//!
//! The journal never interprets fields; applying records back onto live
//! objects is the owner's job (see `Timeline::undo`).

mod history;
mod writer;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use furrow_types::{LogEntry, ObjectId};

pub use history::UndoHistory;
pub use writer::{read_transactions, JournalError, JournalWriter};

/// State that can be captured into and restored from a journal entry.
pub trait Loggable {
    fn id(&self) -> ObjectId;
    fn class_name(&self) -> &'static str;
    fn get(&self, entry: &mut LogEntry);
    fn set(&mut self, entry: &LogEntry);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogAction {
    Create,
    Modify,
    Destroy,
}

/// One object's change inside a transaction.
///
/// `Create` carries only `new`, `Destroy` only `old`, `Modify` both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: ObjectId,
    pub class: String,
    pub action: LogAction,
    pub old: Option<LogEntry>,
    pub new: Option<LogEntry>,
}

impl LogRecord {
    fn inverted(&self) -> LogRecord {
        let action = match self.action {
            LogAction::Create => LogAction::Destroy,
            LogAction::Destroy => LogAction::Create,
            LogAction::Modify => LogAction::Modify,
        };
        LogRecord {
            id: self.id,
            class: self.class.clone(),
            action,
            old: self.new.clone(),
            new: self.old.clone(),
        }
    }
}

/// The unit of undo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub records: Vec<LogRecord>,
}

impl Transaction {
    /// The transaction that, applied forward, reverts this one.
    pub fn inverted(&self) -> Transaction {
        Transaction {
            records: self.records.iter().rev().map(LogRecord::inverted).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

pub struct Journal {
    next_id: u32,
    depth: u32,
    suspended: u32,
    pending: Vec<LogRecord>,
    held: HashMap<ObjectId, LogEntry>,
    history: UndoHistory,
    writer: Option<JournalWriter>,
}

impl Journal {
    pub fn new(undo_depth: usize) -> Self {
        Self {
            next_id: 1,
            depth: 0,
            suspended: 0,
            pending: Vec::new(),
            held: HashMap::new(),
            history: UndoHistory::new(undo_depth),
            writer: None,
        }
    }

    /// Journal that also appends every committed transaction to `path`.
    pub fn with_file(path: &Path, undo_depth: usize) -> Result<Self, JournalError> {
        let mut journal = Self::new(undo_depth);
        journal.writer = Some(JournalWriter::open(path)?);
        Ok(journal)
    }

    pub fn allocate_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Make sure ids handed out later never collide with `id` (used on replay).
    pub fn reserve_id(&mut self, id: ObjectId) {
        if id.get() >= self.next_id {
            self.next_id = id.get() + 1;
        }
    }

    pub fn block_start(&mut self) {
        self.depth += 1;
    }

    pub fn block_end(&mut self) {
        if self.depth == 0 {
            log::warn!(target: "journal", "block_end without matching block_start");
            return;
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.commit();
        }
    }

    pub fn in_block(&self) -> bool {
        self.depth > 0
    }

    /// Stop recording while the owner replays or undoes. Nests.
    pub fn suspend(&mut self) {
        self.suspended += 1;
    }

    pub fn resume(&mut self) {
        self.suspended = self.suspended.saturating_sub(1);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended > 0
    }

    /// Remember the state of `id` before a modification. Only the first
    /// snapshot is kept until the matching [`Journal::log_end`].
    pub fn log_start(&mut self, id: ObjectId, entry: LogEntry) {
        if self.is_suspended() {
            return;
        }
        self.held.entry(id).or_insert(entry);
    }

    /// Close a modification opened by `log_start`; records it if anything changed.
    pub fn log_end(&mut self, id: ObjectId, class: &str, entry: LogEntry) {
        if self.is_suspended() {
            return;
        }
        let Some(old) = self.held.remove(&id) else {
            log::debug!(target: "journal", "log_end for {} without log_start", id);
            return;
        };
        if old == entry {
            return;
        }
        self.push(LogRecord {
            id,
            class: class.to_string(),
            action: LogAction::Modify,
            old: Some(old),
            new: Some(entry),
        });
    }

    pub fn is_held(&self, id: ObjectId) -> bool {
        self.held.contains_key(&id)
    }

    pub fn log_create(&mut self, id: ObjectId, class: &str, entry: LogEntry) {
        if self.is_suspended() {
            return;
        }
        self.push(LogRecord {
            id,
            class: class.to_string(),
            action: LogAction::Create,
            old: None,
            new: Some(entry),
        });
    }

    pub fn log_destroy(&mut self, id: ObjectId, class: &str, entry: LogEntry) {
        if self.is_suspended() {
            return;
        }
        self.held.remove(&id);
        self.push(LogRecord {
            id,
            class: class.to_string(),
            action: LogAction::Destroy,
            old: Some(entry),
            new: None,
        });
    }

    fn push(&mut self, record: LogRecord) {
        if record.action == LogAction::Modify {
            // repeated changes to one object inside a transaction collapse into
            // its earlier record
            if let Some(prev) = self
                .pending
                .iter_mut()
                .rev()
                .find(|r| r.id == record.id && r.action != LogAction::Destroy)
            {
                prev.new = record.new;
                return;
            }
        }

        self.pending.push(record);

        if self.depth == 0 {
            self.commit();
        }
    }

    fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let tx = Transaction {
            records: std::mem::take(&mut self.pending),
        };
        log::debug!(target: "journal", "committed transaction of {} record(s)", tx.len());
        self.write(&tx);
        self.history.push(tx);
    }

    /// Append `tx` to the journal file, if one is attached.
    pub fn write(&mut self, tx: &Transaction) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.append(tx) {
                log::warn!(target: "journal", "failed to append to journal: {}", e);
            }
        }
    }

    pub fn pop_undo(&mut self) -> Option<Transaction> {
        self.history.pop_undo()
    }

    pub fn push_redo(&mut self, tx: Transaction) {
        self.history.push_redo(tx);
    }

    pub fn pop_redo(&mut self) -> Option<Transaction> {
        self.history.pop_redo()
    }

    pub fn push_redone(&mut self, tx: Transaction) {
        self.history.push_redone(tx);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: u64) -> LogEntry {
        let mut e = LogEntry::new();
        e.add(":start", start);
        e
    }

    #[test]
    fn unblocked_records_commit_immediately() {
        let mut j = Journal::new(10);
        let id = j.allocate_id();
        j.log_create(id, "Region", entry(0));
        assert_eq!(j.history().undo_len(), 1);
    }

    #[test]
    fn block_groups_records() {
        let mut j = Journal::new(10);
        let a = j.allocate_id();
        let b = j.allocate_id();
        j.block_start();
        j.log_create(a, "Region", entry(0));
        j.block_start();
        j.log_create(b, "Region", entry(10));
        j.block_end();
        assert_eq!(j.history().undo_len(), 0);
        j.block_end();
        assert_eq!(j.history().undo_len(), 1);
        assert_eq!(j.pop_undo().unwrap().len(), 2);
    }

    #[test]
    fn unchanged_modification_is_dropped() {
        let mut j = Journal::new(10);
        let id = j.allocate_id();
        j.log_start(id, entry(5));
        j.log_end(id, "Region", entry(5));
        assert!(!j.can_undo());
    }

    #[test]
    fn repeated_modifications_merge() {
        let mut j = Journal::new(10);
        let id = j.allocate_id();
        j.block_start();
        for s in 0..5u64 {
            j.log_start(id, entry(s * 10));
            j.log_end(id, "Region", entry((s + 1) * 10));
        }
        j.block_end();
        let tx = j.pop_undo().unwrap();
        assert_eq!(tx.len(), 1);
        assert_eq!(tx.records[0].old, Some(entry(0)));
        assert_eq!(tx.records[0].new, Some(entry(50)));
    }

    #[test]
    fn inverted_transaction_swaps_actions() {
        let mut j = Journal::new(10);
        let a = j.allocate_id();
        j.block_start();
        j.log_create(a, "Region", entry(0));
        j.log_start(a, entry(0));
        j.log_end(a, "Region", entry(7));
        j.block_end();
        let tx = j.pop_undo().unwrap();
        // the modify folded into the create
        assert_eq!(tx.len(), 1);
        assert_eq!(tx.records[0].new, Some(entry(7)));
        let inv = tx.inverted();
        assert_eq!(inv.records[0].action, LogAction::Destroy);
        assert_eq!(inv.records[0].old, Some(entry(7)));
    }

    #[test]
    fn suspended_journal_records_nothing() {
        let mut j = Journal::new(10);
        let id = j.allocate_id();
        j.suspend();
        j.log_create(id, "Region", entry(0));
        j.resume();
        assert!(!j.can_undo());
    }

    #[test]
    fn reserve_id_skips_replayed_ids() {
        let mut j = Journal::new(10);
        j.reserve_id(ObjectId::new(40));
        assert_eq!(j.allocate_id(), ObjectId::new(41));
    }
}
