//! Append-only JSONL journal file: one committed transaction per line.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::Transaction;

/// Error type for journal persistence and replay.
#[derive(Debug)]
pub enum JournalError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl From<std::io::Error> for JournalError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl std::fmt::Display for JournalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for JournalError {}

pub struct JournalWriter {
    writer: BufWriter<File>,
}

impl JournalWriter {
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Create (or truncate) `path` and write `tx` as its only line.
    pub fn write_snapshot(path: &Path, tx: &Transaction) -> Result<(), JournalError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", serde_json::to_string(tx)?)?;
        writer.flush()?;
        Ok(())
    }

    pub fn append(&mut self, tx: &Transaction) -> Result<(), JournalError> {
        let json = serde_json::to_string(tx)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Read every transaction in a journal file. Blank and unparseable lines are skipped.
pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>, JournalError> {
    let file = File::open(path)?;
    let mut out = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Transaction>(&line) {
            Ok(tx) => out.push(tx),
            Err(e) => {
                log::warn!(target: "journal", "skipping line {} of {}: {}", n + 1, path.display(), e)
            }
        }
    }
    Ok(out)
}
