use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::DroidQaResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    /// Agent that produced the entry.
    pub role: String,
    pub content: Option<String>,
    pub payload: Option<serde_json::Value>,
}

/// Append-only JSONL record of one session.
pub struct SessionHistory {
    entries: Vec<HistoryEntry>,
    file_path: PathBuf,
}

impl SessionHistory {
    /// Entries go to `<dir>/session_<uuid>.jsonl`.
    pub fn new(dir: &Path) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Self {
            entries: Vec::new(),
            file_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Append the latest entry to the JSONL file.
    pub fn flush(&self) -> DroidQaResult<()> {
        if let Some(last) = self.entries.last() {
            let line = serde_json::to_string(last)?;
            if let Some(parent) = self.file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)?;
            writeln!(file, "{}", line)?;
            tracing::debug!(
                path = %self.file_path.display(),
                "history entry flushed"
            );
        }
        Ok(())
    }
}
