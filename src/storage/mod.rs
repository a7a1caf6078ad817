//! Filesystem storage.
//!
//! Handles reading and writing the local data directory:
//! - Event log tables (JSONL, written by the game-server logger)
//! - State files owned by this crate (account links)
//! - Advisory locks serializing writers across processes

mod event_log;
mod jsonl;
mod lock;

pub use event_log::*;
pub use jsonl::*;
pub use lock::*;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt record at {path:?} line {line}: {message}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Directory holding the combat log tables.
    pub fn event_log_dir(&self) -> PathBuf {
        self.data_dir.join("event_log")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Snapshot file of chat/game account links.
    pub fn links_path(&self) -> PathBuf {
        self.state_dir().join("linked_accounts.jsonl")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}
