//! Storage backends for received messages
//!
//! The session only needs to persist a named blob and learn whether that
//! worked. Backends are shared by every connection and must serialize access
//! to whatever they write to.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, mpsc};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Somewhere to put finished messages
pub trait Storage: Send + Sync {
    /// Persist `content` under `name`. Called once per message, never retried.
    fn put(&self, name: &str, content: &[u8]) -> Result<(), StorageError>;
}

/// Keeps messages in a map behind a mutex
#[derive(Debug, Default)]
pub struct MemoryStorage {
    messages: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the message stored under `name`
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().ok()?.get(name).cloned()
    }

    /// Number of stored messages
    pub fn len(&self) -> usize {
        self.lock().map(|messages| messages.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, StorageError> {
        self.messages
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_owned()))
    }
}

impl Storage for MemoryStorage {
    fn put(&self, name: &str, content: &[u8]) -> Result<(), StorageError> {
        self.lock()?.insert(name.to_owned(), content.to_vec());
        Ok(())
    }
}

/// Writes each message to `<dir>/<name>.eml`
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    dir: PathBuf,
}

impl DirectoryStorage {
    /// Use `dir` for messages, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path a message named `name` is written to
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.eml"))
    }
}

impl Storage for DirectoryStorage {
    fn put(&self, name: &str, content: &[u8]) -> Result<(), StorageError> {
        // Names must not leave the directory.
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StorageError::Unavailable(format!(
                "refusing message name {name:?}"
            )));
        }

        let path = self.path_for(name);
        fs::write(&path, content)?;
        debug!(path = %path.display(), "message written");
        Ok(())
    }
}

/// A message handed to a [`ChannelStorage`] receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub name: String,
    pub content: Vec<u8>,
}

/// Sends every message down a channel, for embedding the server in tests
#[derive(Debug)]
pub struct ChannelStorage {
    sender: mpsc::Sender<StoredMessage>,
}

impl ChannelStorage {
    /// Create a store and the receiver its messages arrive on
    pub fn new() -> (Self, mpsc::Receiver<StoredMessage>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl Storage for ChannelStorage {
    fn put(&self, name: &str, content: &[u8]) -> Result<(), StorageError> {
        let message = StoredMessage {
            name: name.to_owned(),
            content: content.to_vec(),
        };
        self.sender
            .send(message)
            .map_err(|_| StorageError::Unavailable("receiver dropped".to_owned()))
    }
}
