//! Persisted connection history: recently used connections and connections
//! saved under a name.
//!
//! Stored as a JSON object `{"recent": [...], "saved": {...}}` where each
//! entry is `{"uri": ..., "bind_dn": ..., "password": ...?}`.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::HistoryError;

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionData {
    pub uri: String,
    pub bind_dn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ConnectionData {
    pub fn new(uri: impl Into<String>, bind_dn: impl Into<String>, password: Option<String>) -> Self {
        Self {
            uri: uri.into(),
            bind_dn: bind_dn.into(),
            password,
        }
    }
}

/// Recent connections, most recent first, and named connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStore {
    recent: Vec<ConnectionData>,
    saved: BTreeMap<String, ConnectionData>,
    #[serde(skip, default = "default_max_recent")]
    max_recent: usize,
}

fn default_max_recent() -> usize {
    20
}

impl Default for ConnectionStore {
    fn default() -> Self {
        Self::new(default_max_recent())
    }
}

impl ConnectionStore {
    /// An empty store remembering at most `max_recent` recent connections.
    pub fn new(max_recent: usize) -> Self {
        Self {
            recent: Vec::new(),
            saved: BTreeMap::new(),
            max_recent,
        }
    }

    /// Parse the JSON form of a store.
    pub fn from_json(json: &str, max_recent: usize) -> Result<Self, HistoryError> {
        let mut store: Self = serde_json::from_str(json).map_err(|e| HistoryError::Syntax {
            message: e.to_string(),
        })?;
        store.max_recent = max_recent;
        store.recent.truncate(max_recent);
        Ok(store)
    }

    /// Read the store at `path`. A missing file gives an empty store.
    pub fn load(path: &Path, max_recent: usize) -> Result<Self, HistoryError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "No connection history, starting empty");
                return Ok(Self::new(max_recent));
            }
            Err(source) => {
                return Err(HistoryError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        debug!(path = %path.display(), "Loading connection history");
        Self::from_json(&raw, max_recent)
    }

    /// Write the store to `path` as pretty JSON.
    ///
    /// Writes a temporary file next to `path` and renames it over the target.
    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        let io_error = |source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io_error(io::Error::other(e)))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(io_error)?;
        std::fs::rename(&tmp_path, path).map_err(io_error)?;
        debug!(path = %path.display(), recent = self.recent.len(), saved = self.saved.len(), "Saved connection history");
        Ok(())
    }

    /// Remember `data` as the most recent connection.
    ///
    /// Reconnecting with the same data as last time leaves the list unchanged.
    pub fn add_recent(&mut self, data: ConnectionData) {
        if self.recent.first() == Some(&data) {
            return;
        }
        self.recent.insert(0, data);
        self.recent.truncate(self.max_recent);
    }

    /// The `index`-th most recent connection, counting from zero.
    pub fn recent_connection(&self, index: usize) -> Result<&ConnectionData, HistoryError> {
        self.recent
            .get(index)
            .ok_or(HistoryError::NoSuchRecent { index })
    }

    /// Up to `limit` recent connections, or all of them.
    pub fn recent_connections(&self, limit: Option<usize>) -> &[ConnectionData] {
        match limit {
            Some(limit) => &self.recent[..limit.min(self.recent.len())],
            None => &self.recent,
        }
    }

    pub fn save_connection(&mut self, name: impl Into<String>, data: ConnectionData) {
        self.saved.insert(name.into(), data);
    }

    pub fn remove_connection(&mut self, name: &str) -> Result<ConnectionData, HistoryError> {
        self.saved.remove(name).ok_or_else(|| HistoryError::NoSuchSaved {
            name: name.to_string(),
        })
    }

    pub fn connection(&self, name: &str) -> Result<&ConnectionData, HistoryError> {
        self.saved.get(name).ok_or_else(|| HistoryError::NoSuchSaved {
            name: name.to_string(),
        })
    }

    pub fn connections(&self) -> &BTreeMap<String, ConnectionData> {
        &self.saved
    }
}
