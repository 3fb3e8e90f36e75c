//! Session Records and Stores
//!
//! A `SessionRecord` is the per-user coaching state the decision policy reads.
//! Stores hand out a default record for unknown users instead of failing, and
//! only the tool collaborators write records back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// The stored coaching state for one user.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    /// Unique key into the store.
    pub user_id: String,
    /// The exercise most recently assigned, if any.
    #[serde(default)]
    pub last_exercise: Option<String>,
    /// Completion feedback reported by the user, if any.
    #[serde(default)]
    pub feedback: Option<String>,
    /// Reminders sent since the current exercise was assigned.
    #[serde(default)]
    pub reminders_sent: u32,
    /// When the current exercise was assigned. Informational only.
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Creates an empty record for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// A user id that cannot be used as a store key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid user id: {0:?}")]
pub struct InvalidUserId(pub String);

/// Checks that `user_id` is usable as a store key. Blank ids are rejected.
pub fn validate_user_id(user_id: &str) -> Result<&str, InvalidUserId> {
    if user_id.trim().is_empty() {
        return Err(InvalidUserId(user_id.to_string()));
    }
    Ok(user_id)
}

/// Read/write contract for per-user session state.
///
/// Implementations reject blank user ids with [`InvalidUserId`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the record for `user_id`, creating a default one if none exists.
    async fn get(&self, user_id: &str) -> Result<SessionRecord>;

    /// Inserts or replaces the record keyed by `record.user_id`.
    async fn put(&self, record: SessionRecord) -> Result<()>;

    /// Removes the record for `user_id`. Removing an unknown user is a no-op.
    async fn remove(&self, user_id: &str) -> Result<()>;
}

/// A process-local store backed by a `HashMap`.
#[derive(Default)]
pub struct InMemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &str) -> Result<SessionRecord> {
        validate_user_id(user_id)?;
        let mut records = self.records.lock().await;
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| SessionRecord::new(user_id));
        Ok(record.clone())
    }

    async fn put(&self, record: SessionRecord) -> Result<()> {
        validate_user_id(&record.user_id)?;
        self.records
            .lock()
            .await
            .insert(record.user_id.clone(), record);
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> Result<()> {
        validate_user_id(user_id)?;
        self.records.lock().await.remove(user_id);
        Ok(())
    }
}

/// A store that keeps every record in a single JSON file.
///
/// The whole map is loaded when the store is opened and rewritten after each
/// mutation. Lookups that create a default record are persisted as well, so the
/// file reflects every user the coach has seen.
pub struct JsonFileSessionStore {
    path: PathBuf,
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl JsonFileSessionStore {
    /// Opens the store at `path`. A missing file is treated as an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse session file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read session file {}", path.display()));
            }
        };
        debug!(path = %path.display(), users = records.len(), "Opened session file");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, records: &HashMap<String, SessionRecord>) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        // Replace the file atomically so a crash never leaves it half written.
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("Failed to write session file {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace session file {}", self.path.display()))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "sessions.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn get(&self, user_id: &str) -> Result<SessionRecord> {
        validate_user_id(user_id)?;
        let mut records = self.records.lock().await;
        if let Some(record) = records.get(user_id) {
            return Ok(record.clone());
        }
        let record = SessionRecord::new(user_id);
        records.insert(user_id.to_string(), record.clone());
        self.flush(&records).await?;
        Ok(record)
    }

    async fn put(&self, record: SessionRecord) -> Result<()> {
        validate_user_id(&record.user_id)?;
        let mut records = self.records.lock().await;
        records.insert(record.user_id.clone(), record);
        self.flush(&records).await
    }

    async fn remove(&self, user_id: &str) -> Result<()> {
        validate_user_id(user_id)?;
        let mut records = self.records.lock().await;
        if records.remove(user_id).is_some() {
            self.flush(&records).await?;
        }
        Ok(())
    }
}
