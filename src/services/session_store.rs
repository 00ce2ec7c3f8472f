use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tokio::sync::Mutex;
use validator::Validate;

use crate::core::address::validate_field;
use crate::models::Session;

/// Persisted session record, schema-validated on every read
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[validate(custom(function = "validate_field"))]
    pub address: String,
    #[validate(length(min = 1))]
    pub chain_id: String,
    pub connected: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        Self {
            address: session.address.clone(),
            chain_id: session.chain_id.clone(),
            connected: session.connected,
            created_at: Some(session.created_at),
        }
    }
}

impl PersistedSession {
    /// Parse and validate a raw payload
    pub fn parse(raw: &str) -> Result<Self, String> {
        let record: PersistedSession =
            serde_json::from_str(raw).map_err(|e| format!("unparsable record: {}", e))?;
        record.validate().map_err(|e| format!("invalid record: {}", e))?;
        if !record.connected {
            return Err("record is not marked connected".to_string());
        }
        Ok(record)
    }

    pub fn into_session(self) -> Session {
        let mut session = Session::new(self.address, self.chain_id);
        if let Some(created_at) = self.created_at {
            session.created_at = created_at;
        }
        session
    }
}

/// Raw storage for the single persisted session slot
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> io::Result<Option<String>>;
    async fn save(&self, payload: &str) -> io::Result<()>;
    async fn clear(&self) -> io::Result<()>;
}

/// Session slot kept in a JSON file
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            // Non-UTF-8 bytes are corruption, not an I/O failure
            Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(Some(String::new())),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, payload: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, payload).await
    }

    async fn clear(&self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// In-process session slot
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the slot, e.g. with a payload written by an earlier run
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(payload.into())),
        }
    }

    pub async fn peek(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> io::Result<Option<String>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, payload: &str) -> io::Result<()> {
        *self.slot.lock().await = Some(payload.to_string());
        Ok(())
    }

    async fn clear(&self) -> io::Result<()> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1111";

    #[test]
    fn test_parse_valid_record() {
        let raw = format!(r#"{{"address":"{}","chainId":"1","connected":true}}"#, ADDR);
        let record = PersistedSession::parse(&raw).unwrap();
        assert_eq!(record.address, ADDR);
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_parse_rejects_corruption() {
        assert!(PersistedSession::parse("{not json").is_err());
        assert!(PersistedSession::parse("").is_err());
        assert!(PersistedSession::parse(r#"{"address":"0x12","chainId":"1","connected":true}"#).is_err());
        let empty_chain = format!(r#"{{"address":"{}","chainId":"","connected":true}}"#, ADDR);
        assert!(PersistedSession::parse(&empty_chain).is_err());
        let logged_out = format!(r#"{{"address":"{}","chainId":"1","connected":false}}"#, ADDR);
        assert!(PersistedSession::parse(&logged_out).is_err());
    }

    #[test]
    fn test_record_keeps_creation_time() {
        let session = Session::new(ADDR.to_string(), "1".to_string());
        let raw = serde_json::to_string(&PersistedSession::from(&session)).unwrap();
        assert!(raw.contains("\"chainId\""));

        let restored = PersistedSession::parse(&raw).unwrap().into_session();
        assert_eq!(restored.created_at, session.created_at);
        assert_eq!(restored.address, session.address);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let path = std::env::temp_dir().join(format!("crush-session-{}.json", uuid::Uuid::new_v4()));
        let store = FileSessionStore::new(&path);

        assert_eq!(store.load().await.unwrap(), None);
        store.save("{}").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("{}"));
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
