use crate::errors::Result;
use crate::models::Session;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use tokio::{fs, sync::Mutex};
use tracing::{error, info, warn};

pub const ADMIN_SESSION_KEY: &str = "bader_admin_session";
pub const MEMBER_SESSION_KEY: &str = "bader_session";

/// Key/value persistence standing in for browser local storage.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl StorageProvider for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&staging, value).await?;
        fs::rename(&staging, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Persisted session plus the in-memory copy the gateway authenticates with.
///
/// Each application stores one record under its own key. The identity lives
/// under `admin` for the console and `user` for the member client; only the
/// member client carries a `customer_id`.
pub struct SessionStore {
    provider: Arc<dyn StorageProvider>,
    key: &'static str,
    identity_field: &'static str,
    current: Mutex<Option<Session>>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn StorageProvider>, key: &'static str, identity_field: &'static str) -> Self {
        Self {
            provider,
            key,
            identity_field,
            current: Mutex::new(None),
        }
    }

    pub fn admin(provider: Arc<dyn StorageProvider>) -> Self {
        Self::new(provider, ADMIN_SESSION_KEY, "admin")
    }

    pub fn member(provider: Arc<dyn StorageProvider>) -> Self {
        Self::new(provider, MEMBER_SESSION_KEY, "user")
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }

    /// Loads the persisted session. Unreadable or malformed records are
    /// dropped from storage and treated as signed out.
    pub async fn restore(&self) -> Option<Session> {
        let raw = match self.provider.get(self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                error!("failed to read session {}: {err}", self.key);
                return None;
            }
        };

        match decode_session(&raw, self.identity_field) {
            Some(session) => {
                info!("restored session from {}", self.key);
                *self.current.lock().await = Some(session.clone());
                Some(session)
            }
            None => {
                warn!("discarding malformed session record {}", self.key);
                if let Err(err) = self.provider.remove(self.key).await {
                    error!("failed to remove session {}: {err}", self.key);
                }
                *self.current.lock().await = None;
                None
            }
        }
    }

    pub async fn persist(&self, session: Session) -> Result<()> {
        let payload = encode_session(&session, self.identity_field);
        self.provider.set(self.key, &payload).await?;
        *self.current.lock().await = Some(session);
        Ok(())
    }

    pub async fn clear(&self) {
        *self.current.lock().await = None;
        if let Err(err) = self.provider.remove(self.key).await {
            error!("failed to remove session {}: {err}", self.key);
        }
        info!("session {} cleared", self.key);
    }
}

fn encode_session(session: &Session, identity_field: &str) -> String {
    let mut record = Map::new();
    record.insert("token".to_string(), Value::String(session.token.clone()));
    record.insert(identity_field.to_string(), session.identity.clone());
    if let Some(tenant_id) = &session.tenant_id {
        record.insert("customer_id".to_string(), Value::String(tenant_id.clone()));
    }
    Value::Object(record).to_string()
}

fn decode_session(raw: &str, identity_field: &str) -> Option<Session> {
    let Value::Object(mut record) = serde_json::from_str::<Value>(raw).ok()? else {
        return None;
    };
    let token = match record.remove("token")? {
        Value::String(token) if !token.is_empty() => token,
        _ => return None,
    };
    let identity = record.remove(identity_field).unwrap_or(Value::Null);
    let tenant_id = match record.remove("customer_id") {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };
    Some(Session::new(token, identity, tenant_id))
}
