use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::token::{AccessToken, UserInfo};

/// Persistence backend for the credential store.
///
/// Implementations must tolerate concurrent callers; the credential store
/// invokes them while holding its own token lock, but nothing stops other
/// components from reading the persisted session directly.
pub trait TokenStore: Send + Sync {
    /// Load the persisted session, if any. A missing document is `Ok(None)`,
    /// a present-but-unreadable one is an error.
    fn load(&self) -> AuthResult<Option<AccessToken>>;

    /// Persist the session, replacing any previous document.
    fn save(&self, token: &AccessToken) -> AuthResult<()>;

    /// Remove the persisted session. Clearing an absent document succeeds.
    fn clear(&self) -> AuthResult<()>;
}

/// On-disk session document. Field names are fixed: other tooling reads the
/// same file, so renames here are wire-format changes.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
    #[serde(rename = "expiresAt")]
    expires_at: DateTime<Utc>,
    #[serde(rename = "userInfo", skip_serializing_if = "Option::is_none")]
    user_info: Option<UserInfo>,
}

impl From<&AccessToken> for PersistedSession {
    fn from(token: &AccessToken) -> Self {
        PersistedSession {
            token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_at,
            user_info: token.user.clone(),
        }
    }
}

impl From<PersistedSession> for AccessToken {
    fn from(doc: PersistedSession) -> Self {
        AccessToken {
            access_token: doc.token,
            refresh_token: doc.refresh_token,
            expires_at: doc.expires_at,
            user: doc.user_info,
        }
    }
}

/// File-backed token store keeping the session as a single JSON document.
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTokenStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> AuthResult<Option<AccessToken>> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| AuthError::storage(format!("read {}: {e}", self.path.display())))?;
        let doc: PersistedSession = serde_json::from_str(&raw)
            .map_err(|e| AuthError::storage(format!("parse {}: {e}", self.path.display())))?;
        Ok(Some(doc.into()))
    }

    fn save(&self, token: &AccessToken) -> AuthResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AuthError::storage(format!("create {}: {e}", parent.display())))?;
        }
        let doc = PersistedSession::from(token);
        let raw = serde_json::to_string_pretty(&doc)
            .map_err(|e| AuthError::storage(format!("serialize session: {e}")))?;
        fs::write(&self.path, raw)
            .map_err(|e| AuthError::storage(format!("write {}: {e}", self.path.display())))?;
        debug!("Persisted session to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> AuthResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| AuthError::storage(format!("remove {}: {e}", self.path.display())))?;
        }
        Ok(())
    }
}

/// In-memory token store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<AccessToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> AuthResult<Option<AccessToken>> {
        let guard = self.token.lock().unwrap_or_else(|p| p.into_inner());
        Ok(guard.clone())
    }

    fn save(&self, token: &AccessToken) -> AuthResult<()> {
        let mut guard = self.token.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> AuthResult<()> {
        let mut guard = self.token.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
        Ok(())
    }
}
