use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Principal;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Version stamp written into the persisted envelope
const PERSIST_VERSION: u32 = 0;

/// In-memory authentication state.
///
/// Invariant: `authenticated` is true if and only if both `principal` and
/// `token` are present. The whole triple is always replaced as one unit;
/// no mutation leaves the fields inconsistent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub principal: Option<Principal>,
    pub token: Option<String>,
    pub authenticated: bool,
}

impl Session {
    /// An authenticated session for the given identity and token.
    pub fn authenticated(principal: Principal, token: String) -> Self {
        Self {
            principal: Some(principal),
            token: Some(token),
            authenticated: true,
        }
    }

    /// The logged-out state.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.authenticated && self.principal.is_none() && self.token.is_none()
    }

    fn holds_invariant(&self) -> bool {
        self.authenticated == (self.principal.is_some() && self.token.is_some())
    }
}

/// Serialized subset of [`Session`] written to durable storage.
///
/// Transient flags (loading, error) are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub state: PersistedState,
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub user: Option<Principal>,
    pub token: Option<String>,
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
}

impl PersistedSession {
    pub fn from_session(session: &Session) -> Self {
        Self {
            state: PersistedState {
                user: session.principal.clone(),
                token: session.token.clone(),
                is_authenticated: session.authenticated,
            },
            version: PERSIST_VERSION,
        }
    }

    /// Rehydrate into a [`Session`], falling back to the empty session when
    /// the record violates the session invariant.
    pub fn into_session(self) -> Session {
        let session = Session {
            principal: self.state.user,
            token: self.state.token,
            authenticated: self.state.is_authenticated,
        };
        if session.holds_invariant() {
            session
        } else {
            warn!("persisted session is inconsistent; discarding");
            Session::empty()
        }
    }
}

/// Durable storage for the session record.
///
/// One file in the data directory, written on every session mutation and
/// read once at startup.
pub struct SessionFile {
    dir: PathBuf,
}

impl SessionFile {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Load the persisted session from disk, if any.
    pub fn load(&self) -> Result<Option<Session>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read session file")?;
        let persisted: PersistedSession = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;
        Ok(Some(persisted.into_session()))
    }

    /// Save the session to disk.
    pub fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&PersistedSession::from_session(session))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}
