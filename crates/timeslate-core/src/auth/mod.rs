//! Authentication module for session lifecycle management.
//!
//! This module provides:
//! - `SessionService`: single source of truth for the current session,
//!   with login/register/logout, identity updates, and durable persistence
//! - `SessionGuard`: gates a protected view tree and drives the periodic
//!   freshness loop
//! - `RefreshCoordinator`: unattended renewal policy for elevated sessions
//! - `CredentialStore`: secure OS-level credential storage via keyring
//! - `token`: unverified claim decoding for freshness estimates
//!
//! The session is persisted to disk on every mutation and rehydrated once
//! at startup.

pub mod credentials;
pub mod guard;
pub mod refresh;
pub mod service;
pub mod session;
pub mod token;

pub use credentials::CredentialStore;
pub use guard::{GuardState, SessionGuard, DEFAULT_CHECK_INTERVAL};
pub use refresh::{RefreshCoordinator, ServiceAccount};
pub use service::SessionService;
pub use session::{PersistedSession, Session, SessionFile};
