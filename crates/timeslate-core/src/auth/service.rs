use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{header, Client};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::auth::refresh::RefreshCoordinator;
use crate::auth::session::{Session, SessionFile};
use crate::auth::token;
use crate::config::Config;
use crate::models::{Principal, TokenResponse};
use crate::utils::truncate_bytes;

/// HTTP request timeout in seconds for auth endpoints.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// The credential hasher on the server rejects secrets longer than 72 bytes,
/// so secrets are trimmed client-side on a character boundary.
const MAX_PASSWORD_BYTES: usize = 72;

/// Single source of truth for the current session.
///
/// All session mutations go through this service: login, logout, identity
/// updates, and token renewal. State lives in a `watch` channel, so every
/// mutation is one whole-value assignment and consumers observe changes via
/// [`SessionService::subscribe`]. The serializable subset is written to
/// durable storage synchronously after each mutation and read back once at
/// construction.
pub struct SessionService {
    http: Client,
    base_url: String,
    state: watch::Sender<Session>,
    storage: SessionFile,
    refresh: RefreshCoordinator,
    /// Bumped on logout; in-flight login/renewal results from an older
    /// epoch are discarded instead of resurrecting a cleared session.
    epoch: AtomicU64,
}

impl SessionService {
    /// Create the service with session storage under the platform data dir.
    pub fn new(config: &Config) -> Result<Self> {
        let storage = SessionFile::new(Config::data_dir()?);
        Self::with_storage(config, storage)
    }

    /// Create the service with explicit session storage.
    pub fn with_storage(config: &Config, storage: SessionFile) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let initial = match storage.load() {
            Ok(Some(session)) => {
                debug!(authenticated = session.authenticated, "restored persisted session");
                session
            }
            Ok(None) => Session::empty(),
            Err(e) => {
                warn!(error = %e, "failed to load persisted session; starting logged out");
                Session::empty()
            }
        };
        let (state, _) = watch::channel(initial);

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            state,
            storage,
            refresh: RefreshCoordinator::from_config(config),
            epoch: AtomicU64::new(0),
        })
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Observe session changes. Every mutation notifies all receivers.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Exchange credentials for a token, fetch the identity record, and
    /// commit the authenticated session.
    ///
    /// Returns false on any failure along the way (bad credentials, network
    /// error, identity fetch failure) with the session left untouched.
    /// Never raises.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        let epoch = self.epoch();

        let token_response = match self.authenticate(username, password).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "authentication failed");
                return false;
            }
        };

        let principal = match self
            .fetch_principal(&token_response.token_type, &token_response.access_token)
            .await
        {
            Ok(principal) => principal,
            Err(e) => {
                warn!(error = %e, "identity fetch after authentication failed");
                return false;
            }
        };

        let committed = self.commit_if_current(
            epoch,
            Session::authenticated(principal, token_response.access_token),
        );
        if committed {
            info!(username, "logged in");
        } else {
            debug!("session cleared while login was in flight; result discarded");
        }
        committed
    }

    /// Register a new account, then log in with it.
    ///
    /// Unlike [`SessionService::login`], a registration failure surfaces as
    /// an error carrying the server's message.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<bool> {
        let url = format!("{}/auth/register", self.base_url);
        let password = truncate_bytes(password, MAX_PASSWORD_BYTES);
        let body = serde_json::json!({
            "name": name,
            "email": email,
            "password": password,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send registration request")?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{}", extract_server_message(&body));
        }

        Ok(self.login(email, password).await)
    }

    /// Reset the session to empty and persist the cleared record.
    ///
    /// Idempotent: concurrent callers (for example several unauthorized
    /// responses landing together) clear and persist exactly once.
    pub fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let cleared = self.state.send_if_modified(|session| {
            if session.is_empty() {
                return false;
            }
            *session = Session::empty();
            true
        });
        if cleared {
            self.persist();
            info!("session cleared");
        }
    }

    /// Replace the identity record only, leaving the token untouched.
    /// Used when identity data is refreshed independently of token issuance.
    pub fn set_principal(&self, principal: Principal) {
        self.state.send_modify(|session| session.principal = Some(principal));
        self.persist();
    }

    /// Whether the current token is expiring soon (or absent).
    pub fn check_token_expiration(&self) -> bool {
        let current_token = self.state.borrow().token.clone();
        match current_token {
            Some(tok) => token::is_expiring_soon(&tok, token::DEFAULT_EXPIRY_THRESHOLD_SECS),
            None => true,
        }
    }

    /// Attempt unattended renewal of the session token.
    pub async fn refresh_token_if_needed(&self) -> bool {
        self.refresh.refresh_if_needed(self).await
    }

    /// Exchange credentials at the credential endpoint.
    pub(crate) async fn authenticate(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let url = format!("{}/auth/login", self.base_url);
        let password = truncate_bytes(password, MAX_PASSWORD_BYTES);

        let response = self
            .http
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .context("Failed to send login request")?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .context("Failed to parse token response")
    }

    /// Fetch the identity record using the freshly issued token, honoring
    /// the token type the credential endpoint reported.
    async fn fetch_principal(&self, token_type: &str, access_token: &str) -> Result<Principal> {
        let url = format!("{}/users/me", self.base_url);

        let response = self
            .http
            .get(&url)
            .header(
                header::AUTHORIZATION,
                format!("{} {}", token_type, access_token),
            )
            .send()
            .await
            .context("Failed to send identity request")?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .context("Failed to parse identity response")
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Swap in a renewed token, leaving principal and authenticated flag
    /// untouched. Refuses when a logout happened after `epoch` or the
    /// session is no longer authenticated.
    pub(crate) fn apply_refreshed_token(&self, epoch: u64, access_token: String) -> bool {
        let applied = self.state.send_if_modified(|session| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            if !session.authenticated {
                return false;
            }
            session.token = Some(access_token);
            true
        });
        if applied {
            self.persist();
            debug!("session token renewed");
        }
        applied
    }

    /// Commit a whole-session replacement unless a logout happened after
    /// `epoch` was read.
    fn commit_if_current(&self, epoch: u64, next: Session) -> bool {
        let committed = self.state.send_if_modified(|session| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            *session = next;
            true
        });
        if committed {
            self.persist();
        }
        committed
    }

    /// Write the serializable subset to durable storage. Persistence
    /// failures are logged and never fail the mutation that triggered them.
    fn persist(&self) {
        let snapshot = self.state.borrow().clone();
        if let Err(e) = self.storage.save(&snapshot) {
            warn!(error = %e, "failed to persist session");
        }
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }
}

/// Pull a human-readable message out of a structured error payload,
/// checking `message`, then `detail`, then falling back to a generic
/// message.
fn extract_server_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
        if let Some(detail) = value.get("detail").and_then(|v| v.as_str()) {
            return detail.to_string();
        }
    }
    "registration failed".to_string()
}
