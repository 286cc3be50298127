use tracing::{debug, warn};

use crate::auth::credentials::CredentialStore;
use crate::auth::service::SessionService;
use crate::config::Config;

/// Operator identity used for unattended re-authentication.
#[derive(Debug, Clone)]
pub struct ServiceAccount {
    pub username: String,
    pub password: String,
}

/// Decides whether and how to renew a session before it becomes unusable.
///
/// The backend exposes no refresh-token endpoint, so renewal is a full
/// re-authentication with a service account; only elevated principals are
/// eligible, everyone else re-enters the interactive login flow when their
/// token runs out. Known limitation: the client has to hold an operator
/// credential for this to work at all. The secret is never compiled in -
/// it comes from the config file or the OS keychain.
pub struct RefreshCoordinator {
    account: Option<ServiceAccount>,
}

impl RefreshCoordinator {
    pub fn new(account: Option<ServiceAccount>) -> Self {
        Self { account }
    }

    /// Resolve the service account from config, falling back to the OS
    /// keychain for the secret.
    pub fn from_config(config: &Config) -> Self {
        let account = config.service_username.as_ref().and_then(|username| {
            let password = config
                .service_password
                .clone()
                .or_else(|| CredentialStore::get_password(username).ok());
            match password {
                Some(password) => Some(ServiceAccount {
                    username: username.clone(),
                    password,
                }),
                None => {
                    warn!(%username, "no secret found for service account");
                    None
                }
            }
        });
        Self::new(account)
    }

    /// Attempt to renew the current session's token.
    ///
    /// Returns false without a network call when nobody is logged in or the
    /// principal is not eligible for unattended renewal. On success only
    /// the token field changes; on failure the session is left untouched -
    /// logging out is the caller's decision, not this coordinator's.
    pub(crate) async fn refresh_if_needed(&self, service: &SessionService) -> bool {
        let session = service.current();
        if !session.authenticated {
            return false;
        }
        let principal = match session.principal {
            Some(principal) => principal,
            None => return false,
        };
        if !principal.is_elevated() {
            debug!("principal not eligible for unattended renewal");
            return false;
        }
        let account = match &self.account {
            Some(account) => account,
            None => {
                warn!("no service account configured; cannot renew session");
                return false;
            }
        };

        let epoch = service.epoch();
        match service.authenticate(&account.username, &account.password).await {
            Ok(token_response) => {
                service.apply_refreshed_token(epoch, token_response.access_token)
            }
            Err(e) => {
                warn!(error = %e, "session renewal failed");
                false
            }
        }
    }
}
