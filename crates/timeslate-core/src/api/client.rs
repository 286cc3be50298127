//! API client for the timetable service.
//!
//! Every outbound call reads the current session at call time, so one
//! client serves the whole login/logout lifecycle. Authorization failures
//! funnel into `SessionService::logout` before the error reaches the
//! caller.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::auth::SessionService;
use crate::config::Config;
use crate::models::{Principal, ScheduleEntry, Timetable};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum concurrent requests when expanding timetables with entries.
const MAX_CONCURRENT_REQUESTS: usize = 10;

/// Authenticated client for the timetable API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionService>,
}

impl ApiClient {
    /// Create a client bound to the given session service.
    ///
    /// The session service is explicit construction-time wiring rather than
    /// a global hook, so independent clients (and tests) never interfere.
    pub fn new(config: &Config, session: Arc<SessionService>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            session,
        })
    }

    /// Build a request for `path`, attaching `Bearer <token>` when the
    /// session is authenticated right now.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.request(method, url);
        let session = self.session.current();
        if session.authenticated {
            if let Some(token) = session.token {
                return request.bearer_auth(token);
            }
        }
        request
    }

    /// Check a response: Ok(Some) for success, Ok(None) for a rate limit
    /// (caller retries), Err otherwise. An unauthorized status clears the
    /// session before the error propagates unchanged to the caller.
    async fn check_response(
        &self,
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        if status.as_u16() == 429 {
            return Ok(None);
        }
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 401 {
            warn!("unauthorized response; clearing session");
            self.session.logout();
        }
        Err(ApiError::from_status(status, &body).into())
    }

    /// GET a JSON resource relative to the API root.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .request(Method::GET, path)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", path))?;

            match self.check_response(response).await? {
                Some(response) => {
                    return response.json().await
                        .with_context(|| format!("Failed to parse JSON response from {}", path));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(path, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    /// POST a JSON body and parse a JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .request(Method::POST, path)
                .json(body)
                .send()
                .await
                .with_context(|| format!("Failed to send POST request to {}", path))?;

            match self.check_response(response).await? {
                Some(response) => {
                    return response.json().await
                        .with_context(|| format!("Failed to parse JSON response from {}", path));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(path, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch the identity record for the current session. Pair with
    /// `SessionService::set_principal` to refresh identity data without
    /// re-issuing a token.
    pub async fn fetch_principal(&self) -> Result<Principal> {
        self.get("/users/me").await
    }

    /// Fetch all timetables visible to the current principal.
    pub async fn fetch_timetables(&self) -> Result<Vec<Timetable>> {
        self.get("/timetables").await
    }

    /// Fetch the scheduled entries of one timetable.
    pub async fn fetch_timetable_entries(&self, timetable_id: i64) -> Result<Vec<ScheduleEntry>> {
        let path = format!("/timetables/{}/entries", timetable_id);
        self.get(&path).await
    }

    /// Fetch all timetables and expand each with its entries, limiting
    /// parallel requests to stay polite to the server.
    pub async fn fetch_timetables_with_entries(
        &self,
    ) -> Result<Vec<(Timetable, Vec<ScheduleEntry>)>> {
        let timetables = self.fetch_timetables().await?;

        let results: Vec<(Timetable, Result<Vec<ScheduleEntry>>)> = stream::iter(timetables)
            .map(|timetable| async move {
                let entries = self.fetch_timetable_entries(timetable.id).await;
                (timetable, entries)
            })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        let mut expanded = Vec::with_capacity(results.len());
        for (timetable, entries) in results {
            let entries = entries
                .with_context(|| format!("Failed to fetch entries for timetable {}", timetable.id))?;
            expanded.push((timetable, entries));
        }
        Ok(expanded)
    }
}
