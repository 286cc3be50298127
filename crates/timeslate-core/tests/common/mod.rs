//! Shared test harness: an in-process timetable API on an ephemeral
//! 127.0.0.1 port, with counters and recorded headers the tests assert on.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use timeslate_core::auth::{SessionFile, SessionService};
use timeslate_core::Config;

pub const USER_EMAIL: &str = "dean@example.edu";
pub const USER_PASSWORD: &str = "orchard-gate";
pub const SERVICE_USERNAME: &str = "scheduler-bot";
pub const SERVICE_PASSWORD: &str = "service-secret";
/// Account for which the server accepts any password (used to observe what
/// actually arrives on the wire).
pub const ANY_PASSWORD_USER: &str = "longpass@example.edu";
pub const TAKEN_EMAIL: &str = "taken@example.edu";

/// Server-side knobs and observations shared with the test body.
pub struct MockApi {
    /// Credential-endpoint hits.
    pub login_calls: AtomicUsize,
    /// Passwords received by the credential endpoint, in order.
    pub passwords: Mutex<Vec<String>>,
    /// Authorization headers observed on /timetables, in order.
    pub timetable_auth_headers: Mutex<Vec<Option<String>>>,
    /// Whether issued tokens should expire within the freshness threshold.
    pub issue_short_lived: AtomicBool,
    /// Whether /users/me reports an elevated principal.
    pub principal_is_admin: AtomicBool,
    /// Serial baked into each issued token so renewals are observable.
    pub token_serial: AtomicUsize,
    /// Accounts created through the registration endpoint.
    pub registered: Mutex<Vec<(String, String)>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            login_calls: AtomicUsize::new(0),
            passwords: Mutex::new(Vec::new()),
            timetable_auth_headers: Mutex::new(Vec::new()),
            issue_short_lived: AtomicBool::new(false),
            principal_is_admin: AtomicBool::new(false),
            token_serial: AtomicUsize::new(0),
            registered: Mutex::new(Vec::new()),
        })
    }
}

/// Build a three-segment token with the given expiry and serial.
pub fn make_token(exp: i64, serial: usize) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{}","exp":{}}}"#, serial, exp));
    format!("{}.{}.sig{}", header, payload, serial)
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login_handler(
    State(api): State<Arc<MockApi>>,
    Form(form): Form<LoginForm>,
) -> (StatusCode, Json<Value>) {
    api.login_calls.fetch_add(1, Ordering::SeqCst);
    api.passwords.lock().unwrap().push(form.password.clone());

    let registered = api
        .registered
        .lock()
        .unwrap()
        .iter()
        .any(|(email, password)| *email == form.username && *password == form.password);
    let valid = registered
        || (form.username == USER_EMAIL && form.password == USER_PASSWORD)
        || (form.username == SERVICE_USERNAME && form.password == SERVICE_PASSWORD)
        || form.username == ANY_PASSWORD_USER;

    if !valid {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "incorrect username or password"})),
        );
    }

    let serial = api.token_serial.fetch_add(1, Ordering::SeqCst);
    let lifetime = if api.issue_short_lived.load(Ordering::SeqCst) {
        3_600
    } else {
        14 * 86_400
    };
    let exp = chrono::Utc::now().timestamp() + lifetime;
    (
        StatusCode::OK,
        Json(json!({
            "access_token": make_token(exp, serial),
            "token_type": "bearer",
        })),
    )
}

async fn register_handler(
    State(api): State<Arc<MockApi>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    if email == TAKEN_EMAIL {
        return (
            StatusCode::CONFLICT,
            Json(json!({"detail": "email already registered"})),
        );
    }
    api.registered.lock().unwrap().push((email, password));
    (StatusCode::CREATED, Json(json!({"id": 99})))
}

async fn me_handler(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().starts_with("bearer "))
        .unwrap_or(false);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "not authenticated"})),
        );
    }
    let is_admin = api.principal_is_admin.load(Ordering::SeqCst);
    (
        StatusCode::OK,
        Json(json!({
            "id": 42,
            "email": USER_EMAIL,
            "displayName": "Dean",
            "fullName": "Dean Example",
            "isActive": true,
            "isAdmin": is_admin,
            "role": if is_admin { "Admin" } else { "student" },
        })),
    )
}

async fn timetables_handler(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    api.timetable_auth_headers.lock().unwrap().push(auth);
    Json(json!([
        {"id": 1, "name": "Autumn plan", "semester": "2026-1", "updatedAt": null}
    ]))
}

async fn entries_handler(Path(timetable_id): Path<i64>) -> Json<Value> {
    Json(json!([
        {
            "id": timetable_id * 10,
            "courseName": "Algorithms",
            "room": "B204",
            "dayOfWeek": 0,
            "startsAt": "09:00",
            "endsAt": "10:30",
        }
    ]))
}

async fn protected_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Could not validate credentials"})),
    )
}

fn router(api: Arc<MockApi>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/users/me", get(me_handler))
        .route("/api/timetables", get(timetables_handler))
        .route("/api/timetables/{id}/entries", get(entries_handler))
        .route("/api/protected", get(protected_handler))
        .with_state(api)
}

/// Start the mock API on an ephemeral localhost port. The server task dies
/// with the test runtime.
pub async fn spawn_mock(api: Arc<MockApi>) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    let app = router(api);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock api");
    });
    (addr, handle)
}

/// Config pointed at the mock API.
pub fn test_config(addr: SocketAddr) -> Config {
    Config {
        api_base_url: format!("http://{}/api", addr),
        service_username: None,
        service_password: None,
        last_username: None,
    }
}

/// Session service persisting into the given temp dir.
pub fn test_service(config: &Config, tmp: &TempDir) -> Arc<SessionService> {
    Arc::new(
        SessionService::with_storage(config, SessionFile::new(tmp.path().to_path_buf()))
            .expect("build session service"),
    )
}

/// Path of the persisted session record inside the temp dir.
pub fn session_path(tmp: &TempDir) -> std::path::PathBuf {
    tmp.path().join("session.json")
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .try_init();
}
