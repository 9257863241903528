#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use nextstep_client::auth::{CredentialPair, MemoryCredentialStore};
use nextstep_client::config::ClientConfig;
use nextstep_client::NextStepClient;

pub const EXPIRED_DETAIL: &str = "Given token not valid for any token type";

/// How the mock answers `/auth/refresh/`
#[derive(Debug, Clone)]
pub enum RefreshMode {
    /// Issue `access` (and `refresh` if set). With `accept`, protected routes
    /// start accepting the new token.
    Issue { access: String, refresh: Option<String>, accept: bool },
    /// Answer with this status and a DRF-style error body
    Reject(u16),
    /// 200 with a body that is not JSON
    Garbage,
}

pub struct BackendState {
    valid_access: Mutex<String>,
    refresh_mode: Mutex<RefreshMode>,
    refresh_delay: Mutex<Duration>,
    account_delay: Mutex<Duration>,
    logout_fails: Mutex<bool>,
    refresh_calls: AtomicUsize,
    auth_headers: Mutex<Vec<Option<String>>>,
    refresh_bodies: Mutex<Vec<Value>>,
    requests: Mutex<Vec<String>>,
    last_body: Mutex<Value>,
    last_form: Mutex<Vec<(String, String)>>,
}

impl BackendState {
    fn new() -> Self {
        Self {
            valid_access: Mutex::new("A1".to_string()),
            refresh_mode: Mutex::new(RefreshMode::Issue {
                access: "A2".to_string(),
                refresh: None,
                accept: true,
            }),
            refresh_delay: Mutex::new(Duration::ZERO),
            account_delay: Mutex::new(Duration::ZERO),
            logout_fails: Mutex::new(false),
            refresh_calls: AtomicUsize::new(0),
            auth_headers: Mutex::new(Vec::new()),
            refresh_bodies: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            last_body: Mutex::new(Value::Null),
            last_form: Mutex::new(Vec::new()),
        }
    }

    /// The only access token protected routes accept
    pub fn set_valid_access(&self, token: &str) {
        *self.valid_access.lock().unwrap() = token.to_string();
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    /// Hold `/auth/profile/` responses back. The token is checked after the wait.
    pub fn set_account_delay(&self, delay: Duration) {
        *self.account_delay.lock().unwrap() = delay;
    }

    pub fn set_logout_fails(&self, fails: bool) {
        *self.logout_fails.lock().unwrap() = fails;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Authorization headers seen by protected and public data routes, in order
    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.auth_headers.lock().unwrap().clone()
    }

    pub fn refresh_bodies(&self) -> Vec<Value> {
        self.refresh_bodies.lock().unwrap().clone()
    }

    /// `METHOD path` of every request, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> Value {
        self.last_body.lock().unwrap().clone()
    }

    pub fn last_form(&self) -> Vec<(String, String)> {
        self.last_form.lock().unwrap().clone()
    }

    fn record(&self, request: &str) {
        self.requests.lock().unwrap().push(request.to_string());
    }

    fn record_auth(&self, headers: &HeaderMap) -> Option<String> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth_headers.lock().unwrap().push(header.clone());
        header
    }

    /// Record the header and check it carries the currently valid token
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let header = self.record_auth(headers);
        let expected = format!("Bearer {}", self.valid_access.lock().unwrap());
        if header.as_deref() == Some(expected.as_str()) {
            Ok(())
        } else {
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": EXPIRED_DETAIL, "code": "token_not_valid" })),
            )
                .into_response())
        }
    }
}

type Shared = Arc<BackendState>;

pub struct MockBackend {
    pub base_url: String,
    pub state: Shared,
}

impl MockBackend {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind mock backend")?;

        let state = Arc::new(BackendState::new());
        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}/api", port),
            state,
        })
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_base_url(self.base_url.clone())
    }

    /// Client over an in-memory store, optionally already logged in
    pub fn client(&self, pair: Option<CredentialPair>) -> Result<(NextStepClient, Arc<MemoryCredentialStore>)> {
        self.client_with_config(self.config(), pair)
    }

    /// Another client over an existing store, as two processes sharing one
    /// credentials file would be
    pub fn client_for_store(&self, store: Arc<MemoryCredentialStore>) -> Result<NextStepClient> {
        Ok(NextStepClient::new(self.config(), store)?)
    }

    pub fn client_with_config(
        &self,
        config: ClientConfig,
        pair: Option<CredentialPair>,
    ) -> Result<(NextStepClient, Arc<MemoryCredentialStore>)> {
        let store = Arc::new(match pair {
            Some(pair) => MemoryCredentialStore::with_pair(pair),
            None => MemoryCredentialStore::new(),
        });
        let client = NextStepClient::new(config, store.clone())?;
        Ok((client, store))
    }
}

pub fn pair(access: &str, refresh: Option<&str>) -> CredentialPair {
    CredentialPair::new(access, refresh.map(str::to_string))
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/register/", post(register))
        .route("/api/auth/refresh/", post(refresh))
        .route("/api/auth/logout/", post(logout))
        .route("/api/auth/profile/", get(account))
        .route("/api/auth/password/change/", axum::routing::put(change_password))
        .route("/api/auth/password/reset/", post(password_reset))
        .route("/api/auth/password/reset/confirm/", post(password_reset_confirm))
        .route("/api/core/profile/", get(profile).patch(update_profile))
        .route("/api/core/quizzes/:id/", get(quiz))
        .route("/api/core/quiz-attempts/", post(quiz_attempt))
        .route("/api/ai/recommend/", post(recommend))
        .with_state(state)
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.record("POST /auth/login/");
    if body["username"] == "ada" && body["password"] == "correct-horse" {
        state.set_valid_access("A1");
        (
            [(SET_COOKIE, "refresh_token=R-cookie; Path=/; HttpOnly")],
            Json(json!({ "access": "A1", "refresh": "R1" })),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
            .into_response()
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.record("POST /auth/register/");
    *state.last_body.lock().unwrap() = body.clone();
    if body["username"] == "taken" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "username": ["A user with that username already exists."] })),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "username": body["username"],
            "email": body["email"],
            "first_name": body["first_name"],
            "last_name": body["last_name"],
            "role": body["role"],
        })),
    )
        .into_response()
}

async fn refresh(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    state.record("POST /auth/refresh/");
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.refresh_bodies.lock().unwrap().push(body.clone());

    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    // Cookie refresh: no body, the refresh token rides in the cookie jar
    if body.is_null() {
        let has_cookie = headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |c| c.contains("refresh_token=R-cookie"));
        if !has_cookie {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Refresh token not provided" })),
            )
                .into_response();
        }
    }

    let mode = state.refresh_mode.lock().unwrap().clone();
    match mode {
        RefreshMode::Issue { access, refresh, accept } => {
            if accept {
                state.set_valid_access(&access);
            }
            let mut response = json!({ "access": access });
            if let Some(refresh) = refresh {
                response["refresh"] = json!(refresh);
            }
            Json(response).into_response()
        }
        RefreshMode::Reject(status) => (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" })),
        )
            .into_response(),
        RefreshMode::Garbage => (StatusCode::OK, "<html>gateway</html>").into_response(),
    }
}

async fn logout(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST /auth/logout/");
    *state.last_body.lock().unwrap() = body;
    if *state.logout_fails.lock().unwrap() {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": "boom" }))).into_response();
    }
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    StatusCode::RESET_CONTENT.into_response()
}

async fn account(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.record("GET /auth/profile/");
    let delay = *state.account_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    Json(json!({
        "user": {
            "id": 7,
            "username": "ada",
            "email": "ada@example.com",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "role": "Graduate",
            "bio": null,
            "education_level": "bachelors",
            "interests": [1, 3]
        }
    }))
    .into_response()
}

async fn change_password(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("PUT /auth/password/change/");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    *state.last_body.lock().unwrap() = body;
    Json(json!({ "detail": "Password updated successfully." })).into_response()
}

async fn password_reset(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST /auth/password/reset/");
    state.record_auth(&headers);
    *state.last_body.lock().unwrap() = body;
    Json(json!({
        "detail": "If an account with that email exists, a password reset link has been sent."
    }))
    .into_response()
}

async fn password_reset_confirm(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.record("POST /auth/password/reset/confirm/");
    *state.last_body.lock().unwrap() = body.clone();
    if body["token"] != "set-password" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Invalid or expired token." })),
        )
            .into_response();
    }
    Json(json!({ "detail": "Password has been reset successfully." })).into_response()
}

fn profile_body(bio: Value, interests: Value) -> Value {
    json!({
        "id": 1,
        "user": "ada",
        "education_level": "bachelors",
        "interests": interests,
        "profile_image": null,
        "bio": bio,
        "updated_at": "2026-10-01T10:00:00Z"
    })
}

async fn profile(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.record("GET /core/profile/");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    Json(profile_body(json!("Curious about everything"), json!([1, 3]))).into_response()
}

async fn update_profile(State(state): State<Shared>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    state.record("PATCH /core/profile/");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }

    // File parts are recorded as `file:<name>:<content type>:<byte count>`
    let mut fields = Vec::new();
    let mut image = Value::Null;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.unwrap();
                image = json!(format!("/media/profile_images/{}", file_name));
                fields.push((name, format!("file:{}:{}:{}", file_name, content_type, bytes.len())));
            }
            None => fields.push((name, field.text().await.unwrap())),
        }
    }
    *state.last_form.lock().unwrap() = fields.clone();

    let bio = fields
        .iter()
        .find(|(name, _)| name == "bio")
        .map(|(_, v)| json!(v))
        .unwrap_or(Value::Null);
    let interests: Vec<i64> = fields
        .iter()
        .filter(|(name, _)| name == "interests")
        .filter_map(|(_, v)| v.parse().ok())
        .collect();
    let mut body = profile_body(bio, json!(interests));
    body["profile_image"] = image;
    Json(body).into_response()
}

// Quizzes are readable without a session
async fn quiz(State(state): State<Shared>, Path(id): Path<u64>, headers: HeaderMap) -> Response {
    state.record(&format!("GET /core/quizzes/{}/", id));
    state.record_auth(&headers);
    if !(4..=6).contains(&id) {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response();
    }
    Json(json!({
        "id": id,
        "title": format!("Interest quiz {}", id),
        "description": "Tell us what you enjoy",
        "is_active": true,
        "created_at": "2026-09-01T08:00:00Z",
        "questions": [
            {"id": 10, "quiz": id, "question_text": "Favourite subject?", "type": "mcq",
             "options": ["Maths", "Art", "Biology"], "correct_answer": null, "weightage": 1.0},
            {"id": 11, "quiz": id, "question_text": "Team or solo?", "type": "mcq",
             "options": [{"id": "a", "text": "Team"}, {"id": "b", "text": "Solo"}], "correct_answer": null, "weightage": 1.0}
        ]
    }))
    .into_response()
}

async fn quiz_attempt(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST /core/quiz-attempts/");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    *state.last_body.lock().unwrap() = body.clone();
    (
        StatusCode::CREATED,
        Json(json!({
            "id": 99,
            "user": "ada",
            "quiz": body["quiz"],
            "score": null,
            "started_at": "2026-10-18T09:00:00Z",
            "completed_at": null,
            "answers": body["answers"],
        })),
    )
        .into_response()
}

async fn recommend(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.record("POST /ai/recommend/");
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    *state.last_body.lock().unwrap() = body;
    Json(json!([
        {"career": "Data Scientist", "reason": "Enjoys maths and working with evidence."},
        {"career": "Biomedical Engineer", "reason": "Combines biology with building things."},
        {"career": "UX Researcher", "reason": "Likes teams and understanding people."}
    ]))
    .into_response()
}
