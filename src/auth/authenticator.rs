//! Bearer-token authentication for outbound backend calls.
//!
//! Every request gets the stored access token attached. A 401 on the first
//! attempt triggers one token refresh and one replay of the request; a 401 on
//! the replay goes back to the caller as-is.
//!
//! REFRESH COORDINATION
//! ====================
//! Requests failing together because the same token expired must share one
//! refresh call. The authenticator owns a small state machine:
//!
//! - `Idle`: no refresh has happened (or credentials were replaced since).
//! - `Refreshing`: one refresh call is in flight. Later 401s clone its shared
//!   future and await the same outcome.
//! - `Settled`: the last refresh finished. A 401 for a request that was sent
//!   with an older token than the settled one is replayed with the settled
//!   token, as long as the store still holds it. Any other 401 starts a new
//!   refresh.
//!
//! Credential writes (login, logout, refresh outcome) happen under the state
//! lock, so a refresh whose generation was superseded never touches the store.

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::auth::credentials::{CredentialPair, CredentialStore};
use crate::auth::fingerprint;
use crate::auth::request::{FormPart, RequestBody, RequestDescriptor};
use crate::config::ClientConfig;
use crate::error::ApiError;

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

enum RefreshState {
    Idle,
    Refreshing { generation: u64, future: RefreshFuture },
    Settled { generation: u64, outcome: Option<String> },
}

/// Why a refresh attempt produced no token. Only ever logged; callers see the
/// original 401 instead.
#[derive(Debug, Error)]
enum RefreshFailure {
    #[error("no refresh token stored and cookie refresh is disabled")]
    MissingRefreshToken,

    #[error("refresh request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("refresh endpoint answered {0}")]
    Rejected(StatusCode),

    #[error("refresh response carried no access token")]
    Malformed,

    #[error("invalid refresh URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    access: Option<String>,
    refresh: Option<String>,
}

#[derive(Clone)]
pub struct Authenticator {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    store: Arc<dyn CredentialStore>,
    state: Arc<Mutex<RefreshState>>,
    generations: Arc<AtomicU64>,
}

impl Authenticator {
    /// Build an authenticator with its own HTTP client. The client keeps a
    /// cookie jar so a refresh cookie set at login rides along on the cookie
    /// refresh fallback.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .user_agent(config.api.user_agent.clone())
            .build()?;

        Ok(Self::with_http_client(config, store, http))
    }

    pub fn with_http_client(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            config: Arc::new(config),
            store,
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Attach the stored access token, if there is one. A missing token is
    /// not an error: the request goes out unauthenticated.
    pub async fn attach_token(&self, request: &mut RequestDescriptor) {
        match self.store.get().await {
            Ok(Some(pair)) => {
                if !request.set_bearer(&pair.access_token) {
                    warn!(
                        token = %fingerprint(&pair.access_token),
                        "Stored access token is not a valid header value, sending unauthenticated"
                    );
                }
            }
            Ok(None) => request.clear_bearer(),
            Err(e) => {
                warn!("Could not read stored credentials: {}", e);
                request.clear_bearer();
            }
        }
    }

    /// Send a request, recovering once from an expired access token.
    ///
    /// Non-2xx responses come back as [`ApiError::Status`] with the server's
    /// body. When recovery fails the error is the original 401.
    pub async fn dispatch(&self, request: &mut RequestDescriptor) -> Result<Response, ApiError> {
        let span = tracing::debug_span!(
            "dispatch",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        );
        self.dispatch_inner(request).instrument(span).await
    }

    async fn dispatch_inner(&self, request: &mut RequestDescriptor) -> Result<Response, ApiError> {
        self.attach_token(request).await;

        let response = self.send(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        let original = status_error(response).await;
        if request.is_retried() {
            debug!("401 on a request that was already retried");
            return Err(original);
        }
        request.mark_retried();

        let sent_with = request.bearer_token().map(str::to_owned);
        let token = self
            .join_refresh(|settled| sent_with.as_deref() != Some(settled))
            .await;

        let Some(token) = token else {
            return Err(original);
        };
        if !request.set_bearer(&token) {
            return Err(original);
        }

        debug!(token = %fingerprint(&token), "Replaying request with refreshed token");
        let response = self.send(request).await?;
        check_status(response).await
    }

    /// Send without credentials and without refresh handling. Login and
    /// registration go through here so a rejected password is never mistaken
    /// for an expired session.
    pub async fn send_anonymous(&self, request: &RequestDescriptor) -> Result<Response, ApiError> {
        let response = self.send(request).await?;
        check_status(response).await
    }

    /// Refresh the access token now, joining a refresh already in flight.
    pub async fn refresh_now(&self) -> Option<String> {
        self.join_refresh(|_| false).await
    }

    /// Replace the stored pair (login). Forgets any settled refresh outcome.
    pub async fn store_credentials(&self, pair: CredentialPair) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        self.store.set(pair).await?;
        *state = RefreshState::Idle;
        Ok(())
    }

    /// Drop the stored pair (logout). Forgets any settled refresh outcome.
    pub async fn clear_credentials(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        self.store.clear().await?;
        *state = RefreshState::Idle;
        Ok(())
    }

    /// Await the in-flight refresh, reuse the settled token when
    /// `reuse_settled` accepts it, or start a new refresh.
    async fn join_refresh(&self, reuse_settled: impl Fn(&str) -> bool) -> Option<String> {
        let future = {
            let mut state = self.state.lock().await;
            let pending = match &*state {
                RefreshState::Refreshing { generation, future } => {
                    debug!(generation, "Joining refresh in flight");
                    Some(future.clone())
                }
                RefreshState::Settled { generation, outcome: Some(token) } if reuse_settled(token.as_str()) => {
                    // Another client sharing the store may have moved past this token
                    if self.stored_access_token().await.as_deref() == Some(token.as_str()) {
                        debug!(generation, "Request predates the last refresh, reusing its token");
                        return Some(token.clone());
                    }
                    debug!(generation, "Settled token is no longer stored, refreshing again");
                    None
                }
                _ => None,
            };
            match pending {
                Some(future) => future,
                None => self.begin_refresh(&mut state),
            }
        };

        future.await
    }

    async fn stored_access_token(&self) -> Option<String> {
        match self.store.get().await {
            Ok(pair) => pair.map(|pair| pair.access_token),
            Err(e) => {
                warn!("Could not read stored credentials: {}", e);
                None
            }
        }
    }

    fn begin_refresh(&self, state: &mut RefreshState) -> RefreshFuture {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(generation, "Starting token refresh");

        let future = refresh(
            self.http.clone(),
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            Arc::downgrade(&self.state),
            generation,
        )
        .boxed()
        .shared();

        *state = RefreshState::Refreshing {
            generation,
            future: future.clone(),
        };
        future
    }

    async fn send(&self, request: &RequestDescriptor) -> Result<Response, ApiError> {
        let url = self.config.endpoint(&request.path)?;
        let builder = self
            .http
            .request(request.method.clone(), url)
            .headers(request.headers.clone());

        let builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form(parts) => {
                let mut form = Form::new();
                for part in parts {
                    form = match part {
                        FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                        FormPart::File { name, file_name, content_type, bytes } => {
                            let file = Part::bytes(bytes.clone())
                                .file_name(file_name.clone())
                                .mime_str(content_type)?;
                            form.part(name.clone(), file)
                        }
                    };
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        debug!(
            status = %response.status(),
            authenticated = request.bearer_token().is_some(),
            retried = request.is_retried(),
            "Response received"
        );
        Ok(response)
    }
}

/// The body of one refresh attempt. Runs to completion for every awaiter of
/// the shared future, then moves the state machine to `Settled`.
async fn refresh(
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    store: Arc<dyn CredentialStore>,
    state: Weak<Mutex<RefreshState>>,
    generation: u64,
) -> Option<String> {
    let result = request_new_pair(&http, &config, store.as_ref()).await;

    let owner = state.upgrade();
    let mut guard = match &owner {
        Some(state) => Some(state.lock().await),
        None => None,
    };
    // Login or logout mid-refresh resets the machine to Idle; the store is theirs then
    let current = guard.as_deref().map_or(true, |state| {
        matches!(state, RefreshState::Refreshing { generation: g, .. } if *g == generation)
    });

    let outcome = match result {
        Ok(pair) => {
            let token = pair.access_token.clone();
            if !current {
                debug!(generation, "Credentials replaced during refresh, not storing issued token");
            } else if let Err(e) = store.set(pair).await {
                warn!(generation, "Refreshed token could not be persisted: {}", e);
            }
            info!(generation, token = %fingerprint(&token), "Access token refreshed");
            Some(token)
        }
        Err(failure) if current => {
            warn!(generation, "Token refresh failed, clearing credentials: {}", failure);
            if let Err(e) = store.clear().await {
                warn!(generation, "Could not clear stored credentials: {}", e);
            }
            None
        }
        Err(failure) => {
            warn!(generation, "Token refresh failed after credentials were replaced: {}", failure);
            None
        }
    };

    if let Some(state) = guard.as_deref_mut().filter(|_| current) {
        *state = RefreshState::Settled {
            generation,
            outcome: outcome.clone(),
        };
    }

    outcome
}

async fn request_new_pair(
    http: &reqwest::Client,
    config: &ClientConfig,
    store: &dyn CredentialStore,
) -> Result<CredentialPair, RefreshFailure> {
    let stored = match store.get().await {
        Ok(stored) => stored,
        Err(e) => {
            warn!("Could not read stored credentials for refresh: {}", e);
            None
        }
    };
    let url = config.endpoint(&config.auth.refresh_path)?;

    match stored.and_then(|pair| pair.refresh_token) {
        Some(refresh_token) => {
            let response = http
                .post(url)
                .json(&json!({ "refresh": refresh_token }))
                .send()
                .await?;
            let issued = parse_refresh_response(response).await?;
            // simplejwt only rotates the refresh token when configured to
            let refresh = issued.refresh.or(Some(refresh_token));
            Ok(CredentialPair::new(issued.access, refresh))
        }
        None if config.auth.cookie_refresh => {
            debug!("No refresh token stored, trying cookie refresh");
            let response = http.post(url).send().await?;
            let issued = parse_refresh_response(response).await?;
            Ok(CredentialPair::new(issued.access, issued.refresh))
        }
        None => Err(RefreshFailure::MissingRefreshToken),
    }
}

struct IssuedTokens {
    access: String,
    refresh: Option<String>,
}

async fn parse_refresh_response(response: Response) -> Result<IssuedTokens, RefreshFailure> {
    let status = response.status();
    if !status.is_success() {
        return Err(RefreshFailure::Rejected(status));
    }

    let body: RefreshResponse = response.json().await.map_err(|_| RefreshFailure::Malformed)?;
    match body.access {
        Some(access) if !access.is_empty() => Ok(IssuedTokens {
            access,
            refresh: body.refresh.filter(|r| !r.is_empty()),
        }),
        _ => Err(RefreshFailure::Malformed),
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(status_error(response).await)
    }
}

/// Turn a non-success response into [`ApiError::Status`], keeping the body
/// as JSON when it parses and as a string otherwise.
pub(crate) async fn status_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    ApiError::Status { status, body }
}
