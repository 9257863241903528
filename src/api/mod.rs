//! Typed operations over the NextStep backend.
//!
//! Everything that needs a session goes through the [`Authenticator`], so an
//! expired access token is refreshed and the call replayed transparently.
//! Login, registration and password reset are sent anonymously.

pub mod format;
pub mod models;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{Authenticator, CredentialPair, CredentialStore, RequestDescriptor};
use crate::config::ClientConfig;
use crate::error::ApiError;
use format::Answers;
use models::*;

#[derive(Clone)]
pub struct NextStepClient {
    auth: Authenticator,
}

impl NextStepClient {
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Ok(Self {
            auth: Authenticator::new(config, store)?,
        })
    }

    pub fn from_authenticator(auth: Authenticator) -> Self {
        Self { auth }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// The stored pair, if the user is logged in
    pub async fn credentials(&self) -> Result<Option<CredentialPair>, ApiError> {
        Ok(self.auth.store().get().await?)
    }

    // ---- auth ----

    /// Exchange username/password for tokens and store them
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let request = RequestDescriptor::post("/auth/login/").json(json!(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }));

        let tokens: TokenPair = decode(self.auth.send_anonymous(&request).await?).await?;
        self.auth
            .store_credentials(CredentialPair::new(tokens.access.clone(), tokens.refresh.clone()))
            .await?;

        info!(username, "Logged in");
        Ok(tokens)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<Value, ApiError> {
        request.validate()?;
        let descriptor = RequestDescriptor::post("/auth/register/").json(json!(request));
        decode(self.auth.send_anonymous(&descriptor).await?).await
    }

    /// Tell the server to blacklist the refresh token, then forget the pair.
    /// Local credentials are cleared even when the server call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let refresh = self.credentials().await?.and_then(|pair| pair.refresh_token);

        let server_result = match refresh {
            Some(refresh) => {
                let mut request = RequestDescriptor::post("/auth/logout/").json(json!({ "refresh": refresh }));
                self.auth.dispatch(&mut request).await.map(|_| ())
            }
            None => Ok(()),
        };

        self.auth.clear_credentials().await?;
        if let Err(e) = &server_result {
            warn!("Server-side logout failed, local credentials cleared anyway: {}", e);
        }
        server_result
    }

    /// Force a token refresh. `None` means the session could not be renewed
    /// and the stored credentials are gone.
    pub async fn refresh(&self) -> Option<String> {
        self.auth.refresh_now().await
    }

    /// `GET /auth/profile/`: the account record
    pub async fn account(&self) -> Result<User, ApiError> {
        let envelope: AccountEnvelope = self.get_json("/auth/profile/").await?;
        Ok(envelope.user)
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<String, ApiError> {
        let mut request = RequestDescriptor::put("/auth/password/change/").json(json!({
            "old_password": old_password,
            "new_password": new_password,
        }));
        let detail: Detail = decode(self.auth.dispatch(&mut request).await?).await?;
        Ok(detail.detail)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<String, ApiError> {
        let request = RequestDescriptor::post("/auth/password/reset/").json(json!({ "email": email }));
        let detail: Detail = decode(self.auth.send_anonymous(&request).await?).await?;
        Ok(detail.detail)
    }

    pub async fn confirm_password_reset(
        &self,
        uid: &str,
        token: &str,
        new_password: &str,
    ) -> Result<String, ApiError> {
        let request = RequestDescriptor::post("/auth/password/reset/confirm/").json(json!({
            "uid": uid,
            "token": token,
            "new_password": new_password,
        }));
        let detail: Detail = decode(self.auth.send_anonymous(&request).await?).await?;
        Ok(detail.detail)
    }

    // ---- profile ----

    pub async fn profile(&self) -> Result<Profile, ApiError> {
        self.get_json("/core/profile/").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        if update.is_empty() {
            return Err(ApiError::validation("Nothing to update"));
        }
        let mut request = RequestDescriptor::patch("/core/profile/").form(format::profile_form(update));
        decode(self.auth.dispatch(&mut request).await?).await
    }

    // ---- quiz ----

    pub async fn quiz(&self, id: u64) -> Result<Quiz, ApiError> {
        self.get_json(&format!("/core/quizzes/{}/", id)).await
    }

    pub async fn quiz_for_role(&self, role: &str) -> Result<Quiz, ApiError> {
        let role: Role = role.parse()?;
        self.quiz(role.quiz_id()).await
    }

    pub async fn submit_quiz_attempt(&self, quiz_id: u64, answers: &Answers) -> Result<QuizAttempt, ApiError> {
        let mut request =
            RequestDescriptor::post("/core/quiz-attempts/").json(format::attempt_payload(quiz_id, answers));
        decode(self.auth.dispatch(&mut request).await?).await
    }

    pub async fn recommend(&self, responses: &[QuizResponse]) -> Result<Vec<Recommendation>, ApiError> {
        if responses.is_empty() {
            return Err(ApiError::field("responses", "Answer at least one question first"));
        }
        let mut request = RequestDescriptor::post("/ai/recommend/").json(json!({ "responses": responses }));
        decode(self.auth.dispatch(&mut request).await?).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let mut request = RequestDescriptor::get(path);
        decode(self.auth.dispatch(&mut request).await?).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}
