/// Wire types for the NextStep backend
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// `{ access, refresh }` as returned by `/auth/login/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(alias = "access_token")]
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Account role chosen at registration. Decides which interest quiz the user
/// is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Graduate,
    Professional,
}

impl Role {
    pub fn quiz_id(self) -> u64 {
        match self {
            Role::Student => 4,
            Role::Graduate => 5,
            Role::Professional => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Graduate => "graduate",
            Role::Professional => "professional",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "graduate" => Ok(Role::Graduate),
            "professional" => Ok(Role::Professional),
            other => Err(ApiError::field("role", format!("No quiz found for role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    pub role: Role,
}

impl RegisterRequest {
    /// Checks the backend would reject anyway, done before any network call
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.email.trim().is_empty() {
            return Err(ApiError::field("email", "This field is required."));
        }
        if self.password != self.password2 {
            return Err(ApiError::field("password", "Passwords must match."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub interests: Vec<i64>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }
}

/// `GET /auth/profile/` wraps the user in `{"user": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct AccountEnvelope {
    pub user: User,
}

/// `/core/profile/` record. `user` is the username string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub interests: Vec<i64>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial profile update. Unset fields are left alone by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub education_level: Option<String>,
    pub interests: Option<Vec<i64>>,
    pub profile_image: Option<ProfileImage>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.bio.is_none()
            && self.education_level.is_none()
            && self.interests.is_none()
            && self.profile_image.is_none()
    }
}

/// Image uploaded as the `profile_image` file part
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ProfileImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = image_content_type(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("profile_image")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }
}

fn image_content_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: u64,
    #[serde(default)]
    pub quiz: Option<u64>,
    pub question_text: String,
    #[serde(rename = "type", default = "default_question_type")]
    pub kind: String,
    /// `[{"id": "a", "text": "Option A"}, ...]` or a bare list of strings
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default = "default_weightage")]
    pub weightage: f64,
}

impl QuizQuestion {
    /// Option labels in display order, whichever shape the server stored
    pub fn option_texts(&self) -> Vec<String> {
        let Some(Value::Array(items)) = &self.options else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj
                    .get("text")
                    .or_else(|| obj.get("label"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: u64,
    #[serde(default)]
    pub user: Option<String>,
    pub quiz: u64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answers: Option<Value>,
}

/// One answered question as the recommendation endpoint expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub career: String,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Detail {
    pub detail: String,
}

fn default_true() -> bool {
    true
}

fn default_question_type() -> String {
    "mcq".to_string()
}

fn default_weightage() -> f64 {
    1.0
}
