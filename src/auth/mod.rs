pub mod authenticator;
pub mod credentials;
pub mod request;

pub use authenticator::Authenticator;
pub use credentials::{CredentialError, CredentialPair, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use request::{FormPart, RequestBody, RequestDescriptor};

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Claims the backend's simplejwt access tokens carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// Read the claims of an access token without checking its signature.
///
/// The client never holds the signing key; this is only for showing the user
/// when their session lapses. Returns `None` for opaque or malformed tokens.
pub fn inspect_access_token(token: &str) -> Option<AccessClaims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}

/// Short, non-reversible identifier for a token, safe to put in logs.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}
