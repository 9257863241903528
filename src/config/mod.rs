use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is appended to, e.g. `http://localhost:8000/api`
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path of the token refresh endpoint, relative to the API base
    pub refresh_path: String,
    /// Attempt a cookie-only refresh when no refresh token is stored
    pub cookie_refresh: bool,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Development defaults pointed at an explicit base URL. Used by tests and
    /// the `--api-url` CLI flag.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        let mut config = Self::development();
        config.api.base_url = base_url.into();
        config
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("NEXTSTEP_API_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = env::var("NEXTSTEP_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("NEXTSTEP_USER_AGENT") {
            self.api.user_agent = v;
        }

        if let Ok(v) = env::var("NEXTSTEP_REFRESH_PATH") {
            self.auth.refresh_path = v;
        }
        if let Ok(v) = env::var("NEXTSTEP_COOKIE_REFRESH") {
            self.auth.cookie_refresh = v.parse().unwrap_or(self.auth.cookie_refresh);
        }

        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Join an API path onto the configured base URL.
    ///
    /// The base keeps its own path prefix (`/api`), so `/auth/login/` becomes
    /// `http://host/api/auth/login/`.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let base = self.api.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: DEFAULT_API_URL.to_string(),
                request_timeout_secs: 30,
                user_agent: default_user_agent(),
            },
            auth: AuthConfig {
                refresh_path: DEFAULT_REFRESH_PATH.to_string(),
                cookie_refresh: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "https://staging.nextstep.example.com/api".to_string(),
                request_timeout_secs: 15,
                user_agent: default_user_agent(),
            },
            auth: AuthConfig {
                refresh_path: DEFAULT_REFRESH_PATH.to_string(),
                cookie_refresh: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "https://nextstep.example.com/api".to_string(),
                request_timeout_secs: 10,
                user_agent: default_user_agent(),
            },
            auth: AuthConfig {
                refresh_path: DEFAULT_REFRESH_PATH.to_string(),
                cookie_refresh: false,
            },
        }
    }
}

fn default_user_agent() -> String {
    format!("nextstep-client/{}", env!("CARGO_PKG_VERSION"))
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<ClientConfig> = Lazy::new(ClientConfig::from_env);

pub fn config() -> &'static ClientConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = ClientConfig::development();
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.auth.refresh_path, "/auth/refresh/");
        assert!(config.auth.cookie_refresh);
    }

    #[test]
    fn test_default_production_config() {
        let config = ClientConfig::production();
        assert!(config.api.base_url.starts_with("https://"));
        assert!(!config.auth.cookie_refresh);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = ClientConfig::for_base_url("http://127.0.0.1:9000/api/");
        let url = config.endpoint("/auth/login/").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/api/auth/login/");

        let url = config.endpoint("core/quizzes/4/").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/api/core/quizzes/4/");
    }

    #[test]
    fn test_endpoint_rejects_garbage_base() {
        let config = ClientConfig::for_base_url("not a url");
        assert!(config.endpoint("/auth/login/").is_err());
    }
}
