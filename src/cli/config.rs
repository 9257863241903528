use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::NextStepClient;
use crate::auth::FileCredentialStore;
use crate::config::{self, ClientConfig};

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("NEXTSTEP_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("nextstep").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn credentials_path() -> anyhow::Result<PathBuf> {
    Ok(get_config_dir()?.join("credentials.json"))
}

/// Career Bank dataset directory: `NEXTSTEP_CAREER_DATA_DIR` or `<config dir>/data`
pub fn career_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("NEXTSTEP_CAREER_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    Ok(get_config_dir()?.join("data"))
}

pub fn credential_store() -> anyhow::Result<Arc<FileCredentialStore>> {
    Ok(Arc::new(FileCredentialStore::new(credentials_path()?)))
}

/// Resolve the effective client configuration, letting `--api-url` win over
/// the environment.
pub fn client_config(api_url: Option<&str>) -> ClientConfig {
    let mut client_config = config::config().clone();
    if let Some(url) = api_url {
        client_config.api.base_url = url.to_string();
    }
    client_config
}

pub fn build_client(api_url: Option<&str>) -> anyhow::Result<NextStepClient> {
    let client_config = client_config(api_url);
    client_config
        .endpoint("/")
        .map_err(|e| anyhow::anyhow!("Invalid API URL '{}': {}", client_config.api.base_url, e))?;

    let store = credential_store()?;
    Ok(NextStepClient::new(client_config, store)?)
}
