use crate::api::DEFAULT_BACKEND_URL;
use anyhow::{Context, Result};
use keyring::Entry;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_API_KEY_REF: &str = "env:AI_BUILDER_TOKEN";
pub const DATABASE_FILE: &str = "webchat.sqlite";

const KEYRING_SERVICE: &str = "webchat_api_key";
const KEYRING_USER: &str = "backend";

/// Settings for the proxy server.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind_addr: SocketAddr,
    pub backend_url: String,
    // Where the credential lives: 'env:NAME' or 'keyring'
    pub api_key_ref: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            api_key_ref: DEFAULT_API_KEY_REF.to_string(),
        }
    }
}

// --- API Key Retrieval ---

/// Retrieves the backend credential named by `api_key_ref`, reading either an
/// environment variable or the OS keyring.
pub fn get_api_key(api_key_ref: &str) -> Result<String> {
    match api_key_ref {
        ref_str if ref_str.starts_with("env:") => {
            let env_var_name = ref_str.trim_start_matches("env:");
            log::debug!("Retrieving API key from environment variable: {}", env_var_name);
            let key = std::env::var(env_var_name).context(format!(
                "Failed to get API key from environment variable '{}'",
                env_var_name
            ))?;
            if key.trim().is_empty() {
                return Err(anyhow::anyhow!("Environment variable '{}' is empty", env_var_name));
            }
            Ok(key)
        }
        "keyring" => {
            let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)
                .context("Failed to create keyring entry")?;
            log::debug!("Retrieving API key from keyring for service: {}", KEYRING_SERVICE);
            entry
                .get_password()
                .context("Failed to get API key from keyring. Run `webchat set-key` first.")
        }
        other => Err(anyhow::anyhow!("Unsupported api_key_ref format: {}", other)),
    }
}

/// Stores the backend credential in the OS keyring.
pub fn set_api_key_in_keyring(api_key: &str) -> Result<()> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)
        .context("Failed to create keyring entry for setting password")?;
    log::info!("Setting API key in keyring for service: {}", KEYRING_SERVICE);
    entry
        .set_password(api_key)
        .context("Failed to set API key in keyring")
}

/// Location of the client-side database, defaulting to the platform's local
/// data directory.
pub fn database_path(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => dirs::data_local_dir()
            .context("Failed to resolve local data directory")?
            .join("webchat"),
    };
    Ok(dir.join(DATABASE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_api_key_ref() {
        std::env::set_var("WEBCHAT_TEST_TOKEN", "secret-token");
        assert_eq!(get_api_key("env:WEBCHAT_TEST_TOKEN").unwrap(), "secret-token");

        std::env::remove_var("WEBCHAT_TEST_TOKEN_MISSING");
        assert!(get_api_key("env:WEBCHAT_TEST_TOKEN_MISSING").is_err());
    }

    #[test]
    fn test_unsupported_api_key_ref() {
        let err = get_api_key("vault:thing").unwrap_err();
        assert!(err.to_string().contains("Unsupported api_key_ref"));
    }

    #[test]
    fn test_default_config() {
        let config = ProxyConfig::default();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.api_key_ref, "env:AI_BUILDER_TOKEN");
    }

    #[test]
    fn test_database_path_uses_given_dir() {
        let path = database_path(Some(PathBuf::from("/tmp/chat-data"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/chat-data/webchat.sqlite"));
    }
}
