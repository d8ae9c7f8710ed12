//! Client configuration

use std::sync::LazyLock;
use std::time::Duration;

use crypto_envelope::KeyOptions;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    ClientError, ClientResult, DEFAULT_BASE_URL, DEFAULT_PUBLIC_KEY_PATH, DEFAULT_SUBMIT_PATH,
    DEFAULT_TIMEOUT_SECS, TransportError,
};

/// Environment variable overriding [`FaucetConfig::base_url`]
pub const ENV_BASE_URL: &str = "FAUCET_BASE_URL";
/// Environment variable overriding [`FaucetConfig::timeout_secs`]
pub const ENV_TIMEOUT_SECS: &str = "FAUCET_TIMEOUT_SECS";
/// Environment variable selecting RSA keys of the given size
pub const ENV_KEY_BITS: &str = "FAUCET_KEY_BITS";
/// Environment variable switching to [`ReplyMode::Poll`] on the given path
pub const ENV_REPLY_PATH: &str = "FAUCET_REPLY_PATH";

static DEFAULT_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"));

/// Where the encrypted reply comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReplyMode {
    /// The submission response body carries the reply
    #[default]
    Inline,
    /// A separate `GET` on `path` returns the reply
    Poll { path: String },
}

/// Faucet client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// Faucet service root, may include a path prefix
    pub base_url: Url,
    /// Path of the public key endpoint
    pub public_key_path: String,
    /// Path of the submission endpoint
    pub submit_path: String,
    /// Reply retrieval mode
    pub reply: ReplyMode,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Client key pair options
    pub key_options: KeyOptions,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.clone(),
            public_key_path: DEFAULT_PUBLIC_KEY_PATH.to_string(),
            submit_path: DEFAULT_SUBMIT_PATH.to_string(),
            reply: ReplyMode::Inline,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            key_options: KeyOptions::default(),
        }
    }
}

impl FaucetConfig {
    /// Default configuration pointed at `base_url`
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            ..Self::default()
        })
    }

    /// Defaults overlaid with `FAUCET_*` environment variables
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL) {
            config.base_url = parse_base_url(&url)?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| ClientError::Config(format!("{} must be an integer", ENV_TIMEOUT_SECS)))?;
        }
        if let Some(bits) = lookup(ENV_KEY_BITS) {
            let bits = bits
                .trim()
                .parse()
                .map_err(|_| ClientError::Config(format!("{} must be an integer", ENV_KEY_BITS)))?;
            config.key_options = KeyOptions::with_key_size(bits);
        }
        if let Some(path) = lookup(ENV_REPLY_PATH) {
            config.reply = ReplyMode::Poll { path };
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that can never work
    pub fn validate(&self) -> ClientResult<()> {
        if self.timeout_secs == 0 {
            return Err(ClientError::Config("timeout must be at least one second".into()));
        }
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "unsupported URL scheme `{}`",
                self.base_url.scheme()
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve an endpoint path below the base URL, keeping any base prefix
    pub fn endpoint(&self, path: &str) -> ClientResult<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", joined, e)).into())
    }
}

fn parse_base_url(url: &str) -> ClientResult<Url> {
    Url::parse(url.trim()).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", url, e)).into())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crypto_envelope::KeyAlgorithm;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FaucetConfig::default();
        assert_eq!(config.base_url.as_str(), "http://localhost:5000/");
        assert_eq!(config, FaucetConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.reply, ReplyMode::Inline);
        assert_eq!(config.key_options.algorithm, KeyAlgorithm::X25519);
        assert_eq!(
            config.endpoint(&config.public_key_path).unwrap().as_str(),
            "http://localhost:5000/get_server_public_key"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_prefix() {
        let config = FaucetConfig::new("https://faucet.example/api/v1/").unwrap();
        assert_eq!(
            config.endpoint("/send_request").unwrap().as_str(),
            "https://faucet.example/api/v1/send_request"
        );
    }

    #[test]
    fn test_env_overrides() {
        let config = FaucetConfig::from_lookup(lookup_from(&[
            (ENV_BASE_URL, "http://10.0.0.2:8000"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_KEY_BITS, "3072"),
            (ENV_REPLY_PATH, "/retrieve_response"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.as_str(), "http://10.0.0.2:8000/");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.key_options, KeyOptions::with_key_size(3072));
        assert_eq!(
            config.reply,
            ReplyMode::Poll {
                path: "/retrieve_response".into()
            }
        );
    }

    #[test]
    fn test_invalid_env_values() {
        assert!(matches!(
            FaucetConfig::from_lookup(lookup_from(&[(ENV_TIMEOUT_SECS, "soon")])),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            FaucetConfig::from_lookup(lookup_from(&[(ENV_TIMEOUT_SECS, "0")])),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            FaucetConfig::from_lookup(lookup_from(&[(ENV_BASE_URL, "not a url")])),
            Err(ClientError::Transport(TransportError::InvalidUrl(_)))
        ));
        assert!(matches!(
            FaucetConfig::from_lookup(lookup_from(&[(ENV_BASE_URL, "ftp://faucet")])),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_partial_json_config() {
        let config: FaucetConfig = serde_json::from_str(
            r#"{"base_url": "http://faucet:9000", "reply": {"mode": "poll", "path": "/reply"}, "key_options": {}}"#,
        )
        .unwrap();
        assert_eq!(config.key_options, KeyOptions::default());
        assert_eq!(config.submit_path, DEFAULT_SUBMIT_PATH);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.reply, ReplyMode::Poll { path: "/reply".into() });
    }
}
