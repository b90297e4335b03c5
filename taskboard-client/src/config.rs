/// Configuration management for the client
///
/// Configuration is layered with the `config` crate, later sources winning:
///
/// 1. Built-in defaults
/// 2. `taskboard.toml` in the working directory (optional)
/// 3. `TASKBOARD_*` environment variables (a `.env` file is loaded first)
///
/// # Environment Variables
///
/// - `TASKBOARD_API__BASE_URL`: API root (default: http://localhost:8000/api)
/// - `TASKBOARD_API__TIMEOUT_SECS`: Request timeout (default: 30)
/// - `TASKBOARD_STORAGE__TOKEN_PATH`: Credential file (default: ~/.taskboard/credentials.json)
/// - `TASKBOARD_CACHE__RETAIN_SECS`: How long unused cache entries are kept (default: 300)
/// - `RUST_LOG`: Log level (default: taskboard=info)
///
/// # Example
///
/// ```no_run
/// use taskboard_client::config::ClientConfig;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = ClientConfig::load()?;
/// println!("Talking to {}", config.api.base_url);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Complete client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server connection
    pub api: ApiConfig,

    /// Credential persistence
    pub storage: StorageConfig,

    /// Resource cache tuning
    pub cache: CacheConfig,
}

/// Server connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root, e.g. `https://tasks.example.com/api`
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Credential storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the credential file
    pub token_path: PathBuf,
}

/// Resource cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds an entry with no subscribers is kept for fast re-subscription
    pub retain_secs: u64,
}

impl ClientConfig {
    /// Loads configuration from defaults, `taskboard.toml` and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A source has values of the wrong type
    /// - `base_url` is not an absolute http(s) URL
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("api.base_url", DEFAULT_BASE_URL)?
            .set_default("api.timeout_secs", 30)?
            .set_default(
                "storage.token_path",
                default_token_path().to_string_lossy().to_string(),
            )?
            .set_default("cache.retain_secs", 300)?
            .add_source(config::File::with_name("taskboard").required(false))
            .add_source(
                config::Environment::with_prefix("TASKBOARD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Configuration pointing at `base_url` with every other value defaulted
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                timeout_secs: 30,
            },
            storage: StorageConfig {
                token_path: default_token_path(),
            },
            cache: CacheConfig { retain_secs: 300 },
        }
    }

    /// Checks values that deserialization alone cannot
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.api.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid api.base_url '{}': {}", self.api.base_url, e))?;

        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("api.base_url must use http or https, got '{}'", url.scheme());
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than zero");
        }

        Ok(())
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Cache retention for unsubscribed entries
    pub fn cache_retention(&self) -> Duration {
        Duration::from_secs(self.cache.retain_secs)
    }
}

/// `~/.taskboard/credentials.json`, or a relative path if HOME is unset
fn default_token_path() -> PathBuf {
    let base = env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    base.join(".taskboard").join("credentials.json")
}
