//! Gateway and application configuration
//!
//! Config is loaded in three layers:
//! 1. Embedded defaults (compiled into binary)
//! 2. Override file in data dir (~/.local/share/snapspend/config/gateway.toml)
//! 3. Environment variables (`GEMINI_*`, `SNAPSPEND_*`)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/gateway.toml");

/// Sampling parameters sent with every generateContent request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    pub max_output_tokens: u32,
}

/// Retry and sampling settings for one gateway operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubles after each retry
    pub base_delay: Duration,
    pub generation: GenerationConfig,
}

impl OperationConfig {
    fn new(max_attempts: u32, base_delay_ms: u64, generation: GenerationConfig) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            generation,
        }
    }
}

/// Lowest wait after a rate-limited response; per-minute quotas need at least this
pub const MIN_RATE_LIMIT_FLOOR: Duration = Duration::from_secs(5);

/// Everything the Gemini gateway needs
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Minimum backoff after a rate-limited response
    pub rate_limit_floor: Duration,
    pub extract: OperationConfig,
    pub insights: OperationConfig,
    pub chat: OperationConfig,
    /// How many of the most recent receipts go into the chat context
    pub chat_window: usize,
    /// Item names listed per receipt line in the chat context
    pub items_per_line: usize,
    pub currency: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            rate_limit_floor: MIN_RATE_LIMIT_FLOOR,
            extract: OperationConfig::new(
                3,
                2000,
                GenerationConfig {
                    temperature: 0.4,
                    top_k: Some(32),
                    top_p: Some(1.0),
                    max_output_tokens: 2048,
                },
            ),
            insights: OperationConfig::new(
                2,
                1000,
                GenerationConfig {
                    temperature: 0.7,
                    top_k: Some(40),
                    top_p: Some(0.95),
                    max_output_tokens: 1024,
                },
            ),
            chat: OperationConfig::new(
                2,
                1000,
                GenerationConfig {
                    temperature: 0.8,
                    top_k: Some(40),
                    top_p: Some(0.95),
                    max_output_tokens: 1024,
                },
            ),
            chat_window: 50,
            items_per_line: 5,
            currency: "R$".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Point the gateway at a different server (mock servers, proxies)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full generateContent URL without the key query parameter
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    /// The single receipt owner this installation serves
    pub owner_id: String,
    /// JSON receipt store location
    pub store_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            owner_id: "default_user".to_string(),
            store_path: default_store_path(),
        }
    }
}

impl Config {
    /// Load embedded defaults, the data-dir override, then the environment
    pub fn load() -> Result<Self> {
        let mut config = load_config(None)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit config file, then the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = load_config(Some(path))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.is_empty()) {
            self.gateway.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL").filter(|m| !m.is_empty()) {
            self.gateway.model = model;
        }
        if let Some(url) = lookup("GEMINI_BASE_URL").filter(|u| !u.is_empty()) {
            self.gateway.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(owner) = lookup("SNAPSPEND_OWNER").filter(|o| !o.is_empty()) {
            self.owner_id = owner;
        }
        if let Some(store) = lookup("SNAPSPEND_STORE").filter(|s| !s.is_empty()) {
            self.store_path = PathBuf::from(store);
        }
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("snapspend").join("config").join("gateway.toml"))
}

/// Default receipts file
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("snapspend").join("receipts.json"))
        .unwrap_or_else(|| PathBuf::from("snapspend-receipts.json"))
}

/// Load configuration (override first, then default)
fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    let path = match explicit_path {
        Some(p) if !p.exists() => {
            return Err(Error::Config(format!("Config file not found: {}", p.display())))
        }
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let content = match path {
        Some(p) if p.exists() => fs::read_to_string(&p)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    gemini: Option<RawGemini>,
    retry: Option<RawRetry>,
    operations: Option<RawOperations>,
    chat: Option<RawChat>,
    display: Option<RawDisplay>,
    owner: Option<RawOwner>,
    store: Option<RawStore>,
}

#[derive(Debug, Deserialize)]
struct RawGemini {
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    rate_limit_floor_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawOperations {
    extract: Option<RawOperation>,
    insights: Option<RawOperation>,
    chat: Option<RawOperation>,
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    temperature: Option<f32>,
    top_k: Option<u32>,
    top_p: Option<f32>,
    max_output_tokens: Option<u32>,
}

impl RawOperation {
    fn apply(self, target: &mut OperationConfig) -> Result<()> {
        if let Some(attempts) = self.max_attempts {
            if attempts == 0 {
                return Err(Error::Config("max_attempts must be at least 1".into()));
            }
            target.max_attempts = attempts;
        }
        if let Some(delay) = self.base_delay_ms {
            target.base_delay = Duration::from_millis(delay);
        }
        if let Some(t) = self.temperature {
            target.generation.temperature = t;
        }
        if let Some(k) = self.top_k {
            target.generation.top_k = Some(k);
        }
        if let Some(p) = self.top_p {
            target.generation.top_p = Some(p);
        }
        if let Some(m) = self.max_output_tokens {
            target.generation.max_output_tokens = m;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawChat {
    window: Option<usize>,
    items_per_line: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawDisplay {
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStore {
    path: Option<PathBuf>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = Config::default();
    let gateway = &mut config.gateway;

    if let Some(gemini) = raw.gemini {
        if let Some(url) = gemini.base_url {
            gateway.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = gemini.model {
            gateway.model = model;
        }
        if let Some(timeout) = gemini.timeout_secs {
            gateway.timeout = Duration::from_secs(timeout);
        }
    }

    if let Some(floor_ms) = raw.retry.and_then(|r| r.rate_limit_floor_ms) {
        let floor = Duration::from_millis(floor_ms);
        if floor < MIN_RATE_LIMIT_FLOOR {
            warn!(
                rate_limit_floor_ms = floor_ms,
                minimum_ms = MIN_RATE_LIMIT_FLOOR.as_millis() as u64,
                "Rate-limit floor below minimum, using minimum"
            );
        }
        gateway.rate_limit_floor = floor.max(MIN_RATE_LIMIT_FLOOR);
    }

    if let Some(ops) = raw.operations {
        if let Some(op) = ops.extract {
            op.apply(&mut gateway.extract)?;
        }
        if let Some(op) = ops.insights {
            op.apply(&mut gateway.insights)?;
        }
        if let Some(op) = ops.chat {
            op.apply(&mut gateway.chat)?;
        }
    }

    if let Some(chat) = raw.chat {
        if let Some(window) = chat.window {
            gateway.chat_window = window;
        }
        if let Some(items) = chat.items_per_line {
            gateway.items_per_line = items;
        }
    }

    if let Some(currency) = raw.display.and_then(|d| d.currency) {
        gateway.currency = currency;
    }

    if let Some(id) = raw.owner.and_then(|o| o.id) {
        config.owner_id = id;
    }

    if let Some(path) = raw.store.and_then(|s| s.path) {
        config.store_path = path;
    }

    Ok(config)
}
