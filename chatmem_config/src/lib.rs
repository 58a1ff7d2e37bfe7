//! # chatmem Config
//!
//! TOML configuration for the chatmem processing CLI and the dataset viewer.
//!
//! # Configuration Schema
//!
//! The configuration file (`chatmem.toml`) supports the following sections:
//! - `[logging]`: log level and output format
//! - `[llm]`: endpoints and credentials for the completion backend
//! - `[storage]`: data directory and default archive path
//! - `[sampling]`: seed used for `--prod` sampling
//! - `[viewer]`: bind address and initial data file of the viewer
//!
//! # Environment Variable Overrides
//!
//! Every field can be overridden via environment variables using the
//! `CHATMEM_` prefix and `_` as section separator:
//! - `CHATMEM_LOG_LEVEL` → `logging.level`
//! - `CHATMEM_VIEWER_PORT` → `viewer.port`
//! - `CHATMEM_STORAGE_DATA_DIR` → `storage.data_dir`
//! - etc.

use serde::{Deserialize, Serialize};

/// Top-level chatmem configuration.
///
/// Parsed from `chatmem.toml` or constructed programmatically.
/// Environment variables with the `CHATMEM_` prefix override TOML values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatmemConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (default: "info"). `RUST_LOG` still takes precedence at runtime.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format: "text" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

/// Completion backend configuration.
///
/// The backend mode is picked per model name: names containing `:` or
/// starting with one of `local_model_prefixes` go to `local_base_url`,
/// everything else to `openai_base_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    /// OpenAI-compatible endpoint of a local model server (Ollama by default).
    #[serde(default = "default_local_base_url")]
    pub local_base_url: String,
    /// Name of the environment variable holding the OpenAI API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_local_model_prefixes")]
    pub local_model_prefixes: Vec<String>,
    /// Per-request timeout in seconds. 0 disables the timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_base_url: default_openai_base_url(),
            local_base_url: default_local_base_url(),
            api_key_env: default_api_key_env(),
            local_model_prefixes: default_local_model_prefixes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_local_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_local_model_prefixes() -> Vec<String> {
    vec!["llama".to_string(), "mistral".to_string()]
}
fn default_request_timeout_secs() -> u64 {
    300
}

/// Filesystem layout for inputs and outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the output tree; processed files land in `{data_dir}/prod` or
    /// `{data_dir}/debug`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Archive read when `--input` is not given.
    #[serde(default = "default_input")]
    pub default_input: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_input: default_input(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_input() -> String {
    "data/conversations.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Fixed seed for `--prod` runs (default: 42).
    #[serde(default = "default_prod_seed")]
    pub prod_seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            prod_seed: default_prod_seed(),
        }
    }
}

fn default_prod_seed() -> u64 {
    42
}

/// Dataset viewer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_viewer_host")]
    pub host: String,
    #[serde(default = "default_viewer_port")]
    pub port: u16,
    /// Processed file loaded at startup. When unset, the most recently
    /// modified dataset under `storage.data_dir` is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            host: default_viewer_host(),
            port: default_viewer_port(),
            data_file: None,
        }
    }
}

fn default_viewer_host() -> String {
    "127.0.0.1".to_string()
}
fn default_viewer_port() -> u16 {
    5000
}

impl ChatmemConfig {
    /// Load configuration from a TOML file, then apply environment variable overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::parse_toml(&contents)
    }

    /// Load from `path` when given, otherwise start from defaults.
    ///
    /// Env overrides and validation apply in both cases.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Parse configuration from a TOML string, apply env overrides, then validate.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        let mut config: ChatmemConfig = toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// - `CHATMEM_LOG_LEVEL` → `logging.level`
    /// - `CHATMEM_LOG_FORMAT` → `logging.format`
    /// - `CHATMEM_LLM_OPENAI_BASE_URL` → `llm.openai_base_url`
    /// - `CHATMEM_LLM_LOCAL_BASE_URL` → `llm.local_base_url`
    /// - `CHATMEM_LLM_API_KEY_ENV` → `llm.api_key_env`
    /// - `CHATMEM_LLM_REQUEST_TIMEOUT_SECS` → `llm.request_timeout_secs`
    /// - `CHATMEM_STORAGE_DATA_DIR` → `storage.data_dir`
    /// - `CHATMEM_STORAGE_DEFAULT_INPUT` → `storage.default_input`
    /// - `CHATMEM_SAMPLING_PROD_SEED` → `sampling.prod_seed`
    /// - `CHATMEM_VIEWER_HOST` → `viewer.host`
    /// - `CHATMEM_VIEWER_PORT` → `viewer.port`
    /// - `CHATMEM_VIEWER_DATA_FILE` → `viewer.data_file`
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        // Logging overrides
        if let Ok(v) = std::env::var("CHATMEM_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("CHATMEM_LOG_FORMAT") {
            self.logging.format = v;
        }

        // LLM overrides
        if let Ok(v) = std::env::var("CHATMEM_LLM_OPENAI_BASE_URL") {
            self.llm.openai_base_url = v;
        }
        if let Ok(v) = std::env::var("CHATMEM_LLM_LOCAL_BASE_URL") {
            self.llm.local_base_url = v;
        }
        if let Ok(v) = std::env::var("CHATMEM_LLM_API_KEY_ENV") {
            self.llm.api_key_env = v;
        }
        if let Ok(v) = std::env::var("CHATMEM_LLM_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse::<u64>() {
                self.llm.request_timeout_secs = secs;
            }
        }

        // Storage overrides
        if let Ok(v) = std::env::var("CHATMEM_STORAGE_DATA_DIR") {
            self.storage.data_dir = v;
        }
        if let Ok(v) = std::env::var("CHATMEM_STORAGE_DEFAULT_INPUT") {
            self.storage.default_input = v;
        }

        if let Ok(v) = std::env::var("CHATMEM_SAMPLING_PROD_SEED") {
            if let Ok(seed) = v.parse::<u64>() {
                self.sampling.prod_seed = seed;
            }
        }

        // Viewer overrides
        if let Ok(v) = std::env::var("CHATMEM_VIEWER_HOST") {
            self.viewer.host = v;
        }
        if let Ok(v) = std::env::var("CHATMEM_VIEWER_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.viewer.port = port;
            }
        }
        if let Ok(v) = std::env::var("CHATMEM_VIEWER_DATA_FILE") {
            self.viewer.data_file = Some(v);
        }
    }

    /// Validate configuration values with detailed error messages.
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "logging.level must be one of: {} (got '{}').",
                valid_log_levels.join(", "),
                self.logging.level
            );
        }
        let valid_log_formats = ["text", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "logging.format must be one of: {} (got '{}').",
                valid_log_formats.join(", "),
                self.logging.format
            );
        }

        for (field, url) in [
            ("llm.openai_base_url", &self.llm.openai_base_url),
            ("llm.local_base_url", &self.llm.local_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!(
                    "{} must start with http:// or https:// (got '{}').",
                    field,
                    url
                );
            }
        }
        if self.llm.api_key_env.trim().is_empty() {
            anyhow::bail!(
                "llm.api_key_env must name an environment variable. Set it in chatmem.toml or via CHATMEM_LLM_API_KEY_ENV env var."
            );
        }

        if self.storage.data_dir.trim().is_empty() {
            anyhow::bail!(
                "storage.data_dir must not be empty. Set it in chatmem.toml or via CHATMEM_STORAGE_DATA_DIR env var."
            );
        }

        if self.viewer.port == 0 {
            anyhow::bail!(
                "viewer.port must be > 0 (got 0). Set a valid port in chatmem.toml or via CHATMEM_VIEWER_PORT env var."
            );
        }
        Ok(())
    }

    /// Generate a commented example configuration file.
    ///
    /// This is suitable for `chatmem_viewer --init-config` output.
    pub fn example_toml_commented() -> String {
        let defaults = ChatmemConfig::default();
        format!(
            r#"# =============================================================================
# chatmem Configuration File
# =============================================================================
# All values shown below are defaults; uncomment and modify as needed.
#
# Environment variables override TOML values. Use the CHATMEM_ prefix:
#   CHATMEM_VIEWER_PORT=8080 chatmem_viewer

# -----------------------------------------------------------------------------
# [logging]
# -----------------------------------------------------------------------------
[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides this)
level = "{level}"
# Log format: "text" (human-readable) or "json" (structured)
format = "{format}"

# -----------------------------------------------------------------------------
# [llm]: completion backend
# -----------------------------------------------------------------------------
[llm]
# OpenAI-compatible endpoint used for hosted models.
openai_base_url = "{openai_base_url}"
# Endpoint used for local models (any model name containing ':' or starting
# with one of local_model_prefixes).
local_base_url = "{local_base_url}"
# Environment variable the API key is read from.
api_key_env = "{api_key_env}"
local_model_prefixes = ["llama", "mistral"]
# Per-request timeout in seconds; 0 waits forever.
request_timeout_secs = {timeout}

# -----------------------------------------------------------------------------
# [storage]
# -----------------------------------------------------------------------------
[storage]
# Processed files are written to <data_dir>/prod or <data_dir>/debug.
data_dir = "{data_dir}"
# Archive read when --input is not given.
default_input = "{default_input}"

# -----------------------------------------------------------------------------
# [sampling]
# -----------------------------------------------------------------------------
[sampling]
# Seed used by --prod runs so samples are reproducible.
prod_seed = {prod_seed}

# -----------------------------------------------------------------------------
# [viewer]: dataset viewer HTTP server
# -----------------------------------------------------------------------------
[viewer]
# Bind address for the viewer.
host = "{host}"
port = {port}
# Processed file loaded at startup. Defaults to the newest file under data_dir.
# data_file = "data/prod/convs_with_memories_gpt4omini_0101.json"
"#,
            level = defaults.logging.level,
            format = defaults.logging.format,
            openai_base_url = defaults.llm.openai_base_url,
            local_base_url = defaults.llm.local_base_url,
            api_key_env = defaults.llm.api_key_env,
            timeout = defaults.llm.request_timeout_secs,
            data_dir = defaults.storage.data_dir,
            default_input = defaults.storage.default_input,
            prod_seed = defaults.sampling.prod_seed,
            host = defaults.viewer.host,
            port = defaults.viewer.port,
        )
    }
}
