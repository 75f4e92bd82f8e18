use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const CONFIG_FILE_NAME: &str = "config.toml";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level chatbridge configuration, loaded from `config.toml`.
///
/// Resolution order: `--config-dir` → `CHATBRIDGE_CONFIG_DIR` env → `~/.chatbridge/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Gateway server configuration: bind host and port (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Generation backend configuration (`[inference]`).
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Append-only exchange log (`[chat_log]`).
    #[serde(default)]
    pub chat_log: ChatLogConfig,
}

// ── Gateway ───────────────────────────────────────────────────────

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
        }
    }
}

// ── Inference backend ─────────────────────────────────────────────

/// Generation backend configuration (`[inference]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Provider kind. Only `"ollama"` is supported.
    #[serde(default = "default_inference_provider")]
    pub provider: String,
    /// Base URL of the generation service (default: http://127.0.0.1:11434)
    #[serde(default = "default_inference_base_url")]
    pub base_url: String,
    /// Model name sent with every generate request (default: llama3)
    #[serde(default = "default_inference_model")]
    pub model: String,
    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds, including the streamed body.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_inference_provider() -> String {
    "ollama".into()
}

fn default_inference_base_url() -> String {
    "http://127.0.0.1:11434".into()
}

fn default_inference_model() -> String {
    "llama3".into()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: default_inference_provider(),
            base_url: default_inference_base_url(),
            model: default_inference_model(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ── Chat log ──────────────────────────────────────────────────────

/// Exchange log configuration (`[chat_log]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLogConfig {
    /// Write one JSON line per `/chat` exchange (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log file path; `~` is expanded (default: chat_log.jsonl in the working directory)
    #[serde(default = "default_chat_log_path")]
    pub path: String,
}

fn default_true() -> bool {
    true
}

fn default_chat_log_path() -> String {
    "chat_log.jsonl".into()
}

impl Default for ChatLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_chat_log_path(),
        }
    }
}

impl ChatLogConfig {
    /// The log path with `~` and environment variables expanded.
    pub fn resolved_path(&self) -> PathBuf {
        let expanded = shellexpand::full(&self.path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| shellexpand::tilde(&self.path).into_owned());
        PathBuf::from(expanded)
    }
}

// ── Config impl ──────────────────────────────────────────────────

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".chatbridge"))
}

fn resolve_config_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Ok(dir) = std::env::var("CHATBRIDGE_CONFIG_DIR") {
        let dir = dir.trim();
        if !dir.is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(dir).into_owned()));
        }
    }
    default_config_dir()
}

impl Config {
    pub async fn load_or_init(config_dir: Option<&Path>) -> Result<Self> {
        let config_dir = resolve_config_dir(config_dir)?;
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        fs::create_dir_all(&config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.save().await?;
            config
        } else {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config = Config::from_toml(&contents)?;
            config.config_path = config_path.clone();
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Parse a config document; missing sections and keys take their defaults.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config file")
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }

        let base_url = self.inference.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            anyhow::bail!(
                "inference.base_url must start with http:// or https:// (got {base_url:?})"
            );
        }
        if self.inference.model.trim().is_empty() {
            anyhow::bail!("inference.model must not be empty");
        }
        if self.inference.connect_timeout_secs == 0 {
            anyhow::bail!("inference.connect_timeout_secs must be greater than 0");
        }
        if self.inference.request_timeout_secs == 0 {
            anyhow::bail!("inference.request_timeout_secs must be greater than 0");
        }

        if self.chat_log.enabled && self.chat_log.path.trim().is_empty() {
            anyhow::bail!("chat_log.path must not be empty when chat_log.enabled = true");
        }

        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // Gateway port: CHATBRIDGE_GATEWAY_PORT or PORT
        if let Ok(port_str) =
            std::env::var("CHATBRIDGE_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
        {
            match port_str.trim().parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => {
                    tracing::warn!(port = %port_str, "Ignoring invalid gateway port override");
                }
            }
        }

        // Gateway host: CHATBRIDGE_GATEWAY_HOST or HOST
        if let Ok(host) =
            std::env::var("CHATBRIDGE_GATEWAY_HOST").or_else(|_| std::env::var("HOST"))
        {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }

        if let Ok(url) = std::env::var("CHATBRIDGE_INFERENCE_URL") {
            if !url.is_empty() {
                self.inference.base_url = url;
            }
        }

        if let Ok(model) = std::env::var("CHATBRIDGE_MODEL") {
            if !model.is_empty() {
                self.inference.model = model;
            }
        }

        if let Ok(path) = std::env::var("CHATBRIDGE_CHAT_LOG") {
            if !path.is_empty() {
                self.chat_log.path = path;
            }
        }
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(CONFIG_FILE_NAME);
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        Ok(())
    }
}
