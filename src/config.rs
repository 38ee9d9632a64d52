//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `TUNNELBOT_API_TOKEN`, `TUNNELBOT_AGENT_BIN`
//! 2. **Config file** — path via `--config <path>`, or `tunnelbot.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! There is no fallback to an empty config: the bot token, the agent binary
//! and the operator allow-list only make sense when written down somewhere.
//!
//! ```toml
//! [telegram]
//! api_token = "123456:ABC-DEF"
//! allowed_ids = ["alice", "bob"]   # Telegram usernames
//! poll_interval_secs = 3
//!
//! [agent]
//! bin_path = "/usr/local/bin/ngrok"
//! settle_delay_secs = 5
//! status_url = "http://localhost:4040/api/tunnels"
//!
//! # label = "launch arguments", shown as buttons in file order
//! [profiles]
//! web = "http 8080"
//! ssh = "tcp 22"
//!
//! [logging]
//! level = "info"
//! verbose = false
//! ```
//!
//! Once loaded the [`Config`] is never mutated; it is shared behind an `Arc`.

use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "tunnelbot.toml";

/// Callback token carried by the "Cancel" button. Reserved, cannot be a label.
pub const CANCEL_TOKEN: &str = "/cancel";

/// Telegram rejects `callback_data` longer than this many bytes.
const MAX_LABEL_BYTES: usize = 64;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub agent: AgentConfig,
    #[serde(default)]
    pub profiles: ProfileSet,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. Override with `TUNNELBOT_API_TOKEN`.
    #[serde(default)]
    pub api_token: String,
    /// Usernames allowed to talk to the bot. Empty means nobody.
    #[serde(default)]
    pub allowed_ids: Vec<String>,
    /// Seconds between update polls (default 3). Zero falls back to the default.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Tunneling agent settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Path to the agent binary. Override with `TUNNELBOT_AGENT_BIN`.
    #[serde(default)]
    pub bin_path: String,
    /// Pause after spawning before the first status query (default 5).
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,
    /// The agent's local status API.
    #[serde(default = "default_status_url")]
    pub status_url: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log lifecycle steps and raw status payloads.
    #[serde(default)]
    pub verbose: bool,
}

fn default_poll_interval() -> u64 {
    3
}
fn default_settle_delay() -> u64 {
    5
}
fn default_status_url() -> String {
    "http://localhost:4040/api/tunnels".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            verbose: false,
        }
    }
}

/// A named set of launch arguments for the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelProfile {
    pub label: String,
    pub args: Vec<String>,
}

/// Ordered, immutable label → profile mapping.
///
/// Deserialized from a TOML table of `label = "arg string"`; file order is
/// kept so buttons render the way the operator wrote them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "IndexMap<String, String>")]
pub struct ProfileSet(IndexMap<String, TunnelProfile>);

impl ProfileSet {
    pub fn get(&self, label: &str) -> Option<&TunnelProfile> {
        self.0.get(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TunnelProfile> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<IndexMap<String, String>> for ProfileSet {
    type Error = String;

    fn try_from(raw: IndexMap<String, String>) -> Result<Self, Self::Error> {
        let mut profiles = IndexMap::with_capacity(raw.len());
        for (label, arg_string) in raw {
            if label.is_empty() || label.len() > MAX_LABEL_BYTES {
                return Err(format!(
                    "profile label '{label}' must be 1..={MAX_LABEL_BYTES} bytes"
                ));
            }
            if label == CANCEL_TOKEN {
                return Err(format!("profile label '{CANCEL_TOKEN}' is reserved"));
            }
            let args: Vec<String> = arg_string.split_whitespace().map(String::from).collect();
            if args.is_empty() {
                return Err(format!("profile '{label}' has no launch arguments"));
            }
            profiles.insert(label.clone(), TunnelProfile { label, args });
        }
        Ok(Self(profiles))
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// Reads `path`, or [`DEFAULT_CONFIG_FILE`] from the working directory.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or(DEFAULT_CONFIG_FILE);
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let mut config = Self::parse(&content, path)?;

        if let Ok(token) = std::env::var("TUNNELBOT_API_TOKEN") {
            config.telegram.api_token = token;
        }
        if let Ok(bin) = std::env::var("TUNNELBOT_AGENT_BIN") {
            config.agent.bin_path = bin;
        }

        config.finalize()?;
        Ok(config)
    }

    /// Parse and validate a TOML document without consulting the environment.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse(content, "<inline>")?;
        config.finalize()?;
        Ok(config)
    }

    fn parse(content: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    fn finalize(&mut self) -> Result<(), ConfigError> {
        if self.telegram.poll_interval_secs == 0 {
            self.telegram.poll_interval_secs = default_poll_interval();
        }
        self.agent.bin_path = expand_tilde(&self.agent.bin_path);

        if self.telegram.api_token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "telegram.api_token is empty (set it or TUNNELBOT_API_TOKEN)".into(),
            ));
        }
        if self.agent.bin_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "agent.bin_path is empty (set it or TUNNELBOT_AGENT_BIN)".into(),
            ));
        }
        if self.agent.status_url.trim().is_empty() {
            return Err(ConfigError::Invalid("agent.status_url is empty".into()));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.agent.settle_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.telegram.poll_interval_secs)
    }
}

/// Expand a leading `~` to `$HOME`; anything else passes through unchanged.
fn expand_tilde(path: &str) -> String {
    match (path.strip_prefix('~'), std::env::var("HOME")) {
        (Some(rest), Ok(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{home}{rest}")
        }
        _ => path.to_string(),
    }
}
