//! Error types for every layer of the bot.
//!
//! Each concern owns its own enum so callers can tell the causes apart,
//! while the `Display` output doubles as the human-readable detail that ends
//! up in chat replies and logs.

use thiserror::Error;

/// Startup configuration failure. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failure to query the tunneling agent's local status endpoint.
#[derive(Error, Debug)]
pub enum StatusError {
    /// Connection refused, timeout, DNS failure and friends.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("status endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The body was not a valid tunnel list.
    #[error("malformed status payload: {0}")]
    Protocol(String),
}

/// Failed lifecycle transition. `Display` is the chat-visible message.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Failed to launch: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Failed to get tunnels status: {0}")]
    StatusFetchFailed(#[source] StatusError),

    #[error("Failed to shutdown: no running process")]
    NoProcessRunning,
}

/// Failure talking to the chat transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API accepted the request but reported `ok: false`.
    #[error("API error: {description}")]
    Api { description: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}
