#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

//! tunnelbot library — the pieces behind the `tunnelbot` binary.
//!
//! - `auth` — operator allow-list
//! - `config` — TOML + env-var configuration
//! - `agent` — tunneling agent process controller and status client
//! - `router` — chat command / button dispatch
//! - `chat` — transport trait, Telegram client, update polling
//! - `error` — error types

pub mod agent;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod router;

#[cfg(test)]
mod testutil;

pub use agent::ProcessController;
pub use auth::AllowList;
pub use config::Config;
pub use router::Router;
