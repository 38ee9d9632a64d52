//! Tunneling agent management.
//!
//! - [`controller`] — the single-instance process lifecycle ([`ProcessController`])
//! - [`status`] — client for the agent's local status API ([`StatusClient`])

pub mod controller;
pub mod status;

pub use controller::ProcessController;
pub use status::{format_report, StatusClient, TunnelEndpoint};
