//! wa-gateway - WhatsApp session gateway for a small-business CRM
//!
//! This crate provides:
//! - A session registry and lifecycle controller (create, QR pairing,
//!   connect, disconnect, remove) with pairing-code renewal timers
//! - Lifecycle events pushed to subscribers
//! - A narrow delegate interface to the external messaging library, plus an
//!   in-memory simulated delegate
//! - The REST/WebSocket surface used by the dashboard, and a CLI client
//!
//! # Architecture
//!
//! - The server (`wa-gateway-server`) owns one `LifecycleController`
//! - The dashboard and the CLI (`wa-gateway`) talk to it over HTTP
//! - Protocol work is delegated entirely to a `MessagingDelegate`

pub mod client;
pub mod config;
pub mod delegate;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod qr;
pub mod server;
pub mod session;

pub use error::{GatewayError, Result};
