//! Async HTTP transport for the Gravity portal API.
//!
//! Every cluster controller exposes the operator API under `portal/v1/`.
//! This crate handles URL construction, Basic/Bearer authentication, TLS,
//! JSON request/response handling, file downloads, and websocket log
//! tails. It carries no domain types: `gravity-core` owns the models and
//! maps this crate's [`Error`] onto its own error kinds.

pub mod auth;
pub mod client;
pub mod error;
pub mod logs;
pub mod transport;

pub use auth::Credentials;
pub use client::PortalClient;
pub use error::Error;
pub use logs::LineStream;
pub use transport::{TlsMode, TransportConfig};
