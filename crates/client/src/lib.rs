//! Remote API gateway for the sprite generation service.
//!
//! - [`GenerationGateway`] — the typed operation surface the application
//!   layer depends on; tests substitute an in-memory implementation.
//! - [`HttpGateway`] — the `reqwest` implementation talking to the real
//!   API.
//! - [`ApiError`] — transport, status and malformed-response failures.
//! - [`ClientConfig`] — base URL, transport deadline and freshness
//!   windows loaded from the environment.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;

pub use api::HttpGateway;
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use gateway::GenerationGateway;
