//! AI-assisted features behind a fallback-safe gateway.
//!
//! - [`client`]: the [`LanguageModel`] seam and the HTTP chat client
//! - [`schema`]: request bodies and strict reply schemas
//! - [`prompts`]: user context and prompt templates
//! - [`gateway`]: call, validate, fall back, record

pub mod client;
pub mod gateway;
pub mod prompts;
pub mod schema;

pub use client::{LanguageModel, OpenAiClient};
pub use gateway::AiGateway;
pub use prompts::UserContext;
