//! # parley-providers
//!
//! Reasoning-service clients for Parley.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
