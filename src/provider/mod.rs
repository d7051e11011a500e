//! LLM provider selection
//!
//! Resolves which chat-model provider to use and the settings it needs from
//! environment variables. No client is built here; callers hand the resolved
//! [`ProviderSettings`] to whatever SDK they use.

pub mod bedrock;
mod config;
mod factory;

pub use config::*;
pub use factory::*;
