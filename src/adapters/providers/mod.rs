//! Generation provider adapters.

pub mod anthropic;
pub mod scripted;

pub use anthropic::AnthropicProvider;
pub use scripted::ScriptedProvider;
