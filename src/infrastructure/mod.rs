//! Infrastructure layer: capability adapters, retry, config, and IO.

pub mod anthropic;
pub mod config;
pub mod mock;
pub mod retry;
pub mod store;

pub use anthropic::AnthropicClient;
pub use config::{ConfigError, ConfigLoader};
pub use retry::RetryPolicy;
