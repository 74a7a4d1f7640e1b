pub mod config;
pub mod loader;
pub mod validate;

pub use config::{CacheConfig, Config, RetryConfig, SourceConfig};
pub use loader::{apply_env_overrides, load_config, MODULES_URL_ENV, QUOTE_URL_ENV};
pub use validate::validate_config;
