//! Loader configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{LoaderConfig, LogLevel, available_memory, memory_budget_for};
pub use args::CliArgs;
pub use storage::{ConfigError, StorageManager};
