//! Loader configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::domain::entities::Size;
use crate::infrastructure::image::disk_cache::{DEFAULT_MAX_CACHE_SIZE, dirs_cache_path};
use crate::infrastructure::image::http::DEFAULT_TIMEOUT_SECS;

pub(crate) const APP_NAME: &str = "glint";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "linuxmobile";

const MIB: u64 = 1024 * 1024;

/// Assumed available memory when the system reports none.
const FALLBACK_AVAILABLE_MEMORY: u64 = 512 * MIB;

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Memory cache budget for a process with `available` bytes to spare.
///
/// Small heaps get a smaller share: under 64 MiB → 1/8, under 256 MiB → 1/6,
/// otherwise 1/4.
#[must_use]
pub const fn memory_budget_for(available: u64) -> u64 {
    if available < 64 * MIB {
        available / 8
    } else if available < 256 * MIB {
        available / 6
    } else {
        available / 4
    }
}

/// Currently available system memory in bytes.
#[must_use]
pub fn available_memory() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    match system.available_memory() {
        0 => FALLBACK_AVAILABLE_MEMORY,
        bytes => bytes,
    }
}

/// Image loader configuration, read from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Memory cache budget in bytes. Derived from available memory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_cache_bytes: Option<u64>,

    /// Disk cache budget in bytes.
    #[serde(default = "default_disk_cache_bytes")]
    pub disk_cache_bytes: u64,

    /// Disk cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Connect and request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Width used when a request does not specify one.
    #[serde(default = "default_width")]
    pub default_width: u32,

    /// Height used when a request does not specify one.
    #[serde(default = "default_height")]
    pub default_height: u32,
}

const fn default_disk_cache_bytes() -> u64 {
    DEFAULT_MAX_CACHE_SIZE
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_width() -> u32 {
    1920
}

const fn default_height() -> u32 {
    1080
}

impl LoaderConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache_dir = Some(cache_dir.clone());
        }
        if let Some(bytes) = args.memory_cache_bytes {
            self.memory_cache_bytes = Some(bytes);
        }
        if let Some(bytes) = args.disk_cache_bytes {
            self.disk_cache_bytes = bytes;
        }
        if let Some(timeout) = args.timeout_secs {
            self.timeout_secs = timeout;
        }
    }

    /// Memory cache budget, falling back to a share of available memory.
    #[must_use]
    pub fn effective_memory_cache_bytes(&self) -> u64 {
        self.memory_cache_bytes
            .unwrap_or_else(|| memory_budget_for(available_memory()))
    }

    /// Disk cache directory, falling back to the project cache dir.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(dirs_cache_path)
    }

    /// Network timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Size used for requests without explicit dimensions.
    #[must_use]
    pub const fn viewport(&self) -> Size {
        Size::new(self.default_width, self.default_height)
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("glint.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            memory_cache_bytes: None,
            disk_cache_bytes: default_disk_cache_bytes(),
            cache_dir: None,
            timeout_secs: default_timeout_secs(),
            default_width: default_width(),
            default_height: default_height(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use test_case::test_case;

    #[test_case(32 * MIB, 4 * MIB ; "small_heap_eighth")]
    #[test_case(120 * MIB, 20 * MIB ; "medium_heap_sixth")]
    #[test_case(64 * MIB, 64 * MIB / 6 ; "boundary_is_medium")]
    #[test_case(256 * MIB, 64 * MIB ; "large_heap_quarter")]
    #[test_case(8 * 1024 * MIB, 2048 * MIB ; "very_large_heap")]
    fn test_memory_budget_tiers(available: u64, expected: u64) {
        assert_eq!(memory_budget_for(available), expected);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
            log_level = "debug"
            memory_cache_bytes = 1048576
            disk_cache_bytes = 2097152
            cache_dir = "/tmp/glint-test"
            timeout_secs = 5
        "#;

        let config: LoaderConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.effective_memory_cache_bytes(), 1_048_576);
        assert_eq!(config.disk_cache_bytes, 2_097_152);
        assert_eq!(config.effective_cache_dir(), PathBuf::from("/tmp/glint-test"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.viewport(), Size::new(1920, 1080));
    }

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();

        assert_eq!(config.disk_cache_bytes, 5 * MIB);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.memory_cache_bytes.is_none());
        assert!(config.effective_memory_cache_bytes() > 0);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: LoaderConfig = toml::from_str("").unwrap();
        assert_eq!(config.disk_cache_bytes, DEFAULT_MAX_CACHE_SIZE);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config: LoaderConfig = toml::from_str("disk_cache_bytes = 100").unwrap();
        let args = CliArgs::parse_from([
            "glint",
            "https://example.com/a.png",
            "--disk-cache-bytes",
            "200",
            "--log-level",
            "trace",
        ]);

        config.merge_with_args(&args);

        assert_eq!(config.disk_cache_bytes, 200);
        assert_eq!(config.log_level, LogLevel::Trace);
        assert!(config.cache_dir.is_none());
    }
}
