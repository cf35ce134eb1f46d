// RUNTIME PREFERENCES (User Experience)

use super::compile_time::expansion::DEFAULT_RECURSION_DEPTH;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Errors raised while loading a runtime configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid runtime configuration: {message}")]
    Parse { message: String },
}

impl ConfigError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            ConfigError::Io { .. } => crate::logging::codes::file_processing::IO_ERROR,
            ConfigError::Parse { .. } => crate::logging::codes::system::CONFIGURATION_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPreferences {
    /// Marker that introduces every macro and index literal
    pub macro_prefix: String,

    /// Plain assignment delimiter
    pub split_equal: String,

    /// Accumulating assignment delimiter
    pub split_sum_equal: String,

    /// Maximum depth of recursive re-application
    pub recursion_max: usize,

    /// Whether lines whose rules allow either form are unrolled
    pub unroll_by_default: bool,

    /// Roll any line that would expand to more than this many assignments
    pub unroll_threshold: Option<usize>,

    /// Line emitted when an index range is empty
    pub empty_range_marker: String,
}

impl Default for AgentPreferences {
    fn default() -> Self {
        Self {
            macro_prefix: env::var("TRANSPORT_MACRO_PREFIX").unwrap_or_else(|_| "$$__".to_string()),
            split_equal: env::var("TRANSPORT_SPLIT_EQUAL").unwrap_or_else(|_| "=".to_string()),
            split_sum_equal: env::var("TRANSPORT_SPLIT_SUM_EQUAL")
                .unwrap_or_else(|_| "+=".to_string()),
            recursion_max: env::var("TRANSPORT_RECURSION_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RECURSION_DEPTH),
            unroll_by_default: env::var("TRANSPORT_UNROLL_BY_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            unroll_threshold: env::var("TRANSPORT_UNROLL_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok()),
            empty_range_marker: env::var("TRANSPORT_EMPTY_RANGE_MARKER")
                .unwrap_or_else(|_| "// skipped: empty index range".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationPreferences {
    /// Extension identifying template files during discovery
    pub template_extension: String,

    /// Extension given to generated files; `None` strips the template extension
    pub output_extension: Option<String>,

    /// Whether to log per-file throughput
    pub enable_performance_logging: bool,

    /// Treat any expansion error as a failed translation
    pub fail_on_errors: bool,
}

impl Default for TranslationPreferences {
    fn default() -> Self {
        Self {
            template_extension: env::var("TRANSPORT_TEMPLATE_EXTENSION")
                .unwrap_or_else(|_| "tmpl".to_string()),
            output_extension: env::var("TRANSPORT_OUTPUT_EXTENSION").ok(),
            enable_performance_logging: env::var("TRANSPORT_ENABLE_PERFORMANCE_LOGGING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            fail_on_errors: env::var("TRANSPORT_FAIL_ON_ERRORS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingPreferences {
    /// Whether to use structured JSON logging
    pub use_structured_logging: bool,

    /// Whether to enable console output
    pub enable_console_logging: bool,

    /// Preferred minimum log level
    pub min_log_level: LogLevel,

    /// Whether to include performance metrics in logs
    pub log_performance_events: bool,

    /// Whether to enable cargo-style error reporting
    pub enable_cargo_style_output: bool,

    /// Whether to include file context in log messages
    pub include_file_context: bool,

    /// Append every event to this file as well
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: env::var("TRANSPORT_LOGGING_USE_STRUCTURED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            enable_console_logging: env::var("TRANSPORT_LOGGING_ENABLE_CONSOLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            min_log_level: env::var("TRANSPORT_LOGGING_MIN_LEVEL")
                .ok()
                .and_then(|v| parse_log_level(&v))
                .unwrap_or(LogLevel::Info),
            log_performance_events: env::var("TRANSPORT_LOGGING_LOG_PERFORMANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            enable_cargo_style_output: env::var("TRANSPORT_LOGGING_CARGO_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            include_file_context: env::var("TRANSPORT_LOGGING_INCLUDE_FILE_CONTEXT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            log_file: env::var_os("TRANSPORT_LOGGING_FILE").map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Convert to events::LogLevel
    pub fn to_events_log_level(&self) -> crate::logging::events::LogLevel {
        match self {
            LogLevel::Error => crate::logging::events::LogLevel::Error,
            LogLevel::Warning => crate::logging::events::LogLevel::Warning,
            LogLevel::Info => crate::logging::events::LogLevel::Info,
            LogLevel::Debug => crate::logging::events::LogLevel::Debug,
        }
    }
}

/// Parse log level from string (used for environment variables)
pub fn parse_log_level(level: &str) -> Option<LogLevel> {
    match level.to_lowercase().as_str() {
        "error" | "0" => Some(LogLevel::Error),
        "warning" | "warn" | "1" => Some(LogLevel::Warning),
        "info" | "2" => Some(LogLevel::Info),
        "debug" | "3" => Some(LogLevel::Debug),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub agent: AgentPreferences,
    pub translation: TranslationPreferences,
    pub logging: LoggingPreferences,
}

impl RuntimeConfig {
    /// Parse a runtime configuration; missing sections fall back to environment defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }
}

/// Environment variable names for configuration
pub mod env_vars {
    // Agent
    pub const MACRO_PREFIX: &str = "TRANSPORT_MACRO_PREFIX";
    pub const SPLIT_EQUAL: &str = "TRANSPORT_SPLIT_EQUAL";
    pub const SPLIT_SUM_EQUAL: &str = "TRANSPORT_SPLIT_SUM_EQUAL";
    pub const RECURSION_MAX: &str = "TRANSPORT_RECURSION_MAX";
    pub const UNROLL_BY_DEFAULT: &str = "TRANSPORT_UNROLL_BY_DEFAULT";
    pub const UNROLL_THRESHOLD: &str = "TRANSPORT_UNROLL_THRESHOLD";
    pub const EMPTY_RANGE_MARKER: &str = "TRANSPORT_EMPTY_RANGE_MARKER";

    // Translation
    pub const TEMPLATE_EXTENSION: &str = "TRANSPORT_TEMPLATE_EXTENSION";
    pub const OUTPUT_EXTENSION: &str = "TRANSPORT_OUTPUT_EXTENSION";
    pub const ENABLE_PERFORMANCE_LOGGING: &str = "TRANSPORT_ENABLE_PERFORMANCE_LOGGING";
    pub const FAIL_ON_ERRORS: &str = "TRANSPORT_FAIL_ON_ERRORS";

    // Logging
    pub const LOGGING_USE_STRUCTURED: &str = "TRANSPORT_LOGGING_USE_STRUCTURED";
    pub const LOGGING_ENABLE_CONSOLE: &str = "TRANSPORT_LOGGING_ENABLE_CONSOLE";
    pub const LOGGING_MIN_LEVEL: &str = "TRANSPORT_LOGGING_MIN_LEVEL";
    pub const LOGGING_LOG_PERFORMANCE: &str = "TRANSPORT_LOGGING_LOG_PERFORMANCE";
    pub const LOGGING_CARGO_STYLE: &str = "TRANSPORT_LOGGING_CARGO_STYLE";
    pub const LOGGING_INCLUDE_FILE_CONTEXT: &str = "TRANSPORT_LOGGING_INCLUDE_FILE_CONTEXT";
    pub const LOGGING_FILE: &str = "TRANSPORT_LOGGING_FILE";
}
