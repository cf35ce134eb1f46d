//! Logging preferences in force for this process
//!
//! Preferences are fixed once at start-up; until then the environment
//! defaults of `LoggingPreferences` apply.

use crate::config::compile_time::logging::*;
use crate::config::runtime::LoggingPreferences;
use crate::logging::events::LogLevel;
use std::sync::OnceLock;

static PREFERENCES: OnceLock<LoggingPreferences> = OnceLock::new();
static FALLBACK: OnceLock<LoggingPreferences> = OnceLock::new();

pub fn init_runtime_preferences(preferences: LoggingPreferences) -> Result<(), String> {
    PREFERENCES
        .set(preferences)
        .map_err(|_| "Logging preferences already initialized".to_string())
}

fn preferences() -> &'static LoggingPreferences {
    PREFERENCES
        .get()
        .unwrap_or_else(|| FALLBACK.get_or_init(LoggingPreferences::default))
}

pub fn get_min_log_level() -> LogLevel {
    preferences().min_log_level.to_events_log_level()
}

/// Whether `log_performance!` emits anything
pub fn log_performance_events() -> bool {
    preferences().log_performance_events
}

pub fn use_cargo_style_output() -> bool {
    preferences().enable_cargo_style_output
}

/// Whether events logged during a translation name the template
pub fn include_file_context() -> bool {
    preferences().include_file_context
}

/// Reject a build profile whose logging limits contradict each other
pub fn validate_limits() -> Result<(), String> {
    if !(100..=100_000).contains(&LOG_BUFFER_SIZE) {
        return Err(format!(
            "log buffer size {} outside 100..=100000",
            LOG_BUFFER_SIZE
        ));
    }
    if MAX_LOG_EVENTS_PER_FILE > LOG_BUFFER_SIZE {
        return Err(format!(
            "{} events per template exceeds the buffer of {}",
            MAX_LOG_EVENTS_PER_FILE, LOG_BUFFER_SIZE
        ));
    }
    Ok(())
}
