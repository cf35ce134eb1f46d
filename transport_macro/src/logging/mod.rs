//! Global logging for the macro engine
//!
//! Thread-safe global logging with per-template context for batch runs,
//! cargo-style diagnostic summaries, and a macro interface that is a no-op
//! until `init_global_logging` has been called.

pub mod codes;
pub mod collector;
pub mod config;
pub mod events;
pub mod macros;
pub mod service;

use crate::config::runtime::LoggingPreferences;
use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

pub use codes::Code;
pub use collector::{ErrorCollector, ProcessingSummary, TemplateContext};
pub use events::{LogEvent, LogLevel};
pub use service::{
    ConsoleLogger, FileLogger, Logger, LoggingService, MemoryLogger, MultiLogger,
    StructuredLogger,
};

// ============================================================================
// GLOBAL STATE
// ============================================================================

static GLOBAL_LOGGER: OnceLock<LoggingService> = OnceLock::new();
static GLOBAL_ERROR_COLLECTOR: OnceLock<ErrorCollector> = OnceLock::new();

thread_local! {
    static FILE_CONTEXT: RefCell<Option<TemplateContext>> = const { RefCell::new(None) };
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Install the process-wide logger described by `preferences`
///
/// `frontend` receives events when console logging is off, normally a
/// bridge into the host's `log` facade. Fails if called twice or if the
/// configured log file cannot be opened.
pub fn init_global_logging(
    preferences: LoggingPreferences,
    frontend: Option<Arc<dyn Logger>>,
) -> Result<(), String> {
    config::validate_limits().map_err(|e| format!("Configuration validation failed: {}", e))?;

    let service = service::configured_service(&preferences, frontend).map_err(|e| {
        format!(
            "Cannot open log file {}: {}",
            preferences
                .log_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            e
        )
    })?;

    GLOBAL_LOGGER
        .set(service)
        .map_err(|_| "Global logger already initialized".to_string())?;
    // The logger slot guards re-entry, so these cannot already be set
    let _ = GLOBAL_ERROR_COLLECTOR.set(ErrorCollector::new());
    let _ = config::init_runtime_preferences(preferences);

    let required_codes = ["ERR001", "E005", "E020", "E040", "E060", "W080"];
    for &code in &required_codes {
        if codes::get_description(code) == "Unknown error" {
            return Err(format!("Missing metadata for error code: {}", code));
        }
    }

    emit(LogEvent::success(
        codes::success::SYSTEM_INITIALIZATION_COMPLETED,
        "Global logging system initialized",
    ));
    Ok(())
}

pub fn is_initialized() -> bool {
    GLOBAL_LOGGER.get().is_some()
}

fn global_logger() -> Option<&'static LoggingService> {
    GLOBAL_LOGGER.get()
}

fn global_error_collector() -> Option<&'static ErrorCollector> {
    GLOBAL_ERROR_COLLECTOR.get()
}

// ============================================================================
// FILE CONTEXT MANAGEMENT
// ============================================================================

/// Set the template being translated on the current thread
pub fn set_file_context(file_path: PathBuf, file_id: usize) {
    let context = TemplateContext::new(file_path, file_id);

    if let Some(collector) = global_error_collector() {
        collector.begin_template(&context);
    }

    FILE_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = Some(context);
    });
}

pub fn clear_file_context() {
    let finished = FILE_CONTEXT.with(|ctx| ctx.borrow_mut().take());

    if let (Some(context), Some(collector)) = (finished, global_error_collector()) {
        collector.finish_template(&context);
    }
}

/// Run `f` with the file context set, clearing it afterwards
pub fn with_file_context<F, R>(file_path: PathBuf, file_id: usize, f: F) -> R
where
    F: FnOnce() -> R,
{
    set_file_context(file_path, file_id);
    let result = f();
    clear_file_context();
    result
}

pub fn get_current_file_context() -> Option<TemplateContext> {
    FILE_CONTEXT.with(|ctx| ctx.borrow().clone())
}

// ============================================================================
// MACRO SUPPORT
// ============================================================================

/// Route an event built by the logging macros
///
/// Inside a file context the event is tagged with the template and, when it
/// is an error or warning, kept for the cargo-style summary.
#[doc(hidden)]
pub fn emit(mut event: LogEvent) {
    let file_ctx = get_current_file_context();

    if let Some(ctx) = &file_ctx {
        if config::include_file_context() {
            event = event
                .with_context("file", &ctx.file_path.display().to_string())
                .with_context("file_id", &ctx.file_id.to_string());
        }
        if event.is_error() || event.is_warning() {
            if let Some(collector) = global_error_collector() {
                collector.record_event(&ctx.file_path, event.clone());
            }
        }
    }

    if let Some(logger) = global_logger() {
        logger.log_event(event);
    }
}

// ============================================================================
// BATCH REPORTING
// ============================================================================

/// Cargo-style summary of everything collected so far, if logging is up
pub fn cargo_style_summary() -> Option<String> {
    global_error_collector().map(ErrorCollector::format_cargo_style)
}

/// Error logging that falls back to stderr when uninitialized
pub fn safe_log_error(code: Code, message: &str) {
    if let Some(logger) = global_logger() {
        logger.log_event(LogEvent::error(code, message));
    } else {
        eprintln!("[ERROR] FALLBACK: [{}] {}", code.as_str(), message);
    }
}
