//! Logger backends and the level filter in front of them
//!
//! Engine output (generated code) goes to stdout, so every console backend
//! here writes to stderr.

use super::codes::Code;
use super::events::{LogEvent, LogLevel};
use crate::config::compile_time::logging::LOG_BUFFER_SIZE;
use crate::config::runtime::LoggingPreferences;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for log events
pub trait Logger: Send + Sync {
    fn log(&self, event: &LogEvent);
}

/// Drops events below the configured level before any backend sees them
pub struct LoggingService {
    logger: Arc<dyn Logger>,
    min_level: LogLevel,
}

impl LoggingService {
    pub fn new(logger: Arc<dyn Logger>, min_level: LogLevel) -> Self {
        Self { logger, min_level }
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level <= self.min_level
    }

    pub fn log_event(&self, event: LogEvent) {
        if self.should_log(event.level) {
            self.logger.log(&event);
        }
    }
}

// ============================================================================
// BACKENDS
// ============================================================================

/// `[LEVEL] CODE - message` lines on stderr
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, event: &LogEvent) {
        eprintln!("{}", event.format());
    }
}

/// JSON lines on stderr
pub struct StructuredLogger;

impl Logger for StructuredLogger {
    fn log(&self, event: &LogEvent) {
        eprintln!("{}", event.format_json().unwrap_or_else(|_| event.format()));
    }
}

/// Appends to a log file opened once up front
pub struct FileLogger {
    file: Mutex<File>,
    structured: bool,
}

impl FileLogger {
    /// Open (creating parent directories) in append mode
    pub fn open(path: &Path, structured: bool) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            structured,
        })
    }
}

impl Logger for FileLogger {
    fn log(&self, event: &LogEvent) {
        let line = if self.structured {
            event.format_json().unwrap_or_else(|_| event.format())
        } else {
            event.format()
        };
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        // A failing log write has nowhere to be reported
        let _ = writeln!(file, "{}", line);
    }
}

/// Keeps the most recent events in memory
#[derive(Default)]
pub struct MemoryLogger {
    events: Mutex<Vec<LogEvent>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_code(&self, code: Code) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|event| event.code == code)
    }
}

impl Logger for MemoryLogger {
    fn log(&self, event: &LogEvent) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if events.len() >= LOG_BUFFER_SIZE {
            events.remove(0);
        }
        events.push(event.clone());
    }
}

/// Sends each event to every backend in turn
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Arc<dyn Logger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, logger: Arc<dyn Logger>) -> Self {
        self.loggers.push(logger);
        self
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl Logger for MultiLogger {
    fn log(&self, event: &LogEvent) {
        for logger in &self.loggers {
            logger.log(event);
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Backends selected by the logging preferences
///
/// With console logging enabled the engine prints its own lines (JSON when
/// structured logging is on); otherwise events go to `frontend`, typically
/// a bridge into the host's log facade. A configured log file receives
/// every event in addition.
pub fn configured_service(
    preferences: &LoggingPreferences,
    frontend: Option<Arc<dyn Logger>>,
) -> io::Result<LoggingService> {
    let mut sinks = MultiLogger::new();

    if preferences.enable_console_logging {
        sinks = if preferences.use_structured_logging {
            sinks.with(Arc::new(StructuredLogger))
        } else {
            sinks.with(Arc::new(ConsoleLogger))
        };
    } else if let Some(frontend) = frontend {
        sinks = sinks.with(frontend);
    }

    if let Some(path) = &preferences.log_file {
        let file = FileLogger::open(path, preferences.use_structured_logging)?;
        sinks = sinks.with(Arc::new(file));
    }

    Ok(LoggingService::new(
        Arc::new(sinks),
        preferences.min_log_level.to_events_log_level(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::runtime::LogLevel as PreferredLevel;
    use crate::logging::codes;
    use tempfile::tempdir;

    fn preferences() -> LoggingPreferences {
        LoggingPreferences {
            use_structured_logging: false,
            enable_console_logging: false,
            min_log_level: PreferredLevel::Info,
            log_performance_events: false,
            enable_cargo_style_output: false,
            include_file_context: true,
            log_file: None,
        }
    }

    #[test]
    fn level_filter_applies_before_backends() {
        let memory = Arc::new(MemoryLogger::new());
        let service = LoggingService::new(memory.clone(), LogLevel::Warning);

        service.log_event(LogEvent::debug("token list"));
        service.log_event(LogEvent::info("translating"));
        service.log_event(LogEvent::warning(codes::expansion::UNROLL_CONFLICT, "conflict"));
        service.log_event(LogEvent::error(codes::system::INTERNAL_ERROR, "broken"));

        assert_eq!(memory.events().len(), 2);
        assert!(memory.has_code(codes::expansion::UNROLL_CONFLICT));
    }

    #[test]
    fn frontend_receives_events_when_console_is_off() {
        let memory = Arc::new(MemoryLogger::new());
        let service = configured_service(&preferences(), Some(memory.clone())).unwrap();

        service.log_event(LogEvent::success(codes::success::MODEL_LOADED, "loaded"));
        service.log_event(LogEvent::debug("filtered"));

        assert_eq!(memory.events().len(), 1);
        assert_eq!(service.min_level(), LogLevel::Info);
    }

    #[test]
    fn console_replaces_frontend() {
        let memory = Arc::new(MemoryLogger::new());
        let mut preferences = preferences();
        preferences.enable_console_logging = true;
        preferences.use_structured_logging = true;

        let service = configured_service(&preferences, Some(memory.clone())).unwrap();
        service.log_event(LogEvent::info("to stderr"));
        assert!(memory.events().is_empty());
    }

    #[test]
    fn log_file_gets_every_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("transport.log");
        let mut preferences = preferences();
        preferences.use_structured_logging = true;
        preferences.log_file = Some(path.clone());

        let memory = Arc::new(MemoryLogger::new());
        let service = configured_service(&preferences, Some(memory.clone())).unwrap();
        service.log_event(LogEvent::success(codes::success::TRANSLATION_COMPLETE, "done"));
        service.log_event(LogEvent::debug("filtered"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"code\":\"I080\""));
        assert_eq!(memory.events().len(), 1);
    }

    #[test]
    fn unopenable_log_file_is_an_error() {
        let dir = tempdir().unwrap();
        let mut preferences = preferences();
        // A directory cannot be opened for appending
        preferences.log_file = Some(dir.path().to_path_buf());
        assert!(configured_service(&preferences, None).is_err());
    }

    #[test]
    fn multi_logger_fans_out() {
        let first = Arc::new(MemoryLogger::new());
        let second = Arc::new(MemoryLogger::new());
        let multi = MultiLogger::new().with(first.clone()).with(second.clone());
        assert_eq!(multi.len(), 2);

        multi.log(&LogEvent::info("both"));
        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
    }
}
