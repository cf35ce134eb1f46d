//! Logging macros; context values accept any Display type
//!
//! Each macro builds a `LogEvent` and hands it to `logging::emit`, so all
//! of them are silent until a global logger is installed.

// ============================================================================
// ERROR / WARNING LOGGING
// ============================================================================

/// Log an error with a diagnostic code
#[macro_export]
macro_rules! log_error {
    ($code:expr, $message:expr, span = $span:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $crate::logging::emit(
            $crate::logging::LogEvent::error($code, $message)
                .with_span($span)
                $(.with_context($key, &format!("{}", $value)))*
        )
    };

    ($code:expr, $message:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $crate::logging::emit(
            $crate::logging::LogEvent::error($code, $message)
                $(.with_context($key, &format!("{}", $value)))*
        )
    };
}

/// Log a warning with a diagnostic code
#[macro_export]
macro_rules! log_warning {
    ($code:expr, $message:expr, span = $span:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $crate::logging::emit(
            $crate::logging::LogEvent::warning($code, $message)
                .with_span($span)
                $(.with_context($key, &format!("{}", $value)))*
        )
    };

    ($code:expr, $message:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $crate::logging::emit(
            $crate::logging::LogEvent::warning($code, $message)
                $(.with_context($key, &format!("{}", $value)))*
        )
    };
}

// ============================================================================
// SUCCESS / INFO LOGGING
// ============================================================================

#[macro_export]
macro_rules! log_success {
    ($code:expr, $message:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $crate::logging::emit(
            $crate::logging::LogEvent::success($code, $message)
                $(.with_context($key, &format!("{}", $value)))*
        )
    };
}

#[macro_export]
macro_rules! log_info {
    ($message:expr $(, $key:expr => $value:expr)* $(,)?) => {
        $crate::logging::emit(
            $crate::logging::LogEvent::info($message)
                $(.with_context($key, &format!("{}", $value)))*
        )
    };
}

/// Log a debug message; context is not even formatted below debug level
#[macro_export]
macro_rules! log_debug {
    ($message:expr $(, $key:expr => $value:expr)* $(,)?) => {
        if $crate::logging::config::get_min_log_level() >= $crate::logging::LogLevel::Debug {
            $crate::logging::emit(
                $crate::logging::LogEvent::debug($message)
                    $(.with_context($key, &format!("{}", $value)))*
            )
        }
    };
}

// ============================================================================
// CONVENIENCE MACROS
// ============================================================================

/// Log a timed success event; honours the performance-event preference
#[macro_export]
macro_rules! log_performance {
    ($code:expr, $message:expr, duration = $duration:expr $(, $key:expr => $value:expr)* $(,)?) => {
        if $crate::logging::config::log_performance_events() {
            $crate::log_success!($code, $message,
                "duration_ms" => $duration.as_secs_f64() * 1000.0
                $(, $key => $value)*
            );
        }
    };
}
