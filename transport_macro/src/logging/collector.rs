//! Per-template diagnostic collection with cargo-style output
//!
//! Batch translation runs templates on several threads; each thread records
//! its diagnostics here keyed by template path so the final report reads
//! template by template regardless of scheduling order.

use super::events::LogEvent;
use crate::config::compile_time::logging::MAX_LOG_EVENTS_PER_FILE;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Template being translated on the current thread
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub file_path: PathBuf,
    pub file_id: usize,
    pub started: Instant,
}

impl TemplateContext {
    pub fn new(file_path: PathBuf, file_id: usize) -> Self {
        Self {
            file_path,
            file_id,
            started: Instant::now(),
        }
    }
}

/// Totals over every template the collector has seen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub templates: usize,
    pub clean: usize,
    pub with_warnings: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Events past the per-template cap, counted but not kept
    pub dropped: usize,
}

#[derive(Debug, Default)]
struct TemplateLog {
    events: Vec<LogEvent>,
    dropped: usize,
    elapsed: Option<Duration>,
}

impl TemplateLog {
    fn errors(&self) -> impl Iterator<Item = &LogEvent> {
        self.events.iter().filter(|e| e.is_error())
    }

    fn warnings(&self) -> impl Iterator<Item = &LogEvent> {
        self.events.iter().filter(|e| e.is_warning())
    }
}

/// Thread-safe store of diagnostics, one log per template
#[derive(Debug, Default)]
pub struct ErrorCollector {
    templates: Mutex<BTreeMap<PathBuf, TemplateLog>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn logs(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, TemplateLog>> {
        self.templates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a template so it counts even if it logs nothing
    pub fn begin_template(&self, context: &TemplateContext) {
        self.logs().entry(context.file_path.clone()).or_default();
    }

    /// Close a template's log with its wall-clock time
    pub fn finish_template(&self, context: &TemplateContext) {
        let mut logs = self.logs();
        let log = logs.entry(context.file_path.clone()).or_default();
        log.elapsed = Some(context.started.elapsed());
    }

    /// Keep an event for `file_path`; past the per-template cap it is only counted
    pub fn record_event(&self, file_path: &Path, event: LogEvent) {
        let mut logs = self.logs();
        let log = logs.entry(file_path.to_path_buf()).or_default();
        if log.events.len() < MAX_LOG_EVENTS_PER_FILE {
            log.events.push(event);
        } else {
            log.dropped += 1;
        }
    }

    /// Events kept for one template, in the order they were logged
    pub fn events_for(&self, file_path: &Path) -> Vec<LogEvent> {
        self.logs()
            .get(file_path)
            .map(|log| log.events.clone())
            .unwrap_or_default()
    }

    /// Time a finished template took, if it was bracketed by begin/finish
    pub fn elapsed_for(&self, file_path: &Path) -> Option<Duration> {
        self.logs().get(file_path).and_then(|log| log.elapsed)
    }

    /// Count templates and diagnostics across everything recorded
    pub fn summary(&self) -> ProcessingSummary {
        let logs = self.logs();
        let mut summary = ProcessingSummary {
            templates: logs.len(),
            ..ProcessingSummary::default()
        };

        for log in logs.values() {
            let errors = log.errors().count();
            let warnings = log.warnings().count();
            summary.errors += errors;
            summary.warnings += warnings;
            summary.dropped += log.dropped;

            match (errors, warnings) {
                (0, 0) => summary.clean += 1,
                (0, _) => summary.with_warnings += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }

    /// Diagnostics grouped by template the way cargo prints compiler output
    ///
    /// Templates without errors or warnings are left out.
    pub fn format_cargo_style(&self) -> String {
        let mut output = String::new();
        {
            let logs = self.logs();
            for (path, log) in logs.iter() {
                if log.errors().next().is_none() && log.warnings().next().is_none() {
                    continue;
                }

                let _ = writeln!(output, "Translating {}...", path.display());
                for event in log.errors() {
                    push_event(&mut output, "error", path, event);
                    if let Some(help) = event.help() {
                        let _ = writeln!(output, "  = help: {}", help);
                    }
                }
                for event in log.warnings() {
                    push_event(&mut output, "warning", path, event);
                }
                if log.dropped > 0 {
                    let _ = writeln!(output, "  = note: {} more event(s) not shown", log.dropped);
                }
                output.push('\n');
            }
        }

        let summary = self.summary();
        if summary.errors > 0 {
            let _ = writeln!(output, "Total errors: {}", summary.errors);
        }
        if summary.warnings > 0 {
            let _ = writeln!(output, "Total warnings: {}", summary.warnings);
        }
        output
    }
}

fn push_event(output: &mut String, label: &str, path: &Path, event: &LogEvent) {
    let location = event
        .span
        .map(|s| format!("\n  --> {}:{}:{}", path.display(), s.start().line, s.start().column))
        .unwrap_or_default();
    let _ = writeln!(output, "{}[{}]: {}{}", label, event.code, event.message, location);

    for (key, value) in &event.context {
        if key != "file" && key != "file_id" {
            let _ = writeln!(output, "  = {}: {}", key, value);
        }
    }
}
