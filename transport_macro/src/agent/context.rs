//! Diagnostic context for expanding one template

use crate::logging::Code;
use crate::utils::Span;
use crate::{log_error, log_warning};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        }
    }
}

/// One reported problem, located on a template line
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub code: Code,
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: u32,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn column(&self) -> Option<u32> {
        self.span.map(|s| s.start.column)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file.display())?;
        }
        write!(f, "{}", self.line)?;
        if let Some(column) = self.column() {
            write!(f, ":{}", column)?;
        }
        write!(
            f,
            ": {}[{}]: {}",
            self.level.as_str(),
            self.code,
            self.message
        )
    }
}

/// Collects diagnostics with source location and keeps counts
///
/// Every diagnostic is also forwarded to the global logger, which is a
/// no-op when logging has not been initialized.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    file: Option<PathBuf>,
    line: u32,
    line_text: String,
    diagnostics: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_file(path: &Path) -> Self {
        Self {
            file: Some(path.to_path_buf()),
            ..Self::default()
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Move to a new template line; spans reported afterwards refer to it
    pub fn set_line(&mut self, line: u32, text: &str) {
        self.line = line;
        self.line_text = text.to_string();
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn error(&mut self, code: Code, message: &str, span: Option<Span>) {
        self.errors += 1;
        let span = span.map(|s| s.on_line(&self.line_text, self.line));
        match span {
            Some(s) => log_error!(code, message, span = s, "line" => self.line),
            None => log_error!(code, message, "line" => self.line),
        }
        self.push(DiagnosticLevel::Error, code, message, span);
    }

    pub fn warning(&mut self, code: Code, message: &str, span: Option<Span>) {
        self.warnings += 1;
        let span = span.map(|s| s.on_line(&self.line_text, self.line));
        match span {
            Some(s) => log_warning!(code, message, span = s, "line" => self.line),
            None => log_warning!(code, message, "line" => self.line),
        }
        self.push(DiagnosticLevel::Warning, code, message, span);
    }

    fn push(&mut self, level: DiagnosticLevel, code: Code, message: &str, span: Option<Span>) {
        self.diagnostics.push(Diagnostic {
            level,
            code,
            message: message.to_string(),
            file: self.file.clone(),
            line: self.line,
            span,
        });
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::codes;

    #[test]
    fn counts_and_locates_diagnostics() {
        let mut ctx = ErrorContext::for_file(Path::new("transport.tmpl"));
        ctx.set_line(3, "x = $$__BOGUS;");
        ctx.error(
            codes::tokenizer::UNKNOWN_MACRO_OR_INDEX,
            "Unknown macro or index 'BOGUS'",
            Some(Span::from_offsets(4, 13)),
        );
        ctx.warning(codes::expansion::UNROLL_CONFLICT, "conflict", None);

        assert_eq!(ctx.error_count(), 1);
        assert_eq!(ctx.warning_count(), 1);
        assert_eq!(
            ctx.diagnostics()[0].to_string(),
            "transport.tmpl:3:5: error[E020]: Unknown macro or index 'BOGUS'"
        );
        assert_eq!(
            ctx.diagnostics()[1].to_string(),
            "transport.tmpl:3: warning[W081]: conflict"
        );

        assert_eq!(ctx.take_diagnostics().len(), 2);
        assert!(ctx.diagnostics().is_empty());
        assert!(ctx.has_errors());
    }
}
