//! Template file reading with compile-time limits

use crate::config::compile_time::file_processing::{MAX_FILE_SIZE, MAX_LINE_COUNT};
use crate::logging::codes;
use crate::{log_debug, log_error, log_success};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateFileError {
    #[error("Template not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid template path: {path}")]
    InvalidPath { path: String },

    #[error("Template too large: {size} bytes (max: {max_size})")]
    FileTooLarge { size: u64, max_size: u64 },

    #[error("Template exceeds maximum line count: {lines} (max: {max_lines})")]
    TooManyLines { lines: usize, max_lines: usize },

    #[error("Template is empty: {path}")]
    EmptyFile { path: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Invalid UTF-8 encoding in template: {path}")]
    InvalidEncoding { path: String },

    #[error("I/O error reading template: {message}")]
    IoError { message: String },
}

impl TemplateFileError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            TemplateFileError::FileNotFound { .. } => codes::file_processing::FILE_NOT_FOUND,
            TemplateFileError::InvalidPath { .. } => codes::file_processing::INVALID_PATH,
            TemplateFileError::FileTooLarge { .. } | TemplateFileError::TooManyLines { .. } => {
                codes::file_processing::FILE_TOO_LARGE
            }
            TemplateFileError::EmptyFile { .. } => codes::file_processing::EMPTY_FILE,
            TemplateFileError::PermissionDenied { .. } => codes::file_processing::PERMISSION_DENIED,
            TemplateFileError::InvalidEncoding { .. } => codes::file_processing::INVALID_ENCODING,
            TemplateFileError::IoError { .. } => codes::file_processing::IO_ERROR,
        }
    }

    pub fn requires_halt(&self) -> bool {
        codes::requires_halt(self.error_code().as_str())
    }

    pub fn severity(&self) -> &'static str {
        codes::get_severity(self.error_code().as_str()).as_str()
    }

    pub fn category(&self) -> &'static str {
        codes::get_category(self.error_code().as_str())
    }

    pub fn is_recoverable(&self) -> bool {
        codes::is_recoverable(self.error_code().as_str())
    }

    fn from_io(error: std::io::Error, path: &Path) -> Self {
        let path = path.display().to_string();
        match error.kind() {
            ErrorKind::NotFound => TemplateFileError::FileNotFound { path },
            ErrorKind::PermissionDenied => TemplateFileError::PermissionDenied { path },
            ErrorKind::InvalidData => TemplateFileError::InvalidEncoding { path },
            _ => TemplateFileError::IoError {
                message: format!("{}: {}", path, error),
            },
        }
    }
}

/// Template contents with the facts gathered while reading it
#[derive(Debug, Clone)]
pub struct TemplateFile {
    pub path: PathBuf,
    pub source: String,
    pub size: u64,
    pub line_count: usize,
    pub read_duration: Duration,
}

impl TemplateFile {
    pub fn lines(&self) -> std::str::Lines<'_> {
        self.source.lines()
    }

    /// Whether the template ends in a newline, so output can match
    pub fn has_trailing_newline(&self) -> bool {
        self.source.ends_with('\n')
    }
}

/// Reads templates, enforcing size, line count and encoding limits
#[derive(Debug, Clone, Default)]
pub struct TemplateReader {
    pub enable_performance_logging: bool,
}

impl TemplateReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_performance_logging(mut self, enabled: bool) -> Self {
        self.enable_performance_logging = enabled;
        self
    }

    pub fn read(&self, path: &Path) -> Result<TemplateFile, TemplateFileError> {
        let started = Instant::now();
        log_debug!("Reading template", "file" => path.display());

        let result = self.read_checked(path, started);
        if let Err(error) = &result {
            log_error!(error.error_code(), &error.to_string(), "file" => path.display());
        }
        result
    }

    fn read_checked(&self, path: &Path, started: Instant) -> Result<TemplateFile, TemplateFileError> {
        if path.as_os_str().is_empty() {
            return Err(TemplateFileError::InvalidPath {
                path: String::new(),
            });
        }

        let metadata = fs::metadata(path).map_err(|e| TemplateFileError::from_io(e, path))?;
        if !metadata.is_file() {
            return Err(TemplateFileError::InvalidPath {
                path: path.display().to_string(),
            });
        }

        let size = metadata.len();
        if size > MAX_FILE_SIZE {
            return Err(TemplateFileError::FileTooLarge {
                size,
                max_size: MAX_FILE_SIZE,
            });
        }
        if size == 0 {
            return Err(TemplateFileError::EmptyFile {
                path: path.display().to_string(),
            });
        }

        let source = fs::read_to_string(path).map_err(|e| TemplateFileError::from_io(e, path))?;
        let line_count = source.lines().count();
        if line_count > MAX_LINE_COUNT {
            return Err(TemplateFileError::TooManyLines {
                lines: line_count,
                max_lines: MAX_LINE_COUNT,
            });
        }

        let template = TemplateFile {
            path: path.to_path_buf(),
            source,
            size,
            line_count,
            read_duration: started.elapsed(),
        };

        if self.enable_performance_logging {
            log_success!(codes::success::FILE_PROCESSING_SUCCESS, "Template read",
                "file" => path.display(),
                "size_bytes" => size,
                "lines" => line_count,
                "duration_ms" => format!("{:.2}", template.read_duration.as_secs_f64() * 1000.0)
            );
        }

        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn reads_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kernel.tmpl");
        fs::write(&path, "// $$__NAME\nint n = $$__NUMBER_FIELDS;\n").unwrap();

        let template = TemplateReader::new().read(&path).unwrap();
        assert_eq!(template.line_count, 2);
        assert!(template.has_trailing_newline());
        assert_eq!(template.lines().next(), Some("// $$__NAME"));
    }

    #[test]
    fn missing_template() {
        let result = TemplateReader::new().read(Path::new("/nonexistent/kernel.tmpl"));
        assert_matches!(result, Err(TemplateFileError::FileNotFound { .. }));
    }

    #[test]
    fn empty_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.tmpl");
        fs::write(&path, "").unwrap();
        assert_matches!(
            TemplateReader::new().read(&path),
            Err(TemplateFileError::EmptyFile { .. })
        );
    }

    #[test]
    fn directory_is_not_a_template() {
        let dir = tempdir().unwrap();
        assert_matches!(
            TemplateReader::new().read(dir.path()),
            Err(TemplateFileError::InvalidPath { .. })
        );
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("binary.tmpl");
        fs::write(&path, [0x66, 0x6f, 0xff, 0xfe]).unwrap();
        assert_matches!(
            TemplateReader::new().read(&path),
            Err(TemplateFileError::InvalidEncoding { .. })
        );
    }

    #[test]
    fn too_many_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.tmpl");
        fs::write(&path, "\n".repeat(MAX_LINE_COUNT + 1)).unwrap();
        assert_matches!(
            TemplateReader::new().read(&path),
            Err(TemplateFileError::TooManyLines { lines, max_lines })
                if lines > max_lines && max_lines == MAX_LINE_COUNT
        );
    }

    #[test]
    fn error_metadata() {
        let error = TemplateFileError::FileNotFound {
            path: "kernel.tmpl".to_string(),
        };
        assert_eq!(error.error_code().as_str(), "E005");
        assert_eq!(error.category(), "FileProcessing");
        assert_eq!(error.severity(), "Medium");
        assert!(!error.is_recoverable());
        assert!(error.requires_halt());
    }
}
