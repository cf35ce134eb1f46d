//! Batch translation of template directories
//!
//! Templates are discovered by extension and translated sequentially or on
//! worker threads. Every template gets a fresh agent and rule registry from
//! the `AgentFactory`, so no mutable state crosses translation units.

use crate::agent::{AgentConfig, MacroAgent};
use crate::config::compile_time::batch_processing::{MAX_FILES_PER_BATCH, MAX_WORKER_THREADS};
use crate::index::{IndexConvention, IndexRanges};
use crate::logging::{codes, Code};
use crate::package::{self, ModelDescriptor};
use crate::rules::{RegistryError, RuleRegistry};
use crate::translation::{TranslationReport, Translator};
use crate::{log_debug, log_error, log_info, log_success, log_warning};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// AGENT CONSTRUCTION
// ============================================================================

type RegistryBuilderFn = dyn Fn() -> Result<RuleRegistry, RegistryError> + Send + Sync;

/// Builds independent agents; shareable across worker threads
#[derive(Clone)]
pub struct AgentFactory {
    registry: Arc<RegistryBuilderFn>,
    config: AgentConfig,
    convention: IndexConvention,
    ranges: IndexRanges,
}

impl AgentFactory {
    pub fn new<F>(
        registry: F,
        config: AgentConfig,
        convention: IndexConvention,
        ranges: IndexRanges,
    ) -> Self
    where
        F: Fn() -> Result<RuleRegistry, RegistryError> + Send + Sync + 'static,
    {
        Self {
            registry: Arc::new(registry),
            config,
            convention,
            ranges,
        }
    }

    /// Factory for the standard packages over `model`
    pub fn for_model(model: Arc<ModelDescriptor>, config: AgentConfig) -> Self {
        let ranges = model.ranges();
        Self::new(
            move || package::standard_registry(model.clone()).map(|(registry, _)| registry),
            config,
            IndexConvention::default(),
            ranges,
        )
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn build(&self) -> Result<MacroAgent, RegistryError> {
        let registry = (self.registry)()?;
        Ok(MacroAgent::new(
            Arc::new(registry),
            self.config.clone(),
            self.convention.clone(),
            self.ranges,
        ))
    }
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory")
            .field("config", &self.config)
            .field("ranges", &self.ranges)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BATCH TYPES
// ============================================================================

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_threads: usize,
    pub recursive: bool,
    pub max_files: Option<usize>,
    pub fail_fast: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_threads: thread::available_parallelism()
                .map(|n| n.get().min(MAX_WORKER_THREADS))
                .unwrap_or(4),
            recursive: true,
            max_files: None,
            fail_fast: false,
        }
    }
}

/// A template that could not be translated
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub code: Code,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct BatchResults {
    pub successful: Vec<TranslationReport>,
    pub failed: Vec<BatchFailure>,
    pub files_discovered: usize,
    pub processing_duration: Duration,
}

impl BatchResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files_processed(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    pub fn success_count(&self) -> usize {
        self.successful.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn success_rate(&self) -> f64 {
        match self.files_processed() {
            0 => 0.0,
            processed => self.success_count() as f64 / processed as f64,
        }
    }

    pub fn total_replacements(&self) -> usize {
        self.successful.iter().map(|r| r.replacements).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.successful.iter().map(|r| r.errors).sum()
    }

    fn record(&mut self, outcome: Result<TranslationReport, BatchFailure>) {
        match outcome {
            Ok(report) => self.successful.push(report),
            Err(failure) => self.failed.push(failure),
        }
    }

    fn merge(&mut self, other: BatchResults) {
        self.successful.extend(other.successful);
        self.failed.extend(other.failed);
    }

    fn sort(&mut self) {
        self.successful.sort_by(|a, b| a.input.cmp(&b.input));
        self.failed.sort_by(|a, b| a.path.cmp(&b.path));
    }

    pub fn summary(&self) -> String {
        format!(
            "Batch translation completed: {} templates, {} translated ({:.1}%), {} failed, {} replacements, {:.2}s total",
            self.files_processed(),
            self.success_count(),
            self.success_rate() * 100.0,
            self.failure_count(),
            self.total_replacements(),
            self.processing_duration.as_secs_f64()
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("No .{extension} templates found in {path}")]
    NoTemplatesFound { path: String, extension: String },

    #[error("Too many templates: {count} (max: {max})")]
    TooManyTemplates { count: usize, max: usize },

    #[error("I/O error during directory traversal: {message}")]
    IoError { message: String },

    #[error("Cannot build rule registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("Worker thread failed: {message}")]
    WorkerFailure { message: String },
}

impl BatchError {
    pub fn error_code(&self) -> Code {
        match self {
            BatchError::DirectoryNotFound { .. } => codes::file_processing::FILE_NOT_FOUND,
            BatchError::NoTemplatesFound { .. } => codes::translation::NO_TEMPLATES_FOUND,
            BatchError::TooManyTemplates { .. } => codes::translation::TOO_MANY_TEMPLATES,
            BatchError::IoError { .. } => codes::file_processing::IO_ERROR,
            BatchError::Registry(error) => error.error_code(),
            BatchError::WorkerFailure { .. } => codes::translation::WORKER_FAILURE,
        }
    }
}

// ============================================================================
// TEMPLATE DISCOVERY
// ============================================================================

/// Templates under `dir` with the given extension, sorted
pub fn discover_templates(
    dir: &Path,
    extension: &str,
    config: &BatchConfig,
) -> Result<Vec<PathBuf>, BatchError> {
    log_info!("Starting template discovery",
        "directory" => dir.display(),
        "recursive" => config.recursive
    );

    if !dir.is_dir() {
        return Err(BatchError::DirectoryNotFound {
            path: dir.display().to_string(),
        });
    }

    let mut files = Vec::new();
    visit_directory(dir, extension, config.recursive, &mut files)?;

    if files.is_empty() {
        return Err(BatchError::NoTemplatesFound {
            path: dir.display().to_string(),
            extension: extension.to_string(),
        });
    }

    files.sort();

    if files.len() > MAX_FILES_PER_BATCH {
        return Err(BatchError::TooManyTemplates {
            count: files.len(),
            max: MAX_FILES_PER_BATCH,
        });
    }

    if let Some(max_files) = config.max_files {
        if files.len() > max_files {
            log_warning!(codes::translation::TOO_MANY_TEMPLATES, "Template limit reached; remaining templates skipped",
                "found" => files.len(),
                "limit" => max_files
            );
            files.truncate(max_files);
        }
    }

    log_success!(codes::success::TEMPLATE_DISCOVERY_COMPLETE, "Template discovery completed",
        "templates" => files.len(),
        "directory" => dir.display()
    );

    Ok(files)
}

fn visit_directory(
    dir: &Path,
    extension: &str,
    recursive: bool,
    files: &mut Vec<PathBuf>,
) -> Result<(), BatchError> {
    let io_error = |e: std::io::Error| BatchError::IoError {
        message: format!("{}: {}", dir.display(), e),
    };

    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();

        if path.is_dir() {
            if recursive {
                visit_directory(&path, extension, recursive, files)?;
            }
        } else if is_template(&path, extension) {
            files.push(path);
        }
    }

    Ok(())
}

fn is_template(path: &Path, extension: &str) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

// ============================================================================
// BATCH PROCESSING
// ============================================================================

#[derive(Debug, Clone)]
pub struct BatchProcessor {
    factory: AgentFactory,
    translator: Translator,
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(factory: AgentFactory, translator: Translator, config: BatchConfig) -> Self {
        Self {
            factory,
            translator,
            config,
        }
    }

    /// Discover and translate every template under `dir`
    pub fn process_directory(&self, dir: &Path) -> Result<BatchResults, BatchError> {
        let started = Instant::now();
        let extension = self.translator.preferences().template_extension.clone();
        let files = discover_templates(dir, &extension, &self.config)?;

        // Surface registry problems once, before any worker starts
        self.factory.build()?;

        let mut results = if self.config.max_threads <= 1 || files.len() == 1 {
            self.process_sequential(&files)
        } else {
            self.process_parallel(&files)?
        };

        results.files_discovered = files.len();
        results.processing_duration = started.elapsed();
        results.sort();

        log_success!(codes::success::BATCH_COMPLETE, "Batch translation completed",
            "translated" => results.success_count(),
            "failed" => results.failure_count(),
            "replacements" => results.total_replacements(),
            "duration_ms" => format!("{:.2}", results.processing_duration.as_secs_f64() * 1000.0)
        );

        Ok(results)
    }

    fn process_sequential(&self, files: &[PathBuf]) -> BatchResults {
        let mut results = BatchResults::new();

        for (file_id, path) in files.iter().enumerate() {
            let outcome = translate_one(&self.factory, &self.translator, path, file_id);
            let failed = outcome.is_err();
            results.record(outcome);

            if failed && self.config.fail_fast {
                log_info!("Fail-fast enabled, stopping batch", "after" => path.display());
                break;
            }
        }

        results
    }

    fn process_parallel(&self, files: &[PathBuf]) -> Result<BatchResults, BatchError> {
        let threads = self.config.max_threads.min(MAX_WORKER_THREADS).min(files.len());
        let per_thread = files.len().div_ceil(threads);
        let stop = Arc::new(AtomicBool::new(false));

        log_debug!("Parallel batch configuration",
            "templates" => files.len(),
            "threads" => threads,
            "per_thread" => per_thread
        );

        let mut handles = Vec::with_capacity(threads);
        for (chunk_id, chunk) in files.chunks(per_thread).enumerate() {
            let thread_files = chunk.to_vec();
            let first_id = chunk_id * per_thread;
            let factory = self.factory.clone();
            let translator = self.translator.clone();
            let fail_fast = self.config.fail_fast;
            let stop = Arc::clone(&stop);

            handles.push(thread::spawn(move || {
                let mut results = BatchResults::new();
                for (offset, path) in thread_files.iter().enumerate() {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let outcome = translate_one(&factory, &translator, path, first_id + offset);
                    if outcome.is_err() && fail_fast {
                        stop.store(true, Ordering::Relaxed);
                    }
                    results.record(outcome);
                }
                results
            }));
        }

        let mut merged = BatchResults::new();
        for handle in handles {
            let results = handle.join().map_err(|_| BatchError::WorkerFailure {
                message: "worker thread panicked during translation".to_string(),
            })?;
            merged.merge(results);
        }

        Ok(merged)
    }
}

fn translate_one(
    factory: &AgentFactory,
    translator: &Translator,
    path: &Path,
    file_id: usize,
) -> Result<TranslationReport, BatchFailure> {
    let failure = |code: Code, message: String| {
        log_error!(code, &message, "file" => path.display());
        BatchFailure {
            path: path.to_path_buf(),
            code,
            message,
        }
    };

    let mut agent = factory
        .build()
        .map_err(|e| failure(e.error_code(), e.to_string()))?;
    let output = translator.output_path_for(path);

    translator
        .translate_file(&mut agent, path, &output, file_id)
        .map_err(|e| failure(e.error_code(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslationPreferences;
    use crate::rules::SimpleRule;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn factory() -> AgentFactory {
        AgentFactory::new(
            || {
                let mut builder = RuleRegistry::builder();
                builder.pre(SimpleRule::new("NAME", 0, |_| Ok("quartic".to_string())))?;
                Ok(builder.build())
            },
            AgentConfig::default(),
            IndexConvention::default(),
            IndexRanges::new(1, 1),
        )
    }

    fn translator(fail_on_errors: bool) -> Translator {
        Translator::new(TranslationPreferences {
            template_extension: "tmpl".to_string(),
            output_extension: None,
            enable_performance_logging: false,
            fail_on_errors,
        })
    }

    fn processor(threads: usize, fail_on_errors: bool, fail_fast: bool) -> BatchProcessor {
        BatchProcessor::new(
            factory(),
            translator(fail_on_errors),
            BatchConfig {
                max_threads: threads,
                recursive: true,
                max_files: None,
                fail_fast,
            },
        )
    }

    #[test]
    fn discovery_filters_by_extension() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.h.tmpl"), "x").unwrap();
        fs::write(dir.path().join("a.cpp.tmpl"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("nested/c.tmpl"), "x").unwrap();

        let mut config = BatchConfig::default();
        let files = discover_templates(dir.path(), "tmpl", &config).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("a.cpp.tmpl"));

        config.recursive = false;
        let files = discover_templates(dir.path(), "tmpl", &config).unwrap();
        assert_eq!(files.len(), 2);

        config.max_files = Some(1);
        let files = discover_templates(dir.path(), "tmpl", &config).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn discovery_errors() {
        let dir = tempdir().unwrap();
        let config = BatchConfig::default();
        assert_matches!(
            discover_templates(dir.path(), "tmpl", &config),
            Err(BatchError::NoTemplatesFound { .. })
        );

        let missing = dir.path().join("missing");
        let error = discover_templates(&missing, "tmpl", &config).unwrap_err();
        assert_eq!(error.error_code(), codes::file_processing::FILE_NOT_FOUND);
    }

    #[test]
    fn sequential_batch_writes_outputs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("one.h.tmpl"), "// $$__NAME\n").unwrap();
        fs::write(dir.path().join("two.h.tmpl"), "int x;\n").unwrap();

        let results = processor(1, false, false)
            .process_directory(dir.path())
            .unwrap();

        assert_eq!(results.success_count(), 2);
        assert_eq!(results.total_replacements(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("one.h")).unwrap(),
            "// quartic\n"
        );
        assert!(results.summary().contains("2 translated"));
    }

    #[test]
    fn parallel_batch_matches_sequential() {
        let dir = tempdir().unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            fs::write(dir.path().join(format!("{}.tmpl", name)), "$$__NAME\n").unwrap();
        }

        let results = processor(3, false, false)
            .process_directory(dir.path())
            .unwrap();

        assert_eq!(results.success_count(), 5);
        assert_eq!(results.files_discovered, 5);
        assert!(results.successful[0].input.ends_with("a.tmpl"));
        assert!(results.successful[4].input.ends_with("e.tmpl"));
        assert_eq!(fs::read_to_string(dir.path().join("c")).unwrap(), "quartic\n");
    }

    #[test]
    fn failures_are_recorded_and_fail_fast_stops() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.tmpl"), "x = $$__BOGUS;\n").unwrap();
        fs::write(dir.path().join("b.tmpl"), "fine\n").unwrap();

        let results = processor(1, true, false)
            .process_directory(dir.path())
            .unwrap();
        assert_eq!(results.failure_count(), 1);
        assert_eq!(results.success_count(), 1);
        assert_eq!(results.failed[0].code, codes::translation::TRANSLATION_FAILED);

        let results = processor(1, true, true)
            .process_directory(dir.path())
            .unwrap();
        assert_eq!(results.files_processed(), 1);
    }

    #[test]
    fn registry_clash_fails_whole_batch() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.tmpl"), "x\n").unwrap();

        let clashing = AgentFactory::new(
            || {
                let mut builder = RuleRegistry::builder();
                builder.pre(SimpleRule::new("NAME", 0, |_| Ok(String::new())))?;
                builder.post(SimpleRule::new("NAME", 0, |_| Ok(String::new())))?;
                Ok(builder.build())
            },
            AgentConfig::default(),
            IndexConvention::default(),
            IndexRanges::new(1, 1),
        );
        let processor = BatchProcessor::new(clashing, translator(false), BatchConfig::default());

        assert_matches!(
            processor.process_directory(dir.path()),
            Err(BatchError::Registry(RegistryError::DuplicateRule { .. }))
        );
    }
}
