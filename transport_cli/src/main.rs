//! Command line front end for the transport macro engine
//!
//! ```bash
//! # Expand one template against a model
//! transport-cli --model quartic.toml expand kernels/mpp.h.tmpl
//!
//! # Translate every template under a directory on four threads
//! transport-cli --model quartic.toml batch kernels/ --threads 4
//!
//! # Try a single line
//! transport-cli --model quartic.toml line '__dV[$$__a] = $$__MASS[a];'
//!
//! # Keep a JSON-lines log of a batch run
//! TRANSPORT_LOGGING_USE_STRUCTURED=true transport-cli --model quartic.toml \
//!     --log-file logs/batch.log batch kernels/
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use transport_macro::agent::AgentConfig;
use transport_macro::batch::{AgentFactory, BatchConfig, BatchProcessor, BatchResults};
use transport_macro::config::compile_time::batch_processing::MAX_WORKER_THREADS;
use transport_macro::config::RuntimeConfig;
use transport_macro::logging::{self, codes, LogEvent, LogLevel, Logger};
use transport_macro::package::{standard_registry, ModelDescriptor};
use transport_macro::translation::{TranslationReport, Translator};

#[derive(Parser)]
#[command(name = "transport-cli")]
#[command(version)]
#[command(about = "Expand index-aware macros in perturbation-theory code templates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Model description (TOML)
    #[arg(long, short, global = true)]
    model: Option<PathBuf>,

    /// Runtime configuration file; environment defaults apply otherwise
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    format: OutputFormat,

    /// Also append engine events to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a single template
    Expand {
        template: PathBuf,

        /// Output path; derived from the template name if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Translate every template under a directory
    Batch {
        directory: PathBuf,

        /// Worker threads (default: number of CPUs)
        #[arg(long)]
        threads: Option<usize>,

        /// Don't search subdirectories
        #[arg(long)]
        no_recursive: bool,

        /// Translate at most this many templates
        #[arg(long)]
        max_files: Option<usize>,

        /// Stop at the first template that fails
        #[arg(long)]
        fail_fast: bool,
    },

    /// Expand one line and print the result
    Line { text: String },

    /// List the registered macros
    Rules,
}

// =============================================================================
// LOG BRIDGE
// =============================================================================

/// Forwards engine events to the `log` facade
struct LogBridge;

impl Logger for LogBridge {
    fn log(&self, event: &LogEvent) {
        let mut line = event.format();
        if let Some(file) = event.context.get("file") {
            line.push_str(&format!(" ({})", file));
        }

        match event.level {
            LogLevel::Error => log::error!(target: "transport", "{}", line),
            LogLevel::Warning => log::warn!(target: "transport", "{}", line),
            LogLevel::Info => log::info!(target: "transport", "{}", line),
            LogLevel::Debug => log::debug!(target: "transport", "{}", line),
        }
    }
}

fn init_logging(config: &RuntimeConfig) -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    logging::init_global_logging(config.logging.clone(), Some(Arc::new(LogBridge)))
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_toml_file(path)
            .map_err(|e| format!("[{}] {}", e.error_code(), e))?,
        None => RuntimeConfig::default(),
    };
    if let Some(path) = &cli.log_file {
        config.logging.log_file = Some(path.clone());
    }
    if let Err(message) = init_logging(&config) {
        logging::safe_log_error(codes::system::INITIALIZATION_FAILURE, &message);
        return Err(message);
    }

    let model_path = cli
        .model
        .as_deref()
        .ok_or("a model description is required (--model <FILE>)")?;
    let model = Arc::new(load_model(model_path)?);
    let factory = AgentFactory::for_model(model.clone(), AgentConfig::from_preferences(&config.agent));
    let translator = Translator::new(config.translation.clone());

    match cli.command {
        Commands::Expand { template, output } => {
            let output = output.unwrap_or_else(|| translator.output_path_for(&template));
            let mut agent = factory.build().map_err(|e| e.to_string())?;
            let report = translator
                .translate_file(&mut agent, &template, &output, 0)
                .map_err(|e| format!("[{}] {}", e.error_code(), e))?;

            print_report(&report, cli.format);
            Ok(exit_code(report.errors == 0))
        }

        Commands::Batch {
            directory,
            threads,
            no_recursive,
            max_files,
            fail_fast,
        } => {
            let batch_config = BatchConfig {
                max_threads: threads.unwrap_or_else(num_cpus::get).clamp(1, MAX_WORKER_THREADS),
                recursive: !no_recursive,
                max_files,
                fail_fast,
            };
            let results = BatchProcessor::new(factory, translator, batch_config)
                .process_directory(&directory)
                .map_err(|e| format!("[{}] {}", e.error_code(), e))?;

            print_batch(&results, cli.format);
            Ok(exit_code(results.failure_count() == 0 && results.total_errors() == 0))
        }

        Commands::Line { text } => {
            let mut agent = factory.build().map_err(|e| e.to_string())?;
            let output = agent.apply(&text);

            match cli.format {
                OutputFormat::Json => println!("{}", to_json(&output)?),
                OutputFormat::Text => {
                    for line in &output.lines {
                        println!("{}", line);
                    }
                }
            }
            for diagnostic in agent.context().diagnostics() {
                eprintln!("{}", diagnostic);
            }
            Ok(exit_code(!agent.context().has_errors()))
        }

        Commands::Rules => {
            let (registry, _) = standard_registry(model).map_err(|e| e.to_string())?;
            let summaries = registry.summaries();

            match cli.format {
                OutputFormat::Json => println!("{}", to_json(&summaries)?),
                OutputFormat::Text => {
                    for rule in &summaries {
                        println!(
                            "{:<18} {:<28} arity {} indices {}",
                            rule.kind, rule.name, rule.arity, rule.index_arity
                        );
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_model(path: &Path) -> Result<ModelDescriptor, String> {
    ModelDescriptor::load(path).map_err(|e| format!("[{}] {}", e.error_code(), e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

fn exit_code(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_report(report: &TranslationReport, format: OutputFormat) {
    if format == OutputFormat::Json {
        match to_json(report) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("error: {}", e),
        }
        return;
    }

    for diagnostic in &report.diagnostics {
        eprintln!("{}\n", diagnostic);
    }
    println!(
        "{} -> {}: {} lines in, {} lines out, {} replacements, {} error(s), {} warning(s)",
        report.input.display(),
        report.output.display(),
        report.lines_in,
        report.lines_out,
        report.replacements,
        report.errors,
        report.warnings
    );
}

fn print_batch(results: &BatchResults, format: OutputFormat) {
    if format == OutputFormat::Json {
        let failed: Vec<_> = results
            .failed
            .iter()
            .map(|f| json!({ "path": f.path, "code": f.code.as_str(), "message": f.message }))
            .collect();
        let value = json!({
            "translated": results.successful,
            "failed": failed,
            "files_discovered": results.files_discovered,
            "duration_ms": results.processing_duration.as_secs_f64() * 1000.0,
        });
        match to_json(&value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("error: {}", e),
        }
        return;
    }

    if logging::config::use_cargo_style_output() {
        if let Some(summary) = logging::cargo_style_summary().filter(|s| !s.is_empty()) {
            eprintln!("{}", summary);
        }
    } else {
        for report in &results.successful {
            for diagnostic in &report.diagnostics {
                eprintln!("{}\n", diagnostic);
            }
        }
    }
    for failure in &results.failed {
        eprintln!(
            "error[{}]: {}\n  --> {}\n",
            failure.code,
            failure.message,
            failure.path.display()
        );
    }
    println!("{}", results.summary());
}
