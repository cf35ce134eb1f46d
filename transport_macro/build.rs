// build.rs - TOML-driven compile-time limit generation
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(serde::Deserialize)]
struct CompileTimeConfig {
    tokenizer: TokenizerLimits,
    expansion: ExpansionLimits,
    file_processing: FileProcessingLimits,
    batch_processing: BatchProcessingLimits,
    logging: LoggingLimits,
}

#[derive(serde::Deserialize)]
struct TokenizerLimits {
    max_line_length: usize,
    max_macro_name_length: usize,
    max_macro_arguments: usize,
    max_indices_per_macro: usize,
}

#[derive(serde::Deserialize)]
struct ExpansionLimits {
    default_recursion_depth: usize,
    absolute_max_recursion_depth: usize,
    max_errors_per_token: u32,
}

#[derive(serde::Deserialize)]
struct FileProcessingLimits {
    max_file_size: u64,
    max_line_count: usize,
}

#[derive(serde::Deserialize)]
struct BatchProcessingLimits {
    max_worker_threads: usize,
    max_files_per_batch: usize,
}

#[derive(serde::Deserialize)]
struct LoggingLimits {
    log_buffer_size: usize,
    max_log_events_per_file: usize,
    max_log_message_length: usize,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=TRANSPORT_BUILD_PROFILE");
    println!("cargo:rerun-if-env-changed=TRANSPORT_CONFIG_DIR");

    let profile =
        env::var("TRANSPORT_BUILD_PROFILE").unwrap_or_else(|_| "development".to_string());
    let config_path = locate_profile(&profile);
    println!("cargo:rerun-if-changed={}", config_path.display());

    let content = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        panic!(
            "Cannot read limits profile {} ({}); set TRANSPORT_CONFIG_DIR or TRANSPORT_BUILD_PROFILE",
            config_path.display(),
            e
        )
    });
    let config: CompileTimeConfig = toml::from_str(&content)
        .unwrap_or_else(|e| panic!("Invalid limits in {}: {}", config_path.display(), e));

    if let Err(problem) = check_limits(&config, &profile) {
        panic!("{} profile: {}", profile, problem);
    }
    generate_constants(&config, &profile);
}

/// `<workspace>/<config dir>/<profile>.toml`; the workspace is this crate's parent
fn locate_profile(profile: &str) -> PathBuf {
    let config_dir = env::var("TRANSPORT_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let workspace_root = manifest_dir.parent().unwrap_or(&manifest_dir);

    workspace_root
        .join(config_dir)
        .join(format!("{}.toml", profile))
}

fn check_limits(config: &CompileTimeConfig, profile: &str) -> Result<(), String> {
    const ABSOLUTE_MAX_FILE_SIZE: u64 = 1_000_000_000;
    const ABSOLUTE_MAX_RECURSION: usize = 1024;

    let expansion = &config.expansion;
    let tokenizer = &config.tokenizer;

    if config.file_processing.max_file_size > ABSOLUTE_MAX_FILE_SIZE {
        return Err("max_file_size exceeds absolute maximum".into());
    }
    if expansion.absolute_max_recursion_depth > ABSOLUTE_MAX_RECURSION {
        return Err(format!(
            "absolute_max_recursion_depth exceeds {}",
            ABSOLUTE_MAX_RECURSION
        ));
    }
    if expansion.default_recursion_depth == 0
        || expansion.default_recursion_depth > expansion.absolute_max_recursion_depth
    {
        return Err("default_recursion_depth must lie in 1..=absolute_max_recursion_depth".into());
    }
    if expansion.max_errors_per_token == 0 {
        return Err("max_errors_per_token must be at least 1".into());
    }
    if tokenizer.max_indices_per_macro == 0 || tokenizer.max_macro_name_length == 0 {
        return Err("tokenizer limits must be non-zero".into());
    }
    if config.batch_processing.max_worker_threads == 0 {
        return Err("max_worker_threads must be at least 1".into());
    }
    if config.logging.max_log_events_per_file > config.logging.log_buffer_size {
        return Err("max_log_events_per_file exceeds log_buffer_size".into());
    }
    if profile == "production" && config.file_processing.max_file_size > 50_000_000 {
        return Err("max_file_size too high for production".into());
    }
    Ok(())
}

fn generate_constants(config: &CompileTimeConfig, profile: &str) {
    let out_dir = env::var("OUT_DIR").unwrap();
    let output_path = Path::new(&out_dir).join("constants.rs");

    let constants_code = format!(
        r#"
// Generated compile-time constants from TOML configuration
// Profile: {}
// DO NOT EDIT - Generated by build.rs

pub mod compile_time {{
    pub mod tokenizer {{
        pub const MAX_LINE_LENGTH: usize = {};
        pub const MAX_MACRO_NAME_LENGTH: usize = {};
        pub const MAX_MACRO_ARGUMENTS: usize = {};
        pub const MAX_INDICES_PER_MACRO: usize = {};
    }}

    pub mod expansion {{
        pub const DEFAULT_RECURSION_DEPTH: usize = {};
        pub const ABSOLUTE_MAX_RECURSION_DEPTH: usize = {};
        pub const MAX_ERRORS_PER_TOKEN: u32 = {};
    }}

    pub mod file_processing {{
        pub const MAX_FILE_SIZE: u64 = {};
        pub const MAX_LINE_COUNT: usize = {};
    }}

    pub mod batch_processing {{
        pub const MAX_WORKER_THREADS: usize = {};
        pub const MAX_FILES_PER_BATCH: usize = {};
    }}

    pub mod logging {{
        pub const LOG_BUFFER_SIZE: usize = {};
        pub const MAX_LOG_EVENTS_PER_FILE: usize = {};
        pub const MAX_LOG_MESSAGE_LENGTH: usize = {};
    }}
}}
"#,
        profile,
        config.tokenizer.max_line_length,
        config.tokenizer.max_macro_name_length,
        config.tokenizer.max_macro_arguments,
        config.tokenizer.max_indices_per_macro,
        config.expansion.default_recursion_depth,
        config.expansion.absolute_max_recursion_depth,
        config.expansion.max_errors_per_token,
        config.file_processing.max_file_size,
        config.file_processing.max_line_count,
        config.batch_processing.max_worker_threads,
        config.batch_processing.max_files_per_batch,
        config.logging.log_buffer_size,
        config.logging.max_log_events_per_file,
        config.logging.max_log_message_length,
    );

    fs::write(output_path, constants_code).unwrap();
}
