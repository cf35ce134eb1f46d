//! Consolidated error codes and classification system
//!
//! Single source of truth for all diagnostic codes and their metadata.

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Universal code wrapper for error, warning and success codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ERROR CLASSIFICATION TYPES
// ============================================================================

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Complete metadata for a code
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub requires_halt: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl ErrorMetadata {
    pub fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        recoverable: bool,
        requires_halt: bool,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            recoverable,
            requires_halt,
            description,
            recommended_action,
        }
    }
}

// ============================================================================
// ERROR CODE CONSTANTS
// ============================================================================

/// System error codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
    pub const CONFIGURATION_ERROR: Code = Code::new("ERR003");
}

/// Template and model file error codes
pub mod file_processing {
    use super::Code;

    pub const FILE_NOT_FOUND: Code = Code::new("E005");
    pub const FILE_TOO_LARGE: Code = Code::new("E007");
    pub const EMPTY_FILE: Code = Code::new("E008");
    pub const PERMISSION_DENIED: Code = Code::new("E009");
    pub const INVALID_ENCODING: Code = Code::new("E010");
    pub const IO_ERROR: Code = Code::new("E011");
    pub const INVALID_PATH: Code = Code::new("E012");
}

/// Tokenizer error codes
pub mod tokenizer {
    use super::Code;

    pub const UNKNOWN_MACRO_OR_INDEX: Code = Code::new("E020");
    pub const DIRECTIVE_RULE_MIXING: Code = Code::new("E021");
    pub const MALFORMED_INVOCATION: Code = Code::new("E022");
    pub const INVALID_INDEX_LABEL: Code = Code::new("E023");
    pub const LINE_TOO_LONG: Code = Code::new("E024");
    pub const MACRO_NAME_TOO_LONG: Code = Code::new("E025");
    pub const TOO_MANY_ARGUMENTS: Code = Code::new("E026");
}

/// Replacement rule error codes
pub mod rules {
    use super::Code;

    pub const ARGUMENT_COUNT_MISMATCH: Code = Code::new("E040");
    pub const INDEX_COUNT_MISMATCH: Code = Code::new("E041");
    pub const INDEX_CLASS_MISMATCH: Code = Code::new("E042");
    pub const RULE_APPLICATION_FAILURE: Code = Code::new("E043");
    pub const LIFECYCLE_VIOLATION: Code = Code::new("E044");
    pub const DUPLICATE_RULE: Code = Code::new("E045");
}

/// Index model error codes
pub mod indices {
    use super::Code;

    pub const INDEX_CONFLICT: Code = Code::new("E060");
    pub const LHS_RHS_INDEX_MISMATCH: Code = Code::new("E061");
    pub const UNBOUND_INDEX: Code = Code::new("E062");
}

/// Expansion diagnostics (warnings)
pub mod expansion {
    use super::Code;

    pub const RECURSION_DEPTH_EXCEEDED: Code = Code::new("W080");
    pub const UNROLL_CONFLICT: Code = Code::new("W081");
    pub const RECURSION_LIMIT_CLAMPED: Code = Code::new("W082");
}

/// Model descriptor error codes
pub mod model {
    use super::Code;

    pub const MODEL_PARSE_ERROR: Code = Code::new("E090");
    pub const MODEL_VALIDATION_ERROR: Code = Code::new("E091");
}

/// Translation and batch error codes
pub mod translation {
    use super::Code;

    pub const OUTPUT_WRITE_FAILURE: Code = Code::new("E100");
    pub const TRANSLATION_FAILED: Code = Code::new("E101");
    pub const NO_TEMPLATES_FOUND: Code = Code::new("E102");
    pub const TOO_MANY_TEMPLATES: Code = Code::new("E103");
    pub const WORKER_FAILURE: Code = Code::new("E104");
}

// ============================================================================
// SUCCESS CODE CONSTANTS
// ============================================================================

/// Success codes
pub mod success {
    use super::Code;

    pub const OPERATION_COMPLETED_SUCCESSFULLY: Code = Code::new("I001");
    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I004");
    pub const FILE_PROCESSING_SUCCESS: Code = Code::new("I006");
    pub const TEMPLATE_DISCOVERY_COMPLETE: Code = Code::new("I007");
    pub const RULE_REGISTRY_BUILT: Code = Code::new("I030");
    pub const MODEL_LOADED: Code = Code::new("I031");
    pub const TRANSLATION_COMPLETE: Code = Code::new("I080");
    pub const BATCH_COMPLETE: Code = Code::new("I081");
}

// ============================================================================
// ERROR METADATA REGISTRY
// ============================================================================

static ERROR_REGISTRY: OnceLock<HashMap<&'static str, ErrorMetadata>> = OnceLock::new();

fn get_error_registry() -> &'static HashMap<&'static str, ErrorMetadata> {
    ERROR_REGISTRY.get_or_init(|| {
        let entries = [
            // System
            ErrorMetadata::new(
                "ERR001",
                "System",
                Severity::Critical,
                false,
                true,
                "Critical internal system error",
                "File a bug report with the failing template",
            ),
            ErrorMetadata::new(
                "ERR002",
                "System",
                Severity::Critical,
                false,
                true,
                "System initialization failure",
                "Check logging and runtime configuration",
            ),
            ErrorMetadata::new(
                "ERR003",
                "System",
                Severity::High,
                false,
                true,
                "Invalid runtime configuration",
                "Fix the runtime configuration file or environment variables",
            ),
            // File processing
            ErrorMetadata::new(
                "E005",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "File not found",
                "Verify the file path exists and is accessible",
            ),
            ErrorMetadata::new(
                "E007",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "File exceeds compile-time size or line limits",
                "Split the template or rebuild with a larger limit profile",
            ),
            ErrorMetadata::new(
                "E008",
                "FileProcessing",
                Severity::Low,
                true,
                false,
                "File is empty",
                "Provide a non-empty template",
            ),
            ErrorMetadata::new(
                "E009",
                "FileProcessing",
                Severity::High,
                false,
                true,
                "Permission denied accessing file",
                "Check file permissions",
            ),
            ErrorMetadata::new(
                "E010",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "Invalid UTF-8 encoding",
                "Re-encode the file as UTF-8",
            ),
            ErrorMetadata::new(
                "E011",
                "FileProcessing",
                Severity::High,
                false,
                true,
                "I/O error",
                "Check disk state and retry",
            ),
            ErrorMetadata::new(
                "E012",
                "FileProcessing",
                Severity::Medium,
                false,
                true,
                "Invalid file path",
                "Provide a path to a regular file",
            ),
            // Tokenizer
            ErrorMetadata::new(
                "E020",
                "Tokenizer",
                Severity::High,
                true,
                false,
                "Unknown macro or index literal",
                "Check the macro name against the registered rule packages",
            ),
            ErrorMetadata::new(
                "E021",
                "Tokenizer",
                Severity::High,
                true,
                false,
                "Directives and replacement rules mixed in one invocation",
                "Move the nested invocation onto its own line",
            ),
            ErrorMetadata::new(
                "E022",
                "Tokenizer",
                Severity::High,
                true,
                false,
                "Malformed macro invocation",
                "Balance the braces and brackets of the invocation",
            ),
            ErrorMetadata::new(
                "E023",
                "Tokenizer",
                Severity::Medium,
                true,
                false,
                "Character is not a recognised index label",
                "Use a label defined by the index convention",
            ),
            ErrorMetadata::new(
                "E024",
                "Tokenizer",
                Severity::Medium,
                true,
                false,
                "Template line exceeds the maximum length",
                "Break the line up",
            ),
            ErrorMetadata::new(
                "E025",
                "Tokenizer",
                Severity::Medium,
                true,
                false,
                "Macro name exceeds the maximum length",
                "Use a shorter macro name",
            ),
            ErrorMetadata::new(
                "E026",
                "Tokenizer",
                Severity::Medium,
                true,
                false,
                "Too many macro arguments",
                "Reduce the number of arguments",
            ),
            // Rules
            ErrorMetadata::new(
                "E040",
                "Rules",
                Severity::Medium,
                true,
                false,
                "Wrong number of macro arguments",
                "Match the argument count declared by the rule",
            ),
            ErrorMetadata::new(
                "E041",
                "Rules",
                Severity::Medium,
                true,
                false,
                "Wrong number of indices",
                "Match the index count declared by the rule",
            ),
            ErrorMetadata::new(
                "E042",
                "Rules",
                Severity::Medium,
                true,
                false,
                "Index class not accepted by the rule",
                "Use an index label of the class the rule expects",
            ),
            ErrorMetadata::new(
                "E043",
                "Rules",
                Severity::Medium,
                true,
                false,
                "Replacement rule failed",
                "Inspect the rule arguments",
            ),
            ErrorMetadata::new(
                "E044",
                "Rules",
                Severity::High,
                true,
                false,
                "Index macro evaluated outside its lifecycle",
                "Reset the token list before re-evaluating",
            ),
            ErrorMetadata::new(
                "E045",
                "Rules",
                Severity::Critical,
                false,
                true,
                "Rule name registered more than once",
                "Rename one of the clashing rules",
            ),
            // Indices
            ErrorMetadata::new(
                "E060",
                "Indices",
                Severity::Medium,
                true,
                false,
                "Index label used with incompatible classes or ranges",
                "Use distinct labels for distinct index classes",
            ),
            ErrorMetadata::new(
                "E061",
                "Indices",
                Severity::Medium,
                true,
                false,
                "Left- and right-hand side indices do not agree",
                "Check the index labels on both sides of the assignment",
            ),
            ErrorMetadata::new(
                "E062",
                "Indices",
                Severity::High,
                true,
                false,
                "Index has no value in the current assignment",
                "File a bug report with the failing line",
            ),
            // Expansion warnings
            ErrorMetadata::new(
                "W080",
                "Expansion",
                Severity::Low,
                true,
                false,
                "Recursive macro expansion exceeded the depth limit",
                "Raise recursion_max or remove self-referencing macros",
            ),
            ErrorMetadata::new(
                "W081",
                "Expansion",
                Severity::Low,
                true,
                false,
                "Line mixes macros that force and prevent unrolling",
                "Split the line so each side agrees on unrolling",
            ),
            ErrorMetadata::new(
                "W082",
                "Expansion",
                Severity::Low,
                true,
                false,
                "Recursion limit clamped to the compile-time maximum",
                "Lower recursion_max",
            ),
            // Model
            ErrorMetadata::new(
                "E090",
                "Model",
                Severity::High,
                false,
                true,
                "Model descriptor could not be parsed",
                "Fix the TOML syntax of the model descriptor",
            ),
            ErrorMetadata::new(
                "E091",
                "Model",
                Severity::High,
                false,
                true,
                "Model descriptor is inconsistent",
                "Fix duplicate names or tensor component counts",
            ),
            // Translation
            ErrorMetadata::new(
                "E100",
                "Translation",
                Severity::High,
                false,
                true,
                "Generated output could not be written",
                "Check the output directory permissions",
            ),
            ErrorMetadata::new(
                "E101",
                "Translation",
                Severity::Medium,
                true,
                false,
                "Template translated with errors",
                "Review the diagnostics reported for the template",
            ),
            ErrorMetadata::new(
                "E102",
                "Translation",
                Severity::Medium,
                true,
                false,
                "No templates found",
                "Check the directory and template extension",
            ),
            ErrorMetadata::new(
                "E103",
                "Translation",
                Severity::Medium,
                true,
                false,
                "Too many templates for one batch",
                "Split the batch",
            ),
            ErrorMetadata::new(
                "E104",
                "Translation",
                Severity::Critical,
                false,
                true,
                "Batch worker thread failed",
                "File a bug report",
            ),
            // Success codes
            ErrorMetadata::new(
                "I001",
                "General",
                Severity::Low,
                true,
                false,
                "Operation completed successfully",
                "Continue",
            ),
            ErrorMetadata::new(
                "I004",
                "System",
                Severity::Low,
                true,
                false,
                "System initialization completed",
                "Continue",
            ),
            ErrorMetadata::new(
                "I006",
                "FileProcessing",
                Severity::Low,
                true,
                false,
                "File processed successfully",
                "Continue",
            ),
            ErrorMetadata::new(
                "I007",
                "FileProcessing",
                Severity::Low,
                true,
                false,
                "Template discovery completed",
                "Continue",
            ),
            ErrorMetadata::new(
                "I030",
                "Rules",
                Severity::Low,
                true,
                false,
                "Rule registry built",
                "Continue",
            ),
            ErrorMetadata::new(
                "I031",
                "Model",
                Severity::Low,
                true,
                false,
                "Model descriptor loaded",
                "Continue",
            ),
            ErrorMetadata::new(
                "I080",
                "Translation",
                Severity::Low,
                true,
                false,
                "Template translated",
                "Continue",
            ),
            ErrorMetadata::new(
                "I081",
                "Translation",
                Severity::Low,
                true,
                false,
                "Batch translation completed",
                "Continue",
            ),
        ];

        entries
            .into_iter()
            .map(|metadata| (metadata.code, metadata))
            .collect()
    })
}

// ============================================================================
// CLASSIFICATION FUNCTIONS
// ============================================================================

/// Get metadata for a specific code
pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    get_error_registry().get(code)
}

/// Get severity from code
pub fn get_severity(code: &str) -> Severity {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.severity)
        .unwrap_or(Severity::Medium)
}

/// Check if error is recoverable
pub fn is_recoverable(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recoverable)
        .unwrap_or(true)
}

/// Check if error requires immediate halt
pub fn requires_halt(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.requires_halt)
        .unwrap_or(false)
}

/// Get human-readable description for code
pub fn get_description(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.description)
        .unwrap_or("Unknown error")
}

/// Get recommended action for code
pub fn get_action(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recommended_action)
        .unwrap_or("No specific action available")
}

/// Get category from code
pub fn get_category(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.category)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_declared_code_has_metadata() {
        let declared = [
            system::INTERNAL_ERROR,
            system::CONFIGURATION_ERROR,
            file_processing::FILE_NOT_FOUND,
            tokenizer::UNKNOWN_MACRO_OR_INDEX,
            tokenizer::DIRECTIVE_RULE_MIXING,
            rules::ARGUMENT_COUNT_MISMATCH,
            rules::LIFECYCLE_VIOLATION,
            rules::DUPLICATE_RULE,
            indices::LHS_RHS_INDEX_MISMATCH,
            expansion::RECURSION_DEPTH_EXCEEDED,
            model::MODEL_VALIDATION_ERROR,
            translation::WORKER_FAILURE,
            success::TRANSLATION_COMPLETE,
        ];

        for code in declared {
            assert!(
                get_error_metadata(code.as_str()).is_some(),
                "missing metadata for {}",
                code
            );
        }
    }

    #[test]
    fn test_classification_defaults() {
        assert_eq!(get_description("ZZZ999"), "Unknown error");
        assert_eq!(get_category("ZZZ999"), "Unknown");
        assert!(is_recoverable("ZZZ999"));
        assert!(!requires_halt("ZZZ999"));
    }

    #[test]
    fn test_rule_codes_are_recoverable() {
        assert!(is_recoverable(rules::ARGUMENT_COUNT_MISMATCH.as_str()));
        assert_eq!(get_category(rules::INDEX_CLASS_MISMATCH.as_str()), "Rules");
        assert!(requires_halt(rules::DUPLICATE_RULE.as_str()));
    }
}
