//! Rule invocation and registry errors

use super::registry::RuleKind;
use crate::index::IndexClass;
use crate::logging::codes;

/// Failure while invoking a replacement rule or directive
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("'{rule}' expects {expected} argument(s), found {found}")]
    ArgumentCountMismatch {
        rule: String,
        expected: usize,
        found: usize,
    },

    #[error("'{rule}' expects {expected} index(es), found {found}")]
    IndexCountMismatch {
        rule: String,
        expected: usize,
        found: usize,
    },

    #[error("'{rule}' requires {expected} indices but '{label}' is {found}")]
    IndexClassMismatch {
        rule: String,
        label: char,
        expected: IndexClass,
        found: IndexClass,
    },

    #[error("'{rule}' failed: {message}")]
    RuleApplicationFailure { rule: String, message: String },

    #[error("'{rule}' evaluated out of lifecycle order: {message}")]
    LifecycleViolation { rule: String, message: String },
}

impl RuleError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            RuleError::ArgumentCountMismatch { .. } => codes::rules::ARGUMENT_COUNT_MISMATCH,
            RuleError::IndexCountMismatch { .. } => codes::rules::INDEX_COUNT_MISMATCH,
            RuleError::IndexClassMismatch { .. } => codes::rules::INDEX_CLASS_MISMATCH,
            RuleError::RuleApplicationFailure { .. } => codes::rules::RULE_APPLICATION_FAILURE,
            RuleError::LifecycleViolation { .. } => codes::rules::LIFECYCLE_VIOLATION,
        }
    }

    pub fn rule(&self) -> &str {
        match self {
            RuleError::ArgumentCountMismatch { rule, .. }
            | RuleError::IndexCountMismatch { rule, .. }
            | RuleError::IndexClassMismatch { rule, .. }
            | RuleError::RuleApplicationFailure { rule, .. }
            | RuleError::LifecycleViolation { rule, .. } => rule,
        }
    }
}

/// Failure while assembling the rule tables
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Rule '{name}' is already registered as a {existing} rule")]
    DuplicateRule { name: String, existing: RuleKind },
}

impl RegistryError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            RegistryError::DuplicateRule { .. } => codes::rules::DUPLICATE_RULE,
        }
    }
}
