//! Index model errors

use crate::logging::codes;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("Index '{label}' conflicts: {reason}")]
    IndexConflict { label: char, reason: String },

    #[error("Index '{label}' has no value in the current assignment")]
    UnboundIndex { label: char },
}

impl IndexError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            IndexError::IndexConflict { .. } => codes::indices::INDEX_CONFLICT,
            IndexError::UnboundIndex { .. } => codes::indices::UNBOUND_INDEX,
        }
    }

    /// Label the error refers to
    pub fn label(&self) -> char {
        match self {
            IndexError::IndexConflict { label, .. } | IndexError::UnboundIndex { label } => *label,
        }
    }
}
