//! Macro agent: drives expansion of template lines

pub mod context;
pub mod macro_agent;
pub mod split;

pub use context::{Diagnostic, DiagnosticLevel, ErrorContext};
pub use macro_agent::{
    merge_assignments, AgentConfig, AgentMetrics, ExpansionError, ExpansionOutput, MacroAgent,
};
pub use split::{split_line, SplitKind, SplitLine};
