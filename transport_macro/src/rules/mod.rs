//! Replacement rules
//!
//! Pre and post rules are simple rules evaluated before and after index
//! assignment; index rules additionally take abstract indices and bracket
//! their unrolled evaluations with a pre/post cache lifecycle. Directives run
//! once, at tokenization.

pub mod error;
pub mod index_rule;
pub mod registry;
pub mod simple;

pub use error::{RegistryError, RuleError};
pub use index_rule::{
    CacheHandle, HookState, IndexRule, IndexRuleHandler, RolledIndex, UnrollBehaviour,
};
pub use registry::{RuleKind, RuleRef, RuleRegistry, RuleRegistryBuilder, RuleSummary};
pub use simple::{CallbackResult, IndexDirective, SimpleRule};
