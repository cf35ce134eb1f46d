// Internal modules
pub mod agent;
pub mod batch;
pub mod config;
pub mod index;
#[macro_use]
pub mod logging;
pub mod package;
pub mod rules;
pub mod template;
pub mod tokens;
pub mod translation;
pub mod utils;

// Re-export key types for library consumers
pub use agent::{AgentConfig, ExpansionOutput, MacroAgent};
pub use batch::{AgentFactory, BatchConfig, BatchError, BatchProcessor, BatchResults};
pub use config::RuntimeConfig;
pub use index::{IndexClass, IndexConvention, IndexRanges};
pub use package::{standard_registry, ModelDescriptor};
pub use rules::{RuleRegistry, RuleRegistryBuilder};
pub use translation::{TranslationError, TranslationReport, Translator};
