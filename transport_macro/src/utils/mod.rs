//! Shared utilities for source location tracking

pub mod span;

pub use span::{Position, SourceMap, Span};
