//! Simple replacement rules and directives

use super::error::RuleError;
use crate::index::{AbstractIndex, IndexClass};
use std::fmt;

/// Callback outcome; an `Err` message becomes a `RuleApplicationFailure`
pub type CallbackResult = Result<String, String>;

type SimpleCallback = dyn Fn(&[String]) -> CallbackResult + Send + Sync;
type IndexDirectiveCallback = dyn Fn(&[String], &[AbstractIndex]) -> CallbackResult + Send + Sync;

/// Fixed-arity rule mapping arguments to replacement text
///
/// Serves the pre, post, and simple-directive tables alike; the table a rule
/// sits in decides when it runs.
pub struct SimpleRule {
    name: String,
    arity: usize,
    callback: Box<SimpleCallback>,
}

impl SimpleRule {
    pub fn new<F>(name: &str, arity: usize, callback: F) -> Self
    where
        F: Fn(&[String]) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            arity,
            callback: Box::new(callback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn apply(&self, args: &[String]) -> Result<String, RuleError> {
        check_arity(&self.name, self.arity, args)?;
        (self.callback)(args).map_err(|message| RuleError::RuleApplicationFailure {
            rule: self.name.clone(),
            message,
        })
    }
}

impl fmt::Debug for SimpleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleRule")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Directive taking indices as well as arguments
///
/// Evaluated once at tokenization against the abstract indices; never
/// per assignment.
pub struct IndexDirective {
    name: String,
    arity: usize,
    index_arity: usize,
    class: Option<IndexClass>,
    callback: Box<IndexDirectiveCallback>,
}

impl IndexDirective {
    pub fn new<F>(
        name: &str,
        arity: usize,
        index_arity: usize,
        class: Option<IndexClass>,
        callback: F,
    ) -> Self
    where
        F: Fn(&[String], &[AbstractIndex]) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            arity,
            index_arity,
            class,
            callback: Box::new(callback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn index_arity(&self) -> usize {
        self.index_arity
    }

    pub fn apply(&self, args: &[String], indices: &[AbstractIndex]) -> Result<String, RuleError> {
        check_arity(&self.name, self.arity, args)?;
        check_indices(&self.name, self.index_arity, self.class, indices)?;
        (self.callback)(args, indices).map_err(|message| RuleError::RuleApplicationFailure {
            rule: self.name.clone(),
            message,
        })
    }
}

impl fmt::Debug for IndexDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDirective")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("index_arity", &self.index_arity)
            .finish_non_exhaustive()
    }
}

pub(crate) fn check_arity(rule: &str, expected: usize, args: &[String]) -> Result<(), RuleError> {
    if args.len() != expected {
        return Err(RuleError::ArgumentCountMismatch {
            rule: rule.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_indices(
    rule: &str,
    expected: usize,
    class: Option<IndexClass>,
    indices: &[AbstractIndex],
) -> Result<(), RuleError> {
    if indices.len() != expected {
        return Err(RuleError::IndexCountMismatch {
            rule: rule.to_string(),
            expected,
            found: indices.len(),
        });
    }
    if let Some(required) = class {
        if let Some(bad) = indices.iter().find(|index| !required.accepts(index.class)) {
            return Err(RuleError::IndexClassMismatch {
                rule: rule.to_string(),
                label: bad.label,
                expected: required,
                found: bad.class,
            });
        }
    }
    Ok(())
}
