//! The five rule tables and their uniqueness invariant

use super::error::RegistryError;
use super::index_rule::IndexRule;
use super::simple::{IndexDirective, SimpleRule};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Which table a name lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    Pre,
    Post,
    Index,
    SimpleDirective,
    IndexDirective,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Pre => "pre",
            RuleKind::Post => "post",
            RuleKind::Index => "index",
            RuleKind::SimpleDirective => "simple directive",
            RuleKind::IndexDirective => "index directive",
        }
    }

    pub fn is_directive(&self) -> bool {
        matches!(self, RuleKind::SimpleDirective | RuleKind::IndexDirective)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle to a registered rule
#[derive(Debug, Clone)]
pub enum RuleRef {
    Pre(Arc<SimpleRule>),
    Post(Arc<SimpleRule>),
    Index(Arc<IndexRule>),
    SimpleDirective(Arc<SimpleRule>),
    IndexDirective(Arc<IndexDirective>),
}

impl RuleRef {
    pub fn kind(&self) -> RuleKind {
        match self {
            RuleRef::Pre(_) => RuleKind::Pre,
            RuleRef::Post(_) => RuleKind::Post,
            RuleRef::Index(_) => RuleKind::Index,
            RuleRef::SimpleDirective(_) => RuleKind::SimpleDirective,
            RuleRef::IndexDirective(_) => RuleKind::IndexDirective,
        }
    }

    /// Whether the invocation carries a `[labels]` group
    pub fn takes_indices(&self) -> bool {
        matches!(self, RuleRef::Index(_) | RuleRef::IndexDirective(_))
    }
}

/// Summary row for listing registered rules
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RuleSummary {
    pub name: String,
    pub kind: &'static str,
    pub arity: usize,
    pub index_arity: usize,
}

/// Read-only rule tables, shared across agents
#[derive(Debug, Default)]
pub struct RuleRegistry {
    pre: HashMap<String, Arc<SimpleRule>>,
    post: HashMap<String, Arc<SimpleRule>>,
    index: HashMap<String, Arc<IndexRule>>,
    simple_directives: HashMap<String, Arc<SimpleRule>>,
    index_directives: HashMap<String, Arc<IndexDirective>>,
}

impl RuleRegistry {
    pub fn builder() -> RuleRegistryBuilder {
        RuleRegistryBuilder::default()
    }

    pub fn lookup(&self, name: &str) -> Option<RuleRef> {
        if let Some(rule) = self.pre.get(name) {
            return Some(RuleRef::Pre(rule.clone()));
        }
        if let Some(rule) = self.post.get(name) {
            return Some(RuleRef::Post(rule.clone()));
        }
        if let Some(rule) = self.index.get(name) {
            return Some(RuleRef::Index(rule.clone()));
        }
        if let Some(rule) = self.simple_directives.get(name) {
            return Some(RuleRef::SimpleDirective(rule.clone()));
        }
        self.index_directives
            .get(name)
            .map(|rule| RuleRef::IndexDirective(rule.clone()))
    }

    pub fn kind_of(&self, name: &str) -> Option<RuleKind> {
        if self.pre.contains_key(name) {
            Some(RuleKind::Pre)
        } else if self.post.contains_key(name) {
            Some(RuleKind::Post)
        } else if self.index.contains_key(name) {
            Some(RuleKind::Index)
        } else if self.simple_directives.contains_key(name) {
            Some(RuleKind::SimpleDirective)
        } else if self.index_directives.contains_key(name) {
            Some(RuleKind::IndexDirective)
        } else {
            None
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.pre.len()
            + self.post.len()
            + self.index.len()
            + self.simple_directives.len()
            + self.index_directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every rule, sorted by kind then name
    pub fn summaries(&self) -> Vec<RuleSummary> {
        let mut rows: Vec<(RuleKind, RuleSummary)> = Vec::with_capacity(self.len());

        let simple_rows = [
            (RuleKind::Pre, &self.pre),
            (RuleKind::Post, &self.post),
            (RuleKind::SimpleDirective, &self.simple_directives),
        ];
        for (kind, table) in simple_rows {
            for rule in table.values() {
                rows.push((
                    kind,
                    RuleSummary {
                        name: rule.name().to_string(),
                        kind: kind.as_str(),
                        arity: rule.arity(),
                        index_arity: 0,
                    },
                ));
            }
        }
        for rule in self.index.values() {
            rows.push((
                RuleKind::Index,
                RuleSummary {
                    name: rule.name().to_string(),
                    kind: RuleKind::Index.as_str(),
                    arity: rule.arity(),
                    index_arity: rule.index_arity(),
                },
            ));
        }
        for rule in self.index_directives.values() {
            rows.push((
                RuleKind::IndexDirective,
                RuleSummary {
                    name: rule.name().to_string(),
                    kind: RuleKind::IndexDirective.as_str(),
                    arity: rule.arity(),
                    index_arity: rule.index_arity(),
                },
            ));
        }

        rows.sort_by(|a, b| (a.0, &a.1.name).cmp(&(b.0, &b.1.name)));
        rows.into_iter().map(|(_, summary)| summary).collect()
    }
}

/// Collects rules from packages, rejecting names already in any table
#[derive(Debug, Default)]
pub struct RuleRegistryBuilder {
    registry: RuleRegistry,
}

impl RuleRegistryBuilder {
    fn ensure_unique(&self, name: &str) -> Result<(), RegistryError> {
        match self.registry.kind_of(name) {
            Some(existing) => Err(RegistryError::DuplicateRule {
                name: name.to_string(),
                existing,
            }),
            None => Ok(()),
        }
    }

    pub fn pre(&mut self, rule: SimpleRule) -> Result<&mut Self, RegistryError> {
        self.ensure_unique(rule.name())?;
        self.registry
            .pre
            .insert(rule.name().to_string(), Arc::new(rule));
        Ok(self)
    }

    pub fn post(&mut self, rule: SimpleRule) -> Result<&mut Self, RegistryError> {
        self.ensure_unique(rule.name())?;
        self.registry
            .post
            .insert(rule.name().to_string(), Arc::new(rule));
        Ok(self)
    }

    pub fn index(&mut self, rule: IndexRule) -> Result<&mut Self, RegistryError> {
        self.ensure_unique(rule.name())?;
        self.registry
            .index
            .insert(rule.name().to_string(), Arc::new(rule));
        Ok(self)
    }

    pub fn simple_directive(&mut self, rule: SimpleRule) -> Result<&mut Self, RegistryError> {
        self.ensure_unique(rule.name())?;
        self.registry
            .simple_directives
            .insert(rule.name().to_string(), Arc::new(rule));
        Ok(self)
    }

    pub fn index_directive(&mut self, rule: IndexDirective) -> Result<&mut Self, RegistryError> {
        self.ensure_unique(rule.name())?;
        self.registry
            .index_directives
            .insert(rule.name().to_string(), Arc::new(rule));
        Ok(self)
    }

    pub fn build(self) -> RuleRegistry {
        self.registry
    }
}
