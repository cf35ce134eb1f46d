//! Index replacement rules and their pre/post lifecycle

use super::error::RuleError;
use super::simple::{check_arity, check_indices, CallbackResult};
use crate::index::{AbstractIndex, AssignmentRecord, IndexClass};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Whether a rule's output must, may, or must not be unrolled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrollBehaviour {
    Force,
    Prevent,
    #[default]
    Allow,
}

impl UnrollBehaviour {
    /// Aggregate two dispositions; the flag reports a force/prevent clash,
    /// which resolves to `Force`
    pub fn merge(self, other: UnrollBehaviour) -> (UnrollBehaviour, bool) {
        use UnrollBehaviour::*;
        match (self, other) {
            (Force, Prevent) | (Prevent, Force) => (Force, true),
            (Force, _) | (_, Force) => (Force, false),
            (Prevent, _) | (_, Prevent) => (Prevent, false),
            (Allow, Allow) => (Allow, false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnrollBehaviour::Force => "force",
            UnrollBehaviour::Prevent => "prevent",
            UnrollBehaviour::Allow => "allow",
        }
    }
}

/// Owned cache produced by `pre` and consumed by `post`
#[derive(Default)]
pub struct CacheHandle {
    payload: Option<Box<dyn Any + Send>>,
}

impl CacheHandle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            payload: Some(Box::new(value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.as_mut().and_then(|p| p.downcast_mut::<T>())
    }

    pub fn into_inner<T: Any>(self) -> Option<T> {
        self.payload
            .and_then(|p| p.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }
}

impl fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("occupied", &self.payload.is_some())
            .finish()
    }
}

/// An abstract index as it appears in rolled output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolledIndex {
    pub index: AbstractIndex,
    /// Loop variable standing for the index
    pub variable: String,
}

/// Behaviour supplied by a rule package
pub trait IndexRuleHandler: Send + Sync {
    /// Prime a cache shared by every unrolled evaluation of one token
    fn pre(&self, _args: &[String]) -> Result<CacheHandle, String> {
        Ok(CacheHandle::empty())
    }

    fn unroll(
        &self,
        args: &[String],
        indices: &[AssignmentRecord],
        cache: &mut CacheHandle,
    ) -> CallbackResult;

    fn roll(&self, args: &[String], indices: &[RolledIndex]) -> CallbackResult;

    /// Tear down whatever `pre` built
    fn post(&self, _cache: CacheHandle) {}
}

/// Pre/post state of one index-macro token
#[derive(Debug, Default)]
pub enum HookState {
    #[default]
    Uninitialized,
    Primed(CacheHandle),
    Released,
}

impl HookState {
    pub fn is_primed(&self) -> bool {
        matches!(self, HookState::Primed(_))
    }
}

/// Rule taking arguments and indices
pub struct IndexRule {
    name: String,
    arity: usize,
    index_arity: usize,
    class: Option<IndexClass>,
    unroll: UnrollBehaviour,
    handler: Box<dyn IndexRuleHandler>,
}

impl IndexRule {
    pub fn new<H>(
        name: &str,
        arity: usize,
        index_arity: usize,
        class: Option<IndexClass>,
        handler: H,
    ) -> Self
    where
        H: IndexRuleHandler + 'static,
    {
        Self {
            name: name.to_string(),
            arity,
            index_arity,
            class,
            unroll: UnrollBehaviour::Allow,
            handler: Box::new(handler),
        }
    }

    pub fn with_unroll(mut self, unroll: UnrollBehaviour) -> Self {
        self.unroll = unroll;
        self
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

    pub fn class(&self) -> Option<IndexClass> {
        self.class
    }

    pub fn unroll_behaviour(&self) -> UnrollBehaviour {
        self.unroll
    }

    pub fn validate(&self, args: &[String], indices: &[AbstractIndex]) -> Result<(), RuleError> {
        check_arity(&self.name, self.arity, args)?;
        check_indices(&self.name, self.index_arity, self.class, indices)
    }

    fn failure(&self, message: String) -> RuleError {
        RuleError::RuleApplicationFailure {
            rule: self.name.clone(),
            message,
        }
    }

    /// Validate, prime the cache if this token has not yet, then unroll
    pub fn evaluate_unroll(
        &self,
        args: &[String],
        indices: &[AbstractIndex],
        assignment: &[AssignmentRecord],
        state: &mut HookState,
    ) -> Result<String, RuleError> {
        self.validate(args, indices)?;

        if matches!(state, HookState::Uninitialized) {
            let cache = self.handler.pre(args).map_err(|m| self.failure(m))?;
            *state = HookState::Primed(cache);
        }

        match state {
            HookState::Primed(cache) => self
                .handler
                .unroll(args, assignment, cache)
                .map_err(|m| self.failure(m)),
            _ => Err(RuleError::LifecycleViolation {
                rule: self.name.clone(),
                message: "token was already released".to_string(),
            }),
        }
    }

    /// Validate, then roll; the pre hook is not needed for loop output
    pub fn evaluate_roll(
        &self,
        args: &[String],
        indices: &[RolledIndex],
    ) -> Result<String, RuleError> {
        let abstract_indices: Vec<AbstractIndex> = indices.iter().map(|r| r.index).collect();
        self.validate(args, &abstract_indices)?;
        self.handler.roll(args, indices).map_err(|m| self.failure(m))
    }

    /// Run `post` if the token was primed and move to `next`
    pub fn release(&self, state: &mut HookState, next: HookState) {
        if let HookState::Primed(cache) = std::mem::replace(state, next) {
            self.handler.post(cache);
        }
    }
}

impl fmt::Debug for IndexRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexRule")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("index_arity", &self.index_arity)
            .field("class", &self.class)
            .field("unroll", &self.unroll)
            .finish_non_exhaustive()
    }
}
