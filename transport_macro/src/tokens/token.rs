//! Token variants produced by the tokenizer

use crate::agent::ErrorContext;
use crate::config::compile_time::expansion::MAX_ERRORS_PER_TOKEN;
use crate::index::{AbstractIndex, AssignmentList, IndexConvention, IndexRemap};
use crate::logging::Code;
use crate::rules::{HookState, IndexRule, RolledIndex, SimpleRule, UnrollBehaviour};
use crate::utils::Span;
use std::sync::Arc;

/// When a simple macro runs relative to index assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleKind {
    Pre,
    Post,
}

/// Caps how often one token reports errors
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorCounter {
    count: u32,
}

impl ErrorCounter {
    pub fn report(&mut self, ctx: &mut ErrorContext, code: Code, message: &str, span: Span) {
        if self.count < MAX_ERRORS_PER_TOKEN {
            ctx.error(code, message, Some(span));
        }
        self.count = self.count.saturating_add(1);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_silenced(&self) -> bool {
        self.count >= MAX_ERRORS_PER_TOKEN
    }
}

#[derive(Debug, Clone)]
pub struct TextToken {
    pub text: String,
    pub span: Span,
}

/// Bare `$$__A` reference to an abstract index
#[derive(Debug, Clone)]
pub struct IndexLiteralToken {
    pub index: AbstractIndex,
    pub span: Span,
    text: String,
    errors: ErrorCounter,
}

impl IndexLiteralToken {
    pub fn new(index: AbstractIndex, span: Span) -> Self {
        Self {
            index,
            span,
            text: index.label.to_string(),
            errors: ErrorCounter::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn evaluate_unrolled(&mut self, assignment: &AssignmentList, ctx: &mut ErrorContext) {
        match assignment.select(&[self.index.label]) {
            Ok(records) => self.text = records[0].value.to_string(),
            Err(error) => {
                self.text.clear();
                self.errors
                    .report(ctx, error.error_code(), &error.to_string(), self.span);
            }
        }
    }

    pub fn evaluate_rolled(&mut self, convention: &IndexConvention, remap: Option<&IndexRemap>) {
        let index = remap.map_or(self.index, |r| r.apply(&self.index));
        self.text = convention.loop_variable(index.label);
    }
}

/// Invocation of a pre or post rule
#[derive(Debug)]
pub struct SimpleMacroToken {
    pub name: String,
    pub args: Vec<String>,
    pub kind: SimpleKind,
    pub span: Span,
    rule: Arc<SimpleRule>,
    text: String,
    errors: ErrorCounter,
}

impl SimpleMacroToken {
    pub fn new(
        rule: Arc<SimpleRule>,
        kind: SimpleKind,
        args: Vec<String>,
        source: &str,
        span: Span,
    ) -> Self {
        Self {
            name: rule.name().to_string(),
            args,
            kind,
            span,
            rule,
            text: source.to_string(),
            errors: ErrorCounter::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn evaluate(&mut self, ctx: &mut ErrorContext) {
        match self.rule.apply(&self.args) {
            Ok(text) => self.text = text,
            Err(error) => {
                self.text.clear();
                self.errors
                    .report(ctx, error.error_code(), &error.to_string(), self.span);
            }
        }
    }
}

/// Invocation of an index rule
///
/// Holds the rule's pre/post state: the first unrolled evaluation primes
/// the cache, `reset` releases it for reuse, and dropping the token
/// releases it for good.
#[derive(Debug)]
pub struct IndexMacroToken {
    pub name: String,
    pub args: Vec<String>,
    pub indices: Vec<AbstractIndex>,
    pub span: Span,
    rule: Arc<IndexRule>,
    state: HookState,
    text: String,
    errors: ErrorCounter,
}

impl IndexMacroToken {
    pub fn new(
        rule: Arc<IndexRule>,
        args: Vec<String>,
        indices: Vec<AbstractIndex>,
        source: &str,
        span: Span,
    ) -> Self {
        Self {
            name: rule.name().to_string(),
            args,
            indices,
            span,
            rule,
            state: HookState::Uninitialized,
            text: source.to_string(),
            errors: ErrorCounter::default(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn unroll_behaviour(&self) -> UnrollBehaviour {
        self.rule.unroll_behaviour()
    }

    pub fn state(&self) -> &HookState {
        &self.state
    }

    pub fn error_count(&self) -> u32 {
        self.errors.count()
    }

    pub fn labels(&self) -> Vec<char> {
        self.indices.iter().map(|index| index.label).collect()
    }

    pub fn evaluate_unrolled(&mut self, assignment: &AssignmentList, ctx: &mut ErrorContext) {
        let records = match assignment.select(&self.labels()) {
            Ok(records) => records,
            Err(error) => {
                self.text.clear();
                self.errors
                    .report(ctx, error.error_code(), &error.to_string(), self.span);
                return;
            }
        };

        match self
            .rule
            .evaluate_unroll(&self.args, &self.indices, &records, &mut self.state)
        {
            Ok(text) => self.text = text,
            Err(error) => {
                self.text.clear();
                self.errors
                    .report(ctx, error.error_code(), &error.to_string(), self.span);
            }
        }
    }

    pub fn evaluate_rolled(
        &mut self,
        convention: &IndexConvention,
        remap: Option<&IndexRemap>,
        ctx: &mut ErrorContext,
    ) {
        let rolled: Vec<RolledIndex> = self
            .indices
            .iter()
            .map(|index| {
                let index = remap.map_or(*index, |r| r.apply(index));
                RolledIndex {
                    index,
                    variable: convention.loop_variable(index.label),
                }
            })
            .collect();

        match self.rule.evaluate_roll(&self.args, &rolled) {
            Ok(text) => self.text = text,
            Err(error) => {
                self.text.clear();
                self.errors
                    .report(ctx, error.error_code(), &error.to_string(), self.span);
            }
        }
    }

    /// Run `post` if primed and return to the uninitialized state
    pub fn reset(&mut self) {
        self.rule.release(&mut self.state, HookState::Uninitialized);
    }
}

impl Drop for IndexMacroToken {
    fn drop(&mut self) {
        self.rule.release(&mut self.state, HookState::Released);
    }
}

/// Directive already evaluated at tokenization
#[derive(Debug, Clone)]
pub struct DirectiveToken {
    pub name: String,
    pub span: Span,
    text: String,
}

impl DirectiveToken {
    pub fn new(name: &str, text: String, span: Span) -> Self {
        Self {
            name: name.to_string(),
            span,
            text,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Directives never re-run
    pub fn evaluate(&mut self) {}
}

/// One lexical element of a template line
#[derive(Debug)]
pub enum Token {
    Text(TextToken),
    IndexLiteral(IndexLiteralToken),
    SimpleMacro(SimpleMacroToken),
    IndexMacro(IndexMacroToken),
    Directive(DirectiveToken),
}

impl Token {
    pub fn text(&self) -> &str {
        match self {
            Token::Text(token) => &token.text,
            Token::IndexLiteral(token) => token.text(),
            Token::SimpleMacro(token) => token.text(),
            Token::IndexMacro(token) => token.text(),
            Token::Directive(token) => token.text(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Token::Text(token) => token.span,
            Token::IndexLiteral(token) => token.span,
            Token::SimpleMacro(token) => token.span,
            Token::IndexMacro(token) => token.span,
            Token::Directive(token) => token.span,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Token::Text(_))
    }
}
