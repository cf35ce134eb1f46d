//! Token list for one side of a template line

use super::token::{SimpleKind, Token};
use crate::agent::ErrorContext;
use crate::index::{AssignmentList, IndexConvention, IndexDatabase, IndexRemap};
use crate::rules::UnrollBehaviour;
use std::fmt;

/// Aggregated unroll disposition of a token list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnrollStatus {
    pub behaviour: UnrollBehaviour,
    /// Some token forced unrolling while another prevented it
    pub conflict: bool,
}

impl UnrollStatus {
    pub fn merge(self, other: UnrollStatus) -> UnrollStatus {
        let (behaviour, conflict) = self.behaviour.merge(other.behaviour);
        UnrollStatus {
            behaviour,
            conflict: conflict || self.conflict || other.conflict,
        }
    }
}

impl Default for UnrollStatus {
    fn default() -> Self {
        Self {
            behaviour: UnrollBehaviour::Allow,
            conflict: false,
        }
    }
}

/// Tokens in line order plus per-category positions
///
/// The category vectors hold positions into `tokens`, so evaluation passes
/// touch only the tokens they concern.
#[derive(Debug, Default)]
pub struct TokenList {
    tokens: Vec<Token>,
    index_literals: Vec<usize>,
    pre_macros: Vec<usize>,
    post_macros: Vec<usize>,
    index_macros: Vec<usize>,
    directives: Vec<usize>,
    database: IndexDatabase,
}

impl TokenList {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, token: Token) {
        let position = self.tokens.len();
        match &token {
            Token::Text(_) => {}
            Token::IndexLiteral(_) => self.index_literals.push(position),
            Token::SimpleMacro(m) if m.kind == SimpleKind::Pre => self.pre_macros.push(position),
            Token::SimpleMacro(_) => self.post_macros.push(position),
            Token::IndexMacro(_) => self.index_macros.push(position),
            Token::Directive(_) => self.directives.push(position),
        }
        self.tokens.push(token);
    }

    pub(crate) fn database_mut(&mut self) -> &mut IndexDatabase {
        &mut self.database
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Free indices found on this side of the line
    pub fn indices(&self) -> &IndexDatabase {
        &self.database
    }

    pub fn directive_count(&self) -> usize {
        self.directives.len()
    }

    /// Anything other than plain text
    pub fn has_replacements(&self) -> bool {
        self.tokens.iter().any(|token| !token.is_text())
    }

    /// Evaluate every pre or post macro; returns how many were evaluated
    pub fn evaluate_simple(&mut self, kind: SimpleKind, ctx: &mut ErrorContext) -> usize {
        let positions = match kind {
            SimpleKind::Pre => &self.pre_macros,
            SimpleKind::Post => &self.post_macros,
        };
        for &position in positions {
            if let Token::SimpleMacro(token) = &mut self.tokens[position] {
                token.evaluate(ctx);
            }
        }
        positions.len()
    }

    /// Evaluate index literals and index macros against one assignment
    pub fn evaluate_assignment(
        &mut self,
        assignment: &AssignmentList,
        ctx: &mut ErrorContext,
    ) -> usize {
        for &position in &self.index_literals {
            if let Token::IndexLiteral(token) = &mut self.tokens[position] {
                token.evaluate_unrolled(assignment, ctx);
            }
        }
        for &position in &self.index_macros {
            if let Token::IndexMacro(token) = &mut self.tokens[position] {
                token.evaluate_unrolled(assignment, ctx);
            }
        }
        self.index_literals.len() + self.index_macros.len()
    }

    /// Evaluate with indices left as loop variables
    pub fn evaluate_rolled(
        &mut self,
        convention: &IndexConvention,
        ctx: &mut ErrorContext,
    ) -> usize {
        self.roll(convention, None, ctx)
    }

    /// Rolled evaluation with indices substituted first
    pub fn evaluate_remapped(
        &mut self,
        remap: &IndexRemap,
        convention: &IndexConvention,
        ctx: &mut ErrorContext,
    ) -> usize {
        self.roll(convention, Some(remap), ctx)
    }

    fn roll(
        &mut self,
        convention: &IndexConvention,
        remap: Option<&IndexRemap>,
        ctx: &mut ErrorContext,
    ) -> usize {
        for &position in &self.index_literals {
            if let Token::IndexLiteral(token) = &mut self.tokens[position] {
                token.evaluate_rolled(convention, remap);
            }
        }
        for &position in &self.index_macros {
            if let Token::IndexMacro(token) = &mut self.tokens[position] {
                token.evaluate_rolled(convention, remap, ctx);
            }
        }
        self.index_literals.len() + self.index_macros.len()
    }

    /// Release every primed index macro so the list can be re-enumerated
    pub fn reset(&mut self) {
        for &position in &self.index_macros {
            if let Token::IndexMacro(token) = &mut self.tokens[position] {
                token.reset();
            }
        }
    }

    pub fn unroll_status(&self) -> UnrollStatus {
        self.index_macros
            .iter()
            .filter_map(|&position| match &self.tokens[position] {
                Token::IndexMacro(token) => Some(token.unroll_behaviour()),
                _ => None,
            })
            .fold(UnrollStatus::default(), |status, behaviour| {
                status.merge(UnrollStatus {
                    behaviour,
                    conflict: false,
                })
            })
    }
}

impl fmt::Display for TokenList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str(token.text())?;
        }
        Ok(())
    }
}
