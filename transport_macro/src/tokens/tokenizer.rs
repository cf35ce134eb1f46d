//! Tokenizer for single template lines
//!
//! Recognises `$$__NAME[labels]{args}` invocations against the rule tables,
//! bare `$$__X` index literals, and passes everything else through as text.

use super::token::{
    DirectiveToken, IndexLiteralToken, IndexMacroToken, SimpleKind, SimpleMacroToken, TextToken,
    Token,
};
use super::token_list::TokenList;
use crate::agent::ErrorContext;
use crate::config::compile_time::tokenizer::*;
use crate::index::{AbstractIndex, IndexConvention, IndexError, IndexRanges};
use crate::logging::codes;
use crate::rules::{RuleKind, RuleRef, RuleRegistry};
use crate::utils::Span;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    #[error("Unknown macro or index '{name}'")]
    UnknownMacroOrIndex { name: String, span: Span },

    #[error("'{name}' mixes directives and replacement rules: argument uses {inner} '{inner_name}'")]
    DirectiveRuleMixing {
        name: String,
        inner: RuleKind,
        inner_name: String,
        span: Span,
    },

    #[error("Malformed invocation of '{name}': {reason}")]
    MalformedInvocation {
        name: String,
        reason: String,
        span: Span,
    },

    #[error("'{label}' is not an index label (in '{name}')")]
    InvalidIndexLabel {
        name: String,
        label: char,
        span: Span,
    },

    #[error("Line too long: {length} bytes (max {MAX_LINE_LENGTH})")]
    LineTooLong { length: usize },

    #[error("Macro name too long: {length} characters (max {MAX_MACRO_NAME_LENGTH})")]
    MacroNameTooLong { length: usize, span: Span },

    #[error("'{name}' has {count} arguments (max {MAX_MACRO_ARGUMENTS})")]
    TooManyArguments {
        name: String,
        count: usize,
        span: Span,
    },

    #[error("'{name}' has {count} indices (max {MAX_INDICES_PER_MACRO})")]
    TooManyIndices {
        name: String,
        count: usize,
        span: Span,
    },

    #[error("Index declaration conflict: {source}")]
    IndexConflict {
        #[source]
        source: IndexError,
        span: Span,
    },
}

impl TokenizeError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            TokenizeError::UnknownMacroOrIndex { .. } => codes::tokenizer::UNKNOWN_MACRO_OR_INDEX,
            TokenizeError::DirectiveRuleMixing { .. } => codes::tokenizer::DIRECTIVE_RULE_MIXING,
            TokenizeError::MalformedInvocation { .. } => codes::tokenizer::MALFORMED_INVOCATION,
            TokenizeError::InvalidIndexLabel { .. } => codes::tokenizer::INVALID_INDEX_LABEL,
            TokenizeError::LineTooLong { .. } => codes::tokenizer::LINE_TOO_LONG,
            TokenizeError::MacroNameTooLong { .. } => codes::tokenizer::MACRO_NAME_TOO_LONG,
            TokenizeError::TooManyArguments { .. } | TokenizeError::TooManyIndices { .. } => {
                codes::tokenizer::TOO_MANY_ARGUMENTS
            }
            TokenizeError::IndexConflict { .. } => codes::indices::INDEX_CONFLICT,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            TokenizeError::LineTooLong { .. } => None,
            TokenizeError::UnknownMacroOrIndex { span, .. }
            | TokenizeError::DirectiveRuleMixing { span, .. }
            | TokenizeError::MalformedInvocation { span, .. }
            | TokenizeError::InvalidIndexLabel { span, .. }
            | TokenizeError::MacroNameTooLong { span, .. }
            | TokenizeError::TooManyArguments { span, .. }
            | TokenizeError::TooManyIndices { span, .. }
            | TokenizeError::IndexConflict { span, .. } => Some(*span),
        }
    }
}

fn is_identifier_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Tokenizer bound to one registry and index convention
#[derive(Debug, Clone)]
pub struct Tokenizer {
    registry: Arc<RuleRegistry>,
    prefix: String,
    convention: IndexConvention,
    ranges: IndexRanges,
}

impl Tokenizer {
    pub fn new(
        registry: Arc<RuleRegistry>,
        prefix: &str,
        convention: IndexConvention,
        ranges: IndexRanges,
    ) -> Self {
        Self {
            registry,
            prefix: prefix.to_string(),
            convention,
            ranges,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Tokenize `text`, which starts `base` bytes into its line
    ///
    /// Directives run here, once. Their failures are reported to `ctx` and
    /// leave no text; structural problems abort with an error.
    pub fn tokenize(
        &self,
        text: &str,
        base: usize,
        ctx: &mut ErrorContext,
    ) -> Result<TokenList, TokenizeError> {
        if text.len() > MAX_LINE_LENGTH {
            return Err(TokenizeError::LineTooLong { length: text.len() });
        }

        let mut list = TokenList::new();
        let mut text_start = 0;
        let mut cursor = 0;

        while let Some(found) = text[cursor..].find(&self.prefix) {
            let start = cursor + found;
            let name_start = start + self.prefix.len();
            let name_len = text.as_bytes()[name_start..]
                .iter()
                .take_while(|&&b| is_identifier_byte(b))
                .count();

            // A prefix not followed by a name is ordinary text
            if name_len == 0 {
                cursor = name_start;
                continue;
            }

            if start > text_start {
                list.push(Token::Text(TextToken {
                    text: text[text_start..start].to_string(),
                    span: Span::from_offsets(base + text_start, base + start),
                }));
            }

            let end = self.match_macro_or_index(
                text, start, name_start, name_len, base, &mut list, ctx,
            )?;
            text_start = end;
            cursor = end;
        }

        if text_start < text.len() {
            list.push(Token::Text(TextToken {
                text: text[text_start..].to_string(),
                span: Span::from_offsets(base + text_start, base + text.len()),
            }));
        }

        Ok(list)
    }

    /// Classify the name at `name_start`, push its token and return the
    /// position just past the invocation
    #[allow(clippy::too_many_arguments)]
    fn match_macro_or_index(
        &self,
        text: &str,
        start: usize,
        name_start: usize,
        name_len: usize,
        base: usize,
        list: &mut TokenList,
        ctx: &mut ErrorContext,
    ) -> Result<usize, TokenizeError> {
        let name = &text[name_start..name_start + name_len];
        let mut position = name_start + name_len;
        let name_span = Span::from_offsets(base + start, base + position);

        if name_len > MAX_MACRO_NAME_LENGTH {
            return Err(TokenizeError::MacroNameTooLong {
                length: name_len,
                span: name_span,
            });
        }

        let Some(rule) = self.registry.lookup(name) else {
            return self.match_index_literal(name, position, name_span, list);
        };

        let (indices, after_indices) = if rule.takes_indices() {
            self.parse_indices(text, position, name, base + start)?
        } else {
            (Vec::new(), position)
        };
        position = after_indices;

        let (args, after_args) = parse_arguments(text, position, name, base + start)?;
        position = after_args;

        let span = Span::from_offsets(base + start, base + position);
        if args.len() > MAX_MACRO_ARGUMENTS {
            return Err(TokenizeError::TooManyArguments {
                name: name.to_string(),
                count: args.len(),
                span,
            });
        }
        self.validate_arguments(name, rule.kind(), &args, span)?;

        let source = &text[start..position];
        match rule {
            RuleRef::Pre(rule) => list.push(Token::SimpleMacro(SimpleMacroToken::new(
                rule,
                SimpleKind::Pre,
                args,
                source,
                span,
            ))),
            RuleRef::Post(rule) => list.push(Token::SimpleMacro(SimpleMacroToken::new(
                rule,
                SimpleKind::Post,
                args,
                source,
                span,
            ))),
            RuleRef::Index(rule) => {
                for index in &indices {
                    list.database_mut()
                        .insert(*index)
                        .map_err(|source| TokenizeError::IndexConflict { source, span })?;
                }
                list.push(Token::IndexMacro(IndexMacroToken::new(
                    rule, args, indices, source, span,
                )));
            }
            RuleRef::SimpleDirective(rule) => {
                let output = rule.apply(&args).unwrap_or_else(|error| {
                    ctx.error(error.error_code(), &error.to_string(), Some(span));
                    String::new()
                });
                list.push(Token::Directive(DirectiveToken::new(name, output, span)));
            }
            RuleRef::IndexDirective(rule) => {
                // Directive indices are not free indices of the line
                let output = rule.apply(&args, &indices).unwrap_or_else(|error| {
                    ctx.error(error.error_code(), &error.to_string(), Some(span));
                    String::new()
                });
                list.push(Token::Directive(DirectiveToken::new(name, output, span)));
            }
        }

        Ok(position)
    }

    fn match_index_literal(
        &self,
        name: &str,
        position: usize,
        span: Span,
        list: &mut TokenList,
    ) -> Result<usize, TokenizeError> {
        let mut chars = name.chars();
        let index = match (chars.next(), chars.next()) {
            (Some(label), None) => self.convention.abstract_index(label, &self.ranges),
            _ => None,
        };

        let Some(index) = index else {
            return Err(TokenizeError::UnknownMacroOrIndex {
                name: name.to_string(),
                span,
            });
        };

        list.database_mut()
            .insert(index)
            .map_err(|source| TokenizeError::IndexConflict { source, span })?;
        list.push(Token::IndexLiteral(IndexLiteralToken::new(index, span)));
        Ok(position)
    }

    /// Parse `[labels]`; whitespace between labels is ignored
    fn parse_indices(
        &self,
        text: &str,
        position: usize,
        name: &str,
        span_start: usize,
    ) -> Result<(Vec<AbstractIndex>, usize), TokenizeError> {
        let malformed = |reason: &str, end: usize| TokenizeError::MalformedInvocation {
            name: name.to_string(),
            reason: reason.to_string(),
            span: Span::from_offsets(span_start, end),
        };

        if !text[position..].starts_with('[') {
            return Err(malformed("expected '[' index list", position));
        }
        let close = text[position..]
            .find(']')
            .map(|offset| position + offset)
            .ok_or_else(|| malformed("unterminated '[' index list", text.len()))?;

        let span = Span::from_offsets(span_start, close + 1);
        let mut indices = Vec::new();
        for label in text[position + 1..close].chars().filter(|c| !c.is_whitespace()) {
            let index = self
                .convention
                .abstract_index(label, &self.ranges)
                .ok_or_else(|| TokenizeError::InvalidIndexLabel {
                    name: name.to_string(),
                    label,
                    span,
                })?;
            indices.push(index);
        }

        if indices.len() > MAX_INDICES_PER_MACRO {
            return Err(TokenizeError::TooManyIndices {
                name: name.to_string(),
                count: indices.len(),
                span,
            });
        }

        Ok((indices, close + 1))
    }

    /// Directive arguments may not invoke replacement rules, and rule
    /// arguments may not invoke directives
    fn validate_arguments(
        &self,
        name: &str,
        kind: RuleKind,
        args: &[String],
        span: Span,
    ) -> Result<(), TokenizeError> {
        for arg in args {
            for inner_name in self.invoked_names(arg) {
                if let Some(inner) = self.registry.kind_of(inner_name) {
                    if inner.is_directive() != kind.is_directive() {
                        return Err(TokenizeError::DirectiveRuleMixing {
                            name: name.to_string(),
                            inner,
                            inner_name: inner_name.to_string(),
                            span,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn invoked_names<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut names = Vec::new();
        let mut cursor = 0;
        while let Some(found) = text[cursor..].find(&self.prefix) {
            let name_start = cursor + found + self.prefix.len();
            let name_len = text.as_bytes()[name_start..]
                .iter()
                .take_while(|&&b| is_identifier_byte(b))
                .count();
            if name_len > 0 {
                names.push(&text[name_start..name_start + name_len]);
            }
            cursor = name_start + name_len;
        }
        names
    }
}

/// Parse an optional `{args}` group
///
/// Arguments split on commas outside nested braces, brackets and
/// parentheses, and are trimmed. `{}` is zero arguments.
fn parse_arguments(
    text: &str,
    position: usize,
    name: &str,
    span_start: usize,
) -> Result<(Vec<String>, usize), TokenizeError> {
    if !text[position..].starts_with('{') {
        return Ok((Vec::new(), position));
    }

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut arg_start = position + 1;

    for (offset, ch) in text[position..].char_indices() {
        let at = position + offset;
        match ch {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if ch != '}' {
                        break;
                    }
                    let last = text[arg_start..at].trim();
                    if !(args.is_empty() && last.is_empty()) {
                        args.push(last.to_string());
                    }
                    return Ok((args, at + 1));
                }
            }
            ',' if depth == 1 => {
                args.push(text[arg_start..at].trim().to_string());
                arg_start = at + 1;
            }
            _ => {}
        }
    }

    Err(TokenizeError::MalformedInvocation {
        name: name.to_string(),
        reason: "unterminated '{' argument list".to_string(),
        span: Span::from_offsets(span_start, text.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{AssignmentRecord, IndexClass};
    use crate::rules::{
        CacheHandle, CallbackResult, IndexDirective, IndexRule, IndexRuleHandler, RolledIndex,
        SimpleRule,
    };
    use assert_matches::assert_matches;

    struct Echo;

    impl IndexRuleHandler for Echo {
        fn unroll(
            &self,
            args: &[String],
            indices: &[AssignmentRecord],
            _cache: &mut CacheHandle,
        ) -> CallbackResult {
            let values: Vec<String> = indices.iter().map(|r| r.value.to_string()).collect();
            Ok(format!("{}{}", args.join(""), values.join("")))
        }

        fn roll(&self, _args: &[String], indices: &[RolledIndex]) -> CallbackResult {
            Ok(indices.iter().map(|r| r.variable.as_str()).collect())
        }
    }

    fn tokenizer() -> Tokenizer {
        let mut builder = RuleRegistry::builder();
        builder
            .pre(SimpleRule::new("NAME", 0, |_| Ok("model".to_string())))
            .unwrap()
            .post(SimpleRule::new("WRAP", 1, |args| Ok(format!("({})", args[0]))))
            .unwrap()
            .index(IndexRule::new("U2", 1, 2, Some(IndexClass::Full), Echo))
            .unwrap()
            .simple_directive(SimpleRule::new("RESOURCE_RELEASE", 0, |_| Ok(String::new())))
            .unwrap()
            .index_directive(IndexDirective::new("RESOURCE_DV", 1, 1, None, |_, _| {
                Ok(String::new())
            }))
            .unwrap();
        Tokenizer::new(
            Arc::new(builder.build()),
            "$$__",
            IndexConvention::default(),
            IndexRanges::new(2, 1),
        )
    }

    fn tokenize(line: &str) -> Result<TokenList, TokenizeError> {
        tokenizer().tokenize(line, 0, &mut ErrorContext::new())
    }

    #[test]
    fn plain_text_is_one_token() {
        let list = tokenize("double x = 1.0;").unwrap();
        assert_eq!(list.len(), 1);
        assert!(!list.has_replacements());
        assert_eq!(list.to_string(), "double x = 1.0;");
    }

    #[test]
    fn recognises_each_category() {
        let list = tokenize("$$__NAME: $$__U2[A B]{k} + $$__WRAP{x} * $$__c").unwrap();
        assert_eq!(list.indices().labels(), "ABc");
        assert!(list.has_replacements());
        assert_eq!(list.directive_count(), 0);
        assert_eq!(
            list.to_string(),
            "$$__NAME: $$__U2[A B]{k} + $$__WRAP{x} * c"
        );
    }

    #[test]
    fn arguments_split_on_top_level_commas() {
        let (args, end) = parse_arguments("{ f(a, b) , {c,d},e }rest", 0, "X", 0).unwrap();
        assert_eq!(args, vec!["f(a, b)", "{c,d}", "e"]);
        assert_eq!(end, 21);

        let (args, _) = parse_arguments("{}", 0, "X", 0).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn unterminated_arguments_are_malformed() {
        assert_matches!(
            tokenize("x = $$__WRAP{y"),
            Err(TokenizeError::MalformedInvocation { ref name, .. }) if name == "WRAP"
        );
    }

    #[test]
    fn unknown_names_fail() {
        let err = tokenize("x = $$__BOGUS;").unwrap_err();
        assert_matches!(err, TokenizeError::UnknownMacroOrIndex { ref name, .. } if name == "BOGUS");
        assert_eq!(err.span(), Some(Span::from_offsets(4, 13)));
    }

    #[test]
    fn invalid_label_in_index_list() {
        assert_matches!(
            tokenize("$$__U2[A1]{k}"),
            Err(TokenizeError::InvalidIndexLabel { label: '1', .. })
        );
    }

    #[test]
    fn directive_arguments_cannot_invoke_rules() {
        assert_matches!(
            tokenize("$$__RESOURCE_DV[a]{$$__NAME}"),
            Err(TokenizeError::DirectiveRuleMixing { inner: RuleKind::Pre, .. })
        );
        assert_matches!(
            tokenize("$$__WRAP{$$__RESOURCE_RELEASE}"),
            Err(TokenizeError::DirectiveRuleMixing {
                inner: RuleKind::SimpleDirective,
                ..
            })
        );
    }

    #[test]
    fn directive_indices_are_not_free_indices() {
        let list = tokenize("$$__RESOURCE_DV[a]{dV}").unwrap();
        assert_eq!(list.directive_count(), 1);
        assert!(list.indices().is_empty());
        assert_eq!(list.to_string(), "");
    }

    #[test]
    fn prefix_without_name_is_text() {
        let list = tokenize("cost $$__ only").unwrap();
        assert!(!list.has_replacements());
        assert_eq!(list.to_string(), "cost $$__ only");
    }
}
