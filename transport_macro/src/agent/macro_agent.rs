//! The expansion driver
//!
//! `MacroAgent::apply` takes one template line through split, tokenize,
//! pre-macro evaluation, index enumeration and emission, then re-applies
//! itself to generated lines that still carry the macro prefix. Recursion
//! depth is an explicit parameter rather than agent state.

use super::context::ErrorContext;
use super::split::{split_line, SplitKind, SplitLine};
use crate::config::compile_time::expansion::ABSOLUTE_MAX_RECURSION_DEPTH;
use crate::config::AgentPreferences;
use crate::index::{AssignmentList, IndexConvention, IndexError, IndexRanges};
use crate::log_warning;
use crate::logging::codes;
use crate::rules::{RuleRegistry, UnrollBehaviour};
use crate::tokens::{SimpleKind, TokenList, Tokenizer};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum ExpansionError {
    #[error("LHS and RHS index assignments disagree: {source}")]
    LhsRhsIndexMismatch {
        #[source]
        source: IndexError,
    },
}

impl ExpansionError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            ExpansionError::LhsRhsIndexMismatch { .. } => codes::indices::LHS_RHS_INDEX_MISMATCH,
        }
    }
}

/// Combine an LHS assignment with an RHS assignment
pub fn merge_assignments(
    lhs: &AssignmentList,
    rhs: &AssignmentList,
) -> Result<AssignmentList, ExpansionError> {
    (lhs + rhs).map_err(|source| ExpansionError::LhsRhsIndexMismatch { source })
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub prefix: String,
    pub split_equal: String,
    pub split_sum_equal: String,
    pub recursion_max: usize,
    pub unroll_by_default: bool,
    pub unroll_threshold: Option<usize>,
    pub empty_range_marker: String,
}

impl AgentConfig {
    pub fn from_preferences(preferences: &AgentPreferences) -> Self {
        Self {
            prefix: preferences.macro_prefix.clone(),
            split_equal: preferences.split_equal.clone(),
            split_sum_equal: preferences.split_sum_equal.clone(),
            recursion_max: normalize_recursion_max(preferences.recursion_max),
            unroll_by_default: preferences.unroll_by_default,
            unroll_threshold: preferences.unroll_threshold,
            empty_range_marker: preferences.empty_range_marker.clone(),
        }
    }

    pub fn with_recursion_max(mut self, recursion_max: usize) -> Self {
        self.recursion_max = normalize_recursion_max(recursion_max);
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_preferences(&AgentPreferences::default())
    }
}

/// At least one pass, and never above the compile-time ceiling
fn normalize_recursion_max(requested: usize) -> usize {
    if requested > ABSOLUTE_MAX_RECURSION_DEPTH {
        log_warning!(
            codes::expansion::RECURSION_LIMIT_CLAMPED,
            "Recursion limit clamped to compile-time maximum",
            "requested" => requested,
            "max" => ABSOLUTE_MAX_RECURSION_DEPTH
        );
        return ABSOLUTE_MAX_RECURSION_DEPTH;
    }
    requested.max(1)
}

// ============================================================================
// AGENT
// ============================================================================

/// Lines generated from one template line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionOutput {
    pub lines: Vec<String>,
    pub replacements: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AgentMetrics {
    pub lines: usize,
    pub replacements: usize,
    pub recursion_aborts: usize,
    pub elapsed: Duration,
}

/// Expansion driver for one translation unit
///
/// Not shared between threads: each worker builds its own agent from a
/// shared registry.
#[derive(Debug)]
pub struct MacroAgent {
    tokenizer: Tokenizer,
    config: AgentConfig,
    convention: IndexConvention,
    ranges: IndexRanges,
    ctx: ErrorContext,
    metrics: AgentMetrics,
}

impl MacroAgent {
    pub fn new(
        registry: Arc<RuleRegistry>,
        config: AgentConfig,
        convention: IndexConvention,
        ranges: IndexRanges,
    ) -> Self {
        let tokenizer = Tokenizer::new(registry, &config.prefix, convention.clone(), ranges);
        Self {
            tokenizer,
            config,
            convention,
            ranges,
            ctx: ErrorContext::new(),
            metrics: AgentMetrics::default(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    pub fn context(&self) -> &ErrorContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ErrorContext {
        &mut self.ctx
    }

    /// Swap in a fresh context, returning the previous one
    pub fn replace_context(&mut self, ctx: ErrorContext) -> ErrorContext {
        std::mem::replace(&mut self.ctx, ctx)
    }

    /// Expand one line, re-applying to generated lines as needed
    pub fn apply(&mut self, line: &str) -> ExpansionOutput {
        let started = Instant::now();
        let output = self.apply_at_depth(line, 1);

        self.metrics.lines += 1;
        self.metrics.replacements += output.replacements;
        self.metrics.elapsed += started.elapsed();
        output
    }

    pub fn apply_at_depth(&mut self, line: &str, depth: usize) -> ExpansionOutput {
        if depth > self.config.recursion_max {
            self.metrics.recursion_aborts += 1;
            self.ctx.warning(
                codes::expansion::RECURSION_DEPTH_EXCEEDED,
                &format!(
                    "Recursion depth exceeded maximum of {}; line dropped",
                    self.config.recursion_max
                ),
                None,
            );
            return ExpansionOutput::default();
        }

        let (lines, mut replacements) = self.expand_line(line);
        if replacements == 0 {
            return ExpansionOutput {
                lines,
                replacements,
            };
        }

        let mut output = Vec::with_capacity(lines.len());
        for generated in lines {
            if generated.contains(&self.config.prefix) {
                let nested = self.apply_at_depth(&generated, depth + 1);
                replacements += nested.replacements;
                output.extend(nested.lines);
            } else {
                output.push(generated);
            }
        }

        ExpansionOutput {
            lines: output,
            replacements,
        }
    }

    /// One expansion pass over a line
    fn expand_line(&mut self, line: &str) -> (Vec<String>, usize) {
        if !line.contains(&self.config.prefix) {
            return (vec![line.to_string()], 0);
        }

        let split = split_line(line, &self.config.split_equal, &self.config.split_sum_equal);

        let lhs = match split.lhs {
            Some(text) => self.tokenizer.tokenize(text, 0, &mut self.ctx),
            None => Ok(TokenList::new()),
        };
        let tokenized = lhs.and_then(|lhs| {
            self.tokenizer
                .tokenize(split.rhs, split.rhs_offset, &mut self.ctx)
                .map(|rhs| (lhs, rhs))
        });

        let (mut lhs, mut rhs) = match tokenized {
            Ok(sides) => sides,
            Err(error) => {
                self.ctx
                    .error(error.error_code(), &error.to_string(), error.span());
                return (vec![line.to_string()], 0);
            }
        };

        if !lhs.has_replacements() && !rhs.has_replacements() {
            return (vec![line.to_string()], 0);
        }

        let mut replacements = lhs.directive_count() + rhs.directive_count();
        replacements += lhs.evaluate_simple(SimpleKind::Pre, &mut self.ctx);
        replacements += rhs.evaluate_simple(SimpleKind::Pre, &mut self.ctx);

        let rhs_only = match rhs.indices().subtract(lhs.indices()) {
            Ok(indices) => indices,
            Err(source) => {
                self.report(ExpansionError::LhsRhsIndexMismatch { source });
                return (Vec::new(), replacements);
            }
        };

        if lhs.indices().has_empty_range() || rhs_only.has_empty_range() {
            return (vec![self.config.empty_range_marker.clone()], replacements);
        }

        // Decided before any assignment is built; `None` means the product overflowed
        let rhs_count = rhs_only.assignment_count();
        let total = lhs
            .indices()
            .assignment_count()
            .zip(rhs_count)
            .and_then(|(l, r)| l.checked_mul(r));
        if self.should_roll(&lhs, &rhs, total) {
            let line = self.emit_rolled(&split, &mut lhs, &mut rhs, &mut replacements);
            return (vec![line], replacements);
        }

        let op = operator(split.kind);
        let trailer = split.trailer();
        let rhs_count = rhs_count.unwrap_or(usize::MAX);
        let lhs_assignments = lhs.indices().enumerate(&self.ranges);
        let mut lines = Vec::new();

        for lhs_assignment in lhs_assignments {
            replacements += lhs.evaluate_assignment(&lhs_assignment, &mut self.ctx);
            replacements += lhs.evaluate_simple(SimpleKind::Post, &mut self.ctx);
            let lhs_text = lhs.to_string();

            if rhs_count > 1 {
                if !lhs_text.is_empty() {
                    lines.push(format!("{}{}", lhs_text, op));
                }

                let last = rhs_count - 1;
                for (position, rhs_assignment) in rhs_only.enumerate(&self.ranges).enumerate() {
                    let merged = match merge_assignments(&lhs_assignment, &rhs_assignment) {
                        Ok(merged) => merged,
                        Err(error) => {
                            self.report(error);
                            continue;
                        }
                    };
                    replacements += rhs.evaluate_assignment(&merged, &mut self.ctx);
                    replacements += rhs.evaluate_simple(SimpleKind::Post, &mut self.ctx);

                    let mut output = rhs.to_string();
                    if lhs_text.is_empty() || position == last {
                        output.push_str(trailer);
                    }
                    lines.push(output);
                }
            } else {
                let Some(rhs_assignment) = rhs_only.enumerate(&self.ranges).next() else {
                    continue;
                };
                let merged = match merge_assignments(&lhs_assignment, &rhs_assignment) {
                    Ok(merged) => merged,
                    Err(error) => {
                        self.report(error);
                        continue;
                    }
                };
                replacements += rhs.evaluate_assignment(&merged, &mut self.ctx);
                replacements += rhs.evaluate_simple(SimpleKind::Post, &mut self.ctx);

                lines.push(format!("{}{}{}{}", lhs_text, op, rhs, trailer));
            }
        }

        (lines, replacements)
    }

    fn should_roll(
        &mut self,
        lhs: &TokenList,
        rhs: &TokenList,
        assignments: Option<usize>,
    ) -> bool {
        let status = lhs.unroll_status().merge(rhs.unroll_status());
        if status.conflict {
            self.ctx.warning(
                codes::expansion::UNROLL_CONFLICT,
                "Rules on this line both force and prevent unrolling; unrolling",
                None,
            );
        }

        match status.behaviour {
            UnrollBehaviour::Force => false,
            UnrollBehaviour::Prevent => true,
            UnrollBehaviour::Allow => {
                !self.config.unroll_by_default
                    || self
                        .config
                        .unroll_threshold
                        .is_some_and(|threshold| assignments.map_or(true, |n| n > threshold))
            }
        }
    }

    fn emit_rolled(
        &mut self,
        split: &SplitLine<'_>,
        lhs: &mut TokenList,
        rhs: &mut TokenList,
        replacements: &mut usize,
    ) -> String {
        *replacements += lhs.evaluate_rolled(&self.convention, &mut self.ctx);
        *replacements += lhs.evaluate_simple(SimpleKind::Post, &mut self.ctx);
        *replacements += rhs.evaluate_rolled(&self.convention, &mut self.ctx);
        *replacements += rhs.evaluate_simple(SimpleKind::Post, &mut self.ctx);

        format!("{}{}{}{}", lhs, operator(split.kind), rhs, split.trailer())
    }

    fn report(&mut self, error: ExpansionError) {
        self.ctx
            .error(error.error_code(), &error.to_string(), None);
    }
}

fn operator(kind: SplitKind) -> &'static str {
    match kind {
        SplitKind::None => "",
        SplitKind::Sum => " =",
        SplitKind::SumEqual => " +=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{AssignmentRecord, IndexClass};
    use crate::rules::{
        CacheHandle, CallbackResult, IndexDirective, IndexRule, IndexRuleHandler, RolledIndex,
        SimpleRule,
    };
    use crate::config::compile_time::expansion::MAX_ERRORS_PER_TOKEN;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Names {
        array: &'static str,
        names: &'static [&'static str],
    }

    impl IndexRuleHandler for Names {
        fn unroll(
            &self,
            _args: &[String],
            indices: &[AssignmentRecord],
            _cache: &mut CacheHandle,
        ) -> CallbackResult {
            self.names
                .get(indices[0].value)
                .map(|name| name.to_string())
                .ok_or_else(|| format!("no name for {}", indices[0].value))
        }

        fn roll(&self, _args: &[String], indices: &[RolledIndex]) -> CallbackResult {
            Ok(format!("{}[{}]", self.array, indices[0].variable))
        }
    }

    struct Pair;

    impl IndexRuleHandler for Pair {
        fn unroll(
            &self,
            _args: &[String],
            indices: &[AssignmentRecord],
            _cache: &mut CacheHandle,
        ) -> CallbackResult {
            Ok(format!("p{}{}", indices[0].value, indices[1].value))
        }

        fn roll(&self, _args: &[String], indices: &[RolledIndex]) -> CallbackResult {
            Ok(format!("p[{}][{}]", indices[0].variable, indices[1].variable))
        }
    }

    #[derive(Clone, Default)]
    struct Counting {
        pre: Arc<AtomicUsize>,
        post: Arc<AtomicUsize>,
    }

    impl IndexRuleHandler for Counting {
        fn pre(&self, _args: &[String]) -> Result<CacheHandle, String> {
            self.pre.fetch_add(1, Ordering::SeqCst);
            Ok(CacheHandle::new(Vec::<String>::new()))
        }

        fn unroll(
            &self,
            _args: &[String],
            indices: &[AssignmentRecord],
            _cache: &mut CacheHandle,
        ) -> CallbackResult {
            Ok(format!("c{}", indices[0].value))
        }

        fn roll(&self, _args: &[String], indices: &[RolledIndex]) -> CallbackResult {
            Ok(format!("c[{}]", indices[0].variable))
        }

        fn post(&self, _cache: CacheHandle) {
            self.post.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Joins its loop variables; never expected to unroll
    struct Joined;

    impl IndexRuleHandler for Joined {
        fn unroll(
            &self,
            _args: &[String],
            indices: &[AssignmentRecord],
            _cache: &mut CacheHandle,
        ) -> CallbackResult {
            Err(format!("unrolled over {} indices", indices.len()))
        }

        fn roll(&self, _args: &[String], indices: &[RolledIndex]) -> CallbackResult {
            let variables: Vec<&str> = indices.iter().map(|i| i.variable.as_str()).collect();
            Ok(variables.join(","))
        }
    }

    struct Failing;

    const OK_NAMES: [&str; 10] = ["u"; 10];

    impl IndexRuleHandler for Failing {
        fn unroll(
            &self,
            _args: &[String],
            indices: &[AssignmentRecord],
            _cache: &mut CacheHandle,
        ) -> CallbackResult {
            Err(format!("no component {}", indices[0].value))
        }

        fn roll(&self, _args: &[String], _indices: &[RolledIndex]) -> CallbackResult {
            Err("cannot roll".to_string())
        }
    }

    fn config() -> AgentConfig {
        AgentConfig {
            prefix: "$$__".to_string(),
            split_equal: "=".to_string(),
            split_sum_equal: "+=".to_string(),
            recursion_max: 4,
            unroll_by_default: true,
            unroll_threshold: None,
            empty_range_marker: "// skipped: empty index range".to_string(),
        }
    }

    fn base_registry() -> crate::rules::RuleRegistryBuilder {
        let mut builder = RuleRegistry::builder();
        builder
            .pre(SimpleRule::new("NAME", 0, |_| Ok("quartic".to_string())))
            .unwrap()
            .pre(SimpleRule::new("AGAIN", 0, |_| Ok("$$__AGAIN".to_string())))
            .unwrap()
            .post(SimpleRule::new("WRAP", 1, |args| Ok(format!("({})", args[0]))))
            .unwrap()
            .index(IndexRule::new(
                "FIELD",
                0,
                1,
                Some(IndexClass::FieldOnly),
                Names {
                    array: "fields",
                    names: &["phi", "chi"],
                },
            ))
            .unwrap()
            .index(IndexRule::new(
                "PARAMETER",
                0,
                1,
                None,
                Names {
                    array: "params",
                    names: &["m", "lambda"],
                },
            ))
            .unwrap()
            .index(IndexRule::new("PAIR", 0, 2, None, Pair))
            .unwrap();
        builder
    }

    fn agent_with(
        builder: crate::rules::RuleRegistryBuilder,
        config: AgentConfig,
        convention: IndexConvention,
        ranges: IndexRanges,
    ) -> MacroAgent {
        MacroAgent::new(Arc::new(builder.build()), config, convention, ranges)
    }

    fn agent() -> MacroAgent {
        agent_with(
            base_registry(),
            config(),
            IndexConvention::default(),
            IndexRanges::new(2, 2),
        )
    }

    fn field_convention() -> IndexConvention {
        IndexConvention::empty()
            .with_label('A', IndexClass::FieldOnly)
            .with_label('B', IndexClass::FieldOnly)
    }

    #[test]
    fn trivial_lines_pass_through_unchanged() {
        let mut agent = agent();
        for line in ["double x = 1.0;", "if (a == b) { c += d; }", "", "cost $$ 5"] {
            let output = agent.apply(line);
            assert_eq!(output.lines, vec![line.to_string()]);
            assert_eq!(output.replacements, 0);
        }
        assert!(!agent.context().has_errors());
    }

    #[test]
    fn pre_macros_substitute_once() {
        let output = agent().apply("const char* name = \"$$__NAME\";");
        assert_eq!(output.lines, vec!["const char* name = \"quartic\";"]);
        assert_eq!(output.replacements, 1);
    }

    #[test]
    fn matching_indices_expand_with_trailing_punctuation() {
        let mut agent = agent_with(
            base_registry(),
            config(),
            field_convention(),
            IndexRanges::new(2, 2),
        );
        let output = agent.apply("$$__FIELD[A] = $$__PARAMETER[A];");
        assert_eq!(output.lines, vec!["phi = m;", "chi = lambda;"]);
        assert!(output.lines.iter().all(|line| line.ends_with(';')));
        assert!(!agent.context().has_errors());
    }

    #[test]
    fn empty_range_emits_marker() {
        let mut agent = agent_with(
            base_registry(),
            config(),
            IndexConvention::default(),
            IndexRanges::new(0, 2),
        );
        let output = agent.apply("x = $$__FIELD[a];");
        assert_eq!(output.lines, vec!["// skipped: empty index range"]);
        assert!(!agent.context().has_errors());
    }

    #[test]
    fn sum_equal_split_with_free_rhs_index() {
        let output = agent().apply("acc += $$__WRAP{a = b} * $$__FIELD[a];");
        assert_eq!(
            output.lines,
            vec!["acc +=", " (a = b) * phi", " (a = b) * chi;"]
        );
    }

    #[test]
    fn multi_rhs_with_lhs_text() {
        let mut agent = agent_with(
            base_registry(),
            config(),
            field_convention(),
            IndexRanges::new(2, 2),
        );
        let output = agent.apply("sum = $$__PAIR[A B];");
        assert_eq!(output.lines, vec!["sum =", " p00", " p01", " p10", " p11;"]);
    }

    #[test]
    fn multi_rhs_without_lhs_text() {
        let mut agent = agent_with(
            base_registry(),
            config(),
            field_convention(),
            IndexRanges::new(2, 2),
        );
        let output = agent.apply("$$__PAIR[A B],");
        assert_eq!(output.lines, vec!["p00,", "p01,", "p10,", "p11,"]);
    }

    #[test]
    fn shared_label_combination_is_lhs_rhs_mismatch() {
        let mut lhs = AssignmentList::new();
        lhs.bind(AssignmentRecord::new('A', IndexClass::Full, 0, 2));
        let mut rhs = AssignmentList::new();
        rhs.bind(AssignmentRecord::new('A', IndexClass::Full, 1, 2));

        let result = merge_assignments(&lhs, &rhs);
        assert_matches!(
            result,
            Err(ExpansionError::LhsRhsIndexMismatch {
                source: IndexError::IndexConflict { label: 'A', .. }
            })
        );
    }

    #[test]
    fn recursion_guard_drops_line_with_one_warning() {
        let mut agent = agent_with(
            base_registry(),
            config().with_recursion_max(1),
            IndexConvention::default(),
            IndexRanges::new(2, 2),
        );
        let output = agent.apply("$$__AGAIN");

        assert!(output.lines.is_empty());
        assert_eq!(agent.context().warning_count(), 1);
        let warning = &agent.context().diagnostics()[0];
        assert_eq!(warning.code, codes::expansion::RECURSION_DEPTH_EXCEEDED);
        assert!(warning.message.contains("maximum of 1"));
        assert_eq!(agent.metrics().recursion_aborts, 1);
    }

    #[test]
    fn recursion_max_is_at_least_one() {
        assert_eq!(config().with_recursion_max(0).recursion_max, 1);
        assert_eq!(
            config()
                .with_recursion_max(ABSOLUTE_MAX_RECURSION_DEPTH + 10)
                .recursion_max,
            ABSOLUTE_MAX_RECURSION_DEPTH
        );
    }

    #[test]
    fn generated_macros_are_expanded_again() {
        let mut builder = base_registry();
        builder
            .pre(SimpleRule::new("LABEL", 0, |_| Ok("$$__NAME".to_string())))
            .unwrap();
        let mut agent = agent_with(
            builder,
            config(),
            IndexConvention::default(),
            IndexRanges::new(2, 2),
        );
        let output = agent.apply("// $$__LABEL");
        assert_eq!(output.lines, vec!["// quartic"]);
        assert_eq!(output.replacements, 2);
    }

    #[test]
    fn each_directive_token_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut builder = base_registry();
        builder
            .index_directive(IndexDirective::new("DV", 1, 1, None, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(String::new())
            }))
            .unwrap();
        let mut agent = agent_with(
            builder,
            config(),
            IndexConvention::default(),
            IndexRanges::new(2, 2),
        );

        let output = agent.apply("$$__DV[a]{u} $$__DV[b]{v}");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(output.replacements, 2);
        assert_eq!(output.lines, vec![" "]);
    }

    #[test]
    fn cache_released_after_line() {
        let hooks = Counting::default();
        let mut builder = base_registry();
        builder
            .index(IndexRule::new("COUNT", 0, 1, None, hooks.clone()))
            .unwrap();
        let mut agent = agent_with(
            builder,
            config(),
            IndexConvention::default(),
            IndexRanges::new(2, 2),
        );

        let output = agent.apply("x = $$__COUNT[a];");
        assert_eq!(output.lines, vec!["x =", " c0", " c1;"]);
        assert_eq!(hooks.pre.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.post.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn prevented_line_rolls_without_enumerating() {
        let mut builder = RuleRegistry::builder();
        builder
            .index(IndexRule::new("T", 0, 5, None, Joined).with_unroll(UnrollBehaviour::Prevent))
            .unwrap();
        // Five full indices over 2^21 values each; the product overflows usize
        let mut agent = agent_with(
            builder,
            config(),
            IndexConvention::default(),
            IndexRanges::new(1 << 20, 1),
        );
        let output = agent.apply("x = $$__T[ABCDE];");
        assert_eq!(output.lines, vec!["x = __A,__B,__C,__D,__E;"]);
        assert!(!agent.context().has_errors());
    }

    #[test]
    fn threshold_rolls_before_enumerating() {
        let mut builder = RuleRegistry::builder();
        builder.index(IndexRule::new("T", 0, 5, None, Joined)).unwrap();
        let mut config = config();
        config.unroll_threshold = Some(64);
        let mut agent = agent_with(
            builder,
            config,
            IndexConvention::default(),
            IndexRanges::new(500, 1),
        );
        let output = agent.apply("x[$$__A] = $$__T[ABCDE];");
        assert_eq!(output.lines, vec!["x[__A] = __A,__B,__C,__D,__E;"]);
    }

    #[test]
    fn failing_token_is_silenced_while_siblings_evaluate() {
        let mut builder = RuleRegistry::builder();
        builder
            .index(IndexRule::new("BAD", 0, 1, None, Failing))
            .unwrap()
            .index(IndexRule::new("OK", 0, 1, None, Names {
                array: "ok",
                names: &OK_NAMES,
            }))
            .unwrap();
        let mut agent = agent_with(
            builder,
            config(),
            IndexConvention::default(),
            IndexRanges::new(5, 1),
        );

        let output = agent.apply("x[$$__A] = $$__BAD[A] + $$__OK[A];");
        assert_eq!(output.lines.len(), 10);
        assert_eq!(output.lines[0], "x[0] =  + u;");
        assert_eq!(output.lines[9], "x[9] =  + u;");
        assert!(output.lines.iter().all(|line| line.ends_with(" + u;")));

        assert_eq!(agent.context().error_count(), MAX_ERRORS_PER_TOKEN as usize);
        assert!(agent
            .context()
            .diagnostics()
            .iter()
            .all(|d| d.code == codes::rules::RULE_APPLICATION_FAILURE));
    }

    #[test]
    fn prevent_rolls_the_line() {
        let mut builder = RuleRegistry::builder();
        builder
            .index(
                IndexRule::new(
                    "FIELD",
                    0,
                    1,
                    None,
                    Names {
                        array: "fields",
                        names: &["phi", "chi"],
                    },
                )
                .with_unroll(UnrollBehaviour::Prevent),
            )
            .unwrap();
        let mut agent = agent_with(
            builder,
            config(),
            IndexConvention::default(),
            IndexRanges::new(2, 2),
        );
        let output = agent.apply("x[$$__a] = $$__FIELD[a];");
        assert_eq!(output.lines, vec!["x[__a] = fields[__a];"]);
        assert_eq!(output.replacements, 2);
    }

    #[test]
    fn threshold_rolls_large_expansions() {
        let mut config = config();
        config.unroll_threshold = Some(1);
        let mut agent = agent_with(
            base_registry(),
            config,
            IndexConvention::default(),
            IndexRanges::new(2, 2),
        );
        let output = agent.apply("y = $$__FIELD[a];");
        assert_eq!(output.lines, vec!["y = fields[__a];"]);
    }

    #[test]
    fn force_wins_unroll_conflict_with_warning() {
        let mut builder = RuleRegistry::builder();
        builder
            .index(
                IndexRule::new("FIELD", 0, 1, None, Names {
                    array: "fields",
                    names: &["phi", "chi"],
                })
                .with_unroll(UnrollBehaviour::Force),
            )
            .unwrap()
            .index(
                IndexRule::new("PARAMETER", 0, 1, None, Names {
                    array: "params",
                    names: &["m", "lambda"],
                })
                .with_unroll(UnrollBehaviour::Prevent),
            )
            .unwrap();
        let mut agent = agent_with(
            builder,
            config(),
            IndexConvention::default(),
            IndexRanges::new(2, 2),
        );
        let output = agent.apply("$$__FIELD[a] = $$__PARAMETER[a];");
        assert_eq!(output.lines, vec!["phi = m;", "chi = lambda;"]);
        assert_eq!(agent.context().warning_count(), 1);
        assert_eq!(
            agent.context().diagnostics()[0].code,
            codes::expansion::UNROLL_CONFLICT
        );
    }

    #[test]
    fn unknown_macro_keeps_line_and_reports() {
        let mut agent = agent();
        let output = agent.apply("x = $$__BOGUS;");
        assert_eq!(output.lines, vec!["x = $$__BOGUS;"]);
        assert_eq!(output.replacements, 0);
        assert_eq!(agent.context().error_count(), 1);
        assert_eq!(
            agent.context().diagnostics()[0].code,
            codes::tokenizer::UNKNOWN_MACRO_OR_INDEX
        );
    }

    #[test]
    fn metrics_accumulate() {
        let mut agent = agent();
        agent.apply("plain");
        agent.apply("$$__NAME");
        assert_eq!(agent.metrics().lines, 2);
        assert_eq!(agent.metrics().replacements, 1);
    }
}
