//! Abstract indices, their classes, and the per-line index database

use super::assignment::Assignments;
use super::error::IndexError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Index class of an abstract index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexClass {
    /// Ranges over fields only
    FieldOnly,
    /// Ranges over fields then their momenta
    Full,
    /// Ranges over model parameters
    Parameter,
}

impl IndexClass {
    /// Whether a rule declaring `self` can be bound to an index of class `bound`
    ///
    /// Compatibility is one-directional: a full-class slot accepts field-only
    /// indices, never the other way round.
    pub fn accepts(self, bound: IndexClass) -> bool {
        match self {
            IndexClass::Full => matches!(bound, IndexClass::Full | IndexClass::FieldOnly),
            IndexClass::FieldOnly => bound == IndexClass::FieldOnly,
            IndexClass::Parameter => bound == IndexClass::Parameter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexClass::FieldOnly => "field_only",
            IndexClass::Full => "full",
            IndexClass::Parameter => "parameter",
        }
    }
}

impl fmt::Display for IndexClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Species counts that determine index ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexRanges {
    pub fields: usize,
    pub parameters: usize,
}

impl IndexRanges {
    pub fn new(fields: usize, parameters: usize) -> Self {
        Self { fields, parameters }
    }

    pub fn range_for(&self, class: IndexClass) -> usize {
        match class {
            IndexClass::FieldOnly => self.fields,
            IndexClass::Full => 2 * self.fields,
            IndexClass::Parameter => self.parameters,
        }
    }
}

/// A single-character placeholder for a tensor component position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbstractIndex {
    pub label: char,
    pub class: IndexClass,
    pub range: usize,
}

impl AbstractIndex {
    pub fn new(label: char, class: IndexClass, range: usize) -> Self {
        Self {
            label,
            class,
            range,
        }
    }

    /// Same identity: class and range agree
    pub fn compatible_with(&self, other: &AbstractIndex) -> bool {
        self.class == other.class && self.range == other.range
    }
}

impl fmt::Display for AbstractIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}[{}]", self.label, self.class, self.range)
    }
}

// ============================================================================
// INDEX CONVENTION
// ============================================================================

pub const DEFAULT_LOOP_VARIABLE_PREFIX: &str = "__";

/// Immutable label table handed to the tokenizer
///
/// Decides which characters are index labels and what class each has. Also
/// names the loop variable an index becomes in rolled output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConvention {
    classes: BTreeMap<char, IndexClass>,
    loop_prefix: String,
}

impl Default for IndexConvention {
    fn default() -> Self {
        let mut classes = BTreeMap::new();
        for label in 'A'..='Z' {
            classes.insert(label, IndexClass::Full);
        }
        for label in 'a'..='k' {
            classes.insert(label, IndexClass::FieldOnly);
        }
        for label in 'l'..='z' {
            classes.insert(label, IndexClass::Parameter);
        }
        Self {
            classes,
            loop_prefix: DEFAULT_LOOP_VARIABLE_PREFIX.to_string(),
        }
    }
}

impl IndexConvention {
    /// Convention with no recognised labels
    pub fn empty() -> Self {
        Self {
            classes: BTreeMap::new(),
            loop_prefix: DEFAULT_LOOP_VARIABLE_PREFIX.to_string(),
        }
    }

    pub fn with_label(mut self, label: char, class: IndexClass) -> Self {
        self.classes.insert(label, class);
        self
    }

    pub fn with_loop_prefix(mut self, prefix: &str) -> Self {
        self.loop_prefix = prefix.to_string();
        self
    }

    pub fn classify(&self, label: char) -> Option<IndexClass> {
        self.classes.get(&label).copied()
    }

    pub fn is_label(&self, label: char) -> bool {
        self.classes.contains_key(&label)
    }

    /// Build the abstract index for `label` under the given ranges
    pub fn abstract_index(&self, label: char, ranges: &IndexRanges) -> Option<AbstractIndex> {
        self.classify(label)
            .map(|class| AbstractIndex::new(label, class, ranges.range_for(class)))
    }

    pub fn loop_variable(&self, label: char) -> String {
        format!("{}{}", self.loop_prefix, label)
    }
}

// ============================================================================
// INDEX REMAPPING
// ============================================================================

/// Substitution of abstract indices by other abstract indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRemap {
    targets: BTreeMap<char, AbstractIndex>,
}

impl IndexRemap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, from: char, to: AbstractIndex) -> Self {
        self.targets.insert(from, to);
        self
    }

    pub fn get(&self, label: char) -> Option<&AbstractIndex> {
        self.targets.get(&label)
    }

    /// Remapped index, or the index itself when no mapping exists
    pub fn apply(&self, index: &AbstractIndex) -> AbstractIndex {
        self.targets.get(&index.label).copied().unwrap_or(*index)
    }
}

// ============================================================================
// INDEX DATABASE
// ============================================================================

/// Label-ordered, label-unique set of the abstract indices found on one line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDatabase {
    indices: BTreeMap<char, AbstractIndex>,
}

impl IndexDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an index; re-declaring the same identity is a no-op
    pub fn insert(&mut self, index: AbstractIndex) -> Result<(), IndexError> {
        match self.indices.get(&index.label) {
            Some(existing) if !existing.compatible_with(&index) => {
                Err(IndexError::IndexConflict {
                    label: index.label,
                    reason: format!("declared as {} and as {}", existing, index),
                })
            }
            Some(_) => Ok(()),
            None => {
                self.indices.insert(index.label, index);
                Ok(())
            }
        }
    }

    pub fn get(&self, label: char) -> Option<&AbstractIndex> {
        self.indices.get(&label)
    }

    pub fn contains(&self, label: char) -> bool {
        self.indices.contains_key(&label)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbstractIndex> {
        self.indices.values()
    }

    pub fn labels(&self) -> String {
        self.indices.keys().collect()
    }

    /// Indices in `self` that are absent from `other`
    ///
    /// Shared labels must carry the same class and range in both operands.
    pub fn subtract(&self, other: &IndexDatabase) -> Result<IndexDatabase, IndexError> {
        let mut result = IndexDatabase::new();
        for index in self.indices.values() {
            match other.get(index.label) {
                Some(shared) if !shared.compatible_with(index) => {
                    return Err(IndexError::IndexConflict {
                        label: index.label,
                        reason: format!("{} is incompatible with {}", index, shared),
                    });
                }
                Some(_) => {}
                None => {
                    result.indices.insert(index.label, *index);
                }
            }
        }
        Ok(result)
    }

    /// Union of two databases; shared labels must agree
    pub fn merge(&self, other: &IndexDatabase) -> Result<IndexDatabase, IndexError> {
        let mut result = self.clone();
        for index in other.iter() {
            result.insert(*index)?;
        }
        Ok(result)
    }

    /// True when some index has nothing to range over
    pub fn has_empty_range(&self) -> bool {
        self.indices.values().any(|index| index.range == 0)
    }

    /// Size of the Cartesian product, `None` on overflow
    pub fn assignment_count(&self) -> Option<usize> {
        self.indices
            .values()
            .try_fold(1usize, |count, index| count.checked_mul(index.range))
    }

    /// Every assignment of the indices, produced on demand
    pub fn enumerate(&self, ranges: &IndexRanges) -> Assignments {
        Assignments::new(self.indices.values().copied().collect(), ranges.fields)
    }
}
