//! Concrete index assignments

use super::abstract_index::{AbstractIndex, IndexClass};
use super::error::IndexError;
use std::collections::BTreeMap;
use std::ops::Add;

/// One concrete binding of an abstract index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub label: char,
    pub class: IndexClass,
    /// 0-based component value
    pub value: usize,
    /// Number of fields, needed to split full-class values
    pub fields: usize,
}

impl AssignmentRecord {
    pub fn new(label: char, class: IndexClass, value: usize, fields: usize) -> Self {
        Self {
            label,
            class,
            value,
            fields,
        }
    }

    pub fn is_field(&self) -> bool {
        !self.is_momentum()
    }

    /// Full-class values past the field count refer to momenta
    pub fn is_momentum(&self) -> bool {
        self.class == IndexClass::Full && self.value >= self.fields
    }

    /// Field or parameter number, with momenta folded back onto their field
    pub fn species(&self) -> usize {
        if self.is_momentum() {
            self.value - self.fields
        } else {
            self.value
        }
    }
}

/// One full substitution for a set of labels, ordered by label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentList {
    records: BTreeMap<char, AssignmentRecord>,
}

impl AssignmentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&mut self, record: AssignmentRecord) {
        self.records.insert(record.label, record);
    }

    pub fn get(&self, label: char) -> Option<&AssignmentRecord> {
        self.records.get(&label)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssignmentRecord> {
        self.records.values()
    }

    /// Merge two lists over disjoint labels
    pub fn combine(&self, other: &AssignmentList) -> Result<AssignmentList, IndexError> {
        let mut combined = self.clone();
        for record in other.iter() {
            if let Some(existing) = combined.records.get(&record.label) {
                return Err(IndexError::IndexConflict {
                    label: record.label,
                    reason: format!(
                        "bound to {} and to {} in combined assignments",
                        existing.value, record.value
                    ),
                });
            }
            combined.records.insert(record.label, *record);
        }
        Ok(combined)
    }

    /// Records for `labels`, in the order given
    pub fn select(&self, labels: &[char]) -> Result<Vec<AssignmentRecord>, IndexError> {
        labels
            .iter()
            .map(|label| {
                self.records
                    .get(label)
                    .copied()
                    .ok_or(IndexError::UnboundIndex { label: *label })
            })
            .collect()
    }
}

impl Add for &AssignmentList {
    type Output = Result<AssignmentList, IndexError>;

    fn add(self, other: &AssignmentList) -> Self::Output {
        self.combine(other)
    }
}

/// Lazy odometer over every assignment of a set of indices
///
/// The highest label varies fastest. No indices yield the single empty
/// list; any zero range yields nothing.
#[derive(Debug, Clone)]
pub struct Assignments {
    indices: Vec<AbstractIndex>,
    counters: Vec<usize>,
    fields: usize,
    exhausted: bool,
}

impl Assignments {
    pub(crate) fn new(indices: Vec<AbstractIndex>, fields: usize) -> Self {
        let exhausted = indices.iter().any(|index| index.range == 0);
        Self {
            counters: vec![0; indices.len()],
            indices,
            fields,
            exhausted,
        }
    }

    fn advance(&mut self) {
        let mut position = self.indices.len();
        loop {
            if position == 0 {
                self.exhausted = true;
                return;
            }
            position -= 1;
            self.counters[position] += 1;
            if self.counters[position] < self.indices[position].range {
                return;
            }
            self.counters[position] = 0;
        }
    }
}

impl Iterator for Assignments {
    type Item = AssignmentList;

    fn next(&mut self) -> Option<AssignmentList> {
        if self.exhausted {
            return None;
        }

        let mut list = AssignmentList::new();
        for (index, &value) in self.indices.iter().zip(self.counters.iter()) {
            list.bind(AssignmentRecord::new(
                index.label,
                index.class,
                value,
                self.fields,
            ));
        }
        self.advance();
        Some(list)
    }
}
