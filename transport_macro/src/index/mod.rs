//! Index and assignment model
//!
//! Abstract indices are discovered per line by the tokenizer and collected
//! into an [`IndexDatabase`]; enumerating a database produces the
//! lazy [`Assignments`] the macro agent unrolls over.

pub mod abstract_index;
pub mod assignment;
pub mod error;

pub use abstract_index::{
    AbstractIndex, IndexClass, IndexConvention, IndexDatabase, IndexRanges, IndexRemap,
};
pub use assignment::{AssignmentList, AssignmentRecord, Assignments};
pub use error::IndexError;
