//! The operational-transform core: the operation model, the pairwise
//! transform that reconciles concurrent edits, and the apply function that
//! splices an operation into a text buffer.

pub mod apply;
pub mod op;
pub mod transform;
