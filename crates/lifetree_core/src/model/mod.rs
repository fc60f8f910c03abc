//! Category tree domain model.
//!
//! # Responsibility
//! - Define the detached `Category` node and the arena-backed `CategoryTree`.
//! - Keep every structural invariant inside this module boundary.
//!
//! # Invariants
//! - Node level always equals parent level + 1.
//! - Child order is meaningful and preserved by every operation.
//! - Node ids are unique within one tree.

pub mod category;
pub mod codec;
pub mod tree;
