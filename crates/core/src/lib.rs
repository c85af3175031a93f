//! `tabx-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! exact smallest-unit money, opaque identifiers, and the domain error model
//! shared by every other crate in the workspace.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{ExpenseId, GroupId, Participant};
pub use money::Amount;
