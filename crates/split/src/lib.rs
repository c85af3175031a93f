//! `tabx-split` — exact splitting of a total into per-participant shares.
//!
//! Pure computation: no I/O, no clocks, deterministic given input ordering.

pub mod splitter;

pub use splitter::{split_custom, split_equal};
