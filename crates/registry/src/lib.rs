//! `tabx-registry` — who exists and who shares tabs with whom.
//!
//! The ledger and splitter deal in opaque participant identifiers; this crate
//! owns the mapping from identifiers to human-readable names and the group
//! rosters that scope every expense and settlement.

pub mod directory;
pub mod group;

pub use directory::{InMemoryDirectory, ParticipantDirectory, Registration};
pub use group::{Group, GroupRoster, InMemoryRoster};
