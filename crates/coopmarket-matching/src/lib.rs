//! # coopmarket-matching
//!
//! **Catalog hygiene**: keeps free-text input usable.
//!
//! - **SubstanceMatcher**: normalizes a query and fuzzy-matches it against
//!   the substance catalog (substring → tokens → edit distance / prefix →
//!   repeat-collapse), capped and in catalog order
//! - **DuplicateGuard**: spots a new listing that repeats an existing one
//!   at nearly the same price, so the caller can offer a quantity merge
//!
//! The fuzzy primitives in [`fuzzy`] are pure functions: same input, same
//! output, no I/O.

pub mod catalog;
pub mod duplicate;
pub mod fuzzy;
pub mod matcher;

pub use catalog::{InMemoryCatalog, SubstanceCatalog};
pub use duplicate::{DuplicateGuard, ListingCandidate};
pub use matcher::{SearchContext, SubstanceMatcher};
