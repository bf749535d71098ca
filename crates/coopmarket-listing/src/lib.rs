//! # coopmarket-listing
//!
//! **OfferLifecycle**: owns listing state and its time-based transitions.
//!
//! - **Creation**: shape validation, duplicate guard, eligibility gate
//!   (sell listings wait as drafts until their owner may sell)
//! - **Owner transitions**: edit, pause, reactivate, extend, activate,
//!   quantity merge, delete (owner or moderator)
//! - **Discovery**: filtered listing, fuzzy substance and listing search;
//!   expiry is reconciled against the clock on every read
//! - **Auctions**: bids on sell listings that carry auction terms
//! - **Draft promotion**: push on certificate upload, plus a periodic
//!   tokio fallback sweep
//!
//! Storage is behind [`OfferRepository`]; updates are compare-and-swap on
//! the listing version.

pub mod filter;
pub mod lifecycle;
pub mod promotion;
pub mod repository;

pub use filter::{InMemoryDirectory, ListingFilter, MemberDirectory};
pub use lifecycle::{DuplicatePolicy, NewOffer, OfferEdit, OfferLifecycle, OfferView};
pub use promotion::{PromotionTask, spawn_promotion_fallback};
pub use repository::{InMemoryOfferRepository, OfferRepository};
