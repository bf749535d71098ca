//! # coopmarket-types
//!
//! Shared types, errors, and configuration for the **CoopMarket**
//! negotiation core.
//!
//! Nothing here holds service state; the service crates
//! build on these definitions:
//!
//! - **Identifiers**: [`OfferId`], [`ProposalId`], [`MemberId`], [`SubstanceId`], [`CertificateId`], [`TransactionId`]
//! - **Listing model**: [`Offer`], [`OfferTerms`], [`SellTerms`], [`BuyTerms`], [`Auction`], [`OfferStatus`]
//! - **Negotiation model**: [`Proposal`], [`Agreement`], [`BarterLeg`], [`Decision`], [`CompletionSide`]
//! - **Trade record**: [`Transaction`]
//! - **Catalog & eligibility facts**: [`Substance`], [`SubstanceFlags`], [`CertificateFact`], [`AuthorizationFact`]
//! - **Callers**: [`Actor`], [`Role`]
//! - **Notifications**: [`MarketEvent`], [`NotificationSink`]
//! - **Configuration**: [`MarketConfig`], [`Clock`]
//! - **Errors**: [`MarketError`] with `CM_ERR_` prefix codes
//! - **Text**: [`text::normalize`] and friends
//! - **Constants**: system-wide limits and defaults

pub mod actor;
pub mod certificate;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod offer;
pub mod proposal;
pub mod substance;
pub mod text;
pub mod transaction;

// Re-export all primary types at crate root for ergonomic imports:
//   use coopmarket_types::{Offer, Proposal, Transaction, ...};

pub use actor::*;
pub use certificate::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use offer::*;
pub use proposal::*;
pub use substance::*;
pub use transaction::*;

// Constants and text helpers are accessed via their module paths
// (`coopmarket_types::constants::FOO`, `coopmarket_types::text::normalize`).
