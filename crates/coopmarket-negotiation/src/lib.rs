//! # coopmarket-negotiation
//!
//! **ProposalNegotiation**: counter-parties bid against listings and both
//! sides confirm completed trades.
//!
//! - **Submit**: quantity bounds, buy-side product validity, cash + barter
//!   agreements, controlled-substance authorizations for both parties
//! - **Respond**: owner accepts, rejects or counters (message-only)
//! - **Dual completion**: one compare-and-swap per confirmation; the update
//!   that sees both flags seals the proposal and derives the
//!   [`Transaction`](coopmarket_types::Transaction)
//! - **Ledger**: append-only, idempotent by deterministic transaction id

pub mod ledger;
pub mod negotiation;
pub mod repository;
pub mod validation;

pub use ledger::{Append, InMemoryLedger, TransactionLedger};
pub use negotiation::{Completion, NewProposal, ProposalNegotiation};
pub use repository::{InMemoryProposalRepository, ProposalRepository};
