//! Proposal model: a counter-party's bid against a listing.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐ counter ┌──────────────────┐
//!   │ PENDING ├────────▶│ COUNTER_PROPOSED │
//!   └──┬───┬──┘         └────┬─────────┬───┘
//!      │   │ reject          │ accept  │ reject
//!      │   └─────────────────┼─────────┼──────▶ REJECTED
//!      │ accept              ▼         │
//!      └───────────────▶ ACCEPTED ◀────┘
//!                          │ both sides mark complete
//!                          ▼
//!                    (Transaction, immutable)
//! ```
//!
//! `ACCEPTED` and `REJECTED` are terminal. Dual completion is a sub-state
//! of `ACCEPTED` tracked by the two completion flags.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    CertificateId, MemberId, OfferId, OfferKind, ProposalId, SubstanceId, TransactionId, Unit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    CounterProposed,
}

impl ProposalStatus {
    /// Whether the owner may still answer.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::CounterProposed)
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::CounterProposed => write!(f, "COUNTER_PROPOSED"),
        }
    }
}

/// Substance a proposer hands over as (part of) payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarterLeg {
    pub substance_id: SubstanceId,
    pub quantity: Decimal,
    /// Certificate backing the bartered lot; must belong to the proposer.
    pub certificate_id: CertificateId,
}

/// Settlement split between cash and barter (sell listings only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub cash_amount: Decimal,
    #[serde(default)]
    pub barter: Option<BarterLeg>,
}

/// The owner's answer to a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject { reason: Option<String> },
    /// Message-only: the quantity is suggested, never applied.
    Counter { quantity: Decimal, message: Option<String> },
}

/// Which party is confirming completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSide {
    Proposer,
    Owner,
}

impl std::fmt::Display for CompletionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proposer => write!(f, "PROPOSER"),
            Self::Owner => write!(f, "OWNER"),
        }
    }
}

/// Listing facts captured when the proposal was submitted, so the
/// resulting transaction never depends on a listing that may since have
/// been edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSnapshot {
    pub owner_id: MemberId,
    pub kind: OfferKind,
    pub substance_id: SubstanceId,
    pub substance_name: String,
    pub unit_price: Decimal,
}

/// A proposal against a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub offer_id: OfferId,
    pub proposer_id: MemberId,
    pub offer: OfferSnapshot,
    pub quantity: Decimal,
    pub unit: Unit,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    /// Cash/barter split, sell listings only.
    pub agreement: Option<Agreement>,
    /// Expiry of the product being offered, buy listings only.
    pub product_expiry_date: Option<DateTime<Utc>>,
    /// Proposer's note.
    pub message: Option<String>,
    /// Owner's note attached to a counter.
    pub response_message: Option<String>,
    pub rejection_reason: Option<String>,
    pub counter_proposal_quantity: Option<Decimal>,
    pub completed_by_proposer: bool,
    pub completed_by_owner: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set in the same update that sees both completion flags true.
    pub transaction_id: Option<TransactionId>,
    pub version: u64,
}

impl Proposal {
    #[must_use]
    pub fn owner_id(&self) -> MemberId {
        self.offer.owner_id
    }

    /// Which side `member` is on, if any.
    #[must_use]
    pub fn side_of(&self, member: MemberId) -> Option<CompletionSide> {
        if member == self.proposer_id {
            Some(CompletionSide::Proposer)
        } else if member == self.offer.owner_id {
            Some(CompletionSide::Owner)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_completed_by(&self, side: CompletionSide) -> bool {
        match side {
            CompletionSide::Proposer => self.completed_by_proposer,
            CompletionSide::Owner => self.completed_by_owner,
        }
    }

    #[must_use]
    pub fn is_fully_completed(&self) -> bool {
        self.completed_by_proposer && self.completed_by_owner
    }

    /// A proposal becomes immutable once its transaction exists.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.transaction_id.is_some()
    }

    /// Cash the proposer pays: the agreed cash amount, or full value.
    #[must_use]
    pub fn cash_total(&self) -> Decimal {
        match &self.agreement {
            Some(a) => a.cash_amount,
            None => self
                .quantity
                .checked_mul(self.offer.unit_price)
                .unwrap_or(Decimal::MAX),
        }
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Proposal {
    /// A pending cash proposal for `qty` units of a sell listing.
    pub fn dummy(
        offer_id: OfferId,
        owner_id: MemberId,
        proposer_id: MemberId,
        qty: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id: ProposalId::new(),
            offer_id,
            proposer_id,
            offer: OfferSnapshot {
                owner_id,
                kind: OfferKind::Sell,
                substance_id: SubstanceId::new("dummy"),
                substance_name: "Dummy".into(),
                unit_price,
            },
            quantity: qty,
            unit: Unit::Gram,
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
            agreement: None,
            product_expiry_date: None,
            message: None,
            response_message: None,
            rejection_reason: None,
            counter_proposal_quantity: None,
            completed_by_proposer: false,
            completed_by_owner: false,
            completed_at: None,
            transaction_id: None,
            version: 0,
        }
    }
}
