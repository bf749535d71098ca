//! Completed-trade records.
//!
//! A [`Transaction`] is the immutable record written once both parties
//! confirmed completion of an accepted proposal. It is derived purely from
//! the proposal (and its offer snapshot), so deriving it twice yields the
//! same record, same id, same digest.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    BarterLeg, MarketError, MemberId, OfferId, OfferKind, Proposal, ProposalId, Result,
    SubstanceId, TransactionId, Unit, constants,
};

/// Audit snapshot of a completed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub proposal_id: ProposalId,
    pub offer_id: OfferId,
    pub offer_kind: OfferKind,
    pub substance_id: SubstanceId,
    pub substance_name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub unit_price: Decimal,
    pub seller_id: MemberId,
    pub buyer_id: MemberId,
    pub cash_amount: Decimal,
    pub barter: Option<BarterLeg>,
    pub completed_at: DateTime<Utc>,
    /// Hex SHA-256 over the canonical fields above.
    pub audit_digest: String,
}

impl Transaction {
    /// Derive the transaction for a fully completed proposal.
    ///
    /// # Errors
    /// `InvalidTransition` if either completion flag is still false or the
    /// completion time was never recorded.
    pub fn from_proposal(proposal: &Proposal) -> Result<Self> {
        let completed_at = match (proposal.is_fully_completed(), proposal.completed_at) {
            (true, Some(at)) => at,
            _ => {
                return Err(MarketError::InvalidTransition {
                    action: "materialize transaction",
                    state: format!(
                        "proposer={} owner={}",
                        proposal.completed_by_proposer, proposal.completed_by_owner
                    ),
                });
            }
        };

        // The listing owner sells on a sell listing and buys on a buy intent.
        let (seller_id, buyer_id) = match proposal.offer.kind {
            OfferKind::Sell => (proposal.offer.owner_id, proposal.proposer_id),
            OfferKind::Buy => (proposal.proposer_id, proposal.offer.owner_id),
        };

        let mut tx = Self {
            id: TransactionId::for_proposal(proposal.id),
            proposal_id: proposal.id,
            offer_id: proposal.offer_id,
            offer_kind: proposal.offer.kind,
            substance_id: proposal.offer.substance_id.clone(),
            substance_name: proposal.offer.substance_name.clone(),
            quantity: proposal.quantity,
            unit: proposal.unit,
            unit_price: proposal.offer.unit_price,
            seller_id,
            buyer_id,
            cash_amount: proposal.cash_total(),
            barter: proposal.agreement.as_ref().and_then(|a| a.barter.clone()),
            completed_at,
            audit_digest: String::new(),
        };
        tx.audit_digest = hex::encode(tx.compute_digest());
        Ok(tx)
    }

    /// `SHA-256(domain || id || proposal || offer || substance || qty || price
    ///  || seller || buyer || cash || barter? || completed_at)`
    ///
    /// Variable-width fields are length-prefixed and the barter leg carries
    /// a presence byte, so no two field layouts share an encoding.
    fn compute_digest(&self) -> [u8; 32] {
        fn field(hasher: &mut Sha256, bytes: &[u8]) {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        fn decimal(hasher: &mut Sha256, value: Decimal) {
            field(hasher, value.normalize().to_string().as_bytes());
        }

        let mut hasher = Sha256::new();
        hasher.update(constants::TRANSACTION_DIGEST_DOMAIN);
        hasher.update(self.id.0.as_bytes());
        hasher.update(self.proposal_id.0.as_bytes());
        hasher.update(self.offer_id.0.as_bytes());
        field(&mut hasher, self.substance_id.as_str().as_bytes());
        decimal(&mut hasher, self.quantity);
        decimal(&mut hasher, self.unit_price);
        hasher.update(self.seller_id.0.as_bytes());
        hasher.update(self.buyer_id.0.as_bytes());
        decimal(&mut hasher, self.cash_amount);
        match &self.barter {
            Some(leg) => {
                hasher.update([1u8]);
                field(&mut hasher, leg.substance_id.as_str().as_bytes());
                decimal(&mut hasher, leg.quantity);
                field(&mut hasher, leg.certificate_id.0.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update(self.completed_at.timestamp_millis().to_le_bytes());
        hasher.finalize().into()
    }

    /// Recompute the digest and compare with the stored one.
    #[must_use]
    pub fn verify_digest(&self) -> bool {
        hex::encode(self.compute_digest()) == self.audit_digest
    }

    /// Is `member` a counter-party of this trade?
    #[must_use]
    pub fn involves(&self, member: MemberId) -> bool {
        self.seller_id == member || self.buyer_id == member
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Transaction[{}] {} {}{} @ {} cash={}",
            self.id, self.substance_name, self.quantity, self.unit, self.unit_price, self.cash_amount,
        )
    }
}
