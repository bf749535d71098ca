//! ProposalNegotiation — submit, respond and dual-confirm proposals.
//!
//! ## Completion protocol
//!
//! `mark_complete` is one compare-and-swap per attempt:
//!
//! ```text
//! read proposal (version v)
//!   set own flag
//!   if both flags: completed_at = now, transaction_id = H(proposal id)
//! update if still at v  ──conflict──▶ re-read and retry (bounded)
//!   │
//!   └─ sealed? ─▶ derive Transaction, append to ledger (idempotent by id)
//! ```
//!
//! Only the update that flips the second flag can seal the proposal, and
//! the version check guarantees at most one such update wins. The
//! transaction id is a pure function of the proposal id, so even a caller
//! that re-appends after a crash or a lost race hits the ledger's
//! idempotency check instead of creating a second record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use coopmarket_eligibility::EligibilityEvaluator;
use coopmarket_listing::OfferRepository;
use coopmarket_matching::SubstanceCatalog;
use coopmarket_types::{
    Actor, Agreement, Clock, CompletionSide, Decision, MarketConfig, MarketError, MarketEvent,
    MemberId, NotificationSink, OfferId, OfferSnapshot, OfferStatus, OfferTerms, Proposal,
    ProposalId, ProposalStatus, Result, TracingNotificationSink, Transaction, TransactionId,
    notify_or_log,
};
use rust_decimal::Decimal;

use crate::ledger::{Append, TransactionLedger};
use crate::repository::ProposalRepository;
use crate::validation;

/// Input for [`ProposalNegotiation::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProposal {
    pub offer_id: OfferId,
    pub quantity: Decimal,
    /// Cash/barter split. Sell listings only.
    pub agreement: Option<Agreement>,
    /// Expiry of the product offered. Required on buy listings only.
    pub product_expiry_date: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

impl NewProposal {
    /// A plain cash proposal.
    #[must_use]
    pub fn cash(offer_id: OfferId, quantity: Decimal) -> Self {
        Self {
            offer_id,
            quantity,
            agreement: None,
            product_expiry_date: None,
            message: None,
        }
    }
}

/// Outcome of [`ProposalNegotiation::mark_complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub proposal: Proposal,
    pub side: CompletionSide,
    /// Present iff both sides have confirmed.
    pub transaction: Option<Transaction>,
}

/// The negotiation service.
pub struct ProposalNegotiation {
    proposals: Arc<dyn ProposalRepository>,
    offers: Arc<dyn OfferRepository>,
    catalog: Arc<dyn SubstanceCatalog>,
    eligibility: Arc<EligibilityEvaluator>,
    ledger: Arc<dyn TransactionLedger>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    month_days: i64,
    retry_limit: usize,
}

impl ProposalNegotiation {
    #[must_use]
    pub fn new(
        proposals: Arc<dyn ProposalRepository>,
        offers: Arc<dyn OfferRepository>,
        catalog: Arc<dyn SubstanceCatalog>,
        eligibility: Arc<EligibilityEvaluator>,
        ledger: Arc<dyn TransactionLedger>,
        clock: Arc<dyn Clock>,
        config: &MarketConfig,
    ) -> Self {
        Self {
            proposals,
            offers,
            catalog,
            eligibility,
            ledger,
            notifier: Arc::new(TracingNotificationSink),
            clock,
            month_days: config.validity_month_days,
            retry_limit: config.completion_retry_limit,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    fn load(&self, id: ProposalId) -> Result<Proposal> {
        self.proposals.get(id)?.ok_or(MarketError::ProposalNotFound(id))
    }

    // -----------------------------------------------------------------
    // Submit
    // -----------------------------------------------------------------

    /// Submit a proposal against an active listing. The owner is notified.
    ///
    /// Checks run in order and nothing is written unless all pass:
    /// listing state, quantity, kind-specific terms, barter certificate,
    /// then controlled-substance authorizations.
    ///
    /// # Errors
    /// `OfferNotFound`, `InvalidTransition` (listing not active),
    /// `Forbidden` (own listing), `InvalidQuantity`, `Validation`,
    /// `Ineligible`.
    pub fn submit(&self, actor: Actor, new: NewProposal) -> Result<Proposal> {
        let now = self.clock.now();
        let proposer = actor.member;

        // 1. Listing
        let offer = self
            .offers
            .get(new.offer_id)?
            .ok_or(MarketError::OfferNotFound(new.offer_id))?;
        let status = offer.status_at(now);
        if status != OfferStatus::Active {
            return Err(MarketError::InvalidTransition {
                action: "propose",
                state: status.to_string(),
            });
        }
        let owner = offer.owner_id;
        if owner == proposer {
            return Err(MarketError::forbidden("cannot propose on your own listing"));
        }

        // 2. Quantity
        validation::check_quantity(new.quantity, offer.quantity)?;

        // 3. Kind-specific terms
        let mut barter = None;
        let product_expiry_date = match &offer.terms {
            OfferTerms::Buy(buy) => {
                if new.agreement.is_some() {
                    return Err(MarketError::validation(
                        "agreement",
                        "cash/barter agreements apply to sell listings only",
                    ));
                }
                Some(validation::check_buy_expiry(
                    buy,
                    new.product_expiry_date,
                    now,
                    self.month_days,
                )?)
            }
            OfferTerms::Sell(sell) => {
                if let Some(agreement) = &new.agreement {
                    let leg =
                        validation::check_agreement(agreement, new.quantity, sell.price_per_unit)?;
                    // 4. The bartered lot must be the proposer's and qualify.
                    self.eligibility.require_certificate(
                        proposer,
                        &leg.certificate_id,
                        &leg.substance_id,
                    )?;
                    barter = Some(leg);
                }
                None
            }
        };

        // 5. Controlled substances: both parties for the listed item, and
        //    the owner as receiver of any bartered item.
        let substance = self.catalog.get(&offer.substance_id)?;
        self.eligibility
            .require_controlled_trade(proposer, owner, substance.flags)?;
        if let Some(leg) = barter {
            let bartered = self.catalog.get(&leg.substance_id)?;
            self.eligibility
                .require_controlled_receipt(owner, bartered.flags)?;
        }

        let proposal = self.proposals.create(Proposal {
            id: ProposalId::new(),
            offer_id: offer.id,
            proposer_id: proposer,
            offer: OfferSnapshot {
                owner_id: owner,
                kind: offer.kind(),
                substance_id: offer.substance_id.clone(),
                substance_name: offer.substance_name.clone(),
                unit_price: offer.unit_price(),
            },
            quantity: new.quantity,
            unit: offer.unit,
            status: ProposalStatus::Pending,
            created_at: now,
            responded_at: None,
            agreement: new.agreement,
            product_expiry_date,
            message: new.message,
            response_message: None,
            rejection_reason: None,
            counter_proposal_quantity: None,
            completed_by_proposer: false,
            completed_by_owner: false,
            completed_at: None,
            transaction_id: None,
            version: 0,
        })?;

        tracing::info!(
            proposal = %proposal.id,
            offer = %offer.id,
            %proposer,
            %owner,
            quantity = %proposal.quantity,
            barter = proposal.agreement.is_some(),
            "Proposal submitted"
        );
        notify_or_log(
            self.notifier.as_ref(),
            owner,
            MarketEvent::ProposalReceived {
                proposal: proposal.id,
                offer: offer.id,
                from: proposer,
                quantity: proposal.quantity,
            },
        );
        Ok(proposal)
    }

    // -----------------------------------------------------------------
    // Respond
    // -----------------------------------------------------------------

    /// Owner's answer. Allowed while the proposal is pending or countered.
    ///
    /// A counter is message-only: the suggested quantity is stored, the
    /// proposal's own quantity is left alone.
    ///
    /// # Errors
    /// `Forbidden` for anyone but the owner, `InvalidTransition` once
    /// accepted or rejected, `OfferNotFound` when accepting against a
    /// listing deleted meanwhile, `VersionConflict` when racing another
    /// answer.
    pub fn respond(&self, actor: Actor, id: ProposalId, decision: Decision) -> Result<Proposal> {
        let now = self.clock.now();
        let mut proposal = self.load(id)?;
        if proposal.owner_id() != actor.member {
            return Err(MarketError::forbidden(format!(
                "only the listing owner may answer {id}"
            )));
        }
        if !proposal.status.is_open() {
            return Err(MarketError::InvalidTransition {
                action: "respond",
                state: proposal.status.to_string(),
            });
        }

        let event = match decision {
            Decision::Accept => {
                if self.offers.get(proposal.offer_id)?.is_none() {
                    return Err(MarketError::OfferNotFound(proposal.offer_id));
                }
                proposal.status = ProposalStatus::Accepted;
                MarketEvent::ProposalAccepted { proposal: id }
            }
            Decision::Reject { reason } => {
                proposal.status = ProposalStatus::Rejected;
                proposal.rejection_reason.clone_from(&reason);
                MarketEvent::ProposalRejected { proposal: id, reason }
            }
            Decision::Counter { quantity, message } => {
                if quantity <= Decimal::ZERO {
                    return Err(MarketError::InvalidQuantity {
                        requested: quantity,
                        available: proposal.quantity,
                    });
                }
                proposal.status = ProposalStatus::CounterProposed;
                proposal.counter_proposal_quantity = Some(quantity);
                proposal.response_message = message;
                MarketEvent::ProposalCountered { proposal: id, quantity }
            }
        };
        proposal.responded_at = Some(now);

        let stored = self.proposals.update(proposal)?;
        tracing::info!(proposal = %id, status = %stored.status, "Proposal answered");
        notify_or_log(self.notifier.as_ref(), stored.proposer_id, event);
        Ok(stored)
    }

    // -----------------------------------------------------------------
    // Dual completion
    // -----------------------------------------------------------------

    /// Confirm completion for the caller's side of an accepted proposal.
    ///
    /// Idempotent per side. The call that makes both flags true seals the
    /// proposal and records its transaction; any later call returns that
    /// same transaction.
    ///
    /// # Errors
    /// `Forbidden` for a non-party, `InvalidTransition` unless accepted,
    /// `Contention` when the retry budget runs out.
    pub fn mark_complete(&self, actor: Actor, id: ProposalId) -> Result<Completion> {
        for attempt in 1..=self.retry_limit {
            let mut proposal = self.load(id)?;
            let side = proposal.side_of(actor.member).ok_or_else(|| {
                MarketError::forbidden(format!("member {} is not a party to {id}", actor.member))
            })?;
            if proposal.status != ProposalStatus::Accepted {
                return Err(MarketError::InvalidTransition {
                    action: "complete",
                    state: proposal.status.to_string(),
                });
            }

            if proposal.is_sealed() {
                let tx = self.record(&proposal)?;
                return Ok(Completion {
                    proposal,
                    side,
                    transaction: Some(tx),
                });
            }
            if proposal.is_completed_by(side) {
                return Ok(Completion {
                    proposal,
                    side,
                    transaction: None,
                });
            }

            match side {
                CompletionSide::Proposer => proposal.completed_by_proposer = true,
                CompletionSide::Owner => proposal.completed_by_owner = true,
            }
            if proposal.is_fully_completed() {
                proposal.completed_at = Some(self.clock.now());
                proposal.transaction_id = Some(TransactionId::for_proposal(id));
            }

            match self.proposals.update(proposal) {
                Ok(stored) => return self.after_completion(stored, side, actor.member),
                Err(MarketError::VersionConflict { found, .. }) => {
                    tracing::debug!(proposal = %id, attempt, found, "Completion raced, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        tracing::warn!(proposal = %id, attempts = self.retry_limit, "Completion retries exhausted");
        Err(MarketError::Contention {
            entity: id.to_string(),
            attempts: self.retry_limit,
        })
    }

    fn after_completion(
        &self,
        stored: Proposal,
        side: CompletionSide,
        by: MemberId,
    ) -> Result<Completion> {
        let counterpart = match side {
            CompletionSide::Proposer => stored.owner_id(),
            CompletionSide::Owner => stored.proposer_id,
        };
        if !stored.is_sealed() {
            tracing::info!(proposal = %stored.id, %side, "Completion confirmed");
            notify_or_log(
                self.notifier.as_ref(),
                counterpart,
                MarketEvent::CompletionConfirmed {
                    proposal: stored.id,
                    by,
                },
            );
            return Ok(Completion {
                proposal: stored,
                side,
                transaction: None,
            });
        }

        let tx = self.record(&stored)?;
        for member in [stored.proposer_id, stored.owner_id()] {
            notify_or_log(
                self.notifier.as_ref(),
                member,
                MarketEvent::TransactionCompleted {
                    proposal: stored.id,
                    transaction: tx.id,
                },
            );
        }
        Ok(Completion {
            proposal: stored,
            side,
            transaction: Some(tx),
        })
    }

    /// Derive and append the transaction of a sealed proposal.
    fn record(&self, proposal: &Proposal) -> Result<Transaction> {
        let tx = Transaction::from_proposal(proposal)?;
        if self.ledger.append(tx.clone())? == Append::AlreadyRecorded {
            tracing::debug!(tx = %tx.id, "Transaction already recorded");
        }
        Ok(tx)
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// A proposal, visible to its two parties and moderators.
    pub fn get(&self, actor: Actor, id: ProposalId) -> Result<Proposal> {
        let proposal = self.load(id)?;
        if proposal.side_of(actor.member).is_none() && !actor.is_moderator() {
            return Err(MarketError::forbidden(format!(
                "member {} is not a party to {id}",
                actor.member
            )));
        }
        Ok(proposal)
    }

    /// Proposals received on a listing. Owner or moderator only; works
    /// after the listing was deleted through the proposals' snapshots.
    pub fn proposals_for_offer(&self, actor: Actor, offer_id: OfferId) -> Result<Vec<Proposal>> {
        let proposals = self.proposals.list_for_offer(offer_id)?;
        let owner = match self.offers.get(offer_id)? {
            Some(offer) => offer.owner_id,
            None => proposals
                .first()
                .map(Proposal::owner_id)
                .ok_or(MarketError::OfferNotFound(offer_id))?,
        };
        if owner != actor.member && !actor.is_moderator() {
            return Err(MarketError::forbidden(format!(
                "member {} does not own {offer_id}",
                actor.member
            )));
        }
        Ok(proposals)
    }

    /// Proposals `member` has submitted.
    pub fn proposals_by(&self, member: MemberId) -> Result<Vec<Proposal>> {
        self.proposals.list_by_proposer(member)
    }

    /// Completed trades `member` took part in.
    pub fn transactions_for(&self, member: MemberId) -> Result<Vec<Transaction>> {
        self.ledger.for_member(member)
    }
}
