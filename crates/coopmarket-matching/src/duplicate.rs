//! Duplicate-listing guard.
//!
//! A member re-listing the same substance at nearly the same price is
//! almost always trying to add stock, not open a second market. The guard
//! spots that case so the caller can offer a quantity merge instead of a
//! new row.
//!
//! The tolerance band is computed against the **existing** price:
//! `|candidate - existing| < existing × tolerance` is a duplicate.

use chrono::{DateTime, Utc};
use coopmarket_types::{MarketConfig, MemberId, Offer, OfferKind, OfferStatus, SubstanceId};
use rust_decimal::Decimal;

/// The listing a member is about to create.
#[derive(Debug, Clone, Copy)]
pub struct ListingCandidate<'a> {
    pub owner: MemberId,
    pub substance_id: &'a SubstanceId,
    pub kind: OfferKind,
    pub price: Decimal,
}

impl ListingCandidate<'_> {
    fn same_listing_key(&self, offer: &Offer) -> bool {
        offer.owner_id == self.owner
            && offer.substance_id == *self.substance_id
            && offer.kind() == self.kind
    }
}

/// Detects near-duplicate listings.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateGuard {
    tolerance: Decimal,
}

impl DuplicateGuard {
    #[must_use]
    pub fn new(tolerance: Decimal) -> Self {
        Self { tolerance }
    }

    #[must_use]
    pub fn from_config(config: &MarketConfig) -> Self {
        Self::new(config.duplicate_price_tolerance)
    }

    /// Is `price` inside the band around `existing`?
    #[must_use]
    pub fn within_band(&self, existing: Decimal, price: Decimal) -> bool {
        let band = existing.abs() * self.tolerance;
        (price - existing).abs() < band
    }

    /// The first **active** listing with the same owner, substance and
    /// kind whose price sits inside the tolerance band, if any.
    pub fn find_duplicate<'o>(
        &self,
        existing: &'o [Offer],
        candidate: &ListingCandidate<'_>,
        now: DateTime<Utc>,
    ) -> Option<&'o Offer> {
        let found = existing.iter().find(|offer| {
            candidate.same_listing_key(offer)
                && offer.status_at(now) == OfferStatus::Active
                && self.within_band(offer.unit_price(), candidate.price)
        });
        if let Some(offer) = found {
            tracing::debug!(
                owner = %candidate.owner,
                substance = %candidate.substance_id,
                existing = %offer.id,
                existing_price = %offer.unit_price(),
                price = %candidate.price,
                "Duplicate listing candidate"
            );
        }
        found
    }

    /// The first live (non-expired) listing with the same owner, substance
    /// and kind whose price sits inside the band. Drafts and paused
    /// listings count: they would come back next to the new row.
    pub fn price_neighbour<'o>(
        &self,
        existing: &'o [Offer],
        candidate: &ListingCandidate<'_>,
        now: DateTime<Utc>,
    ) -> Option<&'o Offer> {
        existing.iter().find(|offer| {
            candidate.same_listing_key(offer)
                && offer.status_at(now) != OfferStatus::Expired
                && self.within_band(offer.unit_price(), candidate.price)
        })
    }

    /// `true` when `candidate.price` differs by at least the tolerance from
    /// **every** live listing with the same owner, substance and kind.
    #[must_use]
    pub fn has_minimum_price_jump(
        &self,
        existing: &[Offer],
        candidate: &ListingCandidate<'_>,
        now: DateTime<Utc>,
    ) -> bool {
        self.price_neighbour(existing, candidate, now).is_none()
    }
}
