//! Listing (offer) model.
//!
//! An [`Offer`] shares a common base (owner, substance, quantity, age)
//! and carries kind-specific terms as a tagged variant: [`SellTerms`] or
//! [`BuyTerms`]. Call sites match on [`OfferTerms`] instead of probing
//! optional fields.
//!
//! ## Status
//!
//! ```text
//!   ┌───────┐ eligible  ┌────────┐  pause   ┌────────┐
//!   │ DRAFT ├──────────▶│ ACTIVE │◀────────▶│ PAUSED │
//!   └───────┘           └───┬────┘ reactivate└───┬───┘
//!                           │ now > listing_expires_at
//!                           ▼                   │
//!                       ┌─────────┐◀────────────┘
//!                       │ EXPIRED ├── extend ──▶ ACTIVE
//!                       └─────────┘
//! ```
//!
//! Only the owner-controlled part ([`ListingState`]) is stored. `Expired`
//! is never persisted: it is recomputed from `listing_expires_at` on every
//! read via [`Offer::status_at`].

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CertificateId, MemberId, OfferId, SubstanceId};

/// Which side of the market the listing is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    Sell,
    Buy,
}

impl std::fmt::Display for OfferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sell => write!(f, "SELL"),
            Self::Buy => write!(f, "BUY"),
        }
    }
}

/// Unit a quantity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Milligram,
    Gram,
    Kilogram,
    Milliliter,
    Liter,
    Piece,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Milligram => "mg",
            Self::Gram => "g",
            Self::Kilogram => "kg",
            Self::Milliliter => "mL",
            Self::Liter => "L",
            Self::Piece => "un",
        };
        f.write_str(s)
    }
}

/// The stored, owner-controlled part of a listing's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    /// Waiting for the owner to become eligible to sell.
    Draft,
    Active,
    /// Hidden from discovery by the owner; age keeps running.
    Paused,
}

/// The status a reader observes, reconciled against the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Draft,
    Active,
    Paused,
    Expired,
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// English-auction terms attached to a sell listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub starting_price: Decimal,
    pub current_bid: Option<Decimal>,
    pub highest_bidder: Option<MemberId>,
    pub auction_end: DateTime<Utc>,
}

impl Auction {
    #[must_use]
    pub fn new(starting_price: Decimal, auction_end: DateTime<Utc>) -> Self {
        Self {
            starting_price,
            current_bid: None,
            highest_bidder: None,
            auction_end,
        }
    }

    /// Is `amount` a winning bid right now?
    #[must_use]
    pub fn accepts_bid(&self, amount: Decimal) -> bool {
        match self.current_bid {
            Some(current) => amount > current,
            None => amount >= self.starting_price,
        }
    }

    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now < self.auction_end
    }
}

/// Sell-side terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellTerms {
    pub price_per_unit: Decimal,
    /// Expiry of the physical product lot, not of the listing.
    pub product_expiry_date: DateTime<Utc>,
    /// Certificate of the surplus lot this listing comes from, if any.
    #[serde(default)]
    pub certificate_id: Option<CertificateId>,
    #[serde(default)]
    pub auction: Option<Auction>,
}

/// Buy-side terms (a buy intent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyTerms {
    pub max_price_per_unit: Decimal,
    /// Proposals must deliver product with at least this many months left.
    pub min_validity_months: u32,
}

/// Kind-specific terms of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OfferTerms {
    Sell(SellTerms),
    Buy(BuyTerms),
}

impl OfferTerms {
    #[must_use]
    pub fn kind(&self) -> OfferKind {
        match self {
            Self::Sell(_) => OfferKind::Sell,
            Self::Buy(_) => OfferKind::Buy,
        }
    }

    /// Asking price for sells, price ceiling for buys.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        match self {
            Self::Sell(s) => s.price_per_unit,
            Self::Buy(b) => b.max_price_per_unit,
        }
    }
}

/// A marketplace listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub owner_id: MemberId,
    pub substance_id: SubstanceId,
    pub substance_name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub state: ListingState,
    pub created_at: DateTime<Utc>,
    pub listing_expires_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped on every stored update.
    pub version: u64,
    #[serde(flatten)]
    pub terms: OfferTerms,
}

impl Offer {
    #[must_use]
    pub fn kind(&self) -> OfferKind {
        self.terms.kind()
    }

    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.terms.unit_price()
    }

    #[must_use]
    pub fn sell_terms(&self) -> Option<&SellTerms> {
        match &self.terms {
            OfferTerms::Sell(s) => Some(s),
            OfferTerms::Buy(_) => None,
        }
    }

    pub fn sell_terms_mut(&mut self) -> Option<&mut SellTerms> {
        match &mut self.terms {
            OfferTerms::Sell(s) => Some(s),
            OfferTerms::Buy(_) => None,
        }
    }

    #[must_use]
    pub fn buy_terms(&self) -> Option<&BuyTerms> {
        match &self.terms {
            OfferTerms::Buy(b) => Some(b),
            OfferTerms::Sell(_) => None,
        }
    }

    /// Status as observed at `now`.
    ///
    /// Drafts never expire: they have not been published yet. Active and
    /// paused listings read as expired once `now > listing_expires_at`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> OfferStatus {
        match self.state {
            ListingState::Draft => OfferStatus::Draft,
            _ if now > self.listing_expires_at => OfferStatus::Expired,
            ListingState::Active => OfferStatus::Active,
            ListingState::Paused => OfferStatus::Paused,
        }
    }

    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == OfferStatus::Active
    }

    /// Restart the listing's age: `created_at = now`, deadline recomputed.
    pub fn reset_age(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.created_at = now;
        self.listing_expires_at = now + ttl;
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Offer {
    /// An active sell listing created at `now` with a 7-day deadline.
    pub fn dummy_sell(
        owner_id: MemberId,
        substance_id: &SubstanceId,
        price: Decimal,
        qty: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OfferId::new(),
            owner_id,
            substance_id: substance_id.clone(),
            substance_name: substance_id.0.clone(),
            quantity: qty,
            unit: Unit::Gram,
            state: ListingState::Active,
            created_at: now,
            listing_expires_at: now + Duration::days(crate::constants::DEFAULT_LISTING_TTL_DAYS),
            version: 0,
            terms: OfferTerms::Sell(SellTerms {
                price_per_unit: price,
                product_expiry_date: now + Duration::days(365),
                certificate_id: None,
                auction: None,
            }),
        }
    }

    /// An active buy intent created at `now`.
    pub fn dummy_buy(
        owner_id: MemberId,
        substance_id: &SubstanceId,
        max_price: Decimal,
        qty: Decimal,
        min_validity_months: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            terms: OfferTerms::Buy(BuyTerms {
                max_price_per_unit: max_price,
                min_validity_months,
            }),
            ..Self::dummy_sell(owner_id, substance_id, max_price, qty, now)
        }
    }
}
