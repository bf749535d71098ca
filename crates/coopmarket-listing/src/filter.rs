//! Listing discovery filters and the member directory they resolve names
//! through.

use std::collections::HashMap;

use coopmarket_types::{
    MemberId, Offer, OfferKind, OfferStatus, Result, SubstanceId, text,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;

/// Resolves member ids to display names for name filters.
pub trait MemberDirectory: Send + Sync {
    fn display_name(&self, member: MemberId) -> Result<Option<String>>;
}

/// Directory kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    names: RwLock<HashMap<MemberId, String>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, member: MemberId, name: impl Into<String>) {
        self.names.write().insert(member, name.into());
    }
}

impl MemberDirectory for InMemoryDirectory {
    fn display_name(&self, member: MemberId) -> Result<Option<String>> {
        Ok(self.names.read().get(&member).cloned())
    }
}

/// Criteria for listing discovery. All set criteria must hold.
///
/// The owner of a sell listing is its seller and the owner of a buy
/// listing its buyer, so `owner_name` combined with `kind` covers both
/// "seller name" and "buyer name" searches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    pub kind: Option<OfferKind>,
    pub substance_id: Option<SubstanceId>,
    pub owner: Option<MemberId>,
    /// Normalized substring of the owner's display name.
    pub owner_name: Option<String>,
    pub min_quantity: Option<Decimal>,
    pub max_quantity: Option<Decimal>,
    /// Bounds on the unit price (asking price or price ceiling).
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Also return drafts, paused and expired listings.
    pub include_inactive: bool,
}

impl ListingFilter {
    #[must_use]
    pub fn sells() -> Self {
        Self {
            kind: Some(OfferKind::Sell),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn buys() -> Self {
        Self {
            kind: Some(OfferKind::Buy),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_owner(owner: MemberId) -> Self {
        Self {
            owner: Some(owner),
            include_inactive: true,
            ..Self::default()
        }
    }

    /// Does `offer`, observed with `status`, pass every criterion except the
    /// owner-name one?
    pub(crate) fn admits(&self, offer: &Offer, status: OfferStatus) -> bool {
        fn within(v: Decimal, lo: Option<Decimal>, hi: Option<Decimal>) -> bool {
            lo.is_none_or(|lo| v >= lo) && hi.is_none_or(|hi| v <= hi)
        }

        (self.include_inactive || status == OfferStatus::Active)
            && self.kind.is_none_or(|k| offer.kind() == k)
            && self
                .substance_id
                .as_ref()
                .is_none_or(|s| offer.substance_id == *s)
            && self.owner.is_none_or(|o| offer.owner_id == o)
            && within(offer.quantity, self.min_quantity, self.max_quantity)
            && within(offer.unit_price(), self.min_price, self.max_price)
    }

    /// Owner-name criterion, resolved through `directory`. A member with no
    /// directory entry never matches a name filter.
    pub(crate) fn admits_owner(&self, owner: MemberId, directory: &dyn MemberDirectory) -> Result<bool> {
        let Some(wanted) = self.owner_name.as_deref().map(text::normalize) else {
            return Ok(true);
        };
        if wanted.is_empty() {
            return Ok(true);
        }
        Ok(directory
            .display_name(owner)?
            .is_some_and(|name| text::normalize(&name).contains(&wanted)))
    }
}
