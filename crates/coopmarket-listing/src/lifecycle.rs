//! OfferLifecycle — owns listing state and its time-based transitions.
//!
//! ```text
//! create ──▶ DRAFT ──(eligible)──▶ ACTIVE ◀──reactivate── PAUSED
//!              │                    │  └──────pause──────▶   │
//!              │                    ▼ now > deadline          ▼
//!              │                 EXPIRED ◀────────────────────┘
//!              │                    │ extend (created_at = now)
//!              │                    ▼
//!              └── delete ──▶ removed ◀── delete (owner or moderator)
//! ```
//!
//! Expiry is never written. Every read reconciles status against the clock
//! through [`Offer::status_at`] and hands out an [`OfferView`], so callers
//! cannot observe a stale `active`.
//!
//! Every mutation is read → check → compare-and-swap on the listing
//! version. A caller racing another writer on the same listing gets
//! `VersionConflict` and should re-read.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use coopmarket_eligibility::EligibilityEvaluator;
use coopmarket_matching::{
    DuplicateGuard, ListingCandidate, SearchContext, SubstanceCatalog, SubstanceMatcher,
};
use coopmarket_types::{
    Actor, Clock, ListingState, MarketConfig, MarketError, MarketEvent, MemberId,
    NotificationSink, Offer, OfferId, OfferKind, OfferStatus, OfferTerms, Result, SellTerms,
    Substance, SubstanceId, TracingNotificationSink, Unit, notify_or_log,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::filter::{InMemoryDirectory, ListingFilter, MemberDirectory};
use crate::repository::OfferRepository;

/// Input for [`OfferLifecycle::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffer {
    pub substance_id: SubstanceId,
    pub quantity: Decimal,
    pub unit: Unit,
    pub terms: OfferTerms,
}

/// What `create` does when the new listing repeats an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with `DuplicateListing` so the caller can offer a merge.
    #[default]
    Reject,
    /// The member saw the merge offer and wants a separate row anyway.
    Allow,
}

/// Owner edit of an existing listing. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferEdit {
    pub quantity: Option<Decimal>,
    pub unit: Option<Unit>,
    /// Asking price for sells, price ceiling for buys.
    pub unit_price: Option<Decimal>,
    /// Sell listings only.
    pub product_expiry_date: Option<DateTime<Utc>>,
    /// Buy listings only.
    pub min_validity_months: Option<u32>,
}

/// A listing as observed at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferView {
    #[serde(flatten)]
    pub offer: Offer,
    pub status: OfferStatus,
}

impl OfferView {
    fn at(offer: Offer, now: DateTime<Utc>) -> Self {
        let status = offer.status_at(now);
        Self { offer, status }
    }
}

fn require_positive(field: &'static str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(MarketError::validation(field, format!("must be positive, got {value}")));
    }
    Ok(())
}

fn invalid_transition(action: &'static str, status: OfferStatus) -> MarketError {
    MarketError::InvalidTransition {
        action,
        state: status.to_string(),
    }
}

/// Shape checks shared by creation: rejected before any read or write.
fn validate_new(new: &NewOffer, now: DateTime<Utc>) -> Result<()> {
    require_positive("quantity", new.quantity)?;
    match &new.terms {
        OfferTerms::Sell(sell) => {
            require_positive("price_per_unit", sell.price_per_unit)?;
            if sell.product_expiry_date <= now {
                return Err(MarketError::validation(
                    "product_expiry_date",
                    "product lot is already expired",
                ));
            }
            if let Some(auction) = &sell.auction {
                require_positive("starting_price", auction.starting_price)?;
                if !auction.is_open_at(now) {
                    return Err(MarketError::validation(
                        "auction_end",
                        "auction must end in the future",
                    ));
                }
            }
        }
        OfferTerms::Buy(buy) => require_positive("max_price_per_unit", buy.max_price_per_unit)?,
    }
    Ok(())
}

/// The listing service.
pub struct OfferLifecycle {
    offers: Arc<dyn OfferRepository>,
    catalog: Arc<dyn SubstanceCatalog>,
    eligibility: Arc<EligibilityEvaluator>,
    matcher: SubstanceMatcher,
    directory: Arc<dyn MemberDirectory>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    guard: DuplicateGuard,
    ttl: Duration,
}

impl OfferLifecycle {
    /// Wire the service. Owner-name filters resolve against an empty
    /// directory and notifications go to the log until replaced with
    /// [`with_directory`](Self::with_directory) and
    /// [`with_notifier`](Self::with_notifier).
    #[must_use]
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        catalog: Arc<dyn SubstanceCatalog>,
        eligibility: Arc<EligibilityEvaluator>,
        clock: Arc<dyn Clock>,
        config: &MarketConfig,
    ) -> Self {
        Self {
            matcher: SubstanceMatcher::new(catalog.clone(), eligibility.clone(), config),
            offers,
            catalog,
            eligibility,
            directory: Arc::new(InMemoryDirectory::new()),
            notifier: Arc::new(TracingNotificationSink),
            clock,
            guard: DuplicateGuard::from_config(config),
            ttl: config.listing_ttl(),
        }
    }

    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn MemberDirectory>) -> Self {
        self.directory = directory;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// One listing, status reconciled.
    ///
    /// # Errors
    /// `OfferNotFound` if the id is unknown or the listing was deleted.
    pub fn get(&self, id: OfferId) -> Result<OfferView> {
        let offer = self.offers.get(id)?.ok_or(MarketError::OfferNotFound(id))?;
        Ok(OfferView::at(offer, self.clock.now()))
    }

    /// Listings passing `filter`, oldest first.
    pub fn list(&self, filter: &ListingFilter) -> Result<Vec<OfferView>> {
        let now = self.clock.now();
        let mut found = Vec::new();
        for offer in self.offers.list()? {
            let status = offer.status_at(now);
            if filter.admits(&offer, status)
                && filter.admits_owner(offer.owner_id, self.directory.as_ref())?
            {
                found.push(OfferView { offer, status });
            }
        }
        Ok(found)
    }

    /// Fuzzy substance search in the universe `context` allows.
    pub fn search_substances(&self, query: &str, context: SearchContext) -> Result<Vec<Substance>> {
        self.matcher.search(query, context)
    }

    /// Listings whose substance fuzzy-matches `query`, further narrowed by
    /// `filter`.
    pub fn search_listings(&self, query: &str, filter: &ListingFilter) -> Result<Vec<OfferView>> {
        let substances: HashSet<SubstanceId> = self
            .matcher
            .search(query, SearchContext::Buy)?
            .into_iter()
            .map(|s| s.id)
            .collect();
        if substances.is_empty() {
            return Ok(Vec::new());
        }
        let mut found = self.list(filter)?;
        found.retain(|v| substances.contains(&v.offer.substance_id));
        Ok(found)
    }

    /// An active listing of `owner` that a new `kind` listing of
    /// `substance` at `price` would duplicate.
    pub fn find_duplicate(
        &self,
        owner: MemberId,
        substance: &SubstanceId,
        kind: OfferKind,
        price: Decimal,
    ) -> Result<Option<OfferView>> {
        let now = self.clock.now();
        let owned = self.offers.list_by_owner(owner)?;
        let candidate = ListingCandidate {
            owner,
            substance_id: substance,
            kind,
            price,
        };
        Ok(self
            .guard
            .find_duplicate(&owned, &candidate, now)
            .map(|o| OfferView::at(o.clone(), now)))
    }

    // -----------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------

    /// Create a listing owned by `actor`.
    ///
    /// Buy listings go live at once. A sell listing goes live when its
    /// owner may sell the substance and waits as a draft otherwise; a sell
    /// listing tied to a specific certificate lot must pass that
    /// certificate's check or is refused.
    ///
    /// # Errors
    /// `Validation` for bad shape, `SubstanceNotFound`, `DuplicateListing`
    /// under [`DuplicatePolicy::Reject`], `Ineligible` for a bad lot
    /// certificate.
    pub fn create(&self, actor: Actor, new: NewOffer, policy: DuplicatePolicy) -> Result<OfferView> {
        let now = self.clock.now();
        let owner = actor.member;

        // 1. Shape
        validate_new(&new, now)?;

        // 2. Catalog
        let substance = self.catalog.get(&new.substance_id)?;

        // 3. Duplicates
        if policy == DuplicatePolicy::Reject {
            self.reject_duplicate(owner, &substance.id, new.terms.kind(), new.terms.unit_price(), now)?;
        }

        // 4. Eligibility decides draft vs active
        let mut terms = new.terms;
        let state = match &mut terms {
            OfferTerms::Buy(_) => ListingState::Active,
            OfferTerms::Sell(sell) => {
                if let Some(auction) = &mut sell.auction {
                    auction.current_bid = None;
                    auction.highest_bidder = None;
                }
                self.initial_sell_state(owner, &substance.id, sell)?
            }
        };

        let offer = self.offers.create(Offer {
            id: OfferId::new(),
            owner_id: owner,
            substance_id: substance.id,
            substance_name: substance.name,
            quantity: new.quantity,
            unit: new.unit,
            state,
            created_at: now,
            listing_expires_at: now + self.ttl,
            version: 0,
            terms,
        })?;

        tracing::info!(
            offer = %offer.id,
            %owner,
            kind = %offer.kind(),
            substance = %offer.substance_id,
            quantity = %offer.quantity,
            price = %offer.unit_price(),
            state = ?offer.state,
            "Listing created"
        );
        Ok(OfferView::at(offer, now))
    }

    fn reject_duplicate(
        &self,
        owner: MemberId,
        substance: &SubstanceId,
        kind: OfferKind,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let owned = self.offers.list_by_owner(owner)?;
        let candidate = ListingCandidate {
            owner,
            substance_id: substance,
            kind,
            price,
        };
        let existing = self
            .guard
            .find_duplicate(&owned, &candidate, now)
            .or_else(|| self.guard.price_neighbour(&owned, &candidate, now));
        match existing {
            Some(offer) => {
                tracing::info!(%owner, %substance, existing = %offer.id, %price, "Duplicate listing refused");
                Err(MarketError::DuplicateListing { existing: offer.id })
            }
            None => Ok(()),
        }
    }

    fn initial_sell_state(
        &self,
        owner: MemberId,
        substance: &SubstanceId,
        sell: &SellTerms,
    ) -> Result<ListingState> {
        if let Some(cert) = &sell.certificate_id {
            self.eligibility.require_certificate(owner, cert, substance)?;
            return Ok(ListingState::Active);
        }
        let eligibility = self.eligibility.can_sell(owner, substance)?;
        if eligibility.eligible {
            Ok(ListingState::Active)
        } else {
            if let Some(reason) = &eligibility.reason {
                tracing::info!(%owner, %substance, %reason, "Sell listing parked as draft");
            }
            Ok(ListingState::Draft)
        }
    }

    /// Fail unless the owner may (still) publish this sell listing.
    fn require_sell_gate(&self, offer: &Offer) -> Result<()> {
        let Some(sell) = offer.sell_terms() else {
            return Ok(());
        };
        match &sell.certificate_id {
            Some(cert) => self
                .eligibility
                .require_certificate(offer.owner_id, cert, &offer.substance_id)
                .map(|_| ()),
            None => self
                .eligibility
                .require_sell(offer.owner_id, &offer.substance_id)
                .map(|_| ()),
        }
    }

    // -----------------------------------------------------------------
    // Owner transitions
    // -----------------------------------------------------------------

    /// Load a listing the actor owns.
    fn owned(&self, actor: Actor, id: OfferId) -> Result<Offer> {
        let offer = self.offers.get(id)?.ok_or(MarketError::OfferNotFound(id))?;
        if offer.owner_id != actor.member {
            return Err(MarketError::forbidden(format!(
                "member {} does not own {id}",
                actor.member
            )));
        }
        Ok(offer)
    }

    fn store(&self, offer: Offer, action: &'static str) -> Result<OfferView> {
        let stored = self.offers.update(offer)?;
        let now = self.clock.now();
        tracing::info!(offer = %stored.id, action, version = stored.version, "Listing updated");
        Ok(OfferView::at(stored, now))
    }

    /// Change quantity, unit, price and kind-specific terms. Age is kept.
    pub fn edit(&self, actor: Actor, id: OfferId, edit: OfferEdit) -> Result<OfferView> {
        let now = self.clock.now();
        let mut offer = self.owned(actor, id)?;

        if let Some(quantity) = edit.quantity {
            require_positive("quantity", quantity)?;
            offer.quantity = quantity;
        }
        if let Some(unit) = edit.unit {
            offer.unit = unit;
        }
        match &mut offer.terms {
            OfferTerms::Sell(sell) => {
                if edit.min_validity_months.is_some() {
                    return Err(MarketError::validation(
                        "min_validity_months",
                        "only applies to buy listings",
                    ));
                }
                if let Some(price) = edit.unit_price {
                    require_positive("price_per_unit", price)?;
                    sell.price_per_unit = price;
                }
                if let Some(expiry) = edit.product_expiry_date {
                    if expiry <= now {
                        return Err(MarketError::validation(
                            "product_expiry_date",
                            "product lot is already expired",
                        ));
                    }
                    sell.product_expiry_date = expiry;
                }
            }
            OfferTerms::Buy(buy) => {
                if edit.product_expiry_date.is_some() {
                    return Err(MarketError::validation(
                        "product_expiry_date",
                        "only applies to sell listings",
                    ));
                }
                if let Some(price) = edit.unit_price {
                    require_positive("max_price_per_unit", price)?;
                    buy.max_price_per_unit = price;
                }
                if let Some(months) = edit.min_validity_months {
                    buy.min_validity_months = months;
                }
            }
        }
        self.store(offer, "edit")
    }

    /// Hide an active listing from discovery. Its age keeps running.
    pub fn pause(&self, actor: Actor, id: OfferId) -> Result<OfferView> {
        let mut offer = self.owned(actor, id)?;
        let status = offer.status_at(self.clock.now());
        if status != OfferStatus::Active {
            return Err(invalid_transition("pause", status));
        }
        offer.state = ListingState::Paused;
        self.store(offer, "pause")
    }

    /// Bring a paused listing back. An expired one must be extended.
    pub fn reactivate(&self, actor: Actor, id: OfferId) -> Result<OfferView> {
        let mut offer = self.owned(actor, id)?;
        let status = offer.status_at(self.clock.now());
        if status != OfferStatus::Paused {
            return Err(invalid_transition("reactivate", status));
        }
        offer.state = ListingState::Active;
        self.store(offer, "reactivate")
    }

    /// Restart the listing's age (`created_at = now`) and make it active.
    ///
    /// Allowed from expired, active and paused. A sell listing must still
    /// pass the sell gate, since its certificate may have lapsed meanwhile.
    pub fn extend(&self, actor: Actor, id: OfferId) -> Result<OfferView> {
        let now = self.clock.now();
        let mut offer = self.owned(actor, id)?;
        let status = offer.status_at(now);
        if status == OfferStatus::Draft {
            return Err(invalid_transition("extend", status));
        }
        self.require_sell_gate(&offer)?;
        offer.state = ListingState::Active;
        offer.reset_age(now, self.ttl);
        self.store(offer, "extend")
    }

    /// Publish a draft now.
    ///
    /// # Errors
    /// `Ineligible` with the gate's reason when the owner still may not sell.
    pub fn activate(&self, actor: Actor, id: OfferId) -> Result<OfferView> {
        let now = self.clock.now();
        let mut offer = self.owned(actor, id)?;
        let status = offer.status_at(now);
        if status != OfferStatus::Draft {
            return Err(invalid_transition("activate", status));
        }
        self.require_sell_gate(&offer)?;
        offer.state = ListingState::Active;
        offer.reset_age(now, self.ttl);
        self.store(offer, "activate")
    }

    /// Add `extra` to a live listing's quantity instead of opening a
    /// near-duplicate row.
    pub fn merge_quantity(&self, actor: Actor, id: OfferId, extra: Decimal) -> Result<OfferView> {
        require_positive("quantity", extra)?;
        let mut offer = self.owned(actor, id)?;
        let status = offer.status_at(self.clock.now());
        if status == OfferStatus::Expired {
            return Err(invalid_transition("merge", status));
        }
        offer.quantity = offer
            .quantity
            .checked_add(extra)
            .ok_or_else(|| MarketError::validation("quantity", "overflow"))?;
        self.store(offer, "merge")
    }

    /// Remove a listing. Owner or moderator only; terminal from any state.
    pub fn delete(&self, actor: Actor, id: OfferId) -> Result<Offer> {
        let offer = self.offers.get(id)?.ok_or(MarketError::OfferNotFound(id))?;
        if offer.owner_id != actor.member && !actor.is_moderator() {
            return Err(MarketError::forbidden(format!(
                "member {} may not delete {id}",
                actor.member
            )));
        }
        let removed = self.offers.delete(id)?.ok_or(MarketError::OfferNotFound(id))?;
        tracing::info!(offer = %id, by = %actor.member, moderator = actor.is_moderator(), "Listing deleted");
        Ok(removed)
    }

    // -----------------------------------------------------------------
    // Auctions
    // -----------------------------------------------------------------

    /// Bid on an active auction listing. The owner is notified.
    ///
    /// # Errors
    /// `Forbidden` for the owner's own listing, `InvalidTransition` when the
    /// listing is not an open auction, `Validation` for a non-winning bid.
    pub fn place_bid(&self, actor: Actor, id: OfferId, amount: Decimal) -> Result<OfferView> {
        let now = self.clock.now();
        let mut offer = self.offers.get(id)?.ok_or(MarketError::OfferNotFound(id))?;
        let owner = offer.owner_id;
        if owner == actor.member {
            return Err(MarketError::forbidden("owners cannot bid on their own listing"));
        }
        let status = offer.status_at(now);
        if status != OfferStatus::Active {
            return Err(invalid_transition("bid", status));
        }

        {
            let Some(auction) = offer.sell_terms_mut().and_then(|s| s.auction.as_mut()) else {
                return Err(MarketError::InvalidTransition {
                    action: "bid",
                    state: "not an auction".into(),
                });
            };
            if !auction.is_open_at(now) {
                return Err(MarketError::InvalidTransition {
                    action: "bid",
                    state: "auction closed".into(),
                });
            }
            if !auction.accepts_bid(amount) {
                let floor = auction.current_bid.unwrap_or(auction.starting_price);
                return Err(MarketError::validation(
                    "amount",
                    format!("bid {amount} does not beat {floor}"),
                ));
            }
            auction.current_bid = Some(amount);
            auction.highest_bidder = Some(actor.member);
        }

        let view = self.store(offer, "bid")?;
        notify_or_log(
            self.notifier.as_ref(),
            owner,
            MarketEvent::BidPlaced {
                offer: id,
                bidder: actor.member,
                amount,
            },
        );
        Ok(view)
    }

    // -----------------------------------------------------------------
    // Draft promotion
    // -----------------------------------------------------------------

    /// Push path: `member` just received a certificate, re-check their
    /// drafts. Returns the promoted listings.
    pub fn on_certificate_uploaded(&self, member: MemberId) -> Result<Vec<OfferId>> {
        let drafts = self
            .offers
            .list_by_owner(member)?
            .into_iter()
            .filter(|o| o.state == ListingState::Draft);
        self.promote(drafts)
    }

    /// Sweep every draft. Idempotent: a draft is promoted at most once and
    /// an already-active listing is never touched.
    pub fn promote_all_drafts(&self) -> Result<Vec<OfferId>> {
        let drafts = self
            .offers
            .list()?
            .into_iter()
            .filter(|o| o.state == ListingState::Draft);
        self.promote(drafts)
    }

    fn promote(&self, drafts: impl Iterator<Item = Offer>) -> Result<Vec<OfferId>> {
        let mut promoted = Vec::new();
        for mut draft in drafts {
            if !self.eligibility.can_sell(draft.owner_id, &draft.substance_id)?.eligible {
                continue;
            }
            draft.state = ListingState::Active;
            draft.reset_age(self.clock.now(), self.ttl);
            let owner = draft.owner_id;
            match self.offers.update(draft) {
                Ok(stored) => {
                    tracing::info!(offer = %stored.id, %owner, "Draft promoted to active");
                    notify_or_log(
                        self.notifier.as_ref(),
                        owner,
                        MarketEvent::ListingPromoted { offer: stored.id },
                    );
                    promoted.push(stored.id);
                }
                // Edited, activated or deleted meanwhile: the next pass sees it.
                Err(err @ (MarketError::VersionConflict { .. } | MarketError::OfferNotFound(_))) => {
                    tracing::debug!(error = %err, "Draft promotion skipped");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coopmarket_eligibility::{
        InMemoryAuthorizations, InMemoryCertificates, InMemorySupplierApprovals,
    };
    use coopmarket_matching::InMemoryCatalog;
    use coopmarket_types::{Auction, BuyTerms, CertificateFact, ManualClock, RecordingSink};

    use crate::repository::InMemoryOfferRepository;

    struct Fixture {
        clock: Arc<ManualClock>,
        certs: Arc<InMemoryCertificates>,
        sink: Arc<RecordingSink>,
        lifecycle: OfferLifecycle,
    }

    fn vit_d3() -> SubstanceId {
        SubstanceId::new("vit-d3")
    }

    fn fixture() -> Fixture {
        let config = MarketConfig::default();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let certs = Arc::new(InMemoryCertificates::new());
        let eligibility = Arc::new(EligibilityEvaluator::new(
            certs.clone(),
            Arc::new(InMemorySupplierApprovals::new(["Galena"])),
            Arc::new(InMemoryAuthorizations::new()),
            clock.clone(),
            &config,
        ));
        let catalog = Arc::new(InMemoryCatalog::new(vec![
            Substance::new("vit-d3", "Vitamina D3"),
            Substance::new("zinco", "Zinco Quelato"),
        ]));
        let sink = Arc::new(RecordingSink::new());
        let lifecycle = OfferLifecycle::new(
            Arc::new(InMemoryOfferRepository::new()),
            catalog,
            eligibility,
            clock.clone(),
            &config,
        )
        .with_notifier(sink.clone());
        Fixture {
            clock,
            certs,
            sink,
            lifecycle,
        }
    }

    impl Fixture {
        fn certify(&self, member: MemberId, substance: &SubstanceId) -> CertificateFact {
            let cert = CertificateFact::dummy(member, substance, "Galena", self.clock.now(), 180);
            self.certs.upload(cert.clone());
            cert
        }
    }

    fn sell(price_cents: i64, qty: i64, now: DateTime<Utc>) -> NewOffer {
        NewOffer {
            substance_id: vit_d3(),
            quantity: Decimal::new(qty, 0),
            unit: Unit::Gram,
            terms: OfferTerms::Sell(SellTerms {
                price_per_unit: Decimal::new(price_cents, 2),
                product_expiry_date: now + Duration::days(365),
                certificate_id: None,
                auction: None,
            }),
        }
    }

    fn buy(max_cents: i64) -> NewOffer {
        NewOffer {
            substance_id: vit_d3(),
            quantity: Decimal::new(10, 0),
            unit: Unit::Gram,
            terms: OfferTerms::Buy(BuyTerms {
                max_price_per_unit: Decimal::new(max_cents, 2),
                min_validity_months: 6,
            }),
        }
    }

    #[test]
    fn eligible_seller_goes_live_ineligible_waits_as_draft() {
        let f = fixture();
        let now = f.clock.now();
        let seller = MemberId::new();

        let draft = f
            .lifecycle
            .create(Actor::member(seller), sell(1550, 100, now), DuplicatePolicy::Reject)
            .unwrap();
        assert_eq!(draft.status, OfferStatus::Draft);

        let other = MemberId::new();
        f.certify(other, &vit_d3());
        let live = f
            .lifecycle
            .create(Actor::member(other), sell(1550, 100, now), DuplicatePolicy::Reject)
            .unwrap();
        assert_eq!(live.status, OfferStatus::Active);
        assert_eq!(live.offer.substance_name, "Vitamina D3");
        assert_eq!(live.offer.listing_expires_at, now + Duration::days(7));
    }

    #[test]
    fn buy_listing_needs_no_certificate() {
        let f = fixture();
        let view = f
            .lifecycle
            .create(Actor::member(MemberId::new()), buy(2000), DuplicatePolicy::Reject)
            .unwrap();
        assert_eq!(view.status, OfferStatus::Active);
    }

    #[test]
    fn shape_errors_are_validation() {
        let f = fixture();
        let now = f.clock.now();
        let actor = Actor::member(MemberId::new());
        for bad in [sell(0, 10, now), sell(1550, 0, now), buy(-1)] {
            let err = f.lifecycle.create(actor, bad, DuplicatePolicy::Reject).unwrap_err();
            assert!(matches!(err, MarketError::Validation { .. }), "{err}");
        }
        let mut unknown = buy(100);
        unknown.substance_id = SubstanceId::new("unobtainium");
        let err = f.lifecycle.create(actor, unknown, DuplicatePolicy::Reject).unwrap_err();
        assert!(matches!(err, MarketError::SubstanceNotFound(_)));
    }

    #[test]
    fn activating_draft_without_eligibility_is_ineligible() {
        let f = fixture();
        let now = f.clock.now();
        let seller = Actor::member(MemberId::new());
        let draft = f
            .lifecycle
            .create(seller, sell(1550, 100, now), DuplicatePolicy::Reject)
            .unwrap();

        let err = f.lifecycle.activate(seller, draft.offer.id).unwrap_err();
        assert!(matches!(err, MarketError::Ineligible(_)));

        f.certify(seller.member, &vit_d3());
        let view = f.lifecycle.activate(seller, draft.offer.id).unwrap();
        assert_eq!(view.status, OfferStatus::Active);
    }

    #[test]
    fn expiry_is_reconciled_on_read_and_extend_restarts_age() {
        let f = fixture();
        let seller = Actor::member(MemberId::new());
        f.certify(seller.member, &vit_d3());
        let created = f
            .lifecycle
            .create(seller, sell(1550, 100, f.clock.now()), DuplicatePolicy::Reject)
            .unwrap();

        f.clock.advance(Duration::days(7) + Duration::seconds(1));
        let read = f.lifecycle.get(created.offer.id).unwrap();
        assert_eq!(read.status, OfferStatus::Expired);
        assert!(f.lifecycle.list(&ListingFilter::default()).unwrap().is_empty());

        let err = f.lifecycle.reactivate(seller, created.offer.id).unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));

        let extended = f.lifecycle.extend(seller, created.offer.id).unwrap();
        let now = f.clock.now();
        assert_eq!(extended.status, OfferStatus::Active);
        assert_eq!(extended.offer.created_at, now);
        assert_eq!(extended.offer.listing_expires_at, now + Duration::days(7));
    }

    #[test]
    fn pause_keeps_age_and_reactivate_restores() {
        let f = fixture();
        let seller = Actor::member(MemberId::new());
        f.certify(seller.member, &vit_d3());
        let created = f
            .lifecycle
            .create(seller, sell(1550, 100, f.clock.now()), DuplicatePolicy::Reject)
            .unwrap();

        f.clock.advance(Duration::days(2));
        let paused = f.lifecycle.pause(seller, created.offer.id).unwrap();
        assert_eq!(paused.status, OfferStatus::Paused);
        assert_eq!(paused.offer.created_at, created.offer.created_at);
        assert!(f.lifecycle.list(&ListingFilter::default()).unwrap().is_empty());

        let err = f.lifecycle.pause(seller, created.offer.id).unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));

        let back = f.lifecycle.reactivate(seller, created.offer.id).unwrap();
        assert_eq!(back.status, OfferStatus::Active);
        assert_eq!(back.offer.listing_expires_at, created.offer.listing_expires_at);
    }

    #[test]
    fn only_owner_edits_owner_or_moderator_deletes() {
        let f = fixture();
        let owner = Actor::member(MemberId::new());
        let stranger = Actor::member(MemberId::new());
        let listing = f
            .lifecycle
            .create(owner, buy(2000), DuplicatePolicy::Reject)
            .unwrap();

        let edit = OfferEdit {
            quantity: Some(Decimal::new(3, 0)),
            ..OfferEdit::default()
        };
        let err = f.lifecycle.edit(stranger, listing.offer.id, edit.clone()).unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));
        let err = f.lifecycle.delete(stranger, listing.offer.id).unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));

        let edited = f.lifecycle.edit(owner, listing.offer.id, edit).unwrap();
        assert_eq!(edited.offer.quantity, Decimal::new(3, 0));
        assert_eq!(edited.offer.created_at, listing.offer.created_at);

        let moderator = Actor::moderator(MemberId::new());
        f.lifecycle.delete(moderator, listing.offer.id).unwrap();
        let err = f.lifecycle.get(listing.offer.id).unwrap_err();
        assert!(matches!(err, MarketError::OfferNotFound(_)));
    }

    #[test]
    fn edit_rejects_terms_of_the_other_kind() {
        let f = fixture();
        let owner = Actor::member(MemberId::new());
        let listing = f
            .lifecycle
            .create(owner, buy(2000), DuplicatePolicy::Reject)
            .unwrap();
        let edit = OfferEdit {
            product_expiry_date: Some(f.clock.now() + Duration::days(90)),
            ..OfferEdit::default()
        };
        let err = f.lifecycle.edit(owner, listing.offer.id, edit).unwrap_err();
        assert!(matches!(err, MarketError::Validation { field: "product_expiry_date", .. }));
    }

    #[test]
    fn near_duplicate_is_refused_then_merged() {
        let f = fixture();
        let now = f.clock.now();
        let seller = Actor::member(MemberId::new());
        f.certify(seller.member, &vit_d3());
        let first = f
            .lifecycle
            .create(seller, sell(1550, 100, now), DuplicatePolicy::Reject)
            .unwrap();

        let err = f
            .lifecycle
            .create(seller, sell(1580, 50, now), DuplicatePolicy::Reject)
            .unwrap_err();
        match err {
            MarketError::DuplicateListing { existing } => assert_eq!(existing, first.offer.id),
            other => panic!("expected duplicate, got {other}"),
        }

        let merged = f
            .lifecycle
            .merge_quantity(seller, first.offer.id, Decimal::new(50, 0))
            .unwrap();
        assert_eq!(merged.offer.quantity, Decimal::new(150, 0));

        let jump = f
            .lifecycle
            .create(seller, sell(2000, 50, now), DuplicatePolicy::Reject)
            .unwrap();
        assert_ne!(jump.offer.id, first.offer.id);

        let forced = f
            .lifecycle
            .create(seller, sell(1580, 50, now), DuplicatePolicy::Allow)
            .unwrap();
        assert_eq!(forced.status, OfferStatus::Active);
    }

    #[test]
    fn lot_certificate_must_be_valid() {
        let f = fixture();
        let now = f.clock.now();
        let seller = Actor::member(MemberId::new());
        let cert = f.certify(seller.member, &SubstanceId::new("zinco"));

        let mut excess = sell(1550, 10, now);
        if let OfferTerms::Sell(s) = &mut excess.terms {
            s.certificate_id = Some(cert.id.clone());
        }
        let err = f
            .lifecycle
            .create(seller, excess.clone(), DuplicatePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, MarketError::Ineligible(_)));

        excess.substance_id = SubstanceId::new("zinco");
        let view = f.lifecycle.create(seller, excess, DuplicatePolicy::Reject).unwrap();
        assert_eq!(view.status, OfferStatus::Active);
    }

    #[test]
    fn auction_bids_must_climb_and_notify_owner() {
        let f = fixture();
        let now = f.clock.now();
        let seller = Actor::member(MemberId::new());
        f.certify(seller.member, &vit_d3());
        let mut new = sell(1000, 10, now);
        if let OfferTerms::Sell(s) = &mut new.terms {
            s.auction = Some(Auction::new(Decimal::new(10, 0), now + Duration::hours(2)));
        }
        let listing = f.lifecycle.create(seller, new, DuplicatePolicy::Reject).unwrap();
        let id = listing.offer.id;

        let err = f.lifecycle.place_bid(seller, id, Decimal::new(11, 0)).unwrap_err();
        assert!(matches!(err, MarketError::Forbidden { .. }));

        let bidder = Actor::member(MemberId::new());
        let err = f.lifecycle.place_bid(bidder, id, Decimal::new(9, 0)).unwrap_err();
        assert!(matches!(err, MarketError::Validation { .. }));

        let view = f.lifecycle.place_bid(bidder, id, Decimal::new(10, 0)).unwrap();
        let auction = view.offer.sell_terms().and_then(|s| s.auction.clone()).unwrap();
        assert_eq!(auction.current_bid, Some(Decimal::new(10, 0)));
        assert_eq!(auction.highest_bidder, Some(bidder.member));

        let err = f.lifecycle.place_bid(bidder, id, Decimal::new(10, 0)).unwrap_err();
        assert!(matches!(err, MarketError::Validation { .. }));

        f.clock.advance(Duration::hours(3));
        let err = f.lifecycle.place_bid(bidder, id, Decimal::new(50, 0)).unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { .. }));

        assert_eq!(
            f.sink.events_for(seller.member),
            vec![MarketEvent::BidPlaced {
                offer: id,
                bidder: bidder.member,
                amount: Decimal::new(10, 0),
            }]
        );
    }

    #[test]
    fn certificate_upload_promotes_drafts_once() {
        let f = fixture();
        let now = f.clock.now();
        let seller = Actor::member(MemberId::new());
        let draft = f
            .lifecycle
            .create(seller, sell(1550, 100, now), DuplicatePolicy::Reject)
            .unwrap();

        assert!(f.lifecycle.on_certificate_uploaded(seller.member).unwrap().is_empty());

        f.clock.advance(Duration::days(10));
        f.certify(seller.member, &vit_d3());
        let promoted = f.lifecycle.on_certificate_uploaded(seller.member).unwrap();
        assert_eq!(promoted, vec![draft.offer.id]);
        assert!(f.lifecycle.promote_all_drafts().unwrap().is_empty());

        let view = f.lifecycle.get(draft.offer.id).unwrap();
        assert_eq!(view.status, OfferStatus::Active);
        assert_eq!(view.offer.created_at, f.clock.now());
        assert_eq!(
            f.sink.events_for(seller.member),
            vec![MarketEvent::ListingPromoted {
                offer: draft.offer.id
            }]
        );
    }

    #[test]
    fn search_listings_matches_substance_fuzzily() {
        let f = fixture();
        let buyer = Actor::member(MemberId::new());
        let listing = f
            .lifecycle
            .create(buyer, buy(2000), DuplicatePolicy::Reject)
            .unwrap();
        let found = f
            .lifecycle
            .search_listings("vitamna d3", &ListingFilter::buys())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].offer.id, listing.offer.id);
        assert!(
            f.lifecycle
                .search_listings("zinco", &ListingFilter::default())
                .unwrap()
                .is_empty()
        );
    }
}
