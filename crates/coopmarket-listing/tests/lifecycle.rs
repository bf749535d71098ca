//! Listing lifecycle integration tests.
//!
//! These drive `OfferLifecycle` through realistic member journeys against
//! the in-memory providers: drafts waiting on certificates, discovery
//! filters, expiry on read, and concurrent owner edits.

use std::sync::Arc;

use chrono::{Duration, Utc};
use coopmarket_eligibility::{
    EligibilityEvaluator, InMemoryAuthorizations, InMemoryCertificates, InMemorySupplierApprovals,
};
use coopmarket_listing::*;
use coopmarket_matching::{InMemoryCatalog, SearchContext};
use coopmarket_types::*;
use rust_decimal::Decimal;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Helper: one cooperative with a small catalog.
struct Market {
    clock: Arc<ManualClock>,
    certs: Arc<InMemoryCertificates>,
    directory: Arc<InMemoryDirectory>,
    sink: Arc<RecordingSink>,
    lifecycle: OfferLifecycle,
}

impl Market {
    fn new() -> Self {
        init_tracing();
        let config = MarketConfig::default();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let certs = Arc::new(InMemoryCertificates::new());
        let eligibility = Arc::new(EligibilityEvaluator::new(
            certs.clone(),
            Arc::new(InMemorySupplierApprovals::new(["Galena Química"])),
            Arc::new(InMemoryAuthorizations::new()),
            clock.clone(),
            &config,
        ));
        let catalog = Arc::new(InMemoryCatalog::new(vec![
            Substance::new("colageno", "Colágeno Hidrolisado"),
            Substance::new("vit-c", "Vitamina C (Ácido Ascórbico)"),
            Substance::new("vit-d3", "Vitamina D3"),
        ]));
        let directory = Arc::new(InMemoryDirectory::new());
        let sink = Arc::new(RecordingSink::new());
        let lifecycle = OfferLifecycle::new(
            Arc::new(InMemoryOfferRepository::new()),
            catalog,
            eligibility,
            clock.clone(),
            &config,
        )
        .with_directory(directory.clone())
        .with_notifier(sink.clone());
        Self {
            clock,
            certs,
            directory,
            sink,
            lifecycle,
        }
    }

    fn member(&self, name: &str) -> Actor {
        let id = MemberId::new();
        self.directory.register(id, name);
        Actor::member(id)
    }

    fn certify(&self, actor: Actor, substance: &str) {
        self.certs.upload(CertificateFact::dummy(
            actor.member,
            &SubstanceId::new(substance),
            "GALENA QUIMICA",
            self.clock.now(),
            365,
        ));
    }

    fn sell(&self, actor: Actor, substance: &str, price_cents: i64, qty: i64) -> OfferView {
        self.lifecycle
            .create(
                actor,
                NewOffer {
                    substance_id: SubstanceId::new(substance),
                    quantity: Decimal::new(qty, 0),
                    unit: Unit::Gram,
                    terms: OfferTerms::Sell(SellTerms {
                        price_per_unit: Decimal::new(price_cents, 2),
                        product_expiry_date: self.clock.now() + Duration::days(400),
                        certificate_id: None,
                        auction: None,
                    }),
                },
                DuplicatePolicy::Reject,
            )
            .expect("sell listing should be accepted")
    }

    fn buy(&self, actor: Actor, substance: &str, max_cents: i64, qty: i64) -> OfferView {
        self.lifecycle
            .create(
                actor,
                NewOffer {
                    substance_id: SubstanceId::new(substance),
                    quantity: Decimal::new(qty, 0),
                    unit: Unit::Gram,
                    terms: OfferTerms::Buy(BuyTerms {
                        max_price_per_unit: Decimal::new(max_cents, 2),
                        min_validity_months: 6,
                    }),
                },
                DuplicatePolicy::Reject,
            )
            .expect("buy listing should be accepted")
    }
}

#[test]
fn draft_to_active_to_expired_to_extended_to_deleted() {
    let m = Market::new();
    let ana = m.member("Ana Farmácia");

    // 1. No certificate yet: parked as draft, invisible to discovery
    let draft = m.sell(ana, "vit-d3", 1550, 100);
    assert_eq!(draft.status, OfferStatus::Draft);
    assert!(m.lifecycle.list(&ListingFilter::default()).unwrap().is_empty());

    // 2. Certificate arrives: push path promotes it
    m.clock.advance(Duration::days(3));
    m.certify(ana, "vit-d3");
    assert_eq!(
        m.lifecycle.on_certificate_uploaded(ana.member).unwrap(),
        vec![draft.offer.id]
    );
    let live = m.lifecycle.get(draft.offer.id).unwrap();
    assert_eq!(live.status, OfferStatus::Active);
    assert_eq!(live.offer.listing_expires_at, m.clock.now() + Duration::days(7));

    // 3. Deadline passes: read reconciles to expired
    m.clock.advance(Duration::days(8));
    assert_eq!(
        m.lifecycle.get(draft.offer.id).unwrap().status,
        OfferStatus::Expired
    );

    // 4. Extend: fresh age, active again
    let extended = m.lifecycle.extend(ana, draft.offer.id).unwrap();
    assert_eq!(extended.status, OfferStatus::Active);
    assert_eq!(extended.offer.created_at, m.clock.now());

    // 5. Delete is terminal
    m.lifecycle.delete(ana, draft.offer.id).unwrap();
    assert!(matches!(
        m.lifecycle.extend(ana, draft.offer.id),
        Err(MarketError::OfferNotFound(_))
    ));

    assert_eq!(
        m.sink.events_for(ana.member),
        vec![MarketEvent::ListingPromoted {
            offer: draft.offer.id
        }]
    );
}

#[test]
fn active_never_outlives_its_deadline() {
    let m = Market::new();
    let ana = m.member("Ana");
    m.certify(ana, "vit-d3");
    let listing = m.sell(ana, "vit-d3", 1550, 100);

    for _ in 0..24 {
        m.clock.advance(Duration::hours(9));
        let view = m.lifecycle.get(listing.offer.id).unwrap();
        if view.status == OfferStatus::Active {
            assert!(m.clock.now() <= view.offer.listing_expires_at);
        } else {
            assert_eq!(view.status, OfferStatus::Expired);
            assert!(m.clock.now() > view.offer.listing_expires_at);
        }
    }
}

#[test]
fn discovery_filters_by_owner_name_quantity_and_price() {
    let m = Market::new();
    let joao = m.member("Farmácia São João");
    let maria = m.member("Maria Manipulação");
    m.certify(joao, "vit-d3");
    m.certify(maria, "vit-d3");

    let cheap = m.sell(joao, "vit-d3", 1000, 50);
    let pricey = m.sell(maria, "vit-d3", 3000, 500);
    let wanted = m.buy(maria, "colageno", 8000, 20);

    let by_name = m
        .lifecycle
        .list(&ListingFilter {
            owner_name: Some("SAO JOAO".into()),
            ..ListingFilter::default()
        })
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].offer.id, cheap.offer.id);

    let bulk = m
        .lifecycle
        .list(&ListingFilter {
            min_quantity: Some(Decimal::new(100, 0)),
            ..ListingFilter::sells()
        })
        .unwrap();
    assert_eq!(bulk.len(), 1);
    assert_eq!(bulk[0].offer.id, pricey.offer.id);

    let affordable = m
        .lifecycle
        .list(&ListingFilter {
            max_price: Some(Decimal::new(20, 0)),
            ..ListingFilter::default()
        })
        .unwrap();
    assert_eq!(affordable.len(), 1);
    assert_eq!(affordable[0].offer.id, cheap.offer.id);

    let buyers = m.lifecycle.list(&ListingFilter::buys()).unwrap();
    assert_eq!(buyers.len(), 1);
    assert_eq!(buyers[0].offer.id, wanted.offer.id);

    // Paused listings drop out of discovery but stay visible to their owner.
    m.lifecycle.pause(joao, cheap.offer.id).unwrap();
    assert_eq!(m.lifecycle.list(&ListingFilter::sells()).unwrap().len(), 1);
    let mine = m.lifecycle.list(&ListingFilter::by_owner(joao.member)).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, OfferStatus::Paused);
}

#[test]
fn seller_search_is_limited_to_certified_substances() {
    let m = Market::new();
    let ana = m.member("Ana");
    m.certify(ana, "vit-c");

    let sellable = m
        .lifecycle
        .search_substances("vitamina", SearchContext::Sell { member: ana.member })
        .unwrap();
    let ids: Vec<&str> = sellable.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["vit-c"]);

    let everything = m
        .lifecycle
        .search_substances("vitamina", SearchContext::Buy)
        .unwrap();
    assert_eq!(everything.len(), 2);

    let typo = m
        .lifecycle
        .search_substances("colaageno", SearchContext::Buy)
        .unwrap();
    assert_eq!(typo.len(), 1);
    assert_eq!(typo[0].id.as_str(), "colageno");
}

#[test]
fn concurrent_owner_edits_never_lose_an_update_silently() {
    let m = Market::new();
    let ana = m.member("Ana");
    m.certify(ana, "vit-d3");
    let listing = m.sell(ana, "vit-d3", 1550, 100);
    let id = listing.offer.id;

    let outcomes: Vec<Result<OfferView>> = std::thread::scope(|s| {
        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let lifecycle = &m.lifecycle;
                s.spawn(move || lifecycle.merge_quantity(ana, id, Decimal::new(i, 0)))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect()
    });

    let mut applied = Decimal::ZERO;
    for (i, outcome) in (1..=8).zip(&outcomes) {
        match outcome {
            Ok(_) => applied += Decimal::new(i, 0),
            Err(MarketError::VersionConflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(outcomes.iter().any(|o| o.is_ok()));

    let stored = m.lifecycle.get(id).unwrap();
    assert_eq!(stored.offer.quantity, Decimal::new(100, 0) + applied);
    let successes = outcomes.iter().filter(|o| o.is_ok()).count() as u64;
    assert_eq!(stored.offer.version, successes);
}

#[test]
fn offer_view_serializes_status_with_the_listing() {
    let m = Market::new();
    let ana = m.member("Ana");
    let view = m.buy(ana, "vit-c", 1234, 10);
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["status"], "active");
    assert_eq!(json["kind"], "buy");
    assert_eq!(json["max_price_per_unit"], "12.34");
    assert_eq!(json["substance_name"], "Vitamina C (Ácido Ascórbico)");
}
