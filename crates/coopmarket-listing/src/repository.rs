//! Listing storage.
//!
//! [`OfferRepository`] is the single source of truth for listings. Updates
//! are compare-and-swap on [`Offer::version`]: a writer that read version
//! `v` only succeeds if the stored record is still at `v`, and the stored
//! copy comes back at `v + 1`. Concurrent writers to one listing therefore
//! serialize, and the loser sees `VersionConflict` instead of overwriting.

use std::collections::HashMap;
use std::sync::Arc;

use coopmarket_types::{MarketError, MemberId, Offer, OfferId, Result};
use parking_lot::RwLock;

/// Persistence for listings.
pub trait OfferRepository: Send + Sync {
    /// Store a new listing.
    ///
    /// # Errors
    /// `AlreadyExists` if the id is taken.
    fn create(&self, offer: Offer) -> Result<Offer>;

    fn get(&self, id: OfferId) -> Result<Option<Offer>>;

    /// Replace a listing if its stored version still equals `offer.version`.
    /// Returns the stored copy with the bumped version.
    ///
    /// # Errors
    /// `OfferNotFound` if deleted meanwhile, `VersionConflict` if modified.
    fn update(&self, offer: Offer) -> Result<Offer>;

    /// Remove a listing, returning it.
    fn delete(&self, id: OfferId) -> Result<Option<Offer>>;

    /// All listings, oldest id first.
    fn list(&self) -> Result<Vec<Offer>>;

    /// Listings owned by `owner`, oldest id first.
    fn list_by_owner(&self, owner: MemberId) -> Result<Vec<Offer>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|o| o.owner_id == owner)
            .collect())
    }
}

/// Thread-safe, cloneable in-memory listing store.
///
/// The lock is `parking_lot` and never held across `.await` points.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOfferRepository {
    data: Arc<RwLock<HashMap<OfferId, Offer>>>,
}

impl InMemoryOfferRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl OfferRepository for InMemoryOfferRepository {
    fn create(&self, offer: Offer) -> Result<Offer> {
        let mut guard = self.data.write();
        if guard.contains_key(&offer.id) {
            return Err(MarketError::AlreadyExists(offer.id.to_string()));
        }
        guard.insert(offer.id, offer.clone());
        Ok(offer)
    }

    fn get(&self, id: OfferId) -> Result<Option<Offer>> {
        Ok(self.data.read().get(&id).cloned())
    }

    fn update(&self, mut offer: Offer) -> Result<Offer> {
        let mut guard = self.data.write();
        let stored = guard
            .get_mut(&offer.id)
            .ok_or(MarketError::OfferNotFound(offer.id))?;
        if stored.version != offer.version {
            return Err(MarketError::VersionConflict {
                entity: offer.id.to_string(),
                expected: offer.version,
                found: stored.version,
            });
        }
        offer.version += 1;
        *stored = offer.clone();
        Ok(offer)
    }

    fn delete(&self, id: OfferId) -> Result<Option<Offer>> {
        Ok(self.data.write().remove(&id))
    }

    fn list(&self) -> Result<Vec<Offer>> {
        let mut all: Vec<Offer> = self.data.read().values().cloned().collect();
        all.sort_by_key(|o| o.id);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coopmarket_types::SubstanceId;
    use rust_decimal::Decimal;

    fn offer() -> Offer {
        Offer::dummy_sell(
            MemberId::new(),
            &SubstanceId::new("vit-d3"),
            Decimal::new(1550, 2),
            Decimal::new(100, 0),
            Utc::now(),
        )
    }

    #[test]
    fn create_twice_conflicts() {
        let repo = InMemoryOfferRepository::new();
        let o = offer();
        repo.create(o.clone()).unwrap();
        let err = repo.create(o).unwrap_err();
        assert!(matches!(err, MarketError::AlreadyExists(_)));
    }

    #[test]
    fn update_bumps_version() {
        let repo = InMemoryOfferRepository::new();
        let o = repo.create(offer()).unwrap();
        let mut edited = o.clone();
        edited.quantity = Decimal::new(50, 0);
        let stored = repo.update(edited).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(repo.get(o.id).unwrap().unwrap().quantity, Decimal::new(50, 0));
    }

    #[test]
    fn stale_update_is_rejected() {
        let repo = InMemoryOfferRepository::new();
        let o = repo.create(offer()).unwrap();
        repo.update(o.clone()).unwrap();
        let err = repo.update(o).unwrap_err();
        assert!(matches!(
            err,
            MarketError::VersionConflict {
                expected: 0,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn update_after_delete_is_not_found() {
        let repo = InMemoryOfferRepository::new();
        let o = repo.create(offer()).unwrap();
        assert!(repo.delete(o.id).unwrap().is_some());
        let err = repo.update(o).unwrap_err();
        assert!(matches!(err, MarketError::OfferNotFound(_)));
        assert!(repo.is_empty());
    }

    #[test]
    fn list_by_owner_filters() {
        let repo = InMemoryOfferRepository::new();
        let mine = repo.create(offer()).unwrap();
        repo.create(offer()).unwrap();
        let listed = repo.list_by_owner(mine.owner_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
        assert_eq!(repo.len(), 2);
    }
}
