//! The substance catalog the matcher searches.

use coopmarket_types::{MarketError, Result, Substance, SubstanceId};
use parking_lot::RwLock;

/// Read access to the cooperative's substance catalog.
pub trait SubstanceCatalog: Send + Sync {
    /// Every substance, in catalog order.
    fn all(&self) -> Result<Vec<Substance>>;

    /// Look a substance up by id.
    fn get(&self, id: &SubstanceId) -> Result<Substance> {
        self.all()?
            .into_iter()
            .find(|s| s.id == *id)
            .ok_or_else(|| MarketError::SubstanceNotFound(id.clone()))
    }
}

/// Catalog kept in memory, preserving insertion order.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    substances: RwLock<Vec<Substance>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new(substances: Vec<Substance>) -> Self {
        Self {
            substances: RwLock::new(substances),
        }
    }

    /// Add a substance, replacing any entry with the same id in place.
    pub fn upsert(&self, substance: Substance) {
        let mut all = self.substances.write();
        match all.iter_mut().find(|s| s.id == substance.id) {
            Some(existing) => *existing = substance,
            None => all.push(substance),
        }
    }
}

impl SubstanceCatalog for InMemoryCatalog {
    fn all(&self) -> Result<Vec<Substance>> {
        Ok(self.substances.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_missing() {
        let catalog = InMemoryCatalog::new(vec![Substance::new("vit-d3", "Vitamina D3")]);
        assert_eq!(
            catalog.get(&SubstanceId::new("vit-d3")).unwrap().name,
            "Vitamina D3"
        );
        let err = catalog.get(&SubstanceId::new("nope")).unwrap_err();
        assert!(matches!(err, MarketError::SubstanceNotFound(_)));
    }

    #[test]
    fn upsert_keeps_order() {
        let catalog = InMemoryCatalog::new(vec![
            Substance::new("a", "A"),
            Substance::new("b", "B"),
        ]);
        catalog.upsert(Substance::new("a", "A2"));
        catalog.upsert(Substance::new("c", "C"));
        let names: Vec<_> = catalog.all().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["A2", "B", "C"]);
    }
}
