//! Substance search.
//!
//! ```text
//! search(query, context) -> Vec<Substance>   (≤ search_result_limit, catalog order)
//! ```
//!
//! The context picks the searchable universe: a seller only sees
//! substances they may currently sell, a buyer sees the whole catalog.
//! Each candidate is tested against its name and every synonym; the first
//! accepting pass wins and no ranking is applied beyond catalog order.

use std::sync::Arc;

use coopmarket_eligibility::EligibilityEvaluator;
use coopmarket_types::{MarketConfig, MemberId, Result, Substance, text};

use crate::catalog::SubstanceCatalog;
use crate::fuzzy::{self, FuzzyParams, MatchPass};

/// What the caller is about to do with the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchContext {
    /// Creating a sell listing: only sellable substances.
    Sell { member: MemberId },
    /// Creating a combined (sell-or-barter) listing: same universe as sell.
    Combined { member: MemberId },
    /// Creating a buy intent: the full catalog.
    Buy,
}

/// Fuzzy search over the substance catalog.
pub struct SubstanceMatcher {
    catalog: Arc<dyn SubstanceCatalog>,
    eligibility: Arc<EligibilityEvaluator>,
    params: FuzzyParams,
    limit: usize,
}

impl SubstanceMatcher {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn SubstanceCatalog>,
        eligibility: Arc<EligibilityEvaluator>,
        config: &MarketConfig,
    ) -> Self {
        Self {
            catalog,
            eligibility,
            params: FuzzyParams {
                min_token_len: config.min_token_len,
                fuzzy_token_len: config.fuzzy_token_len,
                similarity_threshold: config.fuzzy_similarity_threshold,
            },
            limit: config.search_result_limit,
        }
    }

    /// First pass accepting `query` against the substance's name or synonyms.
    fn match_substance(&self, query: &str, substance: &Substance) -> Option<MatchPass> {
        std::iter::once(&substance.name)
            .chain(substance.synonyms.iter())
            .find_map(|name| fuzzy::matches(query, &text::normalize(name), &self.params))
    }

    /// Search the universe `context` allows.
    ///
    /// An empty (or whitespace-only) query yields an empty result.
    pub fn search(&self, query: &str, context: SearchContext) -> Result<Vec<Substance>> {
        let query = text::normalize(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut universe = self.catalog.all()?;
        if let SearchContext::Sell { member } | SearchContext::Combined { member } = context {
            let sellable = self.eligibility.sellable_substances(member)?;
            universe.retain(|s| sellable.contains(&s.id));
        }

        let found: Vec<Substance> = universe
            .into_iter()
            .filter(|s| match self.match_substance(&query, s) {
                Some(pass) => {
                    tracing::debug!(query = %query, substance = %s.id, ?pass, "Substance matched");
                    true
                }
                None => false,
            })
            .take(self.limit)
            .collect();

        tracing::debug!(query = %query, ?context, results = found.len(), "Substance search complete");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coopmarket_eligibility::{
        InMemoryAuthorizations, InMemoryCertificates, InMemorySupplierApprovals,
    };
    use coopmarket_types::{CertificateFact, Clock, ManualClock, SubstanceId};

    use crate::catalog::InMemoryCatalog;

    struct Fixture {
        certs: Arc<InMemoryCertificates>,
        clock: Arc<ManualClock>,
        matcher: SubstanceMatcher,
    }

    fn catalog() -> Vec<Substance> {
        vec![
            Substance::new("colageno", "Colágeno Hidrolisado"),
            Substance::new("vit-c", "Vitamina C (Ácido Ascórbico)"),
            Substance::new("vit-d3", "Vitamina D3").with_synonyms(["Colecalciferol"]),
            Substance::new("zinco", "Zinco Quelato"),
        ]
    }

    fn fixture_with(substances: Vec<Substance>, config: &MarketConfig) -> Fixture {
        let certs = Arc::new(InMemoryCertificates::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let evaluator = Arc::new(EligibilityEvaluator::new(
            certs.clone(),
            Arc::new(InMemorySupplierApprovals::new(["Galena"])),
            Arc::new(InMemoryAuthorizations::new()),
            clock.clone(),
            config,
        ));
        let matcher =
            SubstanceMatcher::new(Arc::new(InMemoryCatalog::new(substances)), evaluator, config);
        Fixture {
            certs,
            clock,
            matcher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(catalog(), &MarketConfig::default())
    }

    fn ids(found: &[Substance]) -> Vec<&str> {
        found.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn typo_with_repeated_letter_finds_colageno() {
        let f = fixture();
        let found = f.matcher.search("colaageno", SearchContext::Buy).unwrap();
        assert_eq!(ids(&found), vec!["colageno"]);
    }

    #[test]
    fn token_containment_finds_vitamin_c() {
        let f = fixture();
        let found = f.matcher.search("vitamina c", SearchContext::Buy).unwrap();
        assert!(ids(&found).contains(&"vit-c"));
    }

    #[test]
    fn unknown_query_returns_empty() {
        let f = fixture();
        assert!(f.matcher.search("xyz123", SearchContext::Buy).unwrap().is_empty());
    }

    #[test]
    fn synonyms_are_searched() {
        let f = fixture();
        let found = f.matcher.search("colecalciferol", SearchContext::Buy).unwrap();
        assert_eq!(ids(&found), vec!["vit-d3"]);
    }

    #[test]
    fn blank_query_returns_empty() {
        let f = fixture();
        assert!(f.matcher.search("   ", SearchContext::Buy).unwrap().is_empty());
    }

    #[test]
    fn results_keep_catalog_order() {
        let f = fixture();
        let found = f.matcher.search("vitamina", SearchContext::Buy).unwrap();
        assert_eq!(ids(&found), vec!["vit-c", "vit-d3"]);
    }

    #[test]
    fn sell_context_is_limited_to_sellable_substances() {
        let f = fixture();
        let seller = MemberId::new();
        assert!(
            f.matcher
                .search("vitamina", SearchContext::Sell { member: seller })
                .unwrap()
                .is_empty()
        );

        f.certs.upload(CertificateFact::dummy(
            seller,
            &SubstanceId::new("vit-d3"),
            "Galena",
            f.clock.now(),
            120,
        ));
        let found = f
            .matcher
            .search("vitamina", SearchContext::Combined { member: seller })
            .unwrap();
        assert_eq!(ids(&found), vec!["vit-d3"]);
    }

    #[test]
    fn results_are_capped() {
        let substances: Vec<Substance> = (0..25)
            .map(|i| Substance::new(format!("ext-{i}"), format!("Extrato Seco {i}")))
            .collect();
        let f = fixture_with(substances, &MarketConfig::default());
        let found = f.matcher.search("extrato", SearchContext::Buy).unwrap();
        assert_eq!(found.len(), 10);
        assert_eq!(found[0].id.as_str(), "ext-0");
        assert_eq!(found[9].id.as_str(), "ext-9");
    }
}
