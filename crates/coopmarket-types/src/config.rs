//! Configuration for the negotiation core.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketError, Result, constants};

/// Tunables shared by every service in the core.
///
/// Missing fields in a JSON document fall back to the defaults in
/// [`constants`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Days a listing stays discoverable after creation or extension.
    pub listing_ttl_days: i64,
    /// Certificates must outlive `now + min_validity_days` to sell.
    pub min_validity_days: i64,
    /// Duplicate price band, as a fraction of the existing listing price.
    pub duplicate_price_tolerance: Decimal,
    /// Maximum substances returned by a catalog search.
    pub search_result_limit: usize,
    /// Levenshtein similarity cut-off (exclusive).
    pub fuzzy_similarity_threshold: f64,
    /// Minimum token length for token containment.
    pub min_token_len: usize,
    /// Minimum token length for edit-distance / prefix matching.
    pub fuzzy_token_len: usize,
    /// Days per month when converting product expiry to validity months.
    pub validity_month_days: i64,
    /// Fallback interval for draft promotion sweeps.
    pub promotion_interval_secs: u64,
    /// Bounded optimistic retries for completion confirmation.
    pub completion_retry_limit: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            listing_ttl_days: constants::DEFAULT_LISTING_TTL_DAYS,
            min_validity_days: constants::DEFAULT_MIN_VALIDITY_DAYS,
            duplicate_price_tolerance: Decimal::new(
                constants::DEFAULT_DUPLICATE_PRICE_TOLERANCE_BPS,
                4,
            ),
            search_result_limit: constants::DEFAULT_SEARCH_RESULT_LIMIT,
            fuzzy_similarity_threshold: constants::DEFAULT_FUZZY_SIMILARITY_THRESHOLD,
            min_token_len: constants::DEFAULT_MIN_TOKEN_LEN,
            fuzzy_token_len: constants::DEFAULT_FUZZY_TOKEN_LEN,
            validity_month_days: constants::DEFAULT_VALIDITY_MONTH_DAYS,
            promotion_interval_secs: constants::DEFAULT_PROMOTION_INTERVAL_SECS,
            completion_retry_limit: constants::DEFAULT_COMPLETION_RETRY_LIMIT,
        }
    }
}

impl MarketConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| MarketError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make the core misbehave.
    pub fn validate(&self) -> Result<()> {
        // Timestamps are computed as `now + days`; bounded so that never
        // leaves chrono's range.
        if !(1..=constants::MAX_LISTING_TTL_DAYS).contains(&self.listing_ttl_days) {
            return Err(MarketError::Configuration(format!(
                "listing_ttl_days {} outside 1..={}",
                self.listing_ttl_days,
                constants::MAX_LISTING_TTL_DAYS
            )));
        }
        if !(0..=constants::MAX_MIN_VALIDITY_DAYS).contains(&self.min_validity_days) {
            return Err(MarketError::Configuration(format!(
                "min_validity_days {} outside 0..={}",
                self.min_validity_days,
                constants::MAX_MIN_VALIDITY_DAYS
            )));
        }
        if self.duplicate_price_tolerance <= Decimal::ZERO
            || self.duplicate_price_tolerance >= Decimal::ONE
        {
            return Err(MarketError::Configuration(format!(
                "duplicate_price_tolerance {} outside (0, 1)",
                self.duplicate_price_tolerance
            )));
        }
        if !(self.fuzzy_similarity_threshold > 0.0 && self.fuzzy_similarity_threshold < 1.0) {
            return Err(MarketError::Configuration(format!(
                "fuzzy_similarity_threshold {} outside (0, 1)",
                self.fuzzy_similarity_threshold
            )));
        }
        if self.search_result_limit == 0
            || self.min_token_len == 0
            || self.fuzzy_token_len == 0
            || self.completion_retry_limit == 0
        {
            return Err(MarketError::Configuration(
                "limits and token lengths must be non-zero".into(),
            ));
        }
        if self.validity_month_days <= 0 || self.promotion_interval_secs == 0 {
            return Err(MarketError::Configuration(
                "validity_month_days and promotion_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn listing_ttl(&self) -> Duration {
        Duration::days(self.listing_ttl_days)
    }

    #[must_use]
    pub fn min_validity(&self) -> Duration {
        Duration::days(self.min_validity_days)
    }

    #[must_use]
    pub fn promotion_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.promotion_interval_secs)
    }
}
