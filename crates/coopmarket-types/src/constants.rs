//! System-wide constants for the CoopMarket negotiation core.

/// Days a listing stays discoverable after creation or extension.
pub const DEFAULT_LISTING_TTL_DAYS: i64 = 7;

/// Longest accepted listing TTL (ten years).
pub const MAX_LISTING_TTL_DAYS: i64 = 3_650;

/// A certificate must remain valid at least this many days past `now`
/// for its holder to list the substance for sale.
pub const DEFAULT_MIN_VALIDITY_DAYS: i64 = 30;

/// Longest accepted certificate validity horizon (one hundred years).
pub const MAX_MIN_VALIDITY_DAYS: i64 = 36_500;

/// Duplicate-listing price band, as a fraction of the existing price (5%).
pub const DEFAULT_DUPLICATE_PRICE_TOLERANCE_BPS: i64 = 500;

/// Maximum substances returned by a single catalog search.
pub const DEFAULT_SEARCH_RESULT_LIMIT: usize = 10;

/// Levenshtein similarity must be strictly greater than this to match.
pub const DEFAULT_FUZZY_SIMILARITY_THRESHOLD: f64 = 0.70;

/// Minimum token length for the token-containment matching pass.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 2;

/// Minimum token length for the edit-distance and prefix matching pass.
pub const DEFAULT_FUZZY_TOKEN_LEN: usize = 3;

/// Length of a "month" when converting product expiry into validity months.
pub const DEFAULT_VALIDITY_MONTH_DAYS: i64 = 30;

/// Fallback draft re-evaluation interval (seconds).
pub const DEFAULT_PROMOTION_INTERVAL_SECS: u64 = 5;

/// Optimistic-version retries before `mark_complete` gives up.
pub const DEFAULT_COMPLETION_RETRY_LIMIT: usize = 8;

/// Domain separator for deterministic transaction identifiers.
pub const TRANSACTION_ID_DOMAIN: &[u8] = b"coopmarket:transaction_id:v1:";

/// Domain separator for transaction audit digests.
pub const TRANSACTION_DIGEST_DOMAIN: &[u8] = b"coopmarket:transaction_digest:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
