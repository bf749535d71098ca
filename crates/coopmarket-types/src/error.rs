//! Error types for the CoopMarket negotiation core.
//!
//! All errors use the `CM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by the class of failure the caller sees:
//! - 1xx: Validation (user-correctable, rejected before any mutation)
//! - 2xx: Eligibility (certificate / supplier / authorization gate)
//! - 3xx: Permission (ownership, moderator rights)
//! - 4xx: Not found (stale ids, caller should refresh)
//! - 5xx: Conflict (concurrent mutation of the same entity)
//! - 9xx: General / internal errors

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AuthorizationKind, MemberId, OfferId, ProposalId, SubstanceId};

/// Why an eligibility gate refused an operation.
///
/// The variants are kept distinct so the presentation layer can tell a
/// member *which* paperwork is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IneligibleReason {
    /// The member holds no certificate for the substance.
    NoCertificate,
    /// A certificate exists but none outlives the required horizon.
    CertificateTooShort {
        best_expiry: DateTime<Utc>,
        required_after: DateTime<Utc>,
    },
    /// Certificates are long enough, but none comes from an approved supplier.
    SupplierNotApproved { supplier: String },
    /// A party to a controlled-substance trade lacks an AE/PF authorization.
    MissingAuthorization {
        member: MemberId,
        kind: AuthorizationKind,
    },
    /// The certificate backing a barter leg does not qualify.
    BarterCertificateInvalid { reason: String },
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCertificate => write!(f, "no certificate"),
            Self::CertificateTooShort {
                best_expiry,
                required_after,
            } => write!(
                f,
                "certificate too short: best expiry {best_expiry}, must be after {required_after}"
            ),
            Self::SupplierNotApproved { supplier } => {
                write!(f, "supplier not approved: {supplier}")
            }
            Self::MissingAuthorization { member, kind } => {
                write!(f, "missing {kind} authorization for member {member}")
            }
            Self::BarterCertificateInvalid { reason } => {
                write!(f, "barter certificate invalid: {reason}")
            }
        }
    }
}

/// Coarse error taxonomy callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Ineligible,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

/// Central error enum for all CoopMarket operations.
#[derive(Debug, Error)]
pub enum MarketError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// A field failed validation (bad price, missing required value, ...).
    #[error("CM_ERR_100: Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Requested quantity is non-positive or exceeds what the listing offers.
    #[error("CM_ERR_101: Invalid quantity {requested}: must be > 0 and <= {available}")]
    InvalidQuantity {
        requested: Decimal,
        available: Decimal,
    },

    /// The entity cannot perform this transition from its current state.
    #[error("CM_ERR_102: Cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    /// A near-identical listing already exists; merge quantities instead.
    #[error("CM_ERR_103: Duplicate listing, merge quantity into {existing}")]
    DuplicateListing { existing: OfferId },

    // =================================================================
    // Eligibility Errors (2xx)
    // =================================================================
    /// Certificate, supplier or authorization gate failed.
    #[error("CM_ERR_200: Ineligible: {0}")]
    Ineligible(IneligibleReason),

    // =================================================================
    // Permission Errors (3xx)
    // =================================================================
    /// The caller lacks ownership or the required role.
    #[error("CM_ERR_300: Forbidden: {reason}")]
    Forbidden { reason: String },

    // =================================================================
    // Not Found Errors (4xx)
    // =================================================================
    #[error("CM_ERR_400: Offer not found: {0}")]
    OfferNotFound(OfferId),

    #[error("CM_ERR_401: Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    #[error("CM_ERR_402: Substance not found: {0}")]
    SubstanceNotFound(SubstanceId),

    // =================================================================
    // Conflict Errors (5xx)
    // =================================================================
    /// Optimistic version check failed; the stored record moved on.
    #[error("CM_ERR_500: Version conflict on {entity}: expected {expected}, found {found}")]
    VersionConflict {
        entity: String,
        expected: u64,
        found: u64,
    },

    /// The record already exists (create with a reused id).
    #[error("CM_ERR_501: Already exists: {0}")]
    AlreadyExists(String),

    /// Retries against a contended record were exhausted.
    #[error("CM_ERR_502: Contention on {entity} after {attempts} attempts")]
    Contention { entity: String, attempts: usize },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    #[error("CM_ERR_900: Internal error: {0}")]
    Internal(String),

    #[error("CM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    #[error("CM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// The backing store failed; nothing was committed.
    #[error("CM_ERR_903: Storage error: {0}")]
    Storage(String),
}

impl MarketError {
    /// Shorthand for a validation failure.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Shorthand for a permission failure.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// The taxonomy class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }
            | Self::InvalidQuantity { .. }
            | Self::InvalidTransition { .. }
            | Self::DuplicateListing { .. } => ErrorKind::Validation,
            Self::Ineligible(_) => ErrorKind::Ineligible,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::OfferNotFound(_) | Self::ProposalNotFound(_) | Self::SubstanceNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::VersionConflict { .. } | Self::AlreadyExists(_) | Self::Contention { .. } => {
                ErrorKind::Conflict
            }
            Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MarketError>;

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = MarketError::OfferNotFound(OfferId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("CM_ERR_400"), "Got: {msg}");
    }

    #[test]
    fn invalid_quantity_display() {
        let err = MarketError::InvalidQuantity {
            requested: Decimal::new(150, 0),
            available: Decimal::new(100, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("CM_ERR_101"));
        assert!(msg.contains("150"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn invalid_quantity_is_validation_class() {
        let err = MarketError::InvalidQuantity {
            requested: Decimal::ZERO,
            available: Decimal::ONE,
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn ineligible_reason_is_rendered() {
        let err = MarketError::Ineligible(IneligibleReason::SupplierNotApproved {
            supplier: "Acme".into(),
        });
        let msg = format!("{err}");
        assert!(msg.contains("CM_ERR_200"));
        assert!(msg.contains("Acme"));
        assert_eq!(err.kind(), ErrorKind::Ineligible);
    }

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(MarketError::forbidden("x").kind(), ErrorKind::Forbidden);
        assert_eq!(
            MarketError::ProposalNotFound(ProposalId::new()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            MarketError::VersionConflict {
                entity: "offer".into(),
                expected: 1,
                found: 2
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(MarketError::Storage("down".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn all_errors_have_cm_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(MarketError::validation("price", "must be positive")),
            Box::new(MarketError::Ineligible(IneligibleReason::NoCertificate)),
            Box::new(MarketError::DuplicateListing {
                existing: OfferId::new(),
            }),
            Box::new(MarketError::Internal("test".into())),
            Box::new(MarketError::Contention {
                entity: "proposal".into(),
                attempts: 8,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("CM_ERR_"),
                "Error missing CM_ERR_ prefix: {msg}"
            );
        }
    }
}
