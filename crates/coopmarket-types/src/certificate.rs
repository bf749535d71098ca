//! Eligibility facts produced by external collaborators.
//!
//! The core never issues or stores certificates or authorizations; it only
//! reads these facts through provider traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthorizationKind, CertificateId, MemberId, SubstanceId};

/// A certificate of analysis (laudo) held by a member for one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateFact {
    pub id: CertificateId,
    pub user_id: MemberId,
    pub substance_id: SubstanceId,
    pub expiry_date: DateTime<Utc>,
    pub supplier_name: String,
    pub has_attachment: bool,
}

impl CertificateFact {
    /// Still valid strictly after `horizon`.
    #[must_use]
    pub fn valid_after(&self, horizon: DateTime<Utc>) -> bool {
        self.expiry_date > horizon
    }
}

/// A regulatory authorization (AE/PF) held by a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationFact {
    pub user_id: MemberId,
    pub kind: AuthorizationKind,
    pub expiry_date: DateTime<Utc>,
    pub approved: bool,
}

impl AuthorizationFact {
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.approved && self.expiry_date > now
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl CertificateFact {
    /// A certificate from `supplier` valid for `days` more days.
    pub fn dummy(
        user_id: MemberId,
        substance_id: &SubstanceId,
        supplier: &str,
        now: DateTime<Utc>,
        days: i64,
    ) -> Self {
        Self {
            id: CertificateId::new(format!("LAUDO-{:08}", rand::random::<u32>())),
            user_id,
            substance_id: substance_id.clone(),
            expiry_date: now + chrono::Duration::days(days),
            supplier_name: supplier.to_string(),
            has_attachment: true,
        }
    }
}
