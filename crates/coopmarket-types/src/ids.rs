//! Identifiers used throughout CoopMarket.
//!
//! Entities created by the core (offers, proposals, members) use UUIDv7 for
//! time-ordered sorting. Substances and certificates are owned by external
//! collaborators and keep whatever string key those systems hand out.
//! Transaction ids are derived, never random.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants;

// ---------------------------------------------------------------------------
// OfferId
// ---------------------------------------------------------------------------

/// Globally unique listing identifier. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OfferId(pub Uuid);

impl OfferId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OfferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offer:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ProposalId
// ---------------------------------------------------------------------------

/// Globally unique proposal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MemberId
// ---------------------------------------------------------------------------

/// A cooperative member (cooperado) account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SubstanceId / CertificateId (externally assigned)
// ---------------------------------------------------------------------------

/// Catalog key of a raw-material substance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SubstanceId(pub String);

impl SubstanceId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a certificate of analysis (laudo) in the certificate store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CertificateId(pub String);

impl CertificateId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Identifier of a completed trade.
///
/// Always derived from the originating proposal, so every completion path
/// for the same proposal computes the **same** id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    /// `SHA-256(domain || proposal_id)`, truncated to 16 bytes.
    #[must_use]
    pub fn for_proposal(proposal_id: ProposalId) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(constants::TRANSACTION_ID_DOMAIN);
        hasher.update(proposal_id.0.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_id_uniqueness() {
        let a = OfferId::new();
        let b = OfferId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn proposal_id_ordering() {
        let a = ProposalId::new();
        let b = ProposalId::new();
        assert!(a < b);
    }

    #[test]
    fn transaction_id_is_deterministic_per_proposal() {
        let p = ProposalId::new();
        assert_eq!(TransactionId::for_proposal(p), TransactionId::for_proposal(p));
        assert_ne!(
            TransactionId::for_proposal(p),
            TransactionId::for_proposal(ProposalId::new())
        );
    }

    #[test]
    fn display_prefixes() {
        assert!(OfferId::new().to_string().starts_with("offer:"));
        assert!(ProposalId::new().to_string().starts_with("proposal:"));
        assert_eq!(SubstanceId::new("vit-d3").to_string(), "vit-d3");
    }

    #[test]
    fn substance_id_serializes_as_plain_string() {
        let id = SubstanceId::new("colageno");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"colageno\"");
    }
}
