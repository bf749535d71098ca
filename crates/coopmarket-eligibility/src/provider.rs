//! Provider traits for externally produced eligibility facts, plus
//! in-memory implementations.
//!
//! The in-memory providers back tests and single-process deployments;
//! a real deployment adapts the certificate store and the supplier
//! administration service behind the same traits.

use std::collections::{HashMap, HashSet};

use coopmarket_types::{AuthorizationFact, CertificateFact, MemberId, Result};
use parking_lot::RwLock;

/// Certificates of analysis held by members.
pub trait CertificateProvider: Send + Sync {
    /// All certificates on file for `user`, expired ones included; the
    /// evaluator applies the validity horizon itself.
    fn valid_certificates(&self, user: MemberId) -> Result<Vec<CertificateFact>>;
}

/// The approved-supplier list maintained by cooperative administration.
pub trait SupplierApprovalProvider: Send + Sync {
    /// Supplier names as entered by administrators (not normalized).
    fn approved_names(&self) -> Result<HashSet<String>>;
}

/// AE/PF authorizations held by members.
pub trait AuthorizationProvider: Send + Sync {
    fn authorizations(&self, user: MemberId) -> Result<Vec<AuthorizationFact>>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// Certificate store kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryCertificates {
    by_user: RwLock<HashMap<MemberId, Vec<CertificateFact>>>,
}

impl InMemoryCertificates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an uploaded certificate.
    pub fn upload(&self, cert: CertificateFact) {
        self.by_user.write().entry(cert.user_id).or_default().push(cert);
    }

    /// Drop every certificate of `user`.
    pub fn revoke_all(&self, user: MemberId) {
        self.by_user.write().remove(&user);
    }
}

impl CertificateProvider for InMemoryCertificates {
    fn valid_certificates(&self, user: MemberId) -> Result<Vec<CertificateFact>> {
        Ok(self.by_user.read().get(&user).cloned().unwrap_or_default())
    }
}

/// Approved-supplier list kept in memory.
#[derive(Debug, Default)]
pub struct InMemorySupplierApprovals {
    names: RwLock<HashSet<String>>,
}

impl InMemorySupplierApprovals {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: RwLock::new(names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn approve(&self, name: impl Into<String>) {
        self.names.write().insert(name.into());
    }
}

impl SupplierApprovalProvider for InMemorySupplierApprovals {
    fn approved_names(&self) -> Result<HashSet<String>> {
        Ok(self.names.read().clone())
    }
}

/// Authorization registry kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizations {
    by_user: RwLock<HashMap<MemberId, Vec<AuthorizationFact>>>,
}

impl InMemoryAuthorizations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, fact: AuthorizationFact) {
        self.by_user.write().entry(fact.user_id).or_default().push(fact);
    }
}

impl AuthorizationProvider for InMemoryAuthorizations {
    fn authorizations(&self, user: MemberId) -> Result<Vec<AuthorizationFact>> {
        Ok(self.by_user.read().get(&user).cloned().unwrap_or_default())
    }
}
