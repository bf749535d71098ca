//! Eligibility evaluator — hard gate for sell listings and controlled trades.
//!
//! ## Design Principles
//!
//! - **Fail-closed**: a provider error propagates; it never reads as eligible
//! - **Distinct reasons**: "no certificate", "too short", "supplier not
//!   approved" and "missing authorization" stay distinguishable
//! - **Read-only**: facts are produced elsewhere, the gate only reads them

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use coopmarket_types::{
    AuthorizationKind, CertificateFact, CertificateId, Clock, IneligibleReason, MarketConfig,
    MarketError, MemberId, Result, SubstanceFlags, SubstanceId, text,
};

use crate::provider::{AuthorizationProvider, CertificateProvider, SupplierApprovalProvider};

/// Outcome of [`EligibilityEvaluator::can_sell`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    /// Why not, when `eligible` is false.
    pub reason: Option<IneligibleReason>,
    /// A qualifying certificate, when `eligible` is true.
    pub certificate: Option<CertificateId>,
}

impl Eligibility {
    fn granted(cert: &CertificateFact) -> Self {
        Self {
            eligible: true,
            reason: None,
            certificate: Some(cert.id.clone()),
        }
    }

    fn denied(reason: IneligibleReason) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
            certificate: None,
        }
    }

    /// Convert into a `Result`, mapping a denial to `MarketError::Ineligible`.
    pub fn into_result(self) -> Result<CertificateId> {
        match (self.certificate, self.reason) {
            (Some(cert), _) if self.eligible => Ok(cert),
            (_, Some(reason)) => Err(MarketError::Ineligible(reason)),
            _ => Err(MarketError::Internal(
                "eligibility outcome without certificate or reason".into(),
            )),
        }
    }
}

/// Combines certificate, supplier and authorization facts.
pub struct EligibilityEvaluator {
    certificates: Arc<dyn CertificateProvider>,
    suppliers: Arc<dyn SupplierApprovalProvider>,
    authorizations: Arc<dyn AuthorizationProvider>,
    clock: Arc<dyn Clock>,
    min_validity: Duration,
}

impl EligibilityEvaluator {
    #[must_use]
    pub fn new(
        certificates: Arc<dyn CertificateProvider>,
        suppliers: Arc<dyn SupplierApprovalProvider>,
        authorizations: Arc<dyn AuthorizationProvider>,
        clock: Arc<dyn Clock>,
        config: &MarketConfig,
    ) -> Self {
        Self {
            certificates,
            suppliers,
            authorizations,
            clock,
            min_validity: config.min_validity(),
        }
    }

    /// Certificates must expire strictly after this instant to qualify.
    fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.min_validity
    }

    fn approved_suppliers(&self) -> Result<HashSet<String>> {
        Ok(self
            .suppliers
            .approved_names()?
            .iter()
            .map(|name| text::normalize(name))
            .collect())
    }

    /// Decide over a set of certificates already filtered to one substance.
    fn decide(
        certs: &[CertificateFact],
        horizon: DateTime<Utc>,
        approved: &HashSet<String>,
    ) -> Eligibility {
        let Some(best_expiry) = certs.iter().map(|c| c.expiry_date).max() else {
            return Eligibility::denied(IneligibleReason::NoCertificate);
        };

        let long_enough: Vec<&CertificateFact> =
            certs.iter().filter(|c| c.valid_after(horizon)).collect();
        if long_enough.is_empty() {
            return Eligibility::denied(IneligibleReason::CertificateTooShort {
                best_expiry,
                required_after: horizon,
            });
        }

        match long_enough
            .iter()
            .find(|c| approved.contains(&text::normalize(&c.supplier_name)))
        {
            Some(cert) => Eligibility::granted(cert),
            None => Eligibility::denied(IneligibleReason::SupplierNotApproved {
                supplier: long_enough[0].supplier_name.clone(),
            }),
        }
    }

    /// May `user` list `substance` for sale right now?
    ///
    /// Eligible iff the user holds at least one certificate for the
    /// substance that expires after `now + min_validity_days` **and** comes
    /// from a supplier whose normalized name is approved.
    pub fn can_sell(&self, user: MemberId, substance: &SubstanceId) -> Result<Eligibility> {
        let now = self.clock.now();
        let certs: Vec<CertificateFact> = self
            .certificates
            .valid_certificates(user)?
            .into_iter()
            .filter(|c| c.substance_id == *substance)
            .collect();

        let outcome = Self::decide(&certs, self.horizon(now), &self.approved_suppliers()?);
        match &outcome.reason {
            None => tracing::debug!(%user, %substance, "Sell eligibility granted"),
            Some(reason) => tracing::debug!(%user, %substance, %reason, "Sell eligibility denied"),
        }
        Ok(outcome)
    }

    /// Like [`can_sell`](Self::can_sell), but a denial is an error.
    pub fn require_sell(&self, user: MemberId, substance: &SubstanceId) -> Result<CertificateId> {
        self.can_sell(user, substance)?.into_result()
    }

    /// Every substance `user` may currently sell.
    pub fn sellable_substances(&self, user: MemberId) -> Result<HashSet<SubstanceId>> {
        let horizon = self.horizon(self.clock.now());
        let approved = self.approved_suppliers()?;
        Ok(self
            .certificates
            .valid_certificates(user)?
            .into_iter()
            .filter(|c| c.valid_after(horizon) && approved.contains(&text::normalize(&c.supplier_name)))
            .map(|c| c.substance_id)
            .collect())
    }

    /// Validate one specific certificate: it must belong to `user`, cover
    /// `substance`, and qualify under the same rules as [`can_sell`](Self::can_sell).
    ///
    /// Used for barter legs and for listings tied to a certificate lot.
    pub fn require_certificate(
        &self,
        user: MemberId,
        certificate: &CertificateId,
        substance: &SubstanceId,
    ) -> Result<CertificateFact> {
        let invalid = |reason: String| {
            MarketError::Ineligible(IneligibleReason::BarterCertificateInvalid { reason })
        };
        let cert = self
            .certificates
            .valid_certificates(user)?
            .into_iter()
            .find(|c| c.id == *certificate)
            .ok_or_else(|| invalid(format!("certificate {certificate} not held by member")))?;
        if cert.substance_id != *substance {
            return Err(invalid(format!(
                "certificate {certificate} covers {}, not {substance}",
                cert.substance_id
            )));
        }

        let outcome = Self::decide(
            std::slice::from_ref(&cert),
            self.horizon(self.clock.now()),
            &self.approved_suppliers()?,
        );
        match outcome.reason {
            None => Ok(cert),
            Some(reason) => Err(invalid(reason.to_string())),
        }
    }

    /// First authorization kind demanded by `flags` that `user` lacks.
    pub fn missing_authorization(
        &self,
        user: MemberId,
        flags: SubstanceFlags,
    ) -> Result<Option<AuthorizationKind>> {
        let required = flags.required_kinds();
        if required.is_empty() {
            return Ok(None);
        }
        let now = self.clock.now();
        let held = self.authorizations.authorizations(user)?;
        Ok(required
            .into_iter()
            .find(|kind| !held.iter().any(|a| a.kind == *kind && a.is_valid_at(now))))
    }

    /// Does `user` hold every authorization `flags` demands?
    pub fn can_trade_controlled(&self, user: MemberId, flags: SubstanceFlags) -> Result<bool> {
        Ok(self.missing_authorization(user, flags)?.is_none())
    }

    /// Fail unless `receiver` may take delivery of a substance with `flags`.
    pub fn require_controlled_receipt(&self, receiver: MemberId, flags: SubstanceFlags) -> Result<()> {
        match self.missing_authorization(receiver, flags)? {
            None => Ok(()),
            Some(kind) => {
                tracing::warn!(member = %receiver, %kind, "Controlled-substance gate failed");
                Err(MarketError::Ineligible(IneligibleReason::MissingAuthorization {
                    member: receiver,
                    kind,
                }))
            }
        }
    }

    /// Both counter-parties must independently hold the authorizations a
    /// controlled substance demands. The proposer is checked first.
    pub fn require_controlled_trade(
        &self,
        proposer: MemberId,
        owner: MemberId,
        flags: SubstanceFlags,
    ) -> Result<()> {
        if !flags.is_controlled() {
            return Ok(());
        }
        self.require_controlled_receipt(proposer, flags)?;
        self.require_controlled_receipt(owner, flags)
    }
}
