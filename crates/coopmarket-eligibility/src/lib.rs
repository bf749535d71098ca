//! # coopmarket-eligibility
//!
//! **Eligibility gate**: decides whether a member may list a substance for
//! sale and whether both parties may trade a controlled substance.
//!
//! ## Architecture
//!
//! The gate only *reads* facts produced elsewhere:
//! 1. **CertificateProvider**: certificates of analysis held per member
//! 2. **SupplierApprovalProvider**: the approved-supplier name set
//! 3. **AuthorizationProvider**: AE/PF regulatory authorizations per member
//! 4. **EligibilityEvaluator**: combines them into a fail-closed decision
//!
//! ## Flow
//!
//! ```text
//! listing create / draft promotion → EligibilityEvaluator.can_sell()
//! proposal submit                  → EligibilityEvaluator.require_controlled_trade()
//! ```

pub mod evaluator;
pub mod provider;

pub use evaluator::{Eligibility, EligibilityEvaluator};
pub use provider::{
    AuthorizationProvider, CertificateProvider, InMemoryAuthorizations, InMemoryCertificates,
    InMemorySupplierApprovals, SupplierApprovalProvider,
};
