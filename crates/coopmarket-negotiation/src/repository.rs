//! Proposal storage with compare-and-swap updates on [`Proposal::version`].

use std::collections::HashMap;
use std::sync::Arc;

use coopmarket_types::{MarketError, MemberId, OfferId, Proposal, ProposalId, Result};
use parking_lot::RwLock;

/// Persistence for proposals.
pub trait ProposalRepository: Send + Sync {
    /// # Errors
    /// `AlreadyExists` if the id is taken.
    fn create(&self, proposal: Proposal) -> Result<Proposal>;

    fn get(&self, id: ProposalId) -> Result<Option<Proposal>>;

    /// Replace a proposal if its stored version still equals
    /// `proposal.version`; the stored copy comes back one version up.
    ///
    /// This is the single atomic check-and-act every proposal transition
    /// goes through.
    fn update(&self, proposal: Proposal) -> Result<Proposal>;

    /// All proposals, oldest id first.
    fn list(&self) -> Result<Vec<Proposal>>;

    fn list_for_offer(&self, offer: OfferId) -> Result<Vec<Proposal>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.offer_id == offer)
            .collect())
    }

    fn list_by_proposer(&self, proposer: MemberId) -> Result<Vec<Proposal>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.proposer_id == proposer)
            .collect())
    }
}

/// Thread-safe, cloneable in-memory proposal store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProposalRepository {
    data: Arc<RwLock<HashMap<ProposalId, Proposal>>>,
}

impl InMemoryProposalRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProposalRepository for InMemoryProposalRepository {
    fn create(&self, proposal: Proposal) -> Result<Proposal> {
        let mut guard = self.data.write();
        if guard.contains_key(&proposal.id) {
            return Err(MarketError::AlreadyExists(proposal.id.to_string()));
        }
        guard.insert(proposal.id, proposal.clone());
        Ok(proposal)
    }

    fn get(&self, id: ProposalId) -> Result<Option<Proposal>> {
        Ok(self.data.read().get(&id).cloned())
    }

    fn update(&self, mut proposal: Proposal) -> Result<Proposal> {
        let mut guard = self.data.write();
        let stored = guard
            .get_mut(&proposal.id)
            .ok_or(MarketError::ProposalNotFound(proposal.id))?;
        if stored.version != proposal.version {
            return Err(MarketError::VersionConflict {
                entity: proposal.id.to_string(),
                expected: proposal.version,
                found: stored.version,
            });
        }
        proposal.version += 1;
        *stored = proposal.clone();
        Ok(proposal)
    }

    fn list(&self) -> Result<Vec<Proposal>> {
        let mut all: Vec<Proposal> = self.data.read().values().cloned().collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }
}
