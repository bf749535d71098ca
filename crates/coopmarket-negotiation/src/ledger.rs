//! Transaction ledger — append-only, idempotent by [`TransactionId`].
//!
//! Like a settlement idempotency guard: a transaction id can only be
//! recorded once. Appending the same id again with the same content is a
//! no-op that reports [`Append::AlreadyRecorded`], which lets a completion
//! path that raced (or crashed after sealing the proposal) safely re-append.
//! Appending the same id with different content is an integrity fault.

use std::collections::HashMap;

use coopmarket_types::{MarketError, MemberId, Result, Transaction, TransactionId};
use parking_lot::RwLock;

/// Result of [`TransactionLedger::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    Recorded,
    AlreadyRecorded,
}

/// Append-only store of completed trades.
pub trait TransactionLedger: Send + Sync {
    /// # Errors
    /// `AlreadyExists` if the id is recorded with a different digest.
    fn append(&self, tx: Transaction) -> Result<Append>;

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Trades `member` took part in, in recording order.
    fn for_member(&self, member: MemberId) -> Result<Vec<Transaction>>;
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: Vec<Transaction>,
    index: HashMap<TransactionId, usize>,
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionLedger for InMemoryLedger {
    fn append(&self, tx: Transaction) -> Result<Append> {
        let mut state = self.state.write();
        if let Some(&at) = state.index.get(&tx.id) {
            if state.entries[at].audit_digest == tx.audit_digest {
                return Ok(Append::AlreadyRecorded);
            }
            tracing::error!(tx = %tx.id, "Ledger digest mismatch for recorded transaction");
            return Err(MarketError::AlreadyExists(tx.id.to_string()));
        }
        let at = state.entries.len();
        state.index.insert(tx.id, at);
        tracing::info!(tx = %tx.id, proposal = %tx.proposal_id, digest = %tx.audit_digest, "Transaction recorded");
        state.entries.push(tx);
        Ok(Append::Recorded)
    }

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let state = self.state.read();
        Ok(state.index.get(&id).map(|&at| state.entries[at].clone()))
    }

    fn for_member(&self, member: MemberId) -> Result<Vec<Transaction>> {
        Ok(self
            .state
            .read()
            .entries
            .iter()
            .filter(|tx| tx.involves(member))
            .cloned()
            .collect())
    }
}
