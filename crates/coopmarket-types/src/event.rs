//! Notification events and the sink they are delivered through.
//!
//! Delivery transport (push, e-mail, websocket) lives outside the core.
//! A failed delivery is logged by the caller and never rolls back the
//! mutation that produced the event.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MemberId, OfferId, ProposalId, Result, TransactionId};

/// Something a member should hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MarketEvent {
    ProposalReceived {
        proposal: ProposalId,
        offer: OfferId,
        from: MemberId,
        quantity: Decimal,
    },
    ProposalAccepted {
        proposal: ProposalId,
    },
    ProposalRejected {
        proposal: ProposalId,
        reason: Option<String>,
    },
    ProposalCountered {
        proposal: ProposalId,
        quantity: Decimal,
    },
    /// The other side confirmed completion; waiting on the recipient.
    CompletionConfirmed {
        proposal: ProposalId,
        by: MemberId,
    },
    TransactionCompleted {
        proposal: ProposalId,
        transaction: TransactionId,
    },
    /// A draft listing went live after its owner became eligible.
    ListingPromoted {
        offer: OfferId,
    },
    BidPlaced {
        offer: OfferId,
        bidder: MemberId,
        amount: Decimal,
    },
}

impl MarketEvent {
    /// Short stable name, used as a log field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProposalReceived { .. } => "proposal_received",
            Self::ProposalAccepted { .. } => "proposal_accepted",
            Self::ProposalRejected { .. } => "proposal_rejected",
            Self::ProposalCountered { .. } => "proposal_countered",
            Self::CompletionConfirmed { .. } => "completion_confirmed",
            Self::TransactionCompleted { .. } => "transaction_completed",
            Self::ListingPromoted { .. } => "listing_promoted",
            Self::BidPlaced { .. } => "bid_placed",
        }
    }
}

/// Delivers events to members.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, member: MemberId, event: MarketEvent) -> Result<()>;
}

/// Deliver through `sink`, logging instead of failing on transport errors.
pub fn notify_or_log(sink: &dyn NotificationSink, member: MemberId, event: MarketEvent) {
    let name = event.name();
    if let Err(err) = sink.notify(member, event) {
        tracing::warn!(%member, event = name, error = %err, "Notification delivery failed");
    }
}

/// Sink that only logs. Default when no transport is plugged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, member: MemberId, event: MarketEvent) -> Result<()> {
        tracing::info!(%member, event = event.name(), payload = ?event, "Notification");
        Ok(())
    }
}

/// Sink that keeps every event for assertions.
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: parking_lot::Mutex<Vec<(MemberId, MarketEvent)>>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(MemberId, MarketEvent)> {
        self.events.lock().clone()
    }

    /// Events delivered to `member`, oldest first.
    pub fn events_for(&self, member: MemberId) -> Vec<MarketEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(m, _)| *m == member)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl NotificationSink for RecordingSink {
    fn notify(&self, member: MemberId, event: MarketEvent) -> Result<()> {
        self.events.lock().push((member, event));
        Ok(())
    }
}
