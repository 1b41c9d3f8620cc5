//! Egress event bus (spec.md §6): the host subscribes to these instead of
//! polling. Realized as a bounded `tokio::sync::mpsc` channel per
//! SPEC_FULL §5's actor-per-component model — a full queue sheds the
//! oldest-interest event rather than blocking the component that raised it.

use qnet_consensus::BanRequest;
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 4_096;

#[derive(Debug, Clone)]
pub enum NodeEvent {
    RoundFinalized { round_number: u64, winner: Option<String> },
    LeaderSelected { round_number: u64, node_id: String },
    MicroblockProduced { height: u64, tx_count: usize },
    MacroblockSealed { height: u64, micro_count: usize },
    WindowDistributed { window_index: u64, eligible_count: usize },
    NodeStatusChanged { node_id: String, status: String },
    PhaseTransitioned { transitioned_at: u64 },
    BanRequested(BanRequest),
}

#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::Sender<NodeEvent>,
}

pub struct EventSubscriber {
    receiver: mpsc::Receiver<NodeEvent>,
}

impl EventBus {
    pub fn new() -> (Self, EventSubscriber) {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { sender }, EventSubscriber { receiver })
    }

    /// Best-effort publish: a full channel (an unsubscribed or slow host)
    /// drops the event rather than blocking the producing component.
    pub fn publish(&self, event: NodeEvent) {
        if let Err(dropped) = self.sender.try_send(event) {
            tracing::warn!(?dropped, "event bus full, dropping event");
        }
    }
}

impl EventSubscriber {
    pub async fn recv(&mut self) -> Option<NodeEvent> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_event_is_received() {
        let (bus, mut sub) = EventBus::new();
        bus.publish(NodeEvent::MicroblockProduced { height: 1, tx_count: 3 });
        let event = sub.recv().await.unwrap();
        assert!(matches!(event, NodeEvent::MicroblockProduced { height: 1, tx_count: 3 }));
    }
}
