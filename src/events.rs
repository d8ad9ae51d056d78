//! Typed change notifications.
//!
//! Every service mutation is published here; the WebSocket gateway and any
//! other in-process observer subscribe instead of re-reading the store.

use crate::models::{FarmingLog, FarmingTask, Transaction, User};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    CreditsChanged {
        balance: u64,
    },
    TransactionRecorded {
        transaction: Transaction,
    },
    NotificationsChanged {
        unread: usize,
        total: usize,
    },
    TaskUpdated {
        run_id: Uuid,
        task: FarmingTask,
    },
    FarmingLog {
        run_id: Uuid,
        log: FarmingLog,
    },
    FarmingFinished {
        run_id: Uuid,
        chain: String,
    },
    UserChanged {
        user: Option<User>,
    },
}

impl ChangeEvent {
    /// Subscription channel the event belongs to
    pub fn channel(&self) -> &'static str {
        match self {
            Self::CreditsChanged { .. } | Self::TransactionRecorded { .. } => "credits",
            Self::NotificationsChanged { .. } => "notifications",
            Self::TaskUpdated { .. } | Self::FarmingLog { .. } | Self::FarmingFinished { .. } => {
                "farming"
            }
            Self::UserChanged { .. } => "user",
        }
    }
}

/// Broadcast fan-out of [`ChangeEvent`]s
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish; having no subscribers is not an error
    pub fn publish(&self, event: ChangeEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("No subscribers for {} event", e.0.channel());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = ChangeBus::default();
        let mut rx = bus.subscribe();
        bus.publish(ChangeEvent::CreditsChanged { balance: 7 });

        match rx.recv().await.unwrap() {
            ChangeEvent::CreditsChanged { balance } => assert_eq!(balance, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = ChangeBus::default();
        bus.publish(ChangeEvent::NotificationsChanged {
            unread: 0,
            total: 0,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(ChangeEvent::CreditsChanged { balance: 3 }).unwrap();
        assert_eq!(json["event"], "credits_changed");
        assert_eq!(json["balance"], 3);
    }
}
