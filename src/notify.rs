use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::engine::{Alert, AvailabilityChange, Severity};
use crate::limits::NOTIFY_CHANNEL_CAPACITY;
use crate::model::AvailabilityQuery;

/// Events the engine intends to publish. Built by the engine, dispatched by
/// the service layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notice {
    AvailabilityChanged {
        hotel_id: Ulid,
        change: AvailabilityChange,
    },
    InventoryAlert {
        hotel_id: Ulid,
        severity: Severity,
        message: String,
        alert: Alert,
        query: AvailabilityQuery,
    },
    DataSourceFailure {
        hotel_id: Ulid,
        error_kind: String,
        error: String,
        query: AvailabilityQuery,
    },
}

impl Notice {
    pub fn inventory_alert(alert: Alert, query: &AvailabilityQuery) -> Self {
        Notice::InventoryAlert {
            hotel_id: query.hotel_id,
            severity: alert.severity(),
            message: alert.to_string(),
            alert,
            query: query.clone(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Notice::AvailabilityChanged { .. } => "availability_changed",
            Notice::InventoryAlert { .. } => "inventory_alert",
            Notice::DataSourceFailure { .. } => "data_source_failure",
        }
    }

    pub fn hotel_id(&self) -> Ulid {
        match self {
            Notice::AvailabilityChanged { hotel_id, .. }
            | Notice::InventoryAlert { hotel_id, .. }
            | Notice::DataSourceFailure { hotel_id, .. } => *hotel_id,
        }
    }
}

/// Outbound notification transport. Fire-and-forget: implementations log
/// their own failures and never block the caller.
pub trait NotifierGateway: Send + Sync {
    fn publish_hotel_event(&self, hotel_id: Ulid, notice: &Notice);
    fn publish_admin_event(&self, notice: &Notice);
}

/// In-process broadcast hub: one channel per hotel plus an admin channel.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notice>>,
    admin: broadcast::Sender<Notice>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            admin: broadcast::channel(NOTIFY_CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to a hotel's notices. Creates the channel if needed.
    pub fn subscribe(&self, hotel_id: Ulid) -> broadcast::Receiver<Notice> {
        let sender = self
            .channels
            .entry(hotel_id)
            .or_insert_with(|| broadcast::channel(NOTIFY_CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    pub fn subscribe_admin(&self) -> broadcast::Receiver<Notice> {
        self.admin.subscribe()
    }

    /// Remove a hotel channel once nobody listens any more.
    pub fn prune(&self, hotel_id: &Ulid) {
        self.channels
            .remove_if(hotel_id, |_, sender| sender.receiver_count() == 0);
    }
}

impl NotifierGateway for NotifyHub {
    /// No-op if nobody is listening.
    fn publish_hotel_event(&self, hotel_id: Ulid, notice: &Notice) {
        if let Some(sender) = self.channels.get(&hotel_id) {
            let _ = sender.send(notice.clone());
        }
    }

    fn publish_admin_event(&self, notice: &Notice) {
        let _ = self.admin.send(notice.clone());
    }
}
