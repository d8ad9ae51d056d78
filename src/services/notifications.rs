use crate::clock::Clock;
use crate::config::NotificationConfig;
use crate::error::{option_to_result, AppError, AppResult};
use crate::events::{ChangeBus, ChangeEvent};
use crate::models::{Notification, Severity};
use crate::store::{keys, JsonStore};
use chrono::Duration;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Persisted list of user-facing alerts.
///
/// An alert whose title and message match one added less than
/// `dedup_window` ago is dropped.
pub struct NotificationCenter {
    store: JsonStore,
    bus: ChangeBus,
    clock: Arc<dyn Clock>,
    dedup_window: Duration,
    guard: Mutex<()>,
}

impl NotificationCenter {
    pub fn new(
        store: JsonStore,
        bus: ChangeBus,
        clock: Arc<dyn Clock>,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            dedup_window: config.dedup_window(),
            guard: Mutex::new(()),
        }
    }

    /// Add an alert. Returns `None` when it was suppressed as a duplicate.
    pub fn add(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
    ) -> AppResult<Option<Notification>> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        let mut list = self.load()?;

        let duplicate = list
            .iter()
            .any(|n| n.same_content(title, message) && now - n.timestamp < self.dedup_window);
        if duplicate {
            debug!("Suppressed duplicate notification '{}'", title);
            return Ok(None);
        }

        let notification = Notification::new(title, message, severity, now);
        list.insert(0, notification.clone());
        self.save(&list)?;

        info!("Notification added: {}", title);
        Ok(Some(notification))
    }

    /// Newest first, optionally truncated
    pub fn list(&self, limit: Option<usize>) -> AppResult<Vec<Notification>> {
        let mut list = self.load()?;
        if let Some(limit) = limit {
            list.truncate(limit);
        }
        Ok(list)
    }

    pub fn unread_count(&self) -> AppResult<usize> {
        Ok(self.load()?.iter().filter(|n| !n.read).count())
    }

    pub fn mark_read(&self, id: &str) -> AppResult<Notification> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let mut list = self.load()?;

        let entry = option_to_result(list.iter_mut().find(|n| n.id == id), "Notification not found")?;
        entry.read = true;
        let updated = entry.clone();

        self.save(&list)?;
        Ok(updated)
    }

    /// Returns how many were unread before the call
    pub fn mark_all_read(&self) -> AppResult<usize> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let mut list = self.load()?;

        let mut marked = 0;
        for n in list.iter_mut().filter(|n| !n.read) {
            n.read = true;
            marked += 1;
        }

        self.save(&list)?;
        Ok(marked)
    }

    pub fn delete(&self, id: &str) -> AppResult<()> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let mut list = self.load()?;

        let before = list.len();
        list.retain(|n| n.id != id);
        if list.len() == before {
            return Err(AppError::NotFound("Notification not found".to_string()));
        }

        self.save(&list)
    }

    pub fn clear(&self) -> AppResult<()> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        self.save(&[])
    }

    fn load(&self) -> AppResult<Vec<Notification>> {
        Ok(self
            .store
            .get_json::<Vec<Notification>>(keys::NOTIFICATIONS)?
            .unwrap_or_default())
    }

    fn save(&self, list: &[Notification]) -> AppResult<()> {
        self.store.set_json(keys::NOTIFICATIONS, list)?;
        self.bus.publish(ChangeEvent::NotificationsChanged {
            unread: list.iter().filter(|n| !n.read).count(),
            total: list.len(),
        });
        Ok(())
    }
}
