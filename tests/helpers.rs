#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use scryptex_core::clock::{Clock, ManualClock};
use scryptex_core::config::{AppConfig, FarmingConfig, StoreBackend, StoreConfig};
use scryptex_core::events::ChangeEvent;
use scryptex_core::models::*;
use scryptex_core::store::JsonStore;
use scryptex_core::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Fixed start of every test clock
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

/// Test configuration: memory store, seeded farming
pub fn test_config() -> AppConfig {
    AppConfig {
        farming: FarmingConfig {
            seed: Some(7),
            ..FarmingConfig::default()
        },
        ..AppConfig::default()
    }
}

/// Application wired to a manual clock
pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    /// Fresh app over an in-memory store
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::with_store(config, JsonStore::in_memory())
    }

    /// App over an existing store, e.g. a reopened file store
    pub fn with_store(config: AppConfig, store: JsonStore) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        Self {
            state: AppState::new(&config, store, dyn_clock),
            clock,
        }
    }

    /// Fresh app with a signed-in user
    pub fn signed_in() -> (Self, User) {
        let app = Self::new();
        let user = create_test_user(&app, "alice@example.com", "Alice");
        (app, user)
    }

    pub fn advance_ms(&self, ms: i64) {
        self.clock.advance(Duration::milliseconds(ms));
    }

    pub fn advance_hours(&self, hours: i64) {
        self.clock.advance(Duration::hours(hours));
    }
}

/// Helper function to sign up a test user
pub fn create_test_user(app: &TestApp, email: &str, name: &str) -> User {
    app.state
        .users
        .signup(email, name)
        .expect("Failed to create test user")
}

/// Helper function to build a complete airdrop draft
pub fn create_test_airdrop(name: &str, deadline: DateTime<Utc>) -> AirdropDraft {
    AirdropDraft {
        project_name: Some(name.to_string()),
        link: Some(format!("https://{}.xyz/airdrop", name.to_lowercase())),
        deadline: Some(deadline),
        description: Some(format!("Interact with {} contracts", name)),
        chain: Some("Ethereum".to_string()),
    }
}

/// File store config under a unique temp directory
pub fn scratch_store_config() -> StoreConfig {
    let dir: PathBuf = std::env::temp_dir().join(format!("scryptex-test-{}", uuid::Uuid::new_v4()));
    StoreConfig {
        backend: StoreBackend::File,
        path: dir.join("store.json"),
    }
}

pub fn remove_scratch_store(config: &StoreConfig) {
    if let Some(dir) = config.path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

/// Everything currently buffered on a bus receiver
pub fn drain_events(rx: &mut broadcast::Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Status history per task id, with consecutive repeats collapsed
pub fn status_history(events: &[ChangeEvent]) -> Vec<(u32, Vec<TaskStatus>)> {
    let mut history: Vec<(u32, Vec<TaskStatus>)> = Vec::new();
    for event in events {
        let ChangeEvent::TaskUpdated { task, .. } = event else {
            continue;
        };
        match history.iter_mut().find(|(id, _)| *id == task.id) {
            Some((_, statuses)) => {
                if statuses.last() != Some(&task.status) {
                    statuses.push(task.status);
                }
            }
            None => history.push((task.id, vec![task.status])),
        }
    }
    history
}
