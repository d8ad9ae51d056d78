//! Scryptex Core Library
//!
//! Credit ledger, notification center, simulated farming runner and the
//! persistent store they share, plus the WebSocket gateway in front of them.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod store;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use clock::Clock;
use events::ChangeBus;
use services::*;
use std::sync::Arc;
use store::JsonStore;

/// Application state containing all services
#[derive(Clone)]
pub struct AppState {
    pub store: JsonStore,
    pub bus: ChangeBus,
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<CreditLedger>,
    pub notifications: Arc<NotificationCenter>,
    pub users: Arc<UserService>,
    pub farming: FarmingService,
    pub referrals: Arc<ReferralService>,
    pub actions: Arc<ActionService>,
    pub top_up: Arc<TopUpService>,
    pub airdrops: Arc<AirdropTracker>,
}

impl AppState {
    /// Wire every service onto one store, bus and clock
    pub fn new(config: &AppConfig, store: JsonStore, clock: Arc<dyn Clock>) -> Self {
        let bus = ChangeBus::default();

        let notifications = Arc::new(NotificationCenter::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            &config.notifications,
        ));
        let ledger = Arc::new(CreditLedger::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            config.ledger.clone(),
        ));
        let users = Arc::new(UserService::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            notifications.clone(),
        ));
        let farming = FarmingService::new(
            ledger.clone(),
            notifications.clone(),
            users.clone(),
            bus.clone(),
            clock.clone(),
            config.farming.clone(),
            config.ledger.farming_cost,
        );

        Self {
            referrals: Arc::new(ReferralService::new(
                users.clone(),
                ledger.clone(),
                notifications.clone(),
            )),
            actions: Arc::new(ActionService::new(
                ledger.clone(),
                users.clone(),
                notifications.clone(),
            )),
            top_up: Arc::new(TopUpService::new(ledger.clone(), notifications.clone())),
            airdrops: Arc::new(AirdropTracker::new(clock.clone())),
            store,
            bus,
            clock,
            ledger,
            notifications,
            users,
            farming,
        }
    }
}
