//! Domain models for the Scryptex core.
//!
//! These are the JSON shapes persisted in the key-value store and sent over
//! the WebSocket gateway.

pub mod airdrop;
pub mod credit;
pub mod notification;
pub mod task;
pub mod user;

// Re-export all models for convenient access
pub use airdrop::{AirdropDraft, AirdropEntry};
pub use credit::{
    CreditPackage, PaymentMethod, Transaction, TransactionFilter, TransactionMeta,
    TransactionType,
};
pub use notification::{Notification, Severity};
pub use task::{Chain, FarmingLog, FarmingTask, LogKind, TaskCategory, TaskStatus};
pub use user::{ProjectKind, ReferralStats, User, UserPatch, XpLevel};
