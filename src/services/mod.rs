pub mod actions;
pub mod airdrops;
pub mod farming;
pub mod ledger;
pub mod notifications;
pub mod referral;
pub mod topup;
pub mod users;

pub use actions::{ActionOutcome, ActionService};
pub use airdrops::AirdropTracker;
pub use farming::{FarmingRun, FarmingService, RunHandle};
pub use ledger::{CreditLedger, DailyCredit};
pub use notifications::NotificationCenter;
pub use referral::ReferralService;
pub use topup::{Purchase, Quote, TopUpService};
pub use users::UserService;
