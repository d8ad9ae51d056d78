use crate::error::{AppError, AppResult};
use crate::models::{ProjectKind, Severity};
use crate::services::{CreditLedger, NotificationCenter, UserService};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Credits and XP for one project analysis
pub const ANALYZE_COST: u64 = 1;
pub const ANALYZE_XP: u64 = 2;
/// Credits and XP for one tweet plan
pub const TWEET_COST: u64 = 1;
pub const TWEET_XP: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub kind: ProjectKind,
    pub project: String,
    pub balance: u64,
    pub xp: u64,
}

/// Paid project actions: analysis and tweet generation
pub struct ActionService {
    ledger: Arc<CreditLedger>,
    users: Arc<UserService>,
    notifications: Arc<NotificationCenter>,
}

impl ActionService {
    pub fn new(
        ledger: Arc<CreditLedger>,
        users: Arc<UserService>,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            ledger,
            users,
            notifications,
        }
    }

    /// Charge for `kind` on `project`, then record it and award XP.
    ///
    /// Nothing is recorded when the balance is short.
    pub fn perform(&self, kind: ProjectKind, project: &str) -> AppResult<ActionOutcome> {
        let project = project.trim();
        if project.is_empty() {
            return Err(AppError::Validation("Project name is required".to_string()));
        }

        let (cost, xp, action) = match kind {
            ProjectKind::Analyzed => (ANALYZE_COST, ANALYZE_XP, format!("Analyzed {}", project)),
            ProjectKind::Tweeted => (TWEET_COST, TWEET_XP, format!("Tweet plan for {}", project)),
            ProjectKind::Farmed => {
                return Err(AppError::Validation(
                    "Farming runs are started through the farming service".to_string(),
                ))
            }
        };

        let user = self.users.require_current()?;

        let balance = match self.ledger.charge(cost, &action) {
            Ok(balance) => balance,
            Err(e) => {
                if e.is_out_of_credits() {
                    warn!("{} could not afford {}", user.email, action);
                }
                return Err(e);
            }
        };

        self.users.record_project(kind, project)?;
        let xp = self.users.add_xp(xp, &action)?.unwrap_or(user.xp);

        let (title, message) = match kind {
            ProjectKind::Analyzed => (
                format!("Analysis completed for {}", project),
                "All sections have been analyzed and are ready to view.".to_string(),
            ),
            _ => (
                "Twitter content plan generated".to_string(),
                format!("Created content for {}", project),
            ),
        };
        self.notifications.add(&title, &message, Severity::Success)?;

        info!("{}: {} (balance {})", user.email, action, balance);
        Ok(ActionOutcome {
            kind,
            project: project.to_string(),
            balance,
            xp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, SystemClock};
    use crate::config::{LedgerConfig, NotificationConfig};
    use crate::events::ChangeBus;
    use crate::models::TransactionFilter;
    use crate::store::JsonStore;

    struct Fixture {
        actions: ActionService,
        ledger: Arc<CreditLedger>,
        users: Arc<UserService>,
        notifications: Arc<NotificationCenter>,
    }

    fn fixture(initial_credits: u64) -> Fixture {
        let store = JsonStore::in_memory();
        let bus = ChangeBus::default();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let notifications = Arc::new(NotificationCenter::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            &NotificationConfig::default(),
        ));
        let ledger = Arc::new(CreditLedger::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            LedgerConfig {
                initial_credits,
                ..LedgerConfig::default()
            },
        ));
        let users = Arc::new(UserService::new(store, bus, clock, notifications.clone()));
        Fixture {
            actions: ActionService::new(ledger.clone(), users.clone(), notifications.clone()),
            ledger,
            users,
            notifications,
        }
    }

    #[test]
    fn test_analyze_charges_records_and_rewards() {
        let f = fixture(6);
        f.users.signup("ada@example.com", "Ada").unwrap();

        let outcome = f.actions.perform(ProjectKind::Analyzed, "LayerZero").unwrap();
        assert_eq!(outcome.balance, 5);
        assert_eq!(outcome.xp, ANALYZE_XP);

        let user = f.users.current().unwrap().unwrap();
        assert_eq!(user.analyzed_projects, vec!["LayerZero".to_string()]);
        assert_eq!(user.xp, ANALYZE_XP);

        let spent = f.ledger.transactions(TransactionFilter::Usage).unwrap();
        assert_eq!(spent.len(), 1);
        assert_eq!(spent[0].meta.action.as_deref(), Some("Analyzed LayerZero"));

        let titles: Vec<String> = f
            .notifications
            .list(None)
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert!(titles.contains(&"Analysis completed for LayerZero".to_string()));
        assert!(titles.contains(&"+2 XP Earned".to_string()));
    }

    #[test]
    fn test_tweet_lands_in_tweeted_projects() {
        let f = fixture(6);
        f.users.signup("ada@example.com", "Ada").unwrap();

        f.actions.perform(ProjectKind::Tweeted, "Scroll").unwrap();
        f.actions.perform(ProjectKind::Tweeted, "Scroll").unwrap();

        let user = f.users.current().unwrap().unwrap();
        assert_eq!(user.tweeted_projects, vec!["Scroll".to_string()]);
        assert!(user.analyzed_projects.is_empty());
        assert_eq!(user.xp, 2 * TWEET_XP);
        assert_eq!(f.ledger.balance().unwrap(), 4);
    }

    #[test]
    fn test_out_of_credits_records_nothing() {
        let f = fixture(0);
        f.users.signup("ada@example.com", "Ada").unwrap();

        let err = f.actions.perform(ProjectKind::Analyzed, "Zora").unwrap_err();
        assert!(err.is_out_of_credits());

        let user = f.users.current().unwrap().unwrap();
        assert!(user.analyzed_projects.is_empty());
        assert_eq!(user.xp, 0);
        assert!(f.ledger.transactions(TransactionFilter::All).unwrap().is_empty());
    }

    #[test]
    fn test_requires_session_and_project() {
        let f = fixture(6);
        assert!(matches!(
            f.actions.perform(ProjectKind::Analyzed, "Zora"),
            Err(AppError::Unauthorized(_))
        ));
        assert_eq!(f.ledger.balance().unwrap(), 6);

        f.users.signup("ada@example.com", "Ada").unwrap();
        assert!(matches!(
            f.actions.perform(ProjectKind::Tweeted, "   "),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            f.actions.perform(ProjectKind::Farmed, "Sui"),
            Err(AppError::Validation(_))
        ));
        assert_eq!(f.ledger.balance().unwrap(), 6);
    }
}
