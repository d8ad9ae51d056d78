use crate::error::{AppError, AppResult};
use crate::models::{ReferralStats, Severity, TransactionMeta};
use crate::services::{CreditLedger, NotificationCenter, UserService};
use std::sync::Arc;
use tracing::info;

pub const REFERRAL_REWARD: u64 = 10;
pub const COLLECT_BONUS: u64 = 5;
const REFERRAL_BASE_URL: &str = "https://scryptex.io/refer?code=";

/// Service for the invite program
pub struct ReferralService {
    users: Arc<UserService>,
    ledger: Arc<CreditLedger>,
    notifications: Arc<NotificationCenter>,
}

impl ReferralService {
    pub fn new(
        users: Arc<UserService>,
        ledger: Arc<CreditLedger>,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            users,
            ledger,
            notifications,
        }
    }

    pub fn referral_link(code: &str) -> String {
        format!("{}{}", REFERRAL_BASE_URL, code)
    }

    pub fn stats(&self) -> AppResult<ReferralStats> {
        let user = self.users.require_current()?;
        Ok(ReferralStats {
            link: Self::referral_link(&user.referral_code),
            code: user.referral_code,
            invites: user.invites,
            earned_credits: user.earned_credits,
        })
    }

    /// Record an invite and pay the referrer
    pub fn refer(&self, referee_email: &str) -> AppResult<ReferralStats> {
        let referee_email = referee_email.trim();
        if !is_plausible_email(referee_email) {
            return Err(AppError::Validation(format!(
                "Invalid referee email: {}",
                referee_email
            )));
        }

        let user = self.users.require_current()?;
        if user.email.eq_ignore_ascii_case(referee_email) {
            return Err(AppError::Validation("You cannot refer yourself".to_string()));
        }

        self.ledger.add_credits(
            REFERRAL_REWARD,
            TransactionMeta {
                method: Some("referral".to_string()),
                action: Some(format!("Referred {}", referee_email)),
                ..TransactionMeta::default()
            },
        )?;
        self.users.modify(|user| {
            user.invites += 1;
            user.earned_credits += REFERRAL_REWARD;
        })?;

        self.notifications.add(
            "Referral successful!",
            &format!(
                "You earned {} credits for referring {}",
                REFERRAL_REWARD, referee_email
            ),
            Severity::Success,
        )?;

        info!("{} referred {}", user.email, referee_email);
        self.stats()
    }

    /// Flat bonus from the referral page; returns the new balance
    pub fn collect_bonus(&self) -> AppResult<u64> {
        let balance = self
            .ledger
            .add_credits(COLLECT_BONUS, TransactionMeta::method("referral_bonus"))?;
        self.notifications.add(
            "Credits Added!",
            &format!("{} credits have been added to your account.", COLLECT_BONUS),
            Severity::Success,
        )?;
        Ok(balance)
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_check() {
        assert!(is_plausible_email("bob@example.com"));
        assert!(!is_plausible_email("bob"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("bob@localhost"));
    }

    #[test]
    fn test_link() {
        assert_eq!(
            ReferralService::referral_link("SCXAB12CD"),
            "https://scryptex.io/refer?code=SCXAB12CD"
        );
    }
}
