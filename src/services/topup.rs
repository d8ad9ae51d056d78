use crate::error::{AppError, AppResult};
use crate::models::{CreditPackage, PaymentMethod, Severity, TransactionMeta};
use crate::services::{CreditLedger, NotificationCenter};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Percent off when any referral code is supplied
pub const REFERRAL_DISCOUNT_PCT: u64 = 20;

/// Price for one package, discount applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub package: CreditPackage,
    pub discount_pct: u64,
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Purchase {
    pub quote: Quote,
    pub method: PaymentMethod,
    pub balance: u64,
}

/// Credit package catalogue and simulated checkout
pub struct TopUpService {
    ledger: Arc<CreditLedger>,
    notifications: Arc<NotificationCenter>,
    packages: Vec<CreditPackage>,
}

impl TopUpService {
    pub fn new(ledger: Arc<CreditLedger>, notifications: Arc<NotificationCenter>) -> Self {
        Self {
            ledger,
            notifications,
            packages: default_packages(),
        }
    }

    pub fn packages(&self) -> &[CreditPackage] {
        &self.packages
    }

    pub fn quote(&self, package_id: &str, referral_code: Option<&str>) -> AppResult<Quote> {
        let package = self
            .packages
            .iter()
            .find(|p| p.id == package_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Credit package '{}'", package_id)))?;

        let discount_pct = match referral_code.map(str::trim) {
            Some(code) if !code.is_empty() => REFERRAL_DISCOUNT_PCT,
            _ => 0,
        };
        // round half up to whole dollars
        let price = (package.price * (100 - discount_pct) + 50) / 100;

        Ok(Quote {
            package,
            discount_pct,
            price,
        })
    }

    /// Payment is simulated; the package credits are added immediately
    pub fn purchase(
        &self,
        package_id: &str,
        referral_code: Option<&str>,
        method: PaymentMethod,
    ) -> AppResult<Purchase> {
        let quote = self.quote(package_id, referral_code)?;

        let balance = self.ledger.add_credits(
            quote.package.credits,
            TransactionMeta {
                method: Some(method.as_str().to_string()),
                package: Some(quote.package.id.clone()),
                price: Some(quote.price),
                action: None,
            },
        )?;

        self.notifications.add(
            "Credits Added",
            &format!(
                "{} credits have been added to your account.",
                quote.package.credits
            ),
            Severity::Success,
        )?;

        info!(
            "Purchased package '{}' for ${} via {}",
            quote.package.id,
            quote.price,
            method.as_str()
        );
        Ok(Purchase {
            quote,
            method,
            balance,
        })
    }
}

fn default_packages() -> Vec<CreditPackage> {
    [
        ("basic", "Basic", 100, 29, false),
        ("pro", "Pro", 500, 99, true),
        ("premium", "Premium", 1500, 249, false),
    ]
    .into_iter()
    .map(|(id, name, credits, price, recommended)| CreditPackage {
        id: id.to_string(),
        name: name.to_string(),
        credits,
        price,
        recommended,
    })
    .collect()
}
