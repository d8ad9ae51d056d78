use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::events::{ChangeBus, ChangeEvent};
use crate::models::{Transaction, TransactionFilter, TransactionMeta, TransactionType};
use crate::store::{keys, JsonStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Result of a daily free-credit claim
#[derive(Debug, Clone, PartialEq)]
pub enum DailyCredit {
    Granted {
        balance: u64,
        next_claim_at: DateTime<Utc>,
    },
    NotYet {
        remaining: Duration,
    },
}

/// Credit balance plus its append-only transaction log.
///
/// All read-modify-write cycles go through `guard`, so concurrent callers
/// in one process never lose an update.
pub struct CreditLedger {
    store: JsonStore,
    bus: ChangeBus,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    guard: Mutex<()>,
}

impl CreditLedger {
    pub fn new(store: JsonStore, bus: ChangeBus, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            store,
            bus,
            clock,
            config,
            guard: Mutex::new(()),
        }
    }

    /// Current balance; the configured starting balance if none is stored
    pub fn balance(&self) -> AppResult<u64> {
        Ok(self
            .store
            .get_json::<u64>(keys::CREDITS)?
            .unwrap_or(self.config.initial_credits))
    }

    /// Debit `amount` if the balance covers it.
    ///
    /// Returns `false` and leaves everything untouched when it does not.
    pub fn spend(&self, amount: u64, action: &str) -> AppResult<bool> {
        Ok(self.try_debit(amount, action)?.is_ok())
    }

    /// [`spend`](Self::spend) plus the balance right after the attempt,
    /// read under the same lock as the debit.
    pub fn spend_with_balance(&self, amount: u64, action: &str) -> AppResult<(bool, u64)> {
        Ok(match self.try_debit(amount, action)? {
            Ok(balance) => (true, balance),
            Err(available) => (false, available),
        })
    }

    /// Like [`spend`](Self::spend) but turns a refusal into
    /// [`AppError::InsufficientCredits`] and returns the new balance.
    pub fn charge(&self, amount: u64, action: &str) -> AppResult<u64> {
        self.try_debit(amount, action)?
            .map_err(|available| AppError::InsufficientCredits {
                available,
                required: amount,
            })
    }

    /// Credit `amount`; always succeeds. Returns the new balance.
    pub fn add_credits(&self, amount: u64, meta: TransactionMeta) -> AppResult<u64> {
        validate_amount(amount)?;
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        self.credit_locked(amount, meta)
    }

    pub fn transactions(&self, filter: TransactionFilter) -> AppResult<Vec<Transaction>> {
        let all = self
            .store
            .get_json::<Vec<Transaction>>(keys::TRANSACTIONS)?
            .unwrap_or_default();
        Ok(all.into_iter().filter(|tx| filter.matches(tx)).collect())
    }

    /// Grant one free credit per period.
    ///
    /// The first claim always succeeds and starts the period.
    pub fn claim_daily_credit(&self) -> AppResult<DailyCredit> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();

        if let Some(expiry_ms) = self.store.get_json::<i64>(keys::FREE_CREDITS_EXPIRY)? {
            if let Some(expiry) = Utc.timestamp_millis_opt(expiry_ms).single() {
                if expiry > now {
                    debug!("Daily credit not due until {}", expiry);
                    return Ok(DailyCredit::NotYet {
                        remaining: expiry - now,
                    });
                }
            }
        }

        let balance = self.credit_locked(1, TransactionMeta::method("daily"))?;
        let next_claim_at = now + self.config.daily_credit_period();
        self.store
            .set_json(keys::FREE_CREDITS_EXPIRY, &next_claim_at.timestamp_millis())?;

        Ok(DailyCredit::Granted {
            balance,
            next_claim_at,
        })
    }

    /// Inner debit: `Ok(Ok(new_balance))` on success, `Ok(Err(available))`
    /// when the balance is too low.
    fn try_debit(&self, amount: u64, action: &str) -> AppResult<Result<u64, u64>> {
        validate_amount(amount)?;
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());

        let current = self.balance()?;
        if current < amount {
            warn!(
                "Spend rejected: available {}, required {} ({})",
                current, amount, action
            );
            return Ok(Err(current));
        }

        let balance = current - amount;
        self.commit(
            balance,
            TransactionType::Use,
            amount,
            TransactionMeta::action(action),
        )?;
        info!("Spent {} credits on '{}', balance {}", amount, action, balance);
        Ok(Ok(balance))
    }

    /// Caller must hold `guard`
    fn credit_locked(&self, amount: u64, meta: TransactionMeta) -> AppResult<u64> {
        let balance = self
            .balance()?
            .checked_add(amount)
            .ok_or_else(|| AppError::Validation("Credit balance overflow".to_string()))?;
        self.commit(balance, TransactionType::Topup, amount, meta)?;
        info!("Added {} credits, balance {}", amount, balance);
        Ok(balance)
    }

    fn commit(
        &self,
        balance: u64,
        kind: TransactionType,
        amount: u64,
        meta: TransactionMeta,
    ) -> AppResult<()> {
        let transaction = Transaction {
            kind,
            amount,
            timestamp: self.clock.now(),
            meta,
        };

        let previous = self
            .store
            .get_json::<Vec<Transaction>>(keys::TRANSACTIONS)?;
        let mut log = previous.clone().unwrap_or_default();
        log.push(transaction.clone());

        // Log first; a balance write that fails takes the entry back out
        self.store.set_json(keys::TRANSACTIONS, &log)?;
        if let Err(e) = self.store.set_json(keys::CREDITS, &balance) {
            let restored = match &previous {
                Some(entries) => self.store.set_json(keys::TRANSACTIONS, entries),
                None => self.store.remove(keys::TRANSACTIONS),
            };
            if let Err(restore_err) = restored {
                error!(
                    "Balance write failed and the transaction log could not be restored: {}",
                    restore_err
                );
            }
            return Err(e.into());
        }

        self.bus.publish(ChangeEvent::CreditsChanged { balance });
        self.bus
            .publish(ChangeEvent::TransactionRecorded { transaction });
        Ok(())
    }
}

fn validate_amount(amount: u64) -> AppResult<()> {
    if amount == 0 {
        return Err(AppError::Validation(
            "Credit amount must be positive".to_string(),
        ));
    }
    Ok(())
}
