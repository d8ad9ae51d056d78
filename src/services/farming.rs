use crate::clock::Clock;
use crate::config::FarmingConfig;
use crate::error::{AppError, AppResult};
use crate::events::{ChangeBus, ChangeEvent};
use crate::models::{Chain, FarmingLog, FarmingTask, LogKind, ProjectKind, Severity, TaskStatus};
use crate::services::{CreditLedger, NotificationCenter, UserService};
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

const RETRY_DETAIL: &str = "Transaction failed. Will retry...";

/// State of the current (or last) farming run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmingRun {
    pub id: Uuid,
    pub chain: Chain,
    pub wallet_address: String,
    pub tasks: Vec<FarmingTask>,
    pub logs: Vec<FarmingLog>,
    pub active: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl FarmingRun {
    pub fn completed_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count()
    }
}

/// Handle on a spawned run
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: Uuid,
    join: JoinHandle<AppResult<FarmingRun>>,
}

impl RunHandle {
    /// Wait for the driver to finish and return the final run state
    pub async fn wait(self) -> AppResult<FarmingRun> {
        self.join
            .await
            .map_err(|e| AppError::Message(format!("Farming driver panicked: {}", e)))?
    }
}

/// Simulated testnet farming.
///
/// One run at a time; its tasks are executed strictly in order by a spawned
/// driver. Each task succeeds with `success_rate`; a failed task is
/// re-marked completed after `retry_delay`, so a run always finishes.
/// There is no way to cancel a run once started.
#[derive(Clone)]
pub struct FarmingService {
    ledger: Arc<CreditLedger>,
    notifications: Arc<NotificationCenter>,
    users: Arc<UserService>,
    bus: ChangeBus,
    clock: Arc<dyn Clock>,
    config: FarmingConfig,
    cost: u64,
    rng: Arc<Mutex<ChaCha8Rng>>,
    run: Arc<RwLock<Option<FarmingRun>>>,
}

impl FarmingService {
    pub fn new(
        ledger: Arc<CreditLedger>,
        notifications: Arc<NotificationCenter>,
        users: Arc<UserService>,
        bus: ChangeBus,
        clock: Arc<dyn Clock>,
        config: FarmingConfig,
        cost: u64,
    ) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            ledger,
            notifications,
            users,
            bus,
            clock,
            config,
            cost,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            run: Arc::new(RwLock::new(None)),
        }
    }

    /// Charge the farming cost and spawn a run on `chain`
    pub async fn start(&self, chain: Chain, wallet_address: &str) -> AppResult<RunHandle> {
        let wallet_address = wallet_address.trim();
        if wallet_address.is_empty() {
            return Err(AppError::Validation("Wallet address is required".to_string()));
        }

        let run_id = {
            let mut slot = self.run.write().await;
            if slot.as_ref().is_some_and(|r| r.active) {
                return Err(AppError::Conflict(
                    "A farming run is already in progress".to_string(),
                ));
            }

            if self.cost > 0 {
                self.ledger
                    .charge(self.cost, &format!("Auto-farming on {}", chain))?;
            }

            let run = FarmingRun {
                id: Uuid::new_v4(),
                chain,
                wallet_address: wallet_address.to_string(),
                tasks: chain.tasks(),
                logs: Vec::new(),
                active: true,
                started_at: self.clock.now(),
                finished_at: None,
            };
            let run_id = run.id;
            *slot = Some(run);
            run_id
        };

        info!("Farming run {} started on {} for {}", run_id, chain, wallet_address);

        // Spawn before anything else can fail so a charged run always executes
        let driver = self.clone();
        let join = tokio::spawn(async move {
            let result = driver.drive(run_id, chain).await;
            if let Err(e) = &result {
                error!("Farming run {} aborted: {}", run_id, e);
                driver.abandon(run_id).await;
            }
            result
        });

        if let Err(e) = self.notifications.add(
            "Auto-farming started",
            &format!("Running {} tasks on {}", chain.tasks().len(), chain),
            Severity::Info,
        ) {
            warn!("Could not post start notification for run {}: {}", run_id, e);
        }

        Ok(RunHandle { run_id, join })
    }

    /// Current or most recent run
    pub async fn snapshot(&self) -> Option<FarmingRun> {
        self.run.read().await.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.run.read().await.as_ref().is_some_and(|r| r.active)
    }

    async fn drive(&self, run_id: Uuid, chain: Chain) -> AppResult<FarmingRun> {
        self.log(
            run_id,
            format!("Starting auto-farming on {}...", chain),
            LogKind::Info,
        )
        .await;

        let names: Vec<String> = chain.tasks().into_iter().map(|t| t.name).collect();

        for (index, name) in names.iter().enumerate() {
            self.update_task(run_id, index, |t| t.transition(TaskStatus::Running))
                .await?;
            self.log(run_id, format!("Running step: {}...", name), LogKind::Info)
                .await;

            let (execution, success) = self.draw_outcome();
            self.advance_progress(run_id, index, execution).await?;

            if success {
                self.update_task(run_id, index, |t| {
                    t.transition(TaskStatus::Completed)?;
                    t.progress = 100;
                    Ok(())
                })
                .await?;
                self.log(
                    run_id,
                    format!("Successfully completed: {}", name),
                    LogKind::Success,
                )
                .await;
            } else {
                warn!("Farming step '{}' failed, retrying", name);
                self.update_task(run_id, index, |t| {
                    t.transition(TaskStatus::Failed)?;
                    t.details = Some(RETRY_DETAIL.to_string());
                    Ok(())
                })
                .await?;
                self.log(
                    run_id,
                    format!("Failed: {}. Retrying...", name),
                    LogKind::Error,
                )
                .await;

                time::sleep(self.config.retry_delay()).await;

                self.update_task(run_id, index, |t| {
                    t.transition(TaskStatus::Completed)?;
                    t.details = None;
                    t.progress = 100;
                    Ok(())
                })
                .await?;
                self.log(
                    run_id,
                    format!("Retry successful: {}", name),
                    LogKind::Success,
                )
                .await;
            }
        }

        self.finish(run_id, chain).await
    }

    /// Random execution time and outcome for one step
    fn draw_outcome(&self) -> (Duration, bool) {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let millis = rng.gen_range(self.config.min_step_ms..self.config.max_step_ms);
        let success = rng.gen_bool(self.config.success_rate);
        (Duration::from_millis(millis), success)
    }

    /// Tick progress toward 100 until `execution` has elapsed.
    /// Stays below 100 until the outcome is known.
    async fn advance_progress(&self, run_id: Uuid, index: usize, execution: Duration) -> AppResult<()> {
        let started = Instant::now();
        let deadline = started + execution;
        let mut ticker = time::interval_at(started + self.config.tick(), self.config.tick());
        let expiry = time::sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                _ = &mut expiry => return Ok(()),
                _ = ticker.tick() => {
                    let elapsed = started.elapsed().as_millis();
                    let pct = (elapsed * 100 / execution.as_millis().max(1)).min(99) as u8;
                    self.update_task(run_id, index, |t| {
                        t.progress = t.progress.max(pct);
                        Ok(())
                    })
                    .await?;
                }
            }
        }
    }

    async fn finish(&self, run_id: Uuid, chain: Chain) -> AppResult<FarmingRun> {
        self.log(
            run_id,
            "Farming completed successfully!".to_string(),
            LogKind::Success,
        )
        .await;

        let finished = {
            let mut slot = self.run.write().await;
            let run = active_run(&mut *slot, run_id)?;
            run.active = false;
            run.finished_at = Some(self.clock.now());
            run.clone()
        };

        info!(
            "Farming run {} finished: {}/{} tasks completed",
            run_id,
            finished.completed_count(),
            finished.tasks.len()
        );
        self.bus.publish(ChangeEvent::FarmingFinished {
            run_id,
            chain: chain.display_name().to_string(),
        });

        self.notifications.add(
            "Farming completed",
            &format!("All tasks on {} finished", chain),
            Severity::Success,
        )?;

        // Only a signed-in user has a history to update
        if self.users.current()?.is_some() {
            self.users
                .record_project(ProjectKind::Farmed, chain.display_name())?;
            if self.config.completion_xp > 0 {
                self.users
                    .add_xp(self.config.completion_xp, &format!("Farming on {}", chain))?;
            }
        }

        Ok(finished)
    }

    /// Release the slot after the driver stopped early
    async fn abandon(&self, run_id: Uuid) {
        let mut slot = self.run.write().await;
        if let Ok(run) = active_run(&mut *slot, run_id) {
            run.active = false;
            run.finished_at = Some(self.clock.now());
        }
    }

    async fn update_task<F>(&self, run_id: Uuid, index: usize, f: F) -> AppResult<()>
    where
        F: FnOnce(&mut FarmingTask) -> AppResult<()>,
    {
        let task = {
            let mut slot = self.run.write().await;
            let run = active_run(&mut *slot, run_id)?;
            let task = run
                .tasks
                .get_mut(index)
                .ok_or_else(|| AppError::NotFound(format!("Task #{}", index + 1)))?;
            f(task)?;
            task.clone()
        };

        self.bus.publish(ChangeEvent::TaskUpdated { run_id, task });
        Ok(())
    }

    async fn log(&self, run_id: Uuid, message: String, kind: LogKind) {
        let entry = {
            let mut slot = self.run.write().await;
            let Some(run) = slot.as_mut().filter(|r| r.id == run_id) else {
                return;
            };
            let entry = FarmingLog {
                id: run.logs.len() as u32 + 1,
                message,
                timestamp: self.clock.now(),
                kind,
            };
            run.logs.push(entry.clone());
            entry
        };

        self.bus.publish(ChangeEvent::FarmingLog { run_id, log: entry });
    }
}

fn active_run(slot: &mut Option<FarmingRun>, run_id: Uuid) -> AppResult<&mut FarmingRun> {
    slot.as_mut()
        .filter(|r| r.id == run_id)
        .ok_or_else(|| AppError::NotFound(format!("Farming run {}", run_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::{LedgerConfig, NotificationConfig};
    use crate::store::JsonStore;

    fn service(config: FarmingConfig) -> FarmingService {
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
            LedgerConfig::default(),
        ));
        let users = Arc::new(UserService::new(
            store,
            bus.clone(),
            clock.clone(),
            notifications.clone(),
        ));
        FarmingService::new(ledger, notifications, users, bus, clock, config, 1)
    }

    #[test]
    fn test_outcomes_are_reproducible_with_a_seed() {
        let config = FarmingConfig {
            seed: Some(42),
            ..FarmingConfig::default()
        };
        let a = service(config.clone());
        let b = service(config);

        for _ in 0..10 {
            let (da, sa) = a.draw_outcome();
            let (db, sb) = b.draw_outcome();
            assert_eq!((da, sa), (db, sb));
            assert!(da >= Duration::from_millis(1000) && da < Duration::from_millis(3000));
        }
    }

    #[tokio::test]
    async fn test_empty_wallet_rejected() {
        let farming = service(FarmingConfig::default());
        assert!(matches!(
            farming.start(Chain::Sui, "  ").await,
            Err(AppError::Validation(_))
        ));
        assert!(farming.snapshot().await.is_none());
    }
}
