//! Farming task models and the fixed per-chain task lists

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Task lifecycle.
///
/// Allowed moves: pending -> running -> completed, running -> failed,
/// and the scripted retry failed -> completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Failed, Self::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskCategory {
    #[serde(rename = "NFT")]
    Nft,
    #[serde(rename = "DEX")]
    Dex,
    Bridge,
    Contract,
    Other,
}

/// One simulated on-chain step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmingTask {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub category: TaskCategory,
    pub required: bool,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl FarmingTask {
    pub fn new(id: u32, name: &str, category: TaskCategory, required: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            category,
            required,
            status: TaskStatus::Pending,
            progress: 0,
            details: None,
        }
    }

    /// Move to `next`, rejecting anything outside the allowed lifecycle
    pub fn transition(&mut self, next: TaskStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "Task {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmingLog {
    pub id: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogKind,
}

/// Testnets with a scripted farming routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Zksync,
    Sui,
    Aptos,
    Scroll,
}

impl Chain {
    pub const ALL: [Chain; 4] = [Chain::Zksync, Chain::Sui, Chain::Aptos, Chain::Scroll];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Zksync => "zksync",
            Self::Sui => "sui",
            Self::Aptos => "aptos",
            Self::Scroll => "scroll",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Zksync => "zkSync Era",
            Self::Sui => "Sui",
            Self::Aptos => "Aptos",
            Self::Scroll => "Scroll",
        }
    }

    /// Fresh task list for this chain, all pending
    pub fn tasks(&self) -> Vec<FarmingTask> {
        use TaskCategory::*;

        let steps: [(&str, TaskCategory, bool); 5] = match self {
            Self::Zksync => [
                ("Connect to zkSync Era", Other, true),
                ("Bridge funds from Ethereum", Bridge, true),
                ("Execute swap on SyncSwap", Dex, true),
                ("Provide liquidity to pools", Dex, false),
                ("Interact with dApps", Contract, false),
            ],
            Self::Sui => [
                ("Connect to Sui Network", Other, true),
                ("Claim Sui testnet tokens", Other, true),
                ("Execute transactions", Contract, true),
                ("Stake SUI tokens", Contract, false),
                ("Use Sui dApps", Contract, false),
            ],
            Self::Aptos => [
                ("Connect to Aptos Network", Other, true),
                ("Claim APT testnet tokens", Other, true),
                ("Execute transactions", Contract, true),
                ("Provide liquidity on DEXes", Dex, false),
                ("Interact with Aptos NFTs", Nft, false),
            ],
            Self::Scroll => [
                ("Connect to Scroll Network", Other, true),
                ("Bridge ETH to Scroll", Bridge, true),
                ("Swap tokens on DEXes", Dex, true),
                ("Mint NFTs on Scroll", Nft, false),
                ("Test cross-chain messaging", Bridge, false),
            ],
        };

        steps
            .iter()
            .zip(1u32..)
            .map(|(&(name, category, required), id)| FarmingTask::new(id, name, category, required))
            .collect()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Chain {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::ALL
            .into_iter()
            .find(|c| c.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::Validation(format!("Unknown chain: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Completed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Running.can_transition_to(Pending));
    }

    #[test]
    fn test_transition_rejects_skip() {
        let mut task = FarmingTask::new(1, "Connect", TaskCategory::Other, true);
        assert!(task.transition(TaskStatus::Completed).is_err());
        assert_eq!(task.status, TaskStatus::Pending);
        task.transition(TaskStatus::Running).unwrap();
        task.transition(TaskStatus::Completed).unwrap();
        assert!(task.status.is_terminal());
    }

    #[test]
    fn test_every_chain_has_five_ordered_tasks() {
        for chain in Chain::ALL {
            let tasks = chain.tasks();
            assert_eq!(tasks.len(), 5);
            assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
            assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
        }
        assert_eq!(Chain::Zksync.tasks()[0].name, "Connect to zkSync Era");
    }

    #[test]
    fn test_chain_parse() {
        assert_eq!("SUI".parse::<Chain>().unwrap(), Chain::Sui);
        assert!("solana".parse::<Chain>().is_err());
    }
}
