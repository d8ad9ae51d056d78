//! Credit transaction and top-up package models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    #[serde(rename = "use")]
    Use,
    #[serde(rename = "topup")]
    Topup,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Use => "use",
            Self::Topup => "topup",
        }
    }
}

/// Descriptive fields attached to a transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
}

impl TransactionMeta {
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn method(method: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            ..Self::default()
        }
    }
}

/// Ledger entry, stored under `creditTransactions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(rename = "credits")]
    pub amount: u64,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub meta: TransactionMeta,
}

/// History view selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionFilter {
    #[default]
    All,
    Topup,
    Usage,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            Self::All => true,
            Self::Topup => tx.kind == TransactionType::Topup,
            Self::Usage => tx.kind == TransactionType::Use,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Onchain,
    Offchain,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onchain => "onchain",
            Self::Offchain => "offchain",
        }
    }
}

/// Purchasable bundle of credits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPackage {
    pub id: String,
    pub name: String,
    pub credits: u64,
    /// Whole US dollars
    pub price: u64,
    pub recommended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_json_shape() {
        let tx = Transaction {
            kind: TransactionType::Use,
            amount: 4,
            timestamp: Utc::now(),
            meta: TransactionMeta::action("Analyze project"),
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "use");
        assert_eq!(json["credits"], 4);
        assert_eq!(json["action"], "Analyze project");
        assert!(json.get("method").is_none());
    }

    #[test]
    fn test_filter() {
        let topup = Transaction {
            kind: TransactionType::Topup,
            amount: 50,
            timestamp: Utc::now(),
            meta: TransactionMeta::default(),
        };
        assert!(TransactionFilter::Topup.matches(&topup));
        assert!(!TransactionFilter::Usage.matches(&topup));
        assert!(TransactionFilter::All.matches(&topup));
    }
}
