use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Airdrop bookmark as entered by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirdropDraft {
    pub project_name: Option<String>,
    pub link: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub chain: Option<String>,
}

/// Validated bookmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirdropEntry {
    pub id: Uuid,
    pub project_name: String,
    pub link: String,
    pub deadline: DateTime<Utc>,
    pub description: String,
    pub chain: String,
}

impl AirdropEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now
    }
}
