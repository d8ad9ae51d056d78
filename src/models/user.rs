use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered dashboard user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub name: String,
    pub join_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_handle: Option<String>,
    #[serde(default)]
    pub analyzed_projects: Vec<String>,
    #[serde(default)]
    pub farmed_projects: Vec<String>,
    #[serde(default)]
    pub tweeted_projects: Vec<String>,
    #[serde(default)]
    pub xp: u64,
    pub referral_code: String,
    #[serde(default)]
    pub invites: u32,
    /// Credits earned through referrals
    #[serde(default)]
    pub earned_credits: u64,
}

impl User {
    pub fn new(email: String, name: String, referral_code: String, join_date: DateTime<Utc>) -> Self {
        Self {
            email,
            name,
            join_date,
            wallet_address: None,
            twitter_handle: None,
            analyzed_projects: Vec::new(),
            farmed_projects: Vec::new(),
            tweeted_projects: Vec::new(),
            xp: 0,
            referral_code,
            invites: 0,
            earned_credits: 0,
        }
    }

    pub fn xp_level(&self) -> XpLevel {
        XpLevel::for_xp(self.xp)
    }

    pub fn projects_mut(&mut self, kind: ProjectKind) -> &mut Vec<String> {
        match kind {
            ProjectKind::Analyzed => &mut self.analyzed_projects,
            ProjectKind::Farmed => &mut self.farmed_projects,
            ProjectKind::Tweeted => &mut self.tweeted_projects,
        }
    }

    /// Merge a partial update; `Some` fields overwrite
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(wallet) = patch.wallet_address {
            self.wallet_address = Some(wallet);
        }
        if let Some(handle) = patch.twitter_handle {
            self.twitter_handle = Some(handle);
        }
        if let Some(projects) = patch.analyzed_projects {
            self.analyzed_projects = projects;
        }
        if let Some(projects) = patch.farmed_projects {
            self.farmed_projects = projects;
        }
        if let Some(projects) = patch.tweeted_projects {
            self.tweeted_projects = projects;
        }
        if let Some(xp) = patch.xp {
            self.xp = xp;
        }
        if let Some(invites) = patch.invites {
            self.invites = invites;
        }
        if let Some(earned) = patch.earned_credits {
            self.earned_credits = earned;
        }
    }
}

/// Partial user update. Email, join date and referral code are fixed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub wallet_address: Option<String>,
    pub twitter_handle: Option<String>,
    pub analyzed_projects: Option<Vec<String>>,
    pub farmed_projects: Option<Vec<String>>,
    pub tweeted_projects: Option<Vec<String>>,
    pub xp: Option<u64>,
    pub invites: Option<u32>,
    pub earned_credits: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Analyzed,
    Farmed,
    Tweeted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XpLevel {
    pub level: u8,
    pub title: &'static str,
}

impl XpLevel {
    pub const NOVICE: XpLevel = XpLevel {
        level: 0,
        title: "Novice",
    };

    pub fn for_xp(xp: u64) -> Self {
        let (level, title) = match xp {
            0..=9 => (1, "Explorer"),
            10..=24 => (2, "Contributor"),
            25..=49 => (3, "Builder"),
            50..=99 => (4, "Pioneer"),
            _ => (5, "Master"),
        };
        Self { level, title }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
    pub code: String,
    pub link: String,
    pub invites: u32,
    pub earned_credits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(
            "ada@example.com".into(),
            "Ada".into(),
            "SCXABC123".into(),
            Utc::now(),
        )
    }

    #[test]
    fn test_xp_levels() {
        assert_eq!(XpLevel::for_xp(0).title, "Explorer");
        assert_eq!(XpLevel::for_xp(10).level, 2);
        assert_eq!(XpLevel::for_xp(49).title, "Builder");
        assert_eq!(XpLevel::for_xp(99).title, "Pioneer");
        assert_eq!(XpLevel::for_xp(100).level, 5);
    }

    #[test]
    fn test_patch_merges_only_set_fields() {
        let mut u = user();
        u.apply(UserPatch {
            wallet_address: Some("0xabc".into()),
            xp: Some(12),
            ..UserPatch::default()
        });
        assert_eq!(u.name, "Ada");
        assert_eq!(u.wallet_address.as_deref(), Some("0xabc"));
        assert_eq!(u.xp_level().title, "Contributor");
    }

    #[test]
    fn test_camel_case_storage_shape() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("joinDate").is_some());
        assert!(json.get("referralCode").is_some());
        assert!(json.get("walletAddress").is_none());
    }
}
