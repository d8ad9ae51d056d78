use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{AirdropDraft, AirdropEntry};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Session-local airdrop bookmarks. Never written to the store.
pub struct AirdropTracker {
    clock: Arc<dyn Clock>,
    entries: RwLock<Vec<AirdropEntry>>,
}

impl AirdropTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn add(&self, draft: AirdropDraft) -> AppResult<AirdropEntry> {
        let project_name = required(draft.project_name, "Project name")?;
        if project_name.chars().count() > 100 {
            return Err(AppError::Validation(
                "Project name must be at most 100 characters".to_string(),
            ));
        }
        let link = required(draft.link, "Link")?;
        if !(link.starts_with("http://") || link.starts_with("https://")) {
            return Err(AppError::Validation(format!("Invalid link: {}", link)));
        }
        let deadline = draft
            .deadline
            .ok_or_else(|| AppError::Validation("Deadline is required".to_string()))?;

        let entry = AirdropEntry {
            id: Uuid::new_v4(),
            project_name,
            link,
            deadline,
            description: required(draft.description, "Description")?,
            chain: required(draft.chain, "Chain")?,
        };

        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(entry)
    }

    pub fn list(&self) -> Vec<AirdropEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Entries whose deadline has not passed, soonest first
    pub fn upcoming(&self) -> Vec<AirdropEntry> {
        let now = self.clock.now();
        let mut upcoming: Vec<_> = self
            .list()
            .into_iter()
            .filter(|e| !e.is_expired(now))
            .collect();
        upcoming.sort_by_key(|e| e.deadline);
        upcoming
    }

    pub fn remove(&self, id: Uuid) -> AppResult<AirdropEntry> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Airdrop {}", id)))?;
        Ok(entries.remove(index))
    }
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, Utc};

    fn draft(name: &str, days: i64) -> AirdropDraft {
        AirdropDraft {
            project_name: Some(name.to_string()),
            link: Some("https://layerzero.network/airdrop".to_string()),
            deadline: Some(Utc::now() + Duration::days(days)),
            description: Some("Use the bridge".to_string()),
            chain: Some("Multiple".to_string()),
        }
    }

    #[test]
    fn test_missing_field_rejected() {
        let tracker = AirdropTracker::new(Arc::new(ManualClock::new(Utc::now())));
        let mut incomplete = draft("LayerZero", 10);
        incomplete.chain = Some("   ".to_string());
        assert!(matches!(tracker.add(incomplete), Err(AppError::Validation(_))));
        assert!(tracker.list().is_empty());
    }

    #[test]
    fn test_upcoming_sorted_and_remove() {
        let tracker = AirdropTracker::new(Arc::new(ManualClock::new(Utc::now())));
        let late = tracker.add(draft("Late", 30)).unwrap();
        tracker.add(draft("Soon", 3)).unwrap();
        tracker.add(draft("Gone", -1)).unwrap();

        let names: Vec<_> = tracker
            .upcoming()
            .into_iter()
            .map(|e| e.project_name)
            .collect();
        assert_eq!(names, vec!["Soon", "Late"]);

        tracker.remove(late.id).unwrap();
        assert_eq!(tracker.list().len(), 2);
        assert!(tracker.remove(late.id).unwrap_err().is_not_found());
    }
}
