use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::events::{ChangeBus, ChangeEvent};
use crate::models::{ProjectKind, Severity, User, UserPatch, XpLevel};
use crate::services::NotificationCenter;
use crate::store::{keys, JsonStore};
use rand::Rng;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Service for the signed-in user session and the registered-users list.
///
/// Sessions are mocked: there is no password, an email identifies a user.
pub struct UserService {
    store: JsonStore,
    bus: ChangeBus,
    clock: Arc<dyn Clock>,
    notifications: Arc<NotificationCenter>,
    guard: Mutex<()>,
}

impl UserService {
    pub fn new(
        store: JsonStore,
        bus: ChangeBus,
        clock: Arc<dyn Clock>,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            notifications,
            guard: Mutex::new(()),
        }
    }

    /// Register a new user and open a session for them
    pub fn signup(&self, email: &str, name: &str) -> AppResult<User> {
        let email = email.trim();
        let name = name.trim();
        if !email.contains('@') {
            return Err(AppError::Validation("A valid email is required".to_string()));
        }
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }

        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let mut users = self.registered()?;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let user = User::new(
            email.to_string(),
            name.to_string(),
            generate_referral_code(),
            self.clock.now(),
        );
        users.push(user.clone());
        self.store.set_json(keys::USERS, &users)?;
        self.open_session(&user)?;

        info!("User signed up: {}", user.email);
        Ok(user)
    }

    pub fn login(&self, email: &str) -> AppResult<User> {
        let user = self
            .registered()?
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .ok_or_else(|| {
                warn!("Login failed for {}", email);
                AppError::Unauthorized("Invalid email or password".to_string())
            })?;

        self.open_session(&user)?;
        info!("User logged in: {}", user.email);
        Ok(user)
    }

    /// Close the session; the registered-users list is kept
    pub fn logout(&self) -> AppResult<()> {
        self.store.remove(keys::IS_LOGGED_IN)?;
        self.store.remove(keys::USER)?;
        self.bus.publish(ChangeEvent::UserChanged { user: None });
        Ok(())
    }

    pub fn current(&self) -> AppResult<Option<User>> {
        let logged_in = self
            .store
            .get_json::<bool>(keys::IS_LOGGED_IN)?
            .unwrap_or(false);
        if !logged_in {
            return Ok(None);
        }
        Ok(self.store.get_json::<User>(keys::USER)?)
    }

    pub fn require_current(&self) -> AppResult<User> {
        self.current()?
            .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))
    }

    /// Merge `patch` into the session user and the registered copy
    pub fn update(&self, patch: UserPatch) -> AppResult<User> {
        self.modify(|user| user.apply(patch))
    }

    /// Read-modify-write of the session user under the service lock.
    /// Counters must be bumped here rather than through an absolute patch.
    pub fn modify<F>(&self, f: F) -> AppResult<User>
    where
        F: FnOnce(&mut User),
    {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let mut user = self.require_current()?;
        f(&mut user);
        self.persist(&user)?;
        Ok(user)
    }

    pub fn connect_wallet(&self, address: &str) -> AppResult<User> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AppError::Validation("Wallet address is required".to_string()));
        }
        self.update(UserPatch {
            wallet_address: Some(address.to_string()),
            ..UserPatch::default()
        })
    }

    pub fn connect_twitter(&self, handle: &str) -> AppResult<User> {
        let handle = handle.trim().trim_start_matches('@');
        if handle.is_empty() {
            return Err(AppError::Validation("Twitter handle is required".to_string()));
        }
        self.update(UserPatch {
            twitter_handle: Some(handle.to_string()),
            ..UserPatch::default()
        })
    }

    /// Award XP to the session user. Returns the new total, or `None`
    /// when nobody is logged in.
    pub fn add_xp(&self, amount: u64, action: &str) -> AppResult<Option<u64>> {
        if self.current()?.is_none() {
            return Ok(None);
        }

        let xp = self.modify(|user| user.xp = user.xp.saturating_add(amount))?.xp;

        self.notifications.add(
            &format!("+{} XP Earned", amount),
            &format!("You earned XP for: {}", action),
            Severity::Success,
        )?;
        Ok(Some(xp))
    }

    pub fn xp_level(&self) -> AppResult<XpLevel> {
        Ok(self
            .current()?
            .map(|u| u.xp_level())
            .unwrap_or(XpLevel::NOVICE))
    }

    /// Remember a project in one of the user's history lists
    pub fn record_project(&self, kind: ProjectKind, name: &str) -> AppResult<User> {
        self.modify(|user| {
            let projects = user.projects_mut(kind);
            if !projects.iter().any(|p| p == name) {
                projects.push(name.to_string());
            }
        })
    }

    fn registered(&self) -> AppResult<Vec<User>> {
        Ok(self
            .store
            .get_json::<Vec<User>>(keys::USERS)?
            .unwrap_or_default())
    }

    fn open_session(&self, user: &User) -> AppResult<()> {
        self.store.set_json(keys::IS_LOGGED_IN, &true)?;
        self.store.set_json(keys::USER, user)?;
        self.bus.publish(ChangeEvent::UserChanged {
            user: Some(user.clone()),
        });
        Ok(())
    }

    fn persist(&self, user: &User) -> AppResult<()> {
        self.store.set_json(keys::USER, user)?;

        let mut users = self.registered()?;
        if let Some(slot) = users.iter_mut().find(|u| u.email == user.email) {
            *slot = user.clone();
            self.store.set_json(keys::USERS, &users)?;
        }

        self.bus.publish(ChangeEvent::UserChanged {
            user: Some(user.clone()),
        });
        Ok(())
    }
}

/// `SCX` followed by six uppercase alphanumerics
pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| REFERRAL_ALPHABET[rng.gen_range(0..REFERRAL_ALPHABET.len())] as char)
        .collect();
    format!("SCX{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::NotificationConfig;

    fn service() -> UserService {
        let store = JsonStore::in_memory();
        let bus = ChangeBus::default();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let notifications = Arc::new(NotificationCenter::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            &NotificationConfig::default(),
        ));
        UserService::new(store, bus, clock, notifications)
    }

    #[test]
    fn test_referral_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), 9);
        assert!(code.starts_with("SCX"));
        assert!(code[3..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_signup_login_logout() {
        let users = service();
        let created = users.signup("ada@example.com", "Ada").unwrap();
        assert_eq!(users.current().unwrap(), Some(created.clone()));

        users.logout().unwrap();
        assert_eq!(users.current().unwrap(), None);

        let back = users.login("ADA@example.com").unwrap();
        assert_eq!(back.referral_code, created.referral_code);
    }

    #[test]
    fn test_duplicate_signup_and_unknown_login() {
        let users = service();
        users.signup("ada@example.com", "Ada").unwrap();
        assert!(matches!(
            users.signup("ada@example.com", "Other"),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            users.login("bob@example.com"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_update_survives_relogin() {
        let users = service();
        users.signup("ada@example.com", "Ada").unwrap();
        users.connect_wallet("0x1234").unwrap();
        users.connect_twitter("@ada").unwrap();
        users.logout().unwrap();

        let user = users.login("ada@example.com").unwrap();
        assert_eq!(user.wallet_address.as_deref(), Some("0x1234"));
        assert_eq!(user.twitter_handle.as_deref(), Some("ada"));
    }

    #[test]
    fn test_xp_requires_session() {
        let users = service();
        assert_eq!(users.add_xp(5, "Analyze").unwrap(), None);
        assert_eq!(users.xp_level().unwrap(), XpLevel::NOVICE);

        users.signup("ada@example.com", "Ada").unwrap();
        assert_eq!(users.add_xp(12, "Analyze").unwrap(), Some(12));
        assert_eq!(users.xp_level().unwrap().title, "Contributor");
    }

    #[test]
    fn test_concurrent_xp_awards_all_land() {
        let users = Arc::new(service());
        users.signup("ada@example.com", "Ada").unwrap();

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let users = users.clone();
                std::thread::spawn(move || {
                    for j in 0..5 {
                        users.add_xp(1, &format!("task {}-{}", i, j)).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(users.current().unwrap().unwrap().xp, 40);
    }

    #[test]
    fn test_record_project_dedups() {
        let users = service();
        users.signup("ada@example.com", "Ada").unwrap();
        users.record_project(ProjectKind::Farmed, "zkSync Era").unwrap();
        let user = users.record_project(ProjectKind::Farmed, "zkSync Era").unwrap();
        assert_eq!(user.farmed_projects, vec!["zkSync Era".to_string()]);
    }
}
