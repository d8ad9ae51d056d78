use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Longest accepted daily-credit period (ten years)
pub const MAX_DAILY_CREDIT_SECS: u64 = 10 * 365 * 24 * 60 * 60;
/// Longest accepted notification dedup window (one day)
pub const MAX_DEDUP_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Which key-value backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    File,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(format!(
                "Invalid STORE_BACKEND: {}. Must be one of: [\"memory\", \"file\"]",
                other
            )),
        }
    }
}

/// Key-value store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

/// Credit ledger configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Balance assumed when nothing is stored yet
    pub initial_credits: u64,
    /// Credits charged to start a farming run
    pub farming_cost: u64,
    pub daily_credit_secs: u64,
}

/// Notification center configuration
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub dedup_window_ms: u64,
}

/// Farming simulator configuration
#[derive(Debug, Clone)]
pub struct FarmingConfig {
    pub success_rate: f64,
    pub min_step_ms: u64,
    pub max_step_ms: u64,
    pub retry_delay_ms: u64,
    pub tick_ms: u64,
    /// Fixed RNG seed; random when unset
    pub seed: Option<u64>,
    /// XP awarded when a run finishes
    pub completion_xp: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub ledger: LedgerConfig,
    pub notifications: NotificationConfig,
    pub farming: FarmingConfig,
    pub log_level: String,
    pub ws_port: Option<u16>,
    pub environment: String,
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

impl StoreConfig {
    /// Create store config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let backend = match env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse::<StoreBackend>()?,
            Err(_) => StoreBackend::File,
        };

        let path = env::var("STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/store.json"));

        Ok(Self { backend, path })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: PathBuf::from("./data/store.json"),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();
        let config = Self {
            initial_credits: parse_env("INITIAL_CREDITS").unwrap_or(defaults.initial_credits),
            farming_cost: parse_env("FARMING_COST").unwrap_or(defaults.farming_cost),
            daily_credit_secs: parse_env("DAILY_CREDIT_SECS")
                .unwrap_or(defaults.daily_credit_secs),
        };

        if config.daily_credit_secs == 0 || config.daily_credit_secs > MAX_DAILY_CREDIT_SECS {
            return Err(format!(
                "DAILY_CREDIT_SECS must be between 1 and {}",
                MAX_DAILY_CREDIT_SECS
            ));
        }

        Ok(config)
    }

    /// Time between free-credit claims, capped at [`MAX_DAILY_CREDIT_SECS`]
    pub fn daily_credit_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.daily_credit_secs.min(MAX_DAILY_CREDIT_SECS) as i64)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_credits: 6,
            farming_cost: 1,
            daily_credit_secs: 24 * 60 * 60,
        }
    }
}

impl NotificationConfig {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            dedup_window_ms: parse_env("NOTIFICATION_DEDUP_MS")
                .unwrap_or(Self::default().dedup_window_ms),
        };

        if config.dedup_window_ms > MAX_DEDUP_WINDOW_MS {
            return Err(format!(
                "NOTIFICATION_DEDUP_MS must be at most {}",
                MAX_DEDUP_WINDOW_MS
            ));
        }

        Ok(config)
    }

    /// Capped at [`MAX_DEDUP_WINDOW_MS`]
    pub fn dedup_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.dedup_window_ms.min(MAX_DEDUP_WINDOW_MS) as i64)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 3000,
        }
    }
}

impl FarmingConfig {
    /// Create farming config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();
        let config = Self {
            success_rate: parse_env("FARMING_SUCCESS_RATE").unwrap_or(defaults.success_rate),
            min_step_ms: parse_env("FARMING_MIN_STEP_MS").unwrap_or(defaults.min_step_ms),
            max_step_ms: parse_env("FARMING_MAX_STEP_MS").unwrap_or(defaults.max_step_ms),
            retry_delay_ms: parse_env("FARMING_RETRY_DELAY_MS")
                .unwrap_or(defaults.retry_delay_ms),
            tick_ms: parse_env("FARMING_TICK_MS").unwrap_or(defaults.tick_ms),
            seed: parse_env("FARMING_SEED"),
            completion_xp: parse_env("FARMING_COMPLETION_XP").unwrap_or(defaults.completion_xp),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err("FARMING_SUCCESS_RATE must be between 0 and 1".to_string());
        }
        if self.min_step_ms == 0 || self.max_step_ms <= self.min_step_ms {
            return Err(
                "FARMING_MIN_STEP_MS must be > 0 and below FARMING_MAX_STEP_MS".to_string(),
            );
        }
        if self.tick_ms == 0 {
            return Err("FARMING_TICK_MS must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for FarmingConfig {
    fn default() -> Self {
        Self {
            success_rate: 0.9,
            min_step_ms: 1000,
            max_step_ms: 3000,
            retry_delay_ms: 1000,
            tick_ms: 200,
            seed: None,
            completion_xp: 5,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let store = StoreConfig::from_env()?;
        let ledger = LedgerConfig::from_env()?;
        let notifications = NotificationConfig::from_env()?;
        let farming = FarmingConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let ws_port = parse_env::<u16>("WS_PORT");

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        Ok(Self {
            store,
            ledger,
            notifications,
            farming,
            log_level: log_level.to_lowercase(),
            ws_port,
            environment: environment.to_lowercase(),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            ledger: LedgerConfig::default(),
            notifications: NotificationConfig::default(),
            farming: FarmingConfig::default(),
            log_level: "info".to_string(),
            ws_port: None,
            environment: "development".to_string(),
        }
    }
}
