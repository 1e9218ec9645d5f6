use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

pub const FIREBASE_AUTH_URL: &str =
    "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword";
pub const FIREBASE_REFRESH_URL: &str = "https://securetoken.googleapis.com/v1/token";
pub const SCAPECLOUD_UPLOAD_URL: &str = "https://www.osrslog.com/api/upload";

const APP_DIR_NAME: &str = "ScapeCloud";

/// Remote services the uploader talks to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub auth_url: String,
    pub refresh_url: String,
    pub upload_url: String,
    /// Firebase web API key, appended as `?key=` to the identity calls.
    pub api_key: String,
    pub request_timeout_secs: u64,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_url: FIREBASE_AUTH_URL.to_string(),
            refresh_url: FIREBASE_REFRESH_URL.to_string(),
            upload_url: SCAPECLOUD_UPLOAD_URL.to_string(),
            api_key: String::new(),
            request_timeout_secs: 120,
        }
    }
}

impl Endpoints {
    /// Apply `SCAPECLOUD_*` environment overrides on top of the stored values.
    pub fn with_env_overrides(mut self) -> Self {
        let overrides: [(&str, &mut String); 4] = [
            ("SCAPECLOUD_AUTH_URL", &mut self.auth_url),
            ("SCAPECLOUD_REFRESH_URL", &mut self.refresh_url),
            ("SCAPECLOUD_UPLOAD_URL", &mut self.upload_url),
            ("SCAPECLOUD_API_KEY", &mut self.api_key),
        ];

        for (var, field) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    log::debug!("Using {} from environment", var);
                    *field = value.trim().to_string();
                }
            }
        }
        self
    }
}

/// Which in-game events trigger an automatic screenshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureTriggers {
    pub rewards: bool,
    pub levels: bool,
    pub kingdom: bool,
    pub pets: bool,
    pub kills: bool,
    pub boss_kills: bool,
    pub player_death: bool,
    pub friend_death: bool,
    pub duels: bool,
    pub valuable_drop: bool,
    pub valuable_drop_threshold: u32,
    pub untradeable_drop: bool,
    pub friends_chat_kick: bool,
    pub high_gamble: bool,
    pub collection_log_entries: bool,
}

impl Default for CaptureTriggers {
    fn default() -> Self {
        Self {
            rewards: true,
            levels: true,
            kingdom: true,
            pets: true,
            kills: false,
            boss_kills: false,
            player_death: false,
            friend_death: false,
            duels: false,
            valuable_drop: false,
            valuable_drop_threshold: 0,
            untradeable_drop: false,
            friends_chat_kick: false,
            high_gamble: false,
            collection_log_entries: true,
        }
    }
}

/// What prompted a screenshot. Sent as the metadata `eventType` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureEvent {
    /// Hotkey or anything else the host takes on request.
    #[default]
    Manual,
    Reward,
    LevelUp,
    Kingdom,
    Pet,
    Kill,
    BossKill,
    PlayerDeath,
    FriendDeath,
    Duel,
    ValuableDrop { value: u64 },
    UntradeableDrop,
    FriendsChatKick,
    HighGamble,
    CollectionLog,
}

impl CaptureEvent {
    pub fn tag(&self) -> Option<&'static str> {
        let tag = match self {
            CaptureEvent::Manual => return None,
            CaptureEvent::Reward => "REWARD",
            CaptureEvent::LevelUp => "LEVEL_UP",
            CaptureEvent::Kingdom => "KINGDOM",
            CaptureEvent::Pet => "PET",
            CaptureEvent::Kill => "KILL",
            CaptureEvent::BossKill => "BOSS_KILL",
            CaptureEvent::PlayerDeath => "PLAYER_DEATH",
            CaptureEvent::FriendDeath => "FRIEND_DEATH",
            CaptureEvent::Duel => "DUEL",
            CaptureEvent::ValuableDrop { .. } => "VALUABLE_DROP",
            CaptureEvent::UntradeableDrop => "UNTRADEABLE_DROP",
            CaptureEvent::FriendsChatKick => "FRIENDS_CHAT_KICK",
            CaptureEvent::HighGamble => "HIGH_GAMBLE",
            CaptureEvent::CollectionLog => "COLLECTION_LOG",
        };
        Some(tag)
    }
}

impl CaptureTriggers {
    /// Whether a screenshot for `event` should be taken. Manual captures always are.
    pub fn allows(&self, event: &CaptureEvent) -> bool {
        match event {
            CaptureEvent::Manual => true,
            CaptureEvent::Reward => self.rewards,
            CaptureEvent::LevelUp => self.levels,
            CaptureEvent::Kingdom => self.kingdom,
            CaptureEvent::Pet => self.pets,
            CaptureEvent::Kill => self.kills,
            CaptureEvent::BossKill => self.boss_kills,
            CaptureEvent::PlayerDeath => self.player_death,
            CaptureEvent::FriendDeath => self.friend_death,
            CaptureEvent::Duel => self.duels,
            CaptureEvent::ValuableDrop { value } => {
                self.valuable_drop && *value >= u64::from(self.valuable_drop_threshold)
            }
            CaptureEvent::UntradeableDrop => self.untradeable_drop,
            CaptureEvent::FriendsChatKick => self.friends_chat_kick,
            CaptureEvent::HighGamble => self.high_gamble,
            CaptureEvent::CollectionLog => self.collection_log_entries,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub email: String,
    /// Stored as the host stores secrets: plaintext on disk, hidden from logs.
    pub password: String,
    pub notify_when_taken: bool,
    pub screenshot_dir: Option<PathBuf>,
    pub triggers: CaptureTriggers,
    pub endpoints: Endpoints,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            notify_when_taken: true,
            screenshot_dir: None,
            triggers: CaptureTriggers::default(),
            endpoints: Endpoints::default(),
            log_level: "info".to_string(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("email", &self.email)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("notify_when_taken", &self.notify_when_taken)
            .field("screenshot_dir", &self.screenshot_dir)
            .field("triggers", &self.triggers)
            .field("endpoints", &self.endpoints)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    pub fn has_credentials(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }

    pub fn set_credentials(&mut self, email: &str, password: &str) {
        self.email = email.trim().to_string();
        self.password = password.to_string();
    }

    pub fn clear_credentials(&mut self) {
        self.email.clear();
        self.password.clear();
    }

    /// Screenshot root, falling back to `~/.scapecloud/screenshots`.
    pub fn resolve_screenshot_dir(&self) -> AppResult<PathBuf> {
        if let Some(dir) = &self.screenshot_dir {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Could not find home directory".to_string()))?;
        Ok(home.join(".scapecloud").join("screenshots"))
    }
}

pub fn get_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join(APP_DIR_NAME);

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("config.json"))
}

pub fn load_config() -> AppResult<Config> {
    load_config_from(&get_config_path()?)
}

pub fn save_config(config: &Config) -> AppResult<()> {
    save_config_to(&get_config_path()?, config)
}

/// Load the config at `config_path`, writing defaults when it does not exist yet.
pub fn load_config_from(config_path: &Path) -> AppResult<Config> {
    if config_path.exists() {
        let config_str = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_str).unwrap_or_else(|e| {
            log::warn!("Failed to parse config file: {}. Using defaults.", e);
            Config::default()
        });

        validate_config(&config)?;
        Ok(config)
    } else {
        let default_config = Config::default();
        save_config_to(config_path, &default_config)?;
        Ok(default_config)
    }
}

pub fn save_config_to(config_path: &Path, config: &Config) -> AppResult<()> {
    validate_config(config)?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    if config_path.exists() {
        let backup_path = config_path.with_extension("json.bak");
        if let Err(e) = fs::copy(config_path, &backup_path) {
            log::warn!("Failed to create config backup: {}", e);
        }
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(config_path, config_str)?;

    log::info!("Configuration saved to {}", config_path.display());
    Ok(())
}

pub fn validate_config(config: &Config) -> AppResult<()> {
    if !config.email.is_empty() {
        crate::security::InputValidator::validate_email(&config.email)?;
    }

    for (field, url) in [
        ("endpoints.auth_url", &config.endpoints.auth_url),
        ("endpoints.refresh_url", &config.endpoints.refresh_url),
        ("endpoints.upload_url", &config.endpoints.upload_url),
    ] {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(AppError::validation(field, "Must be an http(s) URL"));
        }
    }

    if config.endpoints.request_timeout_secs == 0 || config.endpoints.request_timeout_secs > 600 {
        return Err(AppError::validation(
            "endpoints.request_timeout_secs",
            "Must be between 1 and 600",
        ));
    }

    let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(AppError::validation("log_level", "Must be a valid log level"));
    }

    Ok(())
}

/// Rewrite an unreadable config file with defaults, keeping the old file as `.json.old`.
pub fn migrate_config_at(config_path: &Path) -> AppResult<()> {
    if !config_path.exists() {
        return Ok(());
    }

    let config_str = fs::read_to_string(config_path)?;
    if serde_json::from_str::<Config>(&config_str).is_ok() {
        return Ok(());
    }

    log::info!("Migrating configuration to new format");

    let backup_path = config_path.with_extension("json.old");
    fs::copy(config_path, &backup_path)?;
    save_config_to(config_path, &Config::default())?;

    log::info!("Old configuration backed up to {}", backup_path.display());
    Ok(())
}

pub fn migrate_config() -> AppResult<()> {
    migrate_config_at(&get_config_path()?)
}

pub fn reset_config() -> AppResult<()> {
    let config_path = get_config_path()?;

    if config_path.exists() {
        let backup_path = config_path.with_extension("json.reset_backup");
        fs::copy(&config_path, &backup_path)?;
        log::info!("Existing config backed up to {}", backup_path.display());
    }

    save_config_to(&config_path, &Config::default())?;
    log::info!("Configuration reset to defaults");
    Ok(())
}
