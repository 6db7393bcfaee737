use crate::behavior::{BehaviorDescriptor, ChatMode};
use crate::credential::{AuthMode, Credential, CredentialRing, Secret};
use crate::session::{ControlState, ServerAddress};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "settings.toml";

/// Delay between joining and the auto-auth commands.
const AUTO_AUTH_DELAY: Duration = Duration::from_millis(500);
const LOOK_ROTATION_INTERVAL: Duration = Duration::from_millis(100);
const CIRCLE_WALK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Credential pool is empty")]
    EmptyPool,

    #[error("Missing required field: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub server: ServerConfig,
    #[serde(alias = "bot-account")]
    pub account: AccountConfig,
    pub position: PositionConfig,
    pub utils: UtilsConfig,
    pub liveness: LivenessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
    /// Protocol version, e.g. "1.20.1". Empty lets the client negotiate.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "localhost".to_string(),
            port: 25565,
            version: String::new(),
        }
    }
}

/// The credential pool.
///
/// With an empty `usernames` list the pool is generated as
/// `<name-prefix>1 ..= <name-prefix><pool-size>`. Every identity shares the
/// same password and auth mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct AccountConfig {
    pub usernames: Vec<String>,
    pub name_prefix: String,
    pub pool_size: usize,
    pub password: Secret,
    #[serde(rename = "type")]
    pub auth: AuthMode,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            usernames: Vec::new(),
            name_prefix: "WatchDog".to_string(),
            pool_size: 4,
            password: Secret::default(),
            auth: AuthMode::Offline,
        }
    }
}

impl AccountConfig {
    fn usernames(&self) -> Vec<String> {
        if self.usernames.is_empty() {
            (1..=self.pool_size)
                .map(|i| format!("{}{i}", self.name_prefix))
                .collect()
        } else {
            self.usernames.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PositionConfig {
    pub enabled: bool,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct UtilsConfig {
    pub auto_auth: AutoAuthConfig,
    pub chat_messages: ChatMessagesConfig,
    pub anti_afk: AntiAfkConfig,
    pub chat_log: bool,
    /// Back-off before the next connect, in milliseconds.
    #[serde(alias = "auto-reconnect-delay-ms")]
    pub auto_reconnect_delay: u64,
    /// Forced rotation interval, in seconds. Default: 21600 (6 hours).
    #[serde(alias = "max-session-lifetime-secs")]
    pub max_session_lifetime: u64,
}

impl Default for UtilsConfig {
    fn default() -> Self {
        Self {
            auto_auth: AutoAuthConfig::default(),
            chat_messages: ChatMessagesConfig::default(),
            anti_afk: AntiAfkConfig::default(),
            chat_log: false,
            auto_reconnect_delay: 5000,
            max_session_lifetime: 6 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct AutoAuthConfig {
    pub enabled: bool,
    pub password: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ChatMessagesConfig {
    pub enabled: bool,
    pub repeat: bool,
    /// Seconds between repeated messages.
    #[serde(alias = "repeat-delay-secs")]
    pub repeat_delay: u64,
    pub messages: Vec<String>,
}

impl Default for ChatMessagesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repeat: false,
            repeat_delay: 60,
            messages: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct AntiAfkConfig {
    /// Master switch for every anti-idle behavior below.
    pub enabled: bool,
    pub sneak: bool,
    pub jump: bool,
    pub rotate: bool,
    /// Yaw added per rotation tick, in radians.
    pub rotate_step: f32,
    pub hit: HitConfig,
    pub circle_walk: CircleWalkConfig,
}

impl Default for AntiAfkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sneak: false,
            jump: false,
            rotate: false,
            rotate_step: 1.0,
            hit: HitConfig::default(),
            circle_walk: CircleWalkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct HitConfig {
    pub enabled: bool,
    /// Milliseconds between strikes.
    #[serde(alias = "delay-ms")]
    pub delay: u64,
    pub attack_mobs: bool,
}

impl Default for HitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: 800,
            attack_mobs: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct CircleWalkConfig {
    pub enabled: bool,
    pub radius: f64,
}

impl Default for CircleWalkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LivenessConfig {
    pub port: u16,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            port: crate::liveness::DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.ip.trim().is_empty() {
            return Err(ConfigError::Missing("server.ip"));
        }
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be non-zero"));
        }

        self.credential_ring()?;

        let utils = &self.utils;
        if utils.auto_auth.enabled && utils.auto_auth.password.is_empty() {
            return Err(ConfigError::Missing("utils.auto-auth.password"));
        }

        let chat = &utils.chat_messages;
        if chat.enabled {
            if chat.messages.is_empty() {
                return Err(invalid(
                    "utils.chat-messages.messages",
                    "at least one message is required when enabled",
                ));
            }
            if chat.repeat && chat.repeat_delay == 0 {
                return Err(invalid("utils.chat-messages.repeat-delay", "must be positive"));
            }
        }

        let anti_afk = &utils.anti_afk;
        if anti_afk.enabled {
            if anti_afk.hit.enabled && anti_afk.hit.delay == 0 {
                return Err(invalid("utils.anti-afk.hit.delay", "must be positive"));
            }
            let radius = anti_afk.circle_walk.radius;
            if anti_afk.circle_walk.enabled && !(radius.is_finite() && radius > 0.0) {
                return Err(invalid(
                    "utils.anti-afk.circle-walk.radius",
                    format!("must be a positive number, got {radius}"),
                ));
            }
            if anti_afk.rotate && !anti_afk.rotate_step.is_finite() {
                return Err(invalid("utils.anti-afk.rotate-step", "must be finite"));
            }
        }

        if utils.max_session_lifetime == 0 {
            return Err(invalid("utils.max-session-lifetime", "must be positive"));
        }

        Ok(())
    }

    /// Build the credential ring, checking every identity.
    pub fn credential_ring(&self) -> Result<CredentialRing, ConfigError> {
        let account = &self.account;
        let usernames = account.usernames();

        let mut seen = HashSet::new();
        for name in &usernames {
            if name.trim().is_empty() {
                return Err(ConfigError::Missing("account.usernames"));
            }
            if !seen.insert(name.as_str()) {
                return Err(invalid("account.usernames", format!("duplicate username {name}")));
            }
        }

        let credentials = usernames
            .into_iter()
            .map(|name| Credential::new(name, account.password.clone(), account.auth))
            .collect();
        CredentialRing::new(credentials).ok_or(ConfigError::EmptyPool)
    }

    /// Enabled behaviors, in the order they attach.
    pub fn behavior_descriptors(&self) -> Vec<BehaviorDescriptor> {
        let utils = &self.utils;
        let mut out = Vec::new();

        if utils.auto_auth.enabled {
            out.push(BehaviorDescriptor::AutoAuth {
                password: utils.auto_auth.password.clone(),
                delay: AUTO_AUTH_DELAY,
            });
        }

        let chat = &utils.chat_messages;
        if chat.enabled {
            let mode = if chat.repeat {
                ChatMode::Repeat {
                    interval: Duration::from_secs(chat.repeat_delay),
                }
            } else {
                ChatMode::Once
            };
            out.push(BehaviorDescriptor::ScriptedChat {
                messages: chat.messages.clone(),
                mode,
            });
        }

        if self.position.enabled {
            let PositionConfig { x, y, z, .. } = self.position;
            out.push(BehaviorDescriptor::GoalSeek { x, y, z });
        }

        let anti_afk = &utils.anti_afk;
        if anti_afk.enabled {
            if anti_afk.sneak {
                out.push(BehaviorDescriptor::HoldControl {
                    control: ControlState::Sneak,
                });
            }
            if anti_afk.jump {
                out.push(BehaviorDescriptor::HoldControl {
                    control: ControlState::Jump,
                });
            }
            if anti_afk.hit.enabled {
                out.push(BehaviorDescriptor::PeriodicStrike {
                    interval: Duration::from_millis(anti_afk.hit.delay),
                    attack_mobs: anti_afk.hit.attack_mobs,
                });
            }
            if anti_afk.rotate {
                out.push(BehaviorDescriptor::LookRotation {
                    interval: LOOK_ROTATION_INTERVAL,
                    step: anti_afk.rotate_step,
                });
            }
            if anti_afk.circle_walk.enabled {
                out.push(BehaviorDescriptor::CirclePatrol {
                    radius: anti_afk.circle_walk.radius,
                    interval: CIRCLE_WALK_INTERVAL,
                });
            }
        }

        if utils.chat_log {
            out.push(BehaviorDescriptor::ChatLog);
        }

        out
    }

    pub fn server_address(&self) -> ServerAddress {
        let version = self.server.version.trim();
        ServerAddress {
            host: self.server.ip.clone(),
            port: self.server.port,
            version: (!version.is_empty()).then(|| version.to_string()),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.utils.auto_reconnect_delay)
    }

    pub fn max_session_lifetime(&self) -> Duration {
        Duration::from_secs(self.utils.max_session_lifetime)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
