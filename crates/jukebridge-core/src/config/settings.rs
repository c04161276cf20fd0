use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub system: SystemConfig,
}

impl Config {
    /// Load config from file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid JSON, or
    /// sets a zero refresh interval.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        super::validation::warn_unknown_fields(&content, "config.json");
        let config: Self = serde_json::from_str(&content)?;
        config.refresh.validate()?;
        Ok(config)
    }
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttConfig {
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Server CA certificate (PEM)
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// Client certificate for certificate-based authentication (PEM)
    #[serde(default)]
    pub cert_file: Option<PathBuf>,

    /// Client key for certificate-based authentication (PEM)
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl MqttConfig {
    /// Username and password, only when both are non-empty.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

fn default_base_topic() -> String {
    "phoniebox".to_string()
}
fn default_client_id() -> String {
    "phoniebox".to_string()
}
fn default_mqtt_host() -> String {
    "localhost".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_keep_alive() -> u64 {
    60
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            base_topic: default_base_topic(),
            client_id: default_client_id(),
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            ca_file: None,
            cert_file: None,
            key_file: None,
            keep_alive_secs: default_keep_alive(),
        }
    }
}

/// Publication cadence in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshConfig {
    /// How often the status is published while the player is playing
    #[serde(default = "default_playing_secs")]
    pub playing_secs: u64,

    /// How often the status is published while the player is not playing
    #[serde(default = "default_idle_secs")]
    pub idle_secs: u64,
}

impl RefreshConfig {
    /// Both intervals must be at least one second.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending interval.
    pub fn validate(&self) -> Result<()> {
        if self.playing_secs == 0 {
            return Err(Error::Config("refresh.playingSecs must be positive".to_string()));
        }
        if self.idle_secs == 0 {
            return Err(Error::Config("refresh.idleSecs must be positive".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn playing(&self) -> Duration {
        Duration::from_secs(self.playing_secs)
    }

    #[must_use]
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

fn default_playing_secs() -> u64 {
    5
}
fn default_idle_secs() -> u64 {
    30
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            playing_secs: default_playing_secs(),
            idle_secs: default_idle_secs(),
        }
    }
}

/// Player line-protocol endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    #[serde(default = "default_player_host")]
    pub host: String,

    #[serde(default = "default_player_port")]
    pub port: u16,

    /// Bound for connecting and for reading the response
    #[serde(default = "default_player_timeout")]
    pub timeout_ms: u64,
}

impl PlayerConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_player_host() -> String {
    "localhost".to_string()
}
fn default_player_port() -> u16 {
    6600
}
fn default_player_timeout() -> u64 {
    1000
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            host: default_player_host(),
            port: default_player_port(),
            timeout_ms: default_player_timeout(),
        }
    }
}

/// Locations of the jukebox scripts and settings files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathsConfig {
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    #[serde(default = "default_settings_dir")]
    pub settings_dir: PathBuf,

    /// Any path on the filesystem whose size is reported
    #[serde(default = "default_disk_path")]
    pub disk_path: PathBuf,
}

impl PathsConfig {
    #[must_use]
    pub fn latest_card_file(&self) -> PathBuf {
        self.settings_dir.join("Latest_RFID")
    }

    #[must_use]
    pub fn version_file(&self) -> PathBuf {
        self.settings_dir.join("version")
    }

    #[must_use]
    pub fn edition_file(&self) -> PathBuf {
        self.settings_dir.join("edition")
    }

    #[must_use]
    pub fn playout_controls(&self) -> PathBuf {
        self.scripts_dir.join("playout_controls.sh")
    }

    #[must_use]
    pub fn trigger_play(&self) -> PathBuf {
        self.scripts_dir.join("rfid_trigger_play.sh")
    }
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("/home/pi/RPi-Jukebox-RFID/scripts")
}
fn default_settings_dir() -> PathBuf {
    PathBuf::from("/home/pi/RPi-Jukebox-RFID/settings")
}
fn default_disk_path() -> PathBuf {
    PathBuf::from("/home/pi")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            scripts_dir: default_scripts_dir(),
            settings_dir: default_settings_dir(),
            disk_path: default_disk_path(),
        }
    }
}

/// systemd units toggled by the `rfid` and `gpio` commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesConfig {
    #[serde(default = "default_rfid_unit")]
    pub rfid_unit: String,

    #[serde(default = "default_gpio_unit")]
    pub gpio_unit: String,
}

fn default_rfid_unit() -> String {
    "phoniebox-rfid-reader.service".to_string()
}
fn default_gpio_unit() -> String {
    "phoniebox-gpio-control.service".to_string()
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            rfid_unit: default_rfid_unit(),
            gpio_unit: default_gpio_unit(),
        }
    }
}

/// External commands used for probing and service control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    #[serde(default = "default_vcgencmd")]
    pub vcgencmd: PathBuf,

    #[serde(default = "default_systemctl")]
    pub systemctl: PathBuf,

    #[serde(default = "default_atq")]
    pub atq: PathBuf,

    #[serde(default = "default_sudo")]
    pub sudo: PathBuf,
}

fn default_vcgencmd() -> PathBuf {
    PathBuf::from("vcgencmd")
}
fn default_systemctl() -> PathBuf {
    PathBuf::from("/bin/systemctl")
}
fn default_atq() -> PathBuf {
    PathBuf::from("atq")
}
fn default_sudo() -> PathBuf {
    PathBuf::from("sudo")
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            vcgencmd: default_vcgencmd(),
            systemctl: default_systemctl(),
            atq: default_atq(),
            sudo: default_sudo(),
        }
    }
}
