//! Button configuration management

use anyhow::{Context, Result, anyhow};
use protocol::{DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID, DeviceIdentity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ButtonConfig {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub polling: PollSettings,
    #[serde(default)]
    pub action: ActionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Which button to open
///
/// # Example Configuration
/// ```toml
/// [device]
/// vendor_id = "0x1d34"
/// product_id = "0x0008"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// USB Vendor ID, written in hex
    #[serde(default = "DeviceSettings::default_vendor_id", with = "hex_id_serde")]
    pub vendor_id: u16,
    /// USB Product ID, written in hex
    #[serde(default = "DeviceSettings::default_product_id", with = "hex_id_serde")]
    pub product_id: u16,
}

impl DeviceSettings {
    fn default_vendor_id() -> u16 {
        DEFAULT_VENDOR_ID
    }

    fn default_product_id() -> u16 {
        DEFAULT_PRODUCT_ID
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_vendor_id(),
            product_id: Self::default_product_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Delay between the end of one poll cycle and the start of the next
    #[serde(default = "PollSettings::default_interval_ms")]
    pub interval_ms: u64,
    /// Status read timeout for flaky devices (0 = disabled)
    #[serde(default = "PollSettings::default_timeout_ms")]
    pub timeout_ms: u64,
    /// Detach a bound kernel driver before claiming
    #[serde(default = "PollSettings::default_detach_kernel_driver")]
    pub detach_kernel_driver: bool,
}

impl PollSettings {
    fn default_interval_ms() -> u64 {
        15
    }

    fn default_timeout_ms() -> u64 {
        300
    }

    fn default_detach_kernel_driver() -> bool {
        true
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            timeout_ms: Self::default_timeout_ms(),
            detach_kernel_driver: Self::default_detach_kernel_driver(),
        }
    }
}

/// Command run on every press
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionSettings {
    /// Program followed by its arguments; empty = print events only
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// Serde module for USB ids stored as `"0x1d34"` strings
mod hex_id_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(id: &u16, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:#06x}", id))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u16, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        protocol::parse_hex_id(&s).map_err(serde::de::Error::custom)
    }
}

impl ButtonConfig {
    /// Load configuration from the specified path
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: ButtonConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load the first configuration file that exists in the standard locations
    ///
    /// Defaults are used only when none exists; a file that exists but does
    /// not parse or validate is an error.
    pub fn load_or_default() -> Result<Self> {
        Self::load_first(&Self::candidate_paths())
    }

    fn load_first(candidates: &[PathBuf]) -> Result<Self> {
        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Standard locations, most specific first
    pub fn candidate_paths() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/hulk-button/button.toml"),
        ]
    }

    /// Load from an explicit path, expanding `~`
    pub fn load_from(path: &str) -> Result<Self> {
        let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
        Self::load(&path_buf)
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("hulk-button").join("button.toml")
        } else {
            PathBuf::from(".config/hulk-button/button.toml")
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.device.vendor_id, self.device.product_id)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        if let Some(program) = self.action.command.first() {
            if program.trim().is_empty() {
                return Err(anyhow!("Action command must not start with an empty program"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ButtonConfig::default();
        assert_eq!(config.identity(), DeviceIdentity::new(0x1d34, 0x0008));
        assert_eq!(config.polling.interval_ms, 15);
        assert_eq!(config.polling.timeout_ms, 300);
        assert!(config.polling.detach_kernel_driver);
        assert!(config.action.command.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = ButtonConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("vendor_id = \"0x1d34\""));
        assert!(toml_str.contains("product_id = \"0x0008\""));

        let parsed: ButtonConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.identity(), config.identity());
        assert_eq!(parsed.polling.interval_ms, config.polling.interval_ms);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let parsed: ButtonConfig = toml::from_str("").unwrap();
        assert_eq!(parsed.identity(), DeviceIdentity::default());
        assert_eq!(parsed.polling.timeout_ms, 300);
    }

    #[test]
    fn test_invalid_hex_id_rejected() {
        let result: std::result::Result<ButtonConfig, _> =
            toml::from_str("[device]\nvendor_id = \"0xZZZZ\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = ButtonConfig::default();
        assert!(config.validate().is_ok());

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_action_command() {
        let mut config = ButtonConfig::default();
        config.action.command = vec![" ".to_string()];
        assert!(config.validate().is_err());

        config.action.command = vec!["echo".to_string(), "hi".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("button.toml");

        let mut config = ButtonConfig::default();
        config.device.product_id = 0x000d;
        config.polling.timeout_ms = 0;
        config.save(&path).unwrap();

        let loaded = ButtonConfig::load(&path).unwrap();
        assert_eq!(loaded.device.product_id, 0x000d);
        assert_eq!(loaded.polling.timeout_ms, 0);
    }

    #[test]
    fn test_no_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = [dir.path().join("missing.toml")];

        let config = ButtonConfig::load_first(&candidates).unwrap();
        assert_eq!(config.identity(), DeviceIdentity::default());
    }

    #[test]
    fn test_malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("button.toml");
        fs::write(
            &path,
            "[device]\nvendor_id = \"0xffff\"\n[polling]\ninterval_ms = \"fast\"\n",
        )
        .unwrap();

        let err = ButtonConfig::load_first(&[path]).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        let system = dir.path().join("system.toml");
        fs::write(&system, "[device]\nproduct_id = \"0x000d\"\n").unwrap();

        let config = ButtonConfig::load_first(&[user.clone(), system.clone()]).unwrap();
        assert_eq!(config.device.product_id, 0x000d);

        fs::write(&user, "[device]\nproduct_id = \"0x0001\"\n").unwrap();
        let config = ButtonConfig::load_first(&[user, system]).unwrap();
        assert_eq!(config.device.product_id, 0x0001);
    }
}
