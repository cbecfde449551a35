//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    domain::network::{NetworkInfo, NetworkRegistry},
    service::command::OutputConflictPolicy,
};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    /// 额外注册的网络（同名覆盖内置网络）
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

/// 设备调用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// 单次设备调用超时（毫秒），0 表示不限制
    pub call_timeout_ms: u64,
    /// "prefer_path" or "reject"
    pub output_conflict_policy: String,
}

/// 网络配置，字段与 `NetworkInfo` 一致
pub type NetworkConfig = NetworkInfo;

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_FILE_ENABLED")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: std::env::var("DEVICE_CALL_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            output_conflict_policy: std::env::var("OUTPUT_CONFLICT_POLICY")
                .unwrap_or_else(|_| "prefer_path".into()),
        }
    }
}

impl DeviceConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        match self.call_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn output_conflict_policy(&self) -> Result<OutputConflictPolicy> {
        self.output_conflict_policy
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            device: DeviceConfig::default(),
            networks: Vec::new(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        self.device
            .output_conflict_policy()
            .context("Invalid OUTPUT_CONFLICT_POLICY")?;

        self.network_registry()?;

        Ok(())
    }

    /// 内置网络 + 配置中的网络
    pub fn network_registry(&self) -> Result<NetworkRegistry> {
        let mut registry = NetworkRegistry::new();
        for network in &self.networks {
            registry.register(network.clone());
        }

        registry
            .validate_configs()
            .map_err(|errors| anyhow::anyhow!("Invalid network config: {}", errors.join("; ")))?;

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::domain::firmware::{DeviceModel, FirmwareVersion};

    #[test]
    fn test_config_from_env() {
        let config = Config::from_env().unwrap();
        assert!(config.networks.is_empty());
        assert!(config.network_registry().unwrap().get("ADA").is_some());
    }

    #[test]
    fn test_call_timeout() {
        let mut device = DeviceConfig {
            call_timeout_ms: 0,
            output_conflict_policy: "prefer_path".into(),
        };
        assert_eq!(device.call_timeout(), None);

        device.call_timeout_ms = 1500;
        assert_eq!(device.call_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "json"
enable_file_logging = false

[device]
call_timeout_ms = 30000
output_conflict_policy = "reject"

[[networks]]
name = "Cardano Testnet"
shortcut = "tADA"
slip44 = 1815

[networks.support]
T = "2.2.0"

[networks.method_overrides.cardanoSignTransaction]
1 = "unsupported"
T = {{ supported = {{ min = "2.3.0" }} }}
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.device.call_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.device.output_conflict_policy().unwrap(),
            OutputConflictPolicy::Reject
        );
        assert!(config.validate().is_ok());

        let registry = config.network_registry().unwrap();
        let testnet = registry.lookup("tada").unwrap();
        assert_eq!(testnet.support(DeviceModel::T), Some(FirmwareVersion::new(2, 2, 0)));
        assert_eq!(testnet.support(DeviceModel::One), None);
        assert!(testnet.method_override("cardanoSignTransaction").is_some());
        // 内置网络仍然存在
        assert!(registry.get("Cardano").is_some());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::from_env().unwrap();
        config.logging.level = "info".into();
        config.logging.format = "text".into();
        config.device.output_conflict_policy = "prefer_path".into();
        assert!(config.validate().is_ok());

        config.logging.format = "xml".into();
        assert!(config.validate().is_err());

        config.logging.format = "text".into();
        config.device.output_conflict_policy = "whatever".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_env() {
        let config = Config::from_env_and_file(Some("/nonexistent/ironcore-connect.toml")).unwrap();
        assert!(config.networks.is_empty());
    }
}
