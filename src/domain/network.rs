//! 网络（币种）描述注册表
//!
//! 只读映射：名称/符号 → 网络描述。由调用方注入，命令构造时按引用传入，
//! 不使用全局单例。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::firmware::{DeviceModel, FirmwareRange, FirmwareVersion, ModelSupport},
    error::{CommandError, CommandResult},
};

/// 各型号的最低支持版本，None 表示该型号不支持此网络
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkSupport {
    #[serde(rename = "1", default)]
    pub one: Option<FirmwareVersion>,
    #[serde(rename = "T", default)]
    pub t: Option<FirmwareVersion>,
}

/// 网络描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// 网络名称
    pub name: String,
    /// 符号 (ADA, ...)
    pub shortcut: String,
    /// SLIP-44 coin type
    pub slip44: u32,
    /// 型号支持情况
    pub support: NetworkSupport,
    /// 按方法名覆盖的固件区间
    #[serde(default)]
    pub method_overrides: HashMap<String, FirmwareRange>,
}

impl NetworkInfo {
    pub fn new(
        name: impl Into<String>,
        shortcut: impl Into<String>,
        slip44: u32,
        support: NetworkSupport,
    ) -> Self {
        Self {
            name: name.into(),
            shortcut: shortcut.into(),
            slip44,
            support,
            method_overrides: HashMap::new(),
        }
    }

    pub fn with_method_override(mut self, method: impl Into<String>, range: FirmwareRange) -> Self {
        self.method_overrides.insert(method.into(), range);
        self
    }

    pub fn support(&self, model: DeviceModel) -> Option<FirmwareVersion> {
        match model {
            DeviceModel::One => self.support.one,
            DeviceModel::T => self.support.t,
        }
    }

    pub fn method_override(&self, method: &str) -> Option<&FirmwareRange> {
        self.method_overrides.get(method)
    }
}

/// 网络注册表
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: HashMap<String, NetworkInfo>,
    shortcut_map: HashMap<String, String>,
}

impl NetworkRegistry {
    /// 创建预配置的注册表
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_default_networks();
        registry
    }

    /// 空注册表（测试或完全由配置驱动时使用）
    pub fn empty() -> Self {
        Self::default()
    }

    fn register_default_networks(&mut self) {
        // Cardano：型号 1 不支持，型号 T 从 2.0.8 起支持
        self.register(NetworkInfo::new(
            "Cardano",
            "ADA",
            1815,
            NetworkSupport {
                one: None,
                t: Some(FirmwareVersion::new(2, 0, 8)),
            },
        ));
    }

    /// 注册网络描述，同名覆盖
    pub fn register(&mut self, network: NetworkInfo) {
        let key = network.name.to_lowercase();
        self.shortcut_map
            .insert(network.shortcut.to_lowercase(), key.clone());
        self.networks.insert(key, network);
    }

    /// 按名称或符号查找（不区分大小写）
    pub fn get(&self, name: &str) -> Option<&NetworkInfo> {
        let key = name.trim().to_lowercase();
        self.networks.get(&key).or_else(|| {
            self.shortcut_map
                .get(&key)
                .and_then(|name| self.networks.get(name))
        })
    }

    /// 查找网络，不存在时返回 `UnknownNetwork`
    pub fn lookup(&self, name: &str) -> CommandResult<&NetworkInfo> {
        self.get(name)
            .ok_or_else(|| CommandError::UnknownNetwork(name.to_string()))
    }

    pub fn list_all(&self) -> Vec<&NetworkInfo> {
        let mut all: Vec<&NetworkInfo> = self.networks.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// 验证注册表完整性
    pub fn validate_configs(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for network in self.networks.values() {
            if network.name.trim().is_empty() {
                errors.push("Network has empty name".to_string());
            }
            if network.shortcut.trim().is_empty() {
                errors.push(format!("Network {} has empty shortcut", network.name));
            }

            for (method, range) in &network.method_overrides {
                for model in DeviceModel::ALL {
                    if let ModelSupport::Supported(interval) = range.get(model) {
                        if interval.is_empty() {
                            errors.push(format!(
                                "Network {} override for {} is empty on model {}: {}",
                                network.name, method, model, interval
                            ));
                        }
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::firmware::VersionInterval;

    #[test]
    fn test_default_registry_has_cardano() {
        let registry = NetworkRegistry::new();

        let cardano = registry.lookup("Cardano").unwrap();
        assert_eq!(cardano.slip44, 1815);
        assert_eq!(cardano.support(DeviceModel::One), None);
        assert_eq!(
            cardano.support(DeviceModel::T),
            Some(FirmwareVersion::new(2, 0, 8))
        );

        // 符号和大小写
        assert_eq!(registry.lookup("ada").unwrap().name, "Cardano");
        assert_eq!(registry.lookup(" CARDANO ").unwrap().name, "Cardano");
    }

    #[test]
    fn test_unknown_network() {
        let registry = NetworkRegistry::new();
        assert_eq!(
            registry.lookup("Dogecoin").unwrap_err(),
            CommandError::UnknownNetwork("Dogecoin".into())
        );
        assert!(NetworkRegistry::empty().lookup("Cardano").is_err());
    }

    #[test]
    fn test_register_overrides_existing() {
        let mut registry = NetworkRegistry::new();
        registry.register(NetworkInfo::new(
            "Cardano",
            "ADA",
            1815,
            NetworkSupport {
                one: None,
                t: Some(FirmwareVersion::new(2, 3, 2)),
            },
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup("ADA").unwrap().support(DeviceModel::T),
            Some(FirmwareVersion::new(2, 3, 2))
        );
    }

    #[test]
    fn test_validate_configs_flags_empty_override() {
        let mut registry = NetworkRegistry::new();
        assert!(registry.validate_configs().is_ok());

        let empty = VersionInterval {
            min: FirmwareVersion::new(2, 3, 0),
            max: Some(FirmwareVersion::new(2, 3, 0)),
        };
        registry.register(
            NetworkInfo::new("Testnet", "tADA", 1, NetworkSupport::default())
                .with_method_override(
                    "cardanoGetAddress",
                    FirmwareRange::new(ModelSupport::Unsupported, ModelSupport::Supported(empty)),
                ),
        );
        let errors = registry.validate_configs().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("cardanoGetAddress"));
    }

    #[test]
    fn test_network_info_deserializes_from_toml() {
        let network: NetworkInfo = toml::from_str(
            r#"
name = "Cardano"
shortcut = "ADA"
slip44 = 1815

[support]
T = "2.0.8"
"#,
        )
        .unwrap();
        assert_eq!(network.support.one, None);
        assert_eq!(network.support.t, Some(FirmwareVersion::new(2, 0, 8)));
        assert!(network.method_overrides.is_empty());
    }
}
