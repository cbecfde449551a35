//! 固件版本区间
//!
//! 每个方法按设备型号声明支持的固件区间 `[min, max)`，
//! 网络（币种）描述可以进一步收窄该区间，但永远不会放宽。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    domain::network::NetworkInfo,
    error::{CommandError, CommandResult},
};

/// 设备型号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceModel {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "T")]
    T,
}

impl DeviceModel {
    pub const ALL: [DeviceModel; 2] = [DeviceModel::One, DeviceModel::T];
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("1"),
            Self::T => f.write_str("T"),
        }
    }
}

impl FromStr for DeviceModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "one" | "One" | "T1" => Ok(Self::One),
            "T" | "t" | "2" | "TT" => Ok(Self::T),
            other => Err(format!("Unknown device model: {}", other)),
        }
    }
}

/// 固件版本（major.minor.patch）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for FirmwareVersion {
    type Err = String;

    /// 接受 `2`、`2.0`、`2.0.8`，缺省部分补 0
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(format!("Invalid firmware version: {}", s));
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("Invalid firmware version: {}", s));
            }
            *slot = part
                .parse()
                .map_err(|_| format!("Invalid firmware version: {}", s))?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl TryFrom<String> for FirmwareVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FirmwareVersion> for String {
    fn from(value: FirmwareVersion) -> Self {
        value.to_string()
    }
}

/// 半开区间 `[min, max)`，max 为 None 表示无上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInterval {
    pub min: FirmwareVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<FirmwareVersion>,
}

impl VersionInterval {
    /// 创建区间，要求 min ≤ max
    pub fn new(min: FirmwareVersion, max: Option<FirmwareVersion>) -> Result<Self, String> {
        if let Some(max) = max {
            if min > max {
                return Err(format!("Invalid firmware range: {} > {}", min, max));
            }
        }
        Ok(Self { min, max })
    }

    pub const fn at_least(min: FirmwareVersion) -> Self {
        Self { min, max: None }
    }

    pub fn contains(&self, version: &FirmwareVersion) -> bool {
        *version >= self.min && self.max.map(|max| *version < max).unwrap_or(true)
    }

    pub fn is_empty(&self) -> bool {
        self.max.map(|max| max <= self.min).unwrap_or(false)
    }

    /// 求交集；交集为空返回 None
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let interval = Self { min, max };
        if interval.is_empty() {
            None
        } else {
            Some(interval)
        }
    }
}

impl fmt::Display for VersionInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}, {})", self.min, max),
            None => write!(f, "[{}, ∞)", self.min),
        }
    }
}

/// 单个型号的支持情况
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSupport {
    Unsupported,
    Supported(VersionInterval),
}

impl ModelSupport {
    pub fn interval(&self) -> Option<&VersionInterval> {
        match self {
            Self::Unsupported => None,
            Self::Supported(interval) => Some(interval),
        }
    }
}

/// 方法的固件支持区间（按型号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareRange {
    #[serde(rename = "1")]
    pub one: ModelSupport,
    #[serde(rename = "T")]
    pub t: ModelSupport,
}

impl Default for FirmwareRange {
    /// 基础区间：两个型号均从首个正式版本起支持，无上限
    fn default() -> Self {
        Self {
            one: ModelSupport::Supported(VersionInterval::at_least(FirmwareVersion::new(1, 0, 0))),
            t: ModelSupport::Supported(VersionInterval::at_least(FirmwareVersion::new(2, 0, 0))),
        }
    }
}

impl FirmwareRange {
    pub fn new(one: ModelSupport, t: ModelSupport) -> Self {
        Self { one, t }
    }

    pub fn get(&self, model: DeviceModel) -> &ModelSupport {
        match model {
            DeviceModel::One => &self.one,
            DeviceModel::T => &self.t,
        }
    }

    fn set(&mut self, model: DeviceModel, support: ModelSupport) {
        match model {
            DeviceModel::One => self.one = support,
            DeviceModel::T => self.t = support,
        }
    }

    pub fn supports(&self, model: DeviceModel, version: &FirmwareVersion) -> bool {
        self.get(model)
            .interval()
            .map(|interval| interval.contains(version))
            .unwrap_or(false)
    }

    /// 兼容性检查：设备上报的型号与版本是否在区间内
    pub fn check(
        &self,
        method: &str,
        model: DeviceModel,
        version: FirmwareVersion,
    ) -> CommandResult<()> {
        if self.supports(model, &version) {
            Ok(())
        } else {
            Err(CommandError::FirmwareNotSupported {
                method: method.to_string(),
                model,
                version,
            })
        }
    }
}

/// 计算方法在指定网络上的固件区间
///
/// # 规则
/// 1. 网络不支持的型号直接标记为不支持
/// 2. 网络声明的最低版本抬高区间下限
/// 3. 网络针对该方法的覆盖区间与结果求交集，只收窄不放宽
/// 4. 任一步骤交集为空时返回 `IncompatibleRangeOverride`
pub fn resolve_firmware_range(
    method: &str,
    network: Option<&NetworkInfo>,
    base: &FirmwareRange,
) -> CommandResult<FirmwareRange> {
    let network = match network {
        Some(network) => network,
        None => return Ok(*base),
    };

    let incompatible = |model: DeviceModel| CommandError::IncompatibleRangeOverride {
        method: method.to_string(),
        model,
    };

    let mut range = *base;
    for model in DeviceModel::ALL {
        let narrowed = match (range.get(model), network.support(model)) {
            (ModelSupport::Unsupported, _) | (_, None) => ModelSupport::Unsupported,
            (ModelSupport::Supported(interval), Some(min)) => {
                let floor = VersionInterval::at_least(min);
                ModelSupport::Supported(
                    interval
                        .intersect(&floor)
                        .ok_or_else(|| incompatible(model))?,
                )
            }
        };

        let narrowed = match (narrowed, network.method_override(method).map(|o| *o.get(model))) {
            (ModelSupport::Supported(current), Some(ModelSupport::Supported(over))) => {
                ModelSupport::Supported(
                    current
                        .intersect(&over)
                        .ok_or_else(|| incompatible(model))?,
                )
            }
            (ModelSupport::Supported(_), Some(ModelSupport::Unsupported)) => {
                ModelSupport::Unsupported
            }
            (support, _) => support,
        };

        range.set(model, narrowed);
    }

    Ok(range)
}
