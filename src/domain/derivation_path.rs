//! BIP32 派生路径校验器
//!
//! 接受字符串形式（`m/1852'/1815'/0'/0/0`）或数组形式（`[2147485500, 2147485463, ...]`），
//! 统一规范化为定长的 u32 序列。硬化组件带 `0x8000_0000` 标志位。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CommandError, CommandResult};

/// 硬化标志位
pub const HARDENED: u32 = 0x8000_0000;

/// CIP-1852 purpose（Shelley）
pub const PURPOSE_CIP1852: u32 = 1852;
/// Byron 时代使用的 BIP44 purpose
pub const PURPOSE_BIP44: u32 = 44;
/// Cardano SLIP-44 coin type
pub const COIN_TYPE_CARDANO: u32 = 1815;

/// 规范化后的派生路径
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    /// 解析字符串路径
    ///
    /// # Arguments
    /// * `expr` - 斜杠分隔的路径，前缀 `m/` 可选
    /// * `expected_len` - 期望的组件数量，None 表示不限
    pub fn parse(expr: &str, expected_len: Option<usize>) -> CommandResult<Self> {
        let trimmed = expr.trim();
        let mut parts: Vec<&str> = trimmed.split('/').collect();
        if matches!(parts.first(), Some(&"m") | Some(&"M")) {
            parts.remove(0);
        }

        let components = parts
            .iter()
            .enumerate()
            .map(|(index, raw)| parse_component(index, raw))
            .collect::<CommandResult<Vec<u32>>>()?;

        Self::checked(components, expected_len)
    }

    /// 解析已拆分的组件数组，元素可以是整数或组件字符串（如 `"44'"`）
    pub fn from_components(items: &[Value], expected_len: Option<usize>) -> CommandResult<Self> {
        let components = items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Number(n) => n
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| CommandError::InvalidPathComponent {
                        index,
                        raw: n.to_string(),
                    }),
                Value::String(s) => parse_component(index, s),
                other => Err(CommandError::InvalidPathComponent {
                    index,
                    raw: other.to_string(),
                }),
            })
            .collect::<CommandResult<Vec<u32>>>()?;

        Self::checked(components, expected_len)
    }

    fn checked(components: Vec<u32>, expected_len: Option<usize>) -> CommandResult<Self> {
        if let Some(expected) = expected_len {
            if components.len() != expected {
                return Err(CommandError::PathLengthMismatch {
                    expected,
                    actual: components.len(),
                });
            }
        }
        Ok(Self(components))
    }

    /// 构建 CIP-1852 路径：m/1852'/1815'/account'/role/index
    pub fn cardano(account: u32, role: u32, index: u32) -> Self {
        Self(vec![
            PURPOSE_CIP1852 | HARDENED,
            COIN_TYPE_CARDANO | HARDENED,
            account | HARDENED,
            role,
            index,
        ])
    }

    /// 构建账户级路径：m/1852'/1815'/account'
    pub fn cardano_account(account: u32) -> Self {
        Self(vec![
            PURPOSE_CIP1852 | HARDENED,
            COIN_TYPE_CARDANO | HARDENED,
            account | HARDENED,
        ])
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_hardened(&self, index: usize) -> bool {
        self.0.get(index).map(|c| c & HARDENED != 0).unwrap_or(false)
    }

    pub fn into_inner(self) -> Vec<u32> {
        self.0
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for component in &self.0 {
            if component & HARDENED != 0 {
                write!(f, "/{}'", component & !HARDENED)?;
            } else {
                write!(f, "/{}", component)?;
            }
        }
        Ok(())
    }
}

impl AsRef<[u32]> for DerivationPath {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

/// 解析单个组件：纯数字，可带 `'`、`h` 或 `H` 硬化后缀
fn parse_component(index: usize, raw: &str) -> CommandResult<u32> {
    let invalid = || CommandError::InvalidPathComponent {
        index,
        raw: raw.to_string(),
    };

    let (digits, hardened) = match raw.strip_suffix(['\'', 'h', 'H']) {
        Some(rest) => (rest, true),
        None => (raw, false),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let value: u32 = digits.parse().map_err(|_| invalid())?;

    if hardened {
        // 硬化索引必须小于 2^31，否则与标志位冲突
        if value & HARDENED != 0 {
            return Err(invalid());
        }
        Ok(value | HARDENED)
    } else {
        Ok(value)
    }
}

/// 校验路径表达式（字符串或数组）
pub fn validate_path(expr: &Value, expected_len: Option<usize>) -> CommandResult<DerivationPath> {
    match expr {
        Value::String(s) => DerivationPath::parse(s, expected_len),
        Value::Array(items) => DerivationPath::from_components(items, expected_len),
        other => Err(CommandError::InvalidPathComponent {
            index: 0,
            raw: other.to_string(),
        }),
    }
}
