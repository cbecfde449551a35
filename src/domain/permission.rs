//! 命令权限标签与授权检查
//!
//! 命令只声明所需权限；是否放行由外部注入的 `PermissionGate` 决定
//! （例如弹窗请求用户确认）。会话在执行前调用一次。

use std::{collections::HashSet, fmt};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CommandError, CommandResult};

/// 权限标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// 读取公钥、地址等
    Read,
    /// 签名等会改变外部状态的操作
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 授权检查接口
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// 检查调用方是否拥有 `required` 中的全部权限
    async fn authorize(&self, method: &str, required: &[Permission]) -> CommandResult<()>;
}

/// 静态授权：预先授予一组权限
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionGate {
    granted: HashSet<Permission>,
}

impl StaticPermissionGate {
    pub fn new(granted: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            granted: granted.into_iter().collect(),
        }
    }

    /// 授予全部权限
    pub fn allow_all() -> Self {
        Self::new([Permission::Read, Permission::Write])
    }
}

/// 权限检查：要求全部权限
pub fn require_permissions(
    granted: &HashSet<Permission>,
    method: &str,
    required: &[Permission],
) -> CommandResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|p| !granted.contains(*p))
        .map(Permission::as_str)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CommandError::PermissionDenied(format!(
            "{} requires permissions: {}",
            method,
            missing.join(", ")
        )))
    }
}

#[async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn authorize(&self, method: &str, required: &[Permission]) -> CommandResult<()> {
        require_permissions(&self.granted, method, required)
    }
}
