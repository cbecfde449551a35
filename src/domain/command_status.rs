//! 命令生命周期状态
//!
//! Constructing → Validated → Executing → Completed
//! Constructing → Failed
//! Executing → Failed

use std::fmt;

use serde::{Deserialize, Serialize};

/// 命令状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// 正在校验参数
    Constructing,

    /// 参数已校验并冻结，可以执行
    Validated,

    /// 设备调用进行中
    Executing,

    /// 设备已返回并完成响应映射
    Completed,

    /// 校验或执行失败
    Failed,
}

impl CommandStatus {
    /// 获取状态描述
    pub fn description(&self) -> &'static str {
        match self {
            Self::Constructing => "命令构造中",
            Self::Validated => "参数已校验",
            Self::Executing => "设备执行中",
            Self::Completed => "命令已完成",
            Self::Failed => "命令失败",
        }
    }

    /// 是否为最终状态（不可再转换）
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use CommandStatus::*;

        match (self, target) {
            // Constructing → Validated | Failed
            (Constructing, Validated) | (Constructing, Failed) => true,

            // Validated → Executing（执行前放弃不占用任何资源，无需转换）
            (Validated, Executing) => true,

            // Executing → Completed | Failed
            (Executing, Completed) | (Executing, Failed) => true,

            // 最终状态不可转换，其他转换非法
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constructing => "constructing",
            Self::Validated => "validated",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
