//! 统一错误定义
//!
//! 所有校验错误在命令构造阶段同步返回，不可重试；
//! 执行阶段的传输层错误原样透传给调用方，本层不做任何重试。

use serde::Serialize;

use crate::{
    domain::{
        command_status::CommandStatus,
        firmware::{DeviceModel, FirmwareVersion},
        params_validator::FieldKind,
    },
    service::transport::TransportError,
};

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    // 参数校验错误
    #[error("Parameter \"{0}\" is missing")]
    MissingField(String),

    #[error("Parameter \"{field}\" has invalid type. \"{expected}\" expected")]
    TypeMismatch { field: String, expected: FieldKind },

    #[error("Invalid derivation path component #{index}: \"{raw}\"")]
    InvalidPathComponent { index: usize, raw: String },

    #[error("Derivation path has invalid length: expected {expected}, got {actual}")]
    PathLengthMismatch { expected: usize, actual: usize },

    /// 嵌套条目中的路径错误，带字段位置（如 `inputs[3].path`）
    #[error("Parameter \"{field}\": {cause}")]
    InvalidPathField {
        field: String,
        cause: Box<CommandError>,
    },

    #[error("Output #{index} supplies both a derivation path and an address")]
    ConflictingOutput { index: usize },

    // 固件/网络错误
    #[error("Firmware range override for \"{method}\" does not intersect base range on model {model}")]
    IncompatibleRangeOverride { method: String, model: DeviceModel },

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Method \"{method}\" is not supported by firmware {version} on model {model}")]
    FirmwareNotSupported {
        method: String,
        model: DeviceModel,
        version: FirmwareVersion,
    },

    // 执行阶段错误
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Command cannot move from {from} to {to}")]
    InvalidState {
        from: CommandStatus,
        to: CommandStatus,
    },

    #[error("Device call cancelled")]
    Cancelled,

    #[error("Device call timed out after {0} ms")]
    Timeout(u64),

    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    #[error("Failed to serialize response: {0}")]
    Serialization(String),
}

/// 返回给调用方的错误体
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody<'a> {
    pub code: &'a str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<&'a str>,
}

impl CommandError {
    /// 稳定的错误码（snake_case）
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::InvalidPathComponent { .. } => "invalid_path_component",
            Self::PathLengthMismatch { .. } => "path_length_mismatch",
            Self::InvalidPathField { cause, .. } => cause.code(),
            Self::ConflictingOutput { .. } => "conflicting_output",
            Self::IncompatibleRangeOverride { .. } => "incompatible_range_override",
            Self::UnknownNetwork(_) => "unknown_network",
            Self::UnknownMethod(_) => "unknown_method",
            Self::FirmwareNotSupported { .. } => "firmware_not_supported",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidState { .. } => "invalid_state",
            Self::Cancelled => "cancelled",
            Self::Timeout(_) => "timeout",
            Self::TransportFailure(_) => "transport_failure",
            Self::Serialization(_) => "serialization",
        }
    }

    /// 是否为构造阶段同步返回的校验错误（不可重试）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::TypeMismatch { .. }
                | Self::InvalidPathComponent { .. }
                | Self::PathLengthMismatch { .. }
                | Self::InvalidPathField { .. }
                | Self::ConflictingOutput { .. }
                | Self::IncompatibleRangeOverride { .. }
                | Self::UnknownNetwork(_)
        )
    }

    /// 调用方是否可以原样重新提交
    ///
    /// 校验错误必须修正请求后再提交；超时和传输错误可以由会话层决定是否重试。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::TransportFailure(_))
    }

    /// 给路径错误附上字段名；其他错误原样返回
    pub fn at_field(self, field: &str) -> Self {
        match self {
            Self::InvalidPathComponent { .. } | Self::PathLengthMismatch { .. } => {
                Self::InvalidPathField {
                    field: field.to_string(),
                    cause: Box::new(self),
                }
            }
            other => other,
        }
    }

    /// 去掉位置包装后的原始错误
    pub fn root_cause(&self) -> &CommandError {
        match self {
            Self::InvalidPathField { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// 为嵌套条目的字段错误加上位置前缀，例如 `inputs[0].prev_hash`
    pub fn in_item(self, list: &str, index: usize) -> Self {
        match self {
            Self::InvalidPathField { field, cause } => Self::InvalidPathField {
                field: format!("{}[{}].{}", list, index, field),
                cause,
            },
            Self::MissingField(field) => {
                Self::MissingField(format!("{}[{}].{}", list, index, field))
            }
            Self::TypeMismatch { field, expected } => Self::TypeMismatch {
                field: format!("{}[{}].{}", list, index, field),
                expected,
            },
            other => other,
        }
    }

    pub fn to_body<'a>(&self, trace_id: Option<&'a str>) -> ErrorBody<'a> {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            trace_id,
        }
    }
}
