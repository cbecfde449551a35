//! 声明式参数校验器
//!
//! 按 schema 顺序逐个检查字段，遇到第一个非法字段立即失败。
//! 顶层请求校验一次，每个嵌套条目（inputs/outputs）再各自校验一次。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CommandError, CommandResult};

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Array,
    /// 派生路径：字符串或数组，具体组件由 PathValidator 检查
    Path,
    /// 十进制字符串编码的整数金额，避免浮点精度丢失
    Amount,
    Object,
    /// 只检查是否存在
    Any,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Path => "path",
            Self::Amount => "amount",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    /// 检查 JSON 值是否符合该类型
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Path => value.is_string() || value.is_array(),
            Self::Amount => value.as_str().map(is_decimal_amount).unwrap_or(false),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 字段描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDescriptor {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// schema 即有序的字段描述列表
pub type Schema = [FieldDescriptor];

fn is_decimal_amount(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// 校验请求参数
///
/// # 返回
/// - Ok: 原始 payload 对象（未做任何修改）
/// - Err: `MissingField` 或 `TypeMismatch`，指明出错字段
pub fn validate_params<'a>(
    payload: &'a Value,
    schema: &Schema,
) -> CommandResult<&'a Map<String, Value>> {
    debug_assert!(has_unique_names(schema), "duplicate field in schema");

    let object = payload.as_object().ok_or_else(|| CommandError::TypeMismatch {
        field: "payload".to_string(),
        expected: FieldKind::Object,
    })?;

    for field in schema {
        let value = match object.get(field.name) {
            Some(Value::Null) | None => {
                if field.required {
                    return Err(CommandError::MissingField(field.name.to_string()));
                }
                continue;
            }
            Some(value) => value,
        };

        if !field.kind.matches(value) {
            return Err(CommandError::TypeMismatch {
                field: field.name.to_string(),
                expected: field.kind,
            });
        }
    }

    Ok(object)
}

/// schema 内字段名必须唯一
pub fn has_unique_names(schema: &Schema) -> bool {
    schema
        .iter()
        .enumerate()
        .all(|(i, a)| schema[i + 1..].iter().all(|b| a.name != b.name))
}

// ============ 取值辅助函数（仅在 validate_params 通过后调用） ============

pub(crate) fn get_str<'a>(object: &'a Map<String, Value>, name: &str) -> CommandResult<&'a str> {
    object
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| CommandError::TypeMismatch {
            field: name.to_string(),
            expected: FieldKind::String,
        })
}

/// 读取可选字符串，null 视为缺省
pub(crate) fn get_opt_str<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    object.get(name).and_then(Value::as_str)
}

/// 读取 u32 数值；负数、小数或超过 u32 范围视为类型错误
pub(crate) fn get_u32(object: &Map<String, Value>, name: &str) -> CommandResult<u32> {
    object
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| CommandError::TypeMismatch {
            field: name.to_string(),
            expected: FieldKind::Number,
        })
}

pub(crate) fn get_opt_u32(object: &Map<String, Value>, name: &str) -> CommandResult<Option<u32>> {
    match object.get(name) {
        Some(Value::Null) | None => Ok(None),
        Some(_) => get_u32(object, name).map(Some),
    }
}

pub(crate) fn get_opt_bool(object: &Map<String, Value>, name: &str) -> Option<bool> {
    object.get(name).and_then(Value::as_bool)
}

pub(crate) fn get_array<'a>(
    object: &'a Map<String, Value>,
    name: &str,
) -> CommandResult<&'a Vec<Value>> {
    object
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| CommandError::TypeMismatch {
            field: name.to_string(),
            expected: FieldKind::Array,
        })
}
