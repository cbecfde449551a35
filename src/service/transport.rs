//! 设备传输层接口
//!
//! 每个设备操作对应一个固定签名的方法，参数顺序属于操作契约的一部分。
//! 字节级编码、加密、USB/蓝牙/桥接通信均由实现方负责，本层只定义接口与消息形状。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    derivation_path::DerivationPath,
    firmware::{DeviceModel, FirmwareVersion},
};

/// 传输层或设备返回的错误，原样透传给调用方
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct TransportError {
    /// 设备失败码（如 `Failure_ActionCancelled`）或传输层错误码
    pub code: String,
    pub message: String,
}

impl TransportError {
    /// 设备返回的失败消息
    pub fn device(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 设备断开连接
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::device("Transport_Disconnected", message)
    }
}

/// 设备上报的特征信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFeatures {
    pub model: DeviceModel,
    pub version: FirmwareVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl DeviceFeatures {
    pub fn new(model: DeviceModel, version: FirmwareVersion) -> Self {
        Self {
            model,
            version,
            label: None,
        }
    }
}

// ============ 设备消息 ============

/// 交易输入（始终由派生路径标识）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardanoTxInput {
    pub address_n: DerivationPath,
    pub prev_hash: String,
    pub prev_index: u32,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<u32>,
}

/// 交易输出：找零到自有地址（派生路径）或支付到外部地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardanoTxOutput {
    ByPath {
        address_n: DerivationPath,
        amount: String,
    },
    ByValue {
        address: String,
        amount: String,
    },
}

impl CardanoTxOutput {
    pub fn amount(&self) -> &str {
        match self {
            Self::ByPath { amount, .. } | Self::ByValue { amount, .. } => amount,
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Self::ByPath { .. })
    }
}

/// 签名结果（设备原始字段名）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardanoSignedTx {
    pub tx_hash: String,
    pub serialized_tx: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardanoAddress {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HDNodeType {
    pub depth: u32,
    pub fingerprint: u32,
    pub child_num: u32,
    pub chain_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardanoPublicKey {
    pub xpub: String,
    pub node: HDNodeType,
}

/// 设备传输句柄
///
/// 句柄由会话持有，执行期间以 `&mut` 借给命令，命令不会保留它。
/// 同一句柄上不允许并发调用，`&mut self` 在类型层面保证这一点。
#[async_trait]
pub trait DeviceTransport: Send {
    /// 当前连接设备的特征信息
    fn features(&self) -> &DeviceFeatures;

    async fn cardano_sign_tx(
        &mut self,
        inputs: &[CardanoTxInput],
        outputs: &[CardanoTxOutput],
        fee: &str,
        ttl: &str,
        protocol_magic: u32,
    ) -> Result<CardanoSignedTx, TransportError>;

    async fn cardano_get_address(
        &mut self,
        address_n: &DerivationPath,
        protocol_magic: u32,
        show_display: bool,
    ) -> Result<CardanoAddress, TransportError>;

    async fn cardano_get_public_key(
        &mut self,
        address_n: &DerivationPath,
        show_display: bool,
    ) -> Result<CardanoPublicKey, TransportError>;
}
