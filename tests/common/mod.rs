//! 测试辅助模块
//! 提供脚本化的模拟设备传输层

#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use ironcore_connect::{
    domain::{DerivationPath, DeviceModel, FirmwareVersion, StaticPermissionGate},
    service::{
        CardanoAddress, CardanoPublicKey, CardanoSignedTx, CardanoTxInput, CardanoTxOutput,
        DeviceFeatures, DeviceSession, DeviceTransport, HDNodeType, TransportError,
    },
};
use serde_json::{json, Value};

/// 设备收到的调用（按到达顺序记录）
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    SignTx {
        inputs: Vec<CardanoTxInput>,
        outputs: Vec<CardanoTxOutput>,
        fee: String,
        ttl: String,
        protocol_magic: u32,
    },
    GetAddress {
        address_n: DerivationPath,
        protocol_magic: u32,
        show_display: bool,
    },
    GetPublicKey {
        address_n: DerivationPath,
        show_display: bool,
    },
}

#[derive(Debug, Default)]
pub struct Journal {
    pub calls: Vec<RecordedCall>,
    in_flight: usize,
    pub max_in_flight: usize,
}

/// 模拟设备
pub struct MockTransport {
    features: DeviceFeatures,
    delay: Duration,
    failure: Option<TransportError>,
    journal: Arc<Mutex<Journal>>,
}

impl MockTransport {
    pub fn new(model: DeviceModel, version: FirmwareVersion) -> Self {
        Self {
            features: DeviceFeatures::new(model, version),
            delay: Duration::ZERO,
            failure: None,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    /// 支持 Cardano 的型号 T
    pub fn model_t() -> Self {
        Self::new(DeviceModel::T, FirmwareVersion::new(2, 3, 0))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 所有调用都返回该错误
    pub fn with_failure(mut self, failure: TransportError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn journal(&self) -> Arc<Mutex<Journal>> {
        self.journal.clone()
    }

    async fn enter(&self, call: RecordedCall) -> Result<(), TransportError> {
        {
            let mut journal = self.journal.lock().unwrap();
            journal.calls.push(call);
            journal.in_flight += 1;
            journal.max_in_flight = journal.max_in_flight.max(journal.in_flight);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.journal.lock().unwrap().in_flight -= 1;

        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeviceTransport for MockTransport {
    fn features(&self) -> &DeviceFeatures {
        &self.features
    }

    async fn cardano_sign_tx(
        &mut self,
        inputs: &[CardanoTxInput],
        outputs: &[CardanoTxOutput],
        fee: &str,
        ttl: &str,
        protocol_magic: u32,
    ) -> Result<CardanoSignedTx, TransportError> {
        self.enter(RecordedCall::SignTx {
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            fee: fee.to_string(),
            ttl: ttl.to_string(),
            protocol_magic,
        })
        .await?;

        Ok(CardanoSignedTx {
            tx_hash: "73e09bdebf98a9e0f17f86a2d11e0f14f4f8dae77cdf26ff1678e821f20c8db6".into(),
            serialized_tx: "83a400818258203b40265111d8bb3c3c608d95b3a0bf83461ace32".into(),
        })
    }

    async fn cardano_get_address(
        &mut self,
        address_n: &DerivationPath,
        protocol_magic: u32,
        show_display: bool,
    ) -> Result<CardanoAddress, TransportError> {
        self.enter(RecordedCall::GetAddress {
            address_n: address_n.clone(),
            protocol_magic,
            show_display,
        })
        .await?;

        Ok(CardanoAddress {
            address: "addr1q9mock".into(),
        })
    }

    async fn cardano_get_public_key(
        &mut self,
        address_n: &DerivationPath,
        show_display: bool,
    ) -> Result<CardanoPublicKey, TransportError> {
        self.enter(RecordedCall::GetPublicKey {
            address_n: address_n.clone(),
            show_display,
        })
        .await?;

        Ok(CardanoPublicKey {
            xpub: "d507c8f866691bd96e131334c355188b1a1d0b2fa0ab11545075aab332d77d9e".into(),
            node: HDNodeType {
                depth: 3,
                fingerprint: 0,
                child_num: 2147483648,
                chain_code: "ab".repeat(32),
                public_key: Some("cd".repeat(32)),
            },
        })
    }
}

/// 授予全部权限的会话
pub fn session_with(device: MockTransport) -> DeviceSession {
    DeviceSession::new(Box::new(device), Arc::new(StaticPermissionGate::allow_all()))
}

/// 签名请求样例
pub fn sign_payload() -> Value {
    json!({
        "inputs": [{
            "path": "m/1852'/1815'/0'/0/0",
            "prev_hash": "1af8fa0b754ff99253d983894e63a2b09cbb56c833ba18c3384210163f63dcfc",
            "prev_index": 0
        }],
        "outputs": [
            {
                "address": "addr1q84sh2j72ux0l03fxndjnhctdg7hcppsaejafsa84vh7lwgmcs5wgus8qt4atk45lvt4xfxpjtwfhdmvchdf2m3u3hlsd5tq5r",
                "amount": "3003112"
            },
            {
                "path": "m/1852'/1815'/0'/1/0",
                "amount": "7120787"
            }
        ],
        "fee": "42",
        "ttl": "10",
        "protocolMagic": 764824073u32
    })
}
