//! cardanoGetAddress

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{
        derivation_path::{validate_path, DerivationPath},
        params_validator::{get_opt_bool, get_u32, validate_params, FieldDescriptor, FieldKind, Schema},
        permission::Permission,
    },
    error::CommandResult,
    service::{
        command::{DeviceMethod, MethodContext},
        methods::cardano_sign_transaction::LINE_ITEM_PATH_LEN,
        transport::DeviceTransport,
    },
};

const PARAMS_SCHEMA: &Schema = &[
    FieldDescriptor::required("path", FieldKind::Path),
    FieldDescriptor::required("protocolMagic", FieldKind::Number),
    FieldDescriptor::optional("showOnTrezor", FieldKind::Boolean),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoGetAddress {
    pub address_n: DerivationPath,
    pub protocol_magic: u32,
    /// 是否在设备屏幕上确认地址（默认 true）
    pub show_on_trezor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoAddressResponse {
    pub path: Vec<u32>,
    pub serialized_path: String,
    pub address: String,
}

#[async_trait]
impl DeviceMethod for CardanoGetAddress {
    type Response = CardanoAddressResponse;

    const NAME: &'static str = "cardanoGetAddress";
    const INFO: &'static str = "Export Cardano address";
    const PERMISSIONS: &'static [Permission] = &[Permission::Read];
    const NETWORK: Option<&'static str> = Some("Cardano");

    fn from_payload(payload: &Value, _ctx: &MethodContext<'_>) -> CommandResult<Self> {
        let object = validate_params(payload, PARAMS_SCHEMA)?;
        Ok(Self {
            address_n: validate_path(
                object.get("path").unwrap_or(&Value::Null),
                Some(LINE_ITEM_PATH_LEN),
            )?,
            protocol_magic: get_u32(object, "protocolMagic")?,
            show_on_trezor: get_opt_bool(object, "showOnTrezor").unwrap_or(true),
        })
    }

    async fn run(&self, device: &mut dyn DeviceTransport) -> CommandResult<CardanoAddressResponse> {
        let reply = device
            .cardano_get_address(&self.address_n, self.protocol_magic, self.show_on_trezor)
            .await?;

        Ok(CardanoAddressResponse {
            path: self.address_n.components().to_vec(),
            serialized_path: self.address_n.to_string(),
            address: reply.address,
        })
    }
}
