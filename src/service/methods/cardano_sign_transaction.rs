//! cardanoSignTransaction
//!
//! 校验输入/输出条目并调用 `cardano_sign_tx`，返回 `{ hash, serializedTx }`。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{
        derivation_path::validate_path,
        params_validator::{
            get_array, get_opt_str, get_opt_u32, get_str, get_u32, validate_params,
            FieldDescriptor, FieldKind, Schema,
        },
        permission::Permission,
    },
    error::{CommandError, CommandResult},
    service::{
        command::{DeviceMethod, MethodContext, OutputConflictPolicy},
        transport::{CardanoTxInput, CardanoTxOutput, DeviceTransport},
    },
};

/// 输入/输出条目的地址路径长度：m/purpose'/coin'/account'/role/index
pub const LINE_ITEM_PATH_LEN: usize = 5;

const PARAMS_SCHEMA: &Schema = &[
    FieldDescriptor::required("inputs", FieldKind::Array),
    FieldDescriptor::required("outputs", FieldKind::Array),
    FieldDescriptor::required("fee", FieldKind::Amount),
    FieldDescriptor::required("ttl", FieldKind::Amount),
    FieldDescriptor::required("protocolMagic", FieldKind::Number),
];

const INPUT_SCHEMA: &Schema = &[
    FieldDescriptor::required("path", FieldKind::Path),
    FieldDescriptor::required("prev_hash", FieldKind::String),
    FieldDescriptor::required("prev_index", FieldKind::Number),
    FieldDescriptor::optional("type", FieldKind::Number),
];

const OUTPUT_SCHEMA: &Schema = &[
    FieldDescriptor::optional("address", FieldKind::String),
    FieldDescriptor::optional("path", FieldKind::Path),
    FieldDescriptor::required("amount", FieldKind::Amount),
];

/// 校验后的签名参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoSignTransaction {
    pub inputs: Vec<CardanoTxInput>,
    pub outputs: Vec<CardanoTxOutput>,
    pub fee: String,
    pub ttl: String,
    pub protocol_magic: u32,
}

/// 签名响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardanoSignedTxResponse {
    pub hash: String,
    #[serde(rename = "serializedTx")]
    pub serialized_tx: String,
}

/// 条目必须是对象，否则直接指出条目位置
fn ensure_object(list: &str, index: usize, item: &Value) -> CommandResult<()> {
    if item.is_object() {
        Ok(())
    } else {
        Err(CommandError::TypeMismatch {
            field: format!("{}[{}]", list, index),
            expected: FieldKind::Object,
        })
    }
}

fn parse_input(index: usize, item: &Value) -> CommandResult<CardanoTxInput> {
    ensure_object("inputs", index, item)?;
    input_fields(item).map_err(|e| e.in_item("inputs", index))
}

fn input_fields(item: &Value) -> CommandResult<CardanoTxInput> {
    let object = validate_params(item, INPUT_SCHEMA)?;
    Ok(CardanoTxInput {
        address_n: validate_path(
            object.get("path").unwrap_or(&Value::Null),
            Some(LINE_ITEM_PATH_LEN),
        )
        .map_err(|e| e.at_field("path"))?,
        prev_hash: get_str(object, "prev_hash")?.to_string(),
        prev_index: get_u32(object, "prev_index")?,
        input_type: get_opt_u32(object, "type")?,
    })
}

fn parse_output(
    index: usize,
    item: &Value,
    policy: OutputConflictPolicy,
) -> CommandResult<CardanoTxOutput> {
    ensure_object("outputs", index, item)?;
    output_fields(index, item, policy).map_err(|e| e.in_item("outputs", index))
}

/// 有路径即为找零输出（ByPath），否则必须提供外部地址（ByValue）
fn output_fields(
    index: usize,
    item: &Value,
    policy: OutputConflictPolicy,
) -> CommandResult<CardanoTxOutput> {
    let object = validate_params(item, OUTPUT_SCHEMA)?;
    let amount = get_str(object, "amount")?.to_string();
    let path = object.get("path").filter(|v| !v.is_null());
    let address = get_opt_str(object, "address");

    match (path, address) {
        (Some(path), address) => {
            if address.is_some() {
                match policy {
                    OutputConflictPolicy::Reject => {
                        return Err(CommandError::ConflictingOutput { index });
                    }
                    OutputConflictPolicy::PreferPath => {
                        tracing::warn!(
                            output_index = index,
                            "Output supplies both path and address, address ignored"
                        );
                    }
                }
            }
            Ok(CardanoTxOutput::ByPath {
                address_n: validate_path(path, Some(LINE_ITEM_PATH_LEN))
                    .map_err(|e| e.at_field("path"))?,
                amount,
            })
        }
        (None, Some(address)) => Ok(CardanoTxOutput::ByValue {
            address: address.to_string(),
            amount,
        }),
        (None, None) => Err(CommandError::MissingField("address".to_string())),
    }
}

#[async_trait]
impl DeviceMethod for CardanoSignTransaction {
    type Response = CardanoSignedTxResponse;

    const NAME: &'static str = "cardanoSignTransaction";
    const INFO: &'static str = "Sign Cardano transaction";
    const PERMISSIONS: &'static [Permission] = &[Permission::Read, Permission::Write];
    const NETWORK: Option<&'static str> = Some("Cardano");

    fn from_payload(payload: &Value, ctx: &MethodContext<'_>) -> CommandResult<Self> {
        let object = validate_params(payload, PARAMS_SCHEMA)?;

        let inputs = get_array(object, "inputs")?
            .iter()
            .enumerate()
            .map(|(index, item)| parse_input(index, item))
            .collect::<CommandResult<Vec<_>>>()?;

        let outputs = get_array(object, "outputs")?
            .iter()
            .enumerate()
            .map(|(index, item)| parse_output(index, item, ctx.output_conflict))
            .collect::<CommandResult<Vec<_>>>()?;

        Ok(Self {
            inputs,
            outputs,
            fee: get_str(object, "fee")?.to_string(),
            ttl: get_str(object, "ttl")?.to_string(),
            protocol_magic: get_u32(object, "protocolMagic")?,
        })
    }

    async fn run(&self, device: &mut dyn DeviceTransport) -> CommandResult<CardanoSignedTxResponse> {
        let signed = device
            .cardano_sign_tx(
                &self.inputs,
                &self.outputs,
                &self.fee,
                &self.ttl,
                self.protocol_magic,
            )
            .await?;

        Ok(CardanoSignedTxResponse {
            hash: signed.tx_hash,
            serialized_tx: signed.serialized_tx,
        })
    }
}
