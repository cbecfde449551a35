//! cardanoGetPublicKey

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{
        derivation_path::{validate_path, DerivationPath},
        params_validator::{get_opt_bool, validate_params, FieldDescriptor, FieldKind, Schema},
        permission::Permission,
    },
    error::CommandResult,
    service::{
        command::{DeviceMethod, MethodContext},
        transport::{DeviceTransport, HDNodeType},
    },
};

/// 账户级路径：m/purpose'/coin'/account'
pub const ACCOUNT_PATH_LEN: usize = 3;

const PARAMS_SCHEMA: &Schema = &[
    FieldDescriptor::required("path", FieldKind::Path),
    FieldDescriptor::optional("showOnTrezor", FieldKind::Boolean),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoGetPublicKey {
    pub address_n: DerivationPath,
    pub show_on_trezor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoPublicKeyResponse {
    pub path: Vec<u32>,
    pub serialized_path: String,
    pub public_key: String,
    pub node: HDNodeType,
}

#[async_trait]
impl DeviceMethod for CardanoGetPublicKey {
    type Response = CardanoPublicKeyResponse;

    const NAME: &'static str = "cardanoGetPublicKey";
    const INFO: &'static str = "Export Cardano public key";
    const PERMISSIONS: &'static [Permission] = &[Permission::Read];
    const NETWORK: Option<&'static str> = Some("Cardano");

    fn from_payload(payload: &Value, _ctx: &MethodContext<'_>) -> CommandResult<Self> {
        let object = validate_params(payload, PARAMS_SCHEMA)?;
        Ok(Self {
            address_n: validate_path(
                object.get("path").unwrap_or(&Value::Null),
                Some(ACCOUNT_PATH_LEN),
            )?,
            show_on_trezor: get_opt_bool(object, "showOnTrezor").unwrap_or(true),
        })
    }

    async fn run(&self, device: &mut dyn DeviceTransport) -> CommandResult<CardanoPublicKeyResponse> {
        let reply = device
            .cardano_get_public_key(&self.address_n, self.show_on_trezor)
            .await?;

        Ok(CardanoPublicKeyResponse {
            path: self.address_n.components().to_vec(),
            serialized_path: self.address_n.to_string(),
            public_key: reply.xpub,
            node: reply.node,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        domain::{network::NetworkRegistry, params_validator::has_unique_names},
        error::CommandError,
    };

    fn build(payload: Value) -> CommandResult<CardanoGetPublicKey> {
        let networks = NetworkRegistry::new();
        CardanoGetPublicKey::from_payload(&payload, &MethodContext::new(&networks))
    }

    #[test]
    fn test_schema_has_unique_names() {
        assert!(has_unique_names(PARAMS_SCHEMA));
    }

    #[test]
    fn test_account_path() {
        let params = build(json!({ "path": "m/1852'/1815'/2'" })).unwrap();
        assert_eq!(params.address_n, DerivationPath::cardano_account(2));
        assert!(params.show_on_trezor);
    }

    #[test]
    fn test_rejects_address_level_path() {
        assert_eq!(
            build(json!({ "path": "m/1852'/1815'/0'/0/0" })).unwrap_err(),
            CommandError::PathLengthMismatch {
                expected: 3,
                actual: 5
            }
        );
        assert_eq!(
            build(json!({})).unwrap_err(),
            CommandError::MissingField("path".into())
        );
    }
}
