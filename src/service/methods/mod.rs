//! 设备方法注册表
//!
//! 方法名 → 构造函数。同一个方法名总是构造同一种命令，从而映射到同一个传输层调用。

pub mod cardano_get_address;
pub mod cardano_get_public_key;
pub mod cardano_sign_transaction;

use std::{collections::HashMap, fmt};

use serde_json::Value;

pub use cardano_get_address::{CardanoAddressResponse, CardanoGetAddress};
pub use cardano_get_public_key::{CardanoGetPublicKey, CardanoPublicKeyResponse};
pub use cardano_sign_transaction::{CardanoSignTransaction, CardanoSignedTxResponse};

use crate::{
    error::{CommandError, CommandResult},
    metrics,
    service::command::{AnyCommand, Command, DeviceMethod, MethodContext},
};

type Builder = fn(&Value, &MethodContext<'_>) -> CommandResult<Box<dyn AnyCommand>>;

fn build_boxed<M: DeviceMethod + 'static>(
    payload: &Value,
    ctx: &MethodContext<'_>,
) -> CommandResult<Box<dyn AnyCommand>> {
    Ok(Box::new(Command::<M>::new(payload, ctx)?))
}

/// 方法注册表
#[derive(Clone)]
pub struct MethodRegistry {
    builders: HashMap<&'static str, Builder>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.names())
            .finish()
    }
}

impl MethodRegistry {
    /// 注册全部内置方法
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register::<CardanoSignTransaction>();
        registry.register::<CardanoGetAddress>();
        registry.register::<CardanoGetPublicKey>();
        registry
    }

    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// 注册方法，同名覆盖
    pub fn register<M: DeviceMethod + 'static>(&mut self) {
        self.builders.insert(M::NAME, build_boxed::<M>);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.builders.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// 按方法名构造命令
    pub fn build(
        &self,
        name: &str,
        payload: &Value,
        ctx: &MethodContext<'_>,
    ) -> CommandResult<Box<dyn AnyCommand>> {
        match self.builders.get(name) {
            Some(builder) => builder(payload, ctx),
            None => {
                metrics::inc_validation_failure();
                tracing::warn!(method = %name, "Unknown device method");
                Err(CommandError::UnknownMethod(name.to_string()))
            }
        }
    }
}

/// 使用内置方法表构造命令
pub fn build_command(
    name: &str,
    payload: &Value,
    ctx: &MethodContext<'_>,
) -> CommandResult<Box<dyn AnyCommand>> {
    MethodRegistry::new().build(name, payload, ctx)
}
