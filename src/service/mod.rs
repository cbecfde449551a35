//! Service 模块
//!
//! 命令生命周期、设备方法、会话与传输层接口

pub mod command;
pub mod methods;
pub mod session;
pub mod transport;

pub use command::{
    AnyCommand, Command, CommandDescription, CommandMeta, DeviceMethod, Executable,
    MethodContext, OutputConflictPolicy,
};
pub use methods::{
    build_command, CardanoAddressResponse, CardanoGetAddress, CardanoGetPublicKey,
    CardanoPublicKeyResponse, CardanoSignTransaction, CardanoSignedTxResponse, MethodRegistry,
};
pub use session::DeviceSession;
pub use transport::{
    CardanoAddress, CardanoPublicKey, CardanoSignedTx, CardanoTxInput, CardanoTxOutput,
    DeviceFeatures, DeviceTransport, HDNodeType, TransportError,
};
