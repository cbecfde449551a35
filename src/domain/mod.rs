//! Domain 模块
//!
//! 参数校验、派生路径、固件区间等纯函数逻辑，不依赖设备与运行时

pub mod command_status;
pub mod derivation_path;
pub mod firmware;
pub mod network;
pub mod params_validator;
pub mod permission;

// Re-exports
pub use command_status::CommandStatus;
pub use derivation_path::{validate_path, DerivationPath, HARDENED};
pub use firmware::{
    resolve_firmware_range, DeviceModel, FirmwareRange, FirmwareVersion, ModelSupport,
    VersionInterval,
};
pub use network::{NetworkInfo, NetworkRegistry, NetworkSupport};
pub use params_validator::{validate_params, FieldDescriptor, FieldKind, Schema};
pub use permission::{Permission, PermissionGate, StaticPermissionGate};
