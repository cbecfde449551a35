//! IronCore Connect - 硬件钱包命令校验与分发层
//!
//! 请求在构造命令时完成全部校验（参数、派生路径、固件区间），
//! 执行时只向设备发起一次传输调用。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod service;

// 重新导出常用类型
pub use error::{CommandError, CommandResult, ErrorBody};

// 统一模块导出
pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{
            DerivationPath, DeviceModel, FirmwareRange, FirmwareVersion, NetworkInfo,
            NetworkRegistry, Permission, PermissionGate, StaticPermissionGate,
        },
        error::{CommandError, CommandResult},
        service::{
            build_command, Command, DeviceMethod, DeviceSession, DeviceTransport, Executable,
            MethodContext, OutputConflictPolicy,
        },
    };
}
