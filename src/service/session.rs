//! 设备会话
//!
//! 会话持有设备句柄（互斥锁即串行化点）、权限检查和网络注册表。
//! 执行顺序：状态 Validated → Executing、权限检查、获取设备锁、固件兼容检查、
//! 单次传输调用（可选超时/取消）、结算为 Completed 或 Failed。

use std::{sync::Arc, time::Duration};

use futures::future::{AbortRegistration, Abortable};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    config::Config,
    domain::{network::NetworkRegistry, permission::PermissionGate},
    error::{CommandError, CommandResult},
    service::{
        command::{
            lifecycle::Lifecycle, AnyCommand, Command, DeviceMethod, Executable, InFlight,
            MethodContext, OutputConflictPolicy,
        },
        methods::MethodRegistry,
        transport::{DeviceFeatures, DeviceTransport},
    },
};

/// 设备会话
pub struct DeviceSession {
    device: Arc<Mutex<Box<dyn DeviceTransport>>>,
    permissions: Arc<dyn PermissionGate>,
    networks: Arc<NetworkRegistry>,
    methods: MethodRegistry,
    output_conflict: OutputConflictPolicy,
    call_timeout: Option<Duration>,
}

impl DeviceSession {
    pub fn new(device: Box<dyn DeviceTransport>, permissions: Arc<dyn PermissionGate>) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            permissions,
            networks: Arc::new(NetworkRegistry::new()),
            methods: MethodRegistry::new(),
            output_conflict: OutputConflictPolicy::default(),
            call_timeout: None,
        }
    }

    /// 按配置创建会话（网络表、输出冲突策略、调用超时）
    pub fn from_config(
        config: &Config,
        device: Box<dyn DeviceTransport>,
        permissions: Arc<dyn PermissionGate>,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(device, permissions)
            .with_networks(Arc::new(config.network_registry()?))
            .with_output_conflict(config.device.output_conflict_policy()?)
            .with_call_timeout(config.device.call_timeout()))
    }

    pub fn with_networks(mut self, networks: Arc<NetworkRegistry>) -> Self {
        self.networks = networks;
        self
    }

    pub fn with_methods(mut self, methods: MethodRegistry) -> Self {
        self.methods = methods;
        self
    }

    pub fn with_output_conflict(mut self, policy: OutputConflictPolicy) -> Self {
        self.output_conflict = policy;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    pub fn context(&self) -> MethodContext<'_> {
        MethodContext::new(&self.networks).with_output_conflict(self.output_conflict)
    }

    /// 当前设备的特征信息（会等待正在执行的命令）
    pub async fn features(&self) -> DeviceFeatures {
        self.device.lock().await.features().clone()
    }

    pub fn build<M: DeviceMethod>(&self, payload: &Value) -> CommandResult<Command<M>> {
        Command::new(payload, &self.context())
    }

    pub fn build_dynamic(&self, name: &str, payload: &Value) -> CommandResult<Box<dyn AnyCommand>> {
        self.methods.build(name, payload, &self.context())
    }

    pub async fn execute<C: Executable>(&self, command: &mut C) -> CommandResult<C::Output> {
        self.run(command, None).await
    }

    /// 可取消的执行：`AbortHandle::abort()` 会丢弃正在进行的传输调用，命令进入 Failed
    pub async fn execute_with_abort<C: Executable>(
        &self,
        command: &mut C,
        registration: AbortRegistration,
    ) -> CommandResult<C::Output> {
        self.run(command, Some(registration)).await
    }

    /// 按方法名构造并执行，响应以 JSON 返回
    pub async fn call(&self, name: &str, payload: &Value) -> CommandResult<Value> {
        let mut command = self.build_dynamic(name, payload)?;
        self.execute(&mut command).await
    }

    async fn run<C: Executable>(
        &self,
        command: &mut C,
        abort: Option<AbortRegistration>,
    ) -> CommandResult<C::Output> {
        // 调用方丢弃本 future 时，InFlight 负责把命令结算为 Failed
        let in_flight = InFlight::begin(command)?;
        let result = self.dispatch(in_flight.command(), abort).await;
        in_flight.settle(result)
    }

    async fn dispatch<C: Executable>(
        &self,
        command: &C,
        abort: Option<AbortRegistration>,
    ) -> CommandResult<C::Output> {
        let meta = command.meta();
        self.permissions
            .authorize(meta.name, &meta.required_permissions)
            .await?;

        let mut device = self.device.lock().await;

        let features = device.features().clone();
        meta.firmware_range
            .check(meta.name, features.model, features.version)?;

        let call = command.run(&mut **device);
        let guarded = async move {
            match abort {
                Some(registration) => match Abortable::new(call, registration).await {
                    Ok(result) => result,
                    Err(_aborted) => Err(CommandError::Cancelled),
                },
                None => call.await,
            }
        };

        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .unwrap_or(Err(CommandError::Timeout(limit.as_millis() as u64))),
            None => guarded.await,
        }
    }
}
