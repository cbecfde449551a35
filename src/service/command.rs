//! 设备命令
//!
//! 命令在构造时完成全部参数校验，之后参数冻结不可变；
//! `execute` 借用设备句柄，只发起一次设备调用，并把原始返回映射成调用方响应。

use std::{fmt, str::FromStr, time::Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::{
        command_status::CommandStatus,
        firmware::{resolve_firmware_range, FirmwareRange},
        network::NetworkRegistry,
        permission::Permission,
    },
    error::{CommandError, CommandResult},
    metrics,
    service::transport::DeviceTransport,
};

/// 输出同时提供派生路径和地址时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputConflictPolicy {
    /// 以派生路径为准，忽略地址（记录警告）
    #[default]
    PreferPath,
    /// 直接拒绝
    Reject,
}

impl FromStr for OutputConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prefer_path" | "prefer-path" => Ok(Self::PreferPath),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "Unknown output conflict policy: {} (expected prefer_path or reject)",
                other
            )),
        }
    }
}

/// 方法构造上下文
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'a> {
    pub networks: &'a NetworkRegistry,
    pub output_conflict: OutputConflictPolicy,
}

impl<'a> MethodContext<'a> {
    pub fn new(networks: &'a NetworkRegistry) -> Self {
        Self {
            networks,
            output_conflict: OutputConflictPolicy::default(),
        }
    }

    pub fn with_output_conflict(mut self, policy: OutputConflictPolicy) -> Self {
        self.output_conflict = policy;
        self
    }
}

/// 设备方法
///
/// 实现方本身就是校验后的参数集合。`from_payload` 负责校验和规范化，
/// `run` 负责按固定顺序调用一次传输层并映射返回值。
#[async_trait]
pub trait DeviceMethod: Serialize + Send + Sync + Sized {
    type Response: Serialize + Send;

    /// 方法名（与传输层操作一一对应）
    const NAME: &'static str;
    /// 人类可读的描述
    const INFO: &'static str;
    const PERMISSIONS: &'static [Permission];
    /// 用于收窄固件区间的网络名
    const NETWORK: Option<&'static str> = None;

    /// 方法自身的基础固件区间
    fn base_firmware_range() -> FirmwareRange {
        FirmwareRange::default()
    }

    fn from_payload(payload: &Value, ctx: &MethodContext<'_>) -> CommandResult<Self>;

    async fn run(&self, device: &mut dyn DeviceTransport) -> CommandResult<Self::Response>;
}

/// 命令元信息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMeta {
    pub id: Uuid,
    pub name: &'static str,
    pub required_permissions: Vec<Permission>,
    pub firmware_range: FirmwareRange,
    pub info: String,
}

/// 命令描述（dry run 输出）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDescription<'a, P: Serialize> {
    #[serde(flatten)]
    pub meta: &'a CommandMeta,
    pub status: CommandStatus,
    pub params: &'a P,
}

/// 已校验的命令
#[derive(Debug)]
pub struct Command<M: DeviceMethod> {
    meta: CommandMeta,
    method: M,
    status: CommandStatus,
    failure: Option<CommandError>,
    started_at: Option<Instant>,
}

impl<M: DeviceMethod> Command<M> {
    /// 校验原始请求并构造命令
    ///
    /// 任一校验失败直接返回错误，调用方拿不到处于 Failed 状态的命令。
    pub fn new(payload: &Value, ctx: &MethodContext<'_>) -> CommandResult<Self> {
        let id = Uuid::new_v4();
        match Self::construct(id, payload, ctx) {
            Ok(command) => {
                metrics::inc_command_built();
                tracing::debug!(
                    command_id = %id,
                    method = M::NAME,
                    status = %command.status,
                    "Command validated"
                );
                Ok(command)
            }
            Err(e) => {
                metrics::inc_validation_failure();
                tracing::warn!(
                    command_id = %id,
                    method = M::NAME,
                    code = e.code(),
                    error = %e,
                    "Command validation failed"
                );
                Err(e)
            }
        }
    }

    fn construct(id: Uuid, payload: &Value, ctx: &MethodContext<'_>) -> CommandResult<Self> {
        let network = match M::NETWORK {
            Some(name) => Some(ctx.networks.lookup(name)?),
            None => None,
        };
        let firmware_range =
            resolve_firmware_range(M::NAME, network, &M::base_firmware_range())?;

        let method = M::from_payload(payload, ctx)?;

        // Constructing → Validated；构造失败时调用方只拿到错误
        Ok(Self {
            meta: CommandMeta {
                id,
                name: M::NAME,
                required_permissions: M::PERMISSIONS.to_vec(),
                firmware_range,
                info: M::INFO.to_string(),
            },
            method,
            status: CommandStatus::Validated,
            failure: None,
            started_at: None,
        })
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    pub fn name(&self) -> &'static str {
        M::NAME
    }

    /// 校验后的参数
    pub fn params(&self) -> &M {
        &self.method
    }

    pub fn status(&self) -> CommandStatus {
        self.status
    }

    /// 执行失败的原因
    pub fn failure(&self) -> Option<&CommandError> {
        self.failure.as_ref()
    }

    pub fn describe(&self) -> CommandDescription<'_, M> {
        CommandDescription {
            meta: &self.meta,
            status: self.status,
            params: &self.method,
        }
    }

    /// 直接在设备句柄上执行（不经过会话的权限/固件检查）
    pub async fn execute(
        &mut self,
        device: &mut dyn DeviceTransport,
    ) -> CommandResult<M::Response> {
        let in_flight = InFlight::begin(self)?;
        let result = in_flight.command().method.run(device).await;
        in_flight.settle(result)
    }

    /// Validated → Executing
    pub(crate) fn begin(&mut self) -> CommandResult<()> {
        self.transition(CommandStatus::Executing)?;
        self.started_at = Some(Instant::now());
        tracing::info!(
            command_id = %self.meta.id,
            method = M::NAME,
            "Executing device command"
        );
        Ok(())
    }

    /// Executing → Completed | Failed
    pub(crate) fn settle(
        &mut self,
        result: CommandResult<M::Response>,
    ) -> CommandResult<M::Response> {
        self.record(result.as_ref().err())?;
        result
    }

    fn ensure_executing(&self) -> CommandResult<()> {
        if self.status != CommandStatus::Executing {
            return Err(CommandError::InvalidState {
                from: self.status,
                to: CommandStatus::Executing,
            });
        }
        Ok(())
    }

    fn record(&mut self, error: Option<&CommandError>) -> CommandResult<()> {
        let target = match error {
            None => CommandStatus::Completed,
            Some(_) => CommandStatus::Failed,
        };
        self.transition(target)?;

        let elapsed_ms = self
            .started_at
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        match error {
            None => {
                metrics::observe_execution(M::NAME, elapsed_ms, true);
                tracing::info!(
                    command_id = %self.meta.id,
                    method = M::NAME,
                    elapsed_ms = elapsed_ms as u64,
                    "Device command completed"
                );
            }
            Some(e) => {
                self.failure = Some(e.clone());
                metrics::observe_execution(M::NAME, elapsed_ms, false);
                tracing::warn!(
                    command_id = %self.meta.id,
                    method = M::NAME,
                    elapsed_ms = elapsed_ms as u64,
                    code = e.code(),
                    error = %e,
                    "Device command failed"
                );
            }
        }
        Ok(())
    }

    fn transition(&mut self, target: CommandStatus) -> CommandResult<()> {
        if !self.status.can_transition_to(&target) {
            return Err(CommandError::InvalidState {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }
}

/// 生命周期步骤只在 crate 内可见，外部只能通过 `execute` 走完整状态机
pub(crate) mod lifecycle {
    use async_trait::async_trait;
    use serde_json::Value;

    use crate::{error::CommandResult, service::transport::DeviceTransport};

    #[async_trait]
    pub trait Lifecycle: Send + Sync {
        type Output: Send;

        fn begin(&mut self) -> CommandResult<()>;
        async fn run(&self, device: &mut dyn DeviceTransport) -> CommandResult<Self::Output>;
        fn settle(&mut self, result: CommandResult<Self::Output>) -> CommandResult<Self::Output>;
    }

    /// 类型擦除命令的生命周期，响应为 JSON
    #[async_trait]
    pub trait ErasedLifecycle: Send + Sync {
        fn begin(&mut self) -> CommandResult<()>;
        async fn run_json(&self, device: &mut dyn DeviceTransport) -> CommandResult<Value>;
        fn settle_json(&mut self, result: CommandResult<Value>) -> CommandResult<Value>;
    }
}

use lifecycle::{ErasedLifecycle, Lifecycle};

/// 正在执行的命令
///
/// 在结算前被丢弃（外层超时、select 分支被取消）时，命令结算为 Failed(Cancelled)。
pub(crate) struct InFlight<'a, C: Lifecycle> {
    command: &'a mut C,
    settled: bool,
}

impl<'a, C: Lifecycle> InFlight<'a, C> {
    pub(crate) fn begin(command: &'a mut C) -> CommandResult<Self> {
        command.begin()?;
        Ok(Self {
            command,
            settled: false,
        })
    }

    pub(crate) fn command(&self) -> &C {
        self.command
    }

    pub(crate) fn settle(mut self, result: CommandResult<C::Output>) -> CommandResult<C::Output> {
        self.settled = true;
        self.command.settle(result)
    }
}

impl<C: Lifecycle> Drop for InFlight<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            let _ = self.command.settle(Err(CommandError::Cancelled));
        }
    }
}

/// 执行接口，会话通过它统一处理具体类型命令和类型擦除后的命令
pub trait Executable: Lifecycle {
    fn meta(&self) -> &CommandMeta;
    fn status(&self) -> CommandStatus;
}

#[async_trait]
impl<M: DeviceMethod> Lifecycle for Command<M> {
    type Output = M::Response;

    fn begin(&mut self) -> CommandResult<()> {
        Command::begin(self)
    }

    async fn run(&self, device: &mut dyn DeviceTransport) -> CommandResult<M::Response> {
        self.ensure_executing()?;
        self.method.run(device).await
    }

    fn settle(&mut self, result: CommandResult<M::Response>) -> CommandResult<M::Response> {
        Command::settle(self, result)
    }
}

impl<M: DeviceMethod> Executable for Command<M> {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn status(&self) -> CommandStatus {
        self.status
    }
}

/// 类型擦除的命令，响应以 JSON 形式返回（按方法名动态分发时使用）
pub trait AnyCommand: ErasedLifecycle {
    fn meta(&self) -> &CommandMeta;
    fn status(&self) -> CommandStatus;
    fn failure(&self) -> Option<&CommandError>;
    fn describe_json(&self) -> CommandResult<Value>;
}

impl fmt::Debug for dyn AnyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyCommand")
            .field("meta", self.meta())
            .field("status", &self.status())
            .finish()
    }
}

fn to_json<T: Serialize>(value: &T) -> CommandResult<Value> {
    serde_json::to_value(value).map_err(|e| CommandError::Serialization(e.to_string()))
}

impl<M: DeviceMethod> AnyCommand for Command<M> {
    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn status(&self) -> CommandStatus {
        self.status
    }

    fn failure(&self) -> Option<&CommandError> {
        self.failure.as_ref()
    }

    fn describe_json(&self) -> CommandResult<Value> {
        to_json(&self.describe())
    }
}

#[async_trait]
impl<M: DeviceMethod> ErasedLifecycle for Command<M> {
    fn begin(&mut self) -> CommandResult<()> {
        Command::begin(self)
    }

    async fn run_json(&self, device: &mut dyn DeviceTransport) -> CommandResult<Value> {
        self.ensure_executing()?;
        let response = self.method.run(device).await?;
        to_json(&response)
    }

    fn settle_json(&mut self, result: CommandResult<Value>) -> CommandResult<Value> {
        self.record(result.as_ref().err())?;
        result
    }
}

#[async_trait]
impl Lifecycle for Box<dyn AnyCommand> {
    type Output = Value;

    fn begin(&mut self) -> CommandResult<()> {
        ErasedLifecycle::begin(&mut **self)
    }

    async fn run(&self, device: &mut dyn DeviceTransport) -> CommandResult<Value> {
        (**self).run_json(device).await
    }

    fn settle(&mut self, result: CommandResult<Value>) -> CommandResult<Value> {
        (**self).settle_json(result)
    }
}

impl Executable for Box<dyn AnyCommand> {
    fn meta(&self) -> &CommandMeta {
        (**self).meta()
    }

    fn status(&self) -> CommandStatus {
        (**self).status()
    }
}
