//! IronCore Connect 命令行入口
//!
//! 读取 `{ "method": ..., "params": {...} }` 请求（文件参数或 stdin），
//! 只做构造与校验（不连接设备），输出规范化后的命令描述。

use std::{io::Read, process::ExitCode};

use anyhow::{Context, Result};
use ironcore_connect::{
    config::Config,
    infrastructure::logging,
    service::{MethodContext, MethodRegistry},
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct Request {
    method: String,
    #[serde(default)]
    params: Value,
}

fn load_config() -> Result<Config> {
    let config = Config::from_env_and_file(std::env::var("CONFIG_PATH").ok())?;
    config.validate()?;
    Ok(config)
}

fn read_request(source: Option<String>) -> Result<Request> {
    let raw = match source.as_deref() {
        Some(path) if path != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };

    serde_json::from_str(&raw).context("Request must be a JSON object with \"method\" and \"params\"")
}

fn main() -> ExitCode {
    // 1. 加载环境变量与配置
    dotenvy::dotenv().ok();
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {:#}", e);
            return ExitCode::from(2);
        }
    };

    // 2. 初始化日志（guard 必须持有到进程退出）
    let _guard = logging::init_logging(&config.logging).unwrap_or_else(|e| {
        eprintln!("Failed to initialize logging: {}, falling back to defaults", e);
        logging::init_default_logging()
    });

    let request = match read_request(std::env::args().nth(1)) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read request");
            eprintln!("{:#}", e);
            return ExitCode::from(2);
        }
    };

    let networks = match config.network_registry() {
        Ok(networks) => networks,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(2);
        }
    };
    let policy = config
        .device
        .output_conflict_policy()
        .unwrap_or_default();
    let ctx = MethodContext::new(&networks).with_output_conflict(policy);

    // 3. 构造命令（dry run）
    let trace_id = Uuid::new_v4().to_string();
    let outcome = MethodRegistry::new()
        .build(&request.method, &request.params, &ctx)
        .and_then(|command| command.describe_json());

    match outcome {
        Ok(description) => {
            tracing::info!(method = %request.method, trace_id = %trace_id, "Command validated");
            println!(
                "{}",
                serde_json::to_string_pretty(&description).unwrap_or_default()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            let body = e.to_body(Some(&trace_id));
            println!(
                "{}",
                serde_json::to_string_pretty(&body).unwrap_or_default()
            );
            ExitCode::FAILURE
        }
    }
}
