use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, OnceLock},
};

use serde::Serialize;

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

// 延迟直方图分桶上界（毫秒）：<100, <500, <1000, <5000, <30000, >=30000
const LATENCY_BOUNDS_MS: [u128; 5] = [100, 500, 1000, 5000, 30000];

#[derive(Default)]
struct MetricsState {
    commands_built: u64,
    validation_failures: u64,
    per_method_ok: BTreeMap<&'static str, u64>,
    per_method_err: BTreeMap<&'static str, u64>,
    // 设备调用时延统计（毫秒）
    execution_latency_sum_ms: u128,
    execution_hist_buckets: [u64; 6],
}

fn state() -> MutexGuard<'static, MetricsState> {
    let lock = METRICS.get_or_init(|| Mutex::new(MetricsState::default()));
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

/// 指标快照
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub taken_at: chrono::DateTime<chrono::Utc>,
    pub commands_built: u64,
    pub validation_failures: u64,
    pub executions_ok: BTreeMap<String, u64>,
    pub executions_err: BTreeMap<String, u64>,
    pub execution_latency_sum_ms: u128,
}

pub fn inc_command_built() {
    state().commands_built += 1;
}

pub fn inc_validation_failure() {
    state().validation_failures += 1;
}

/// 记录一次设备调用结果与耗时
pub fn observe_execution(method: &'static str, latency_ms: u128, ok: bool) {
    let mut s = state();
    if ok {
        *s.per_method_ok.entry(method).or_insert(0) += 1;
    } else {
        *s.per_method_err.entry(method).or_insert(0) += 1;
    }
    s.execution_latency_sum_ms += latency_ms;
    let bucket = LATENCY_BOUNDS_MS
        .iter()
        .position(|bound| latency_ms < *bound)
        .unwrap_or(LATENCY_BOUNDS_MS.len());
    s.execution_hist_buckets[bucket] += 1;
}

pub fn snapshot() -> MetricsSnapshot {
    let s = state();
    MetricsSnapshot {
        taken_at: chrono::Utc::now(),
        commands_built: s.commands_built,
        validation_failures: s.validation_failures,
        executions_ok: s
            .per_method_ok
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
        executions_err: s
            .per_method_err
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
        execution_latency_sum_ms: s.execution_latency_sum_ms,
    }
}

pub fn render_prometheus() -> String {
    let s = state();
    let mut out = String::new();
    out.push_str("# HELP ironcore_connect_commands_built_total Commands that passed validation\n");
    out.push_str("# TYPE ironcore_connect_commands_built_total counter\n");
    out.push_str(&format!(
        "ironcore_connect_commands_built_total {}\n",
        s.commands_built
    ));

    out.push_str("# HELP ironcore_connect_validation_failures_total Rejected requests\n");
    out.push_str("# TYPE ironcore_connect_validation_failures_total counter\n");
    out.push_str(&format!(
        "ironcore_connect_validation_failures_total {}\n",
        s.validation_failures
    ));

    out.push_str("# HELP ironcore_connect_executions_total Device calls per method\n");
    out.push_str("# TYPE ironcore_connect_executions_total counter\n");
    for (method, count) in s.per_method_ok.iter() {
        out.push_str(&format!(
            "ironcore_connect_executions_total{{method=\"{}\",result=\"ok\"}} {}\n",
            method, count
        ));
    }
    for (method, count) in s.per_method_err.iter() {
        out.push_str(&format!(
            "ironcore_connect_executions_total{{method=\"{}\",result=\"err\"}} {}\n",
            method, count
        ));
    }

    out.push_str("# HELP ironcore_connect_execution_latency_ms_sum Sum of device call latency in ms\n");
    out.push_str("# TYPE ironcore_connect_execution_latency_ms_sum counter\n");
    out.push_str(&format!(
        "ironcore_connect_execution_latency_ms_sum {}\n",
        s.execution_latency_sum_ms
    ));

    out.push_str("# HELP ironcore_connect_execution_latency_ms_bucket Device call latency histogram\n");
    out.push_str("# TYPE ironcore_connect_execution_latency_ms_bucket histogram\n");
    let mut cumulative = 0;
    for (i, bound) in LATENCY_BOUNDS_MS.iter().enumerate() {
        cumulative += s.execution_hist_buckets[i];
        out.push_str(&format!(
            "ironcore_connect_execution_latency_ms_bucket{{le=\"{}\"}} {}\n",
            bound, cumulative
        ));
    }
    // +Inf 桶
    out.push_str(&format!(
        "ironcore_connect_execution_latency_ms_bucket{{le=\"+Inf\"}} {}\n",
        s.execution_hist_buckets.iter().sum::<u64>()
    ));

    out
}
