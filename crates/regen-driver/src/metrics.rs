//! 控制循环指标
//!
//! 原子计数器，任何线程都可无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制循环实时指标
#[derive(Debug, Default)]
pub struct LoopMetrics {
    /// 已执行的 tick 数（含传感器失败的 tick）
    pub ticks: AtomicU64,

    /// 单次循环耗时超过 `tick_period * dt_clamp_multiplier` 的次数
    pub overruns: AtomicU64,

    /// 电压读取失败次数
    pub sensor_errors: AtomicU64,

    /// 执行器命令失败次数
    pub actuator_errors: AtomicU64,

    /// 观测到的最长 tick 耗时（微秒）
    pub max_tick_us: AtomicU64,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 使用 `Ordering::Relaxed`，不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        LoopMetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            sensor_errors: self.sensor_errors.load(Ordering::Relaxed),
            actuator_errors: self.actuator_errors.load(Ordering::Relaxed),
            max_tick_us: self.max_tick_us.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_tick_duration(&self, micros: u64) {
        self.max_tick_us.fetch_max(micros, Ordering::Relaxed);
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.sensor_errors.store(0, Ordering::Relaxed);
        self.actuator_errors.store(0, Ordering::Relaxed);
        self.max_tick_us.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopMetricsSnapshot {
    pub ticks: u64,
    pub overruns: u64,
    pub sensor_errors: u64,
    pub actuator_errors: u64,
    pub max_tick_us: u64,
}

impl LoopMetricsSnapshot {
    /// 超时率（百分比）
    ///
    /// `ticks` 为 0 时返回 0.0。
    pub fn overrun_rate(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        (self.overruns as f64 / self.ticks as f64) * 100.0
    }

    /// 是否出现过协作者故障
    pub fn has_faults(&self) -> bool {
        self.sensor_errors > 0 || self.actuator_errors > 0
    }
}
