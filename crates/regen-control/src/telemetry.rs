//! 回馈遥测计数
//!
//! 只在显式调用 `reset()` 时清零。

/// Wh 与 J 的换算（1 Wh = 3600 J）
const SECONDS_PER_HOUR: f64 = 3600.0;

/// 遥测计数器
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Telemetry {
    /// 已执行的 tick 数
    pub tick_count: u64,
    /// 观测到的最大输出电流（A）
    pub max_current_applied: f64,
    /// 累计回收能量（Wh）
    pub cumulative_energy_recovered: f64,
}

impl Telemetry {
    /// 记录一个 tick
    ///
    /// `applied` 为 true 时才累加能量：`output * voltage * dt / 3600`。
    pub fn record(&mut self, output: f64, voltage: f64, dt_sec: f64, applied: bool) {
        self.tick_count += 1;
        if output > self.max_current_applied {
            self.max_current_applied = output;
        }
        if applied {
            self.cumulative_energy_recovered += output * voltage * dt_sec / SECONDS_PER_HOUR;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
