//! # 回馈统计
//!
//! 从轨迹计算回馈期间的平均电压 / 电流、回馈时间占比和回收能量。

use crate::trace::RegenTrace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wh 与 J 的换算
const SECONDS_PER_HOUR: f64 = 3600.0;

/// 轨迹统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegenSummary {
    /// 采样点数
    pub samples: usize,

    /// 总时长（秒）
    pub total_time: f64,

    /// 处于调节区的时长（秒）
    pub active_time: f64,

    /// 调节区内平均电压（V），无调节时为 `None`
    pub avg_voltage_active: Option<f64>,

    /// 调节区内平均电流（A），无调节时为 `None`
    pub avg_current_active: Option<f64>,

    /// 最大回馈电流（A）
    pub max_current: f64,

    /// 回收能量（Wh）
    pub energy_wh: f64,
}

impl RegenSummary {
    pub fn from_trace(trace: &RegenTrace) -> Self {
        let dt = trace.dt();
        let mut summary = RegenSummary {
            samples: trace.len(),
            total_time: trace.len() as f64 * dt,
            ..Default::default()
        };

        let mut active = 0usize;
        let mut voltage_sum = 0.0;
        let mut current_sum = 0.0;

        for p in &trace.points {
            if p.active {
                active += 1;
                voltage_sum += p.voltage;
                current_sum += p.current;
            }
            summary.max_current = summary.max_current.max(p.current);
            summary.energy_wh += p.current * p.voltage * dt / SECONDS_PER_HOUR;
        }

        summary.active_time = active as f64 * dt;
        if active > 0 {
            summary.avg_voltage_active = Some(voltage_sum / active as f64);
            summary.avg_current_active = Some(current_sum / active as f64);
        }
        summary
    }

    /// 回馈时间占比（%）
    pub fn active_ratio(&self) -> f64 {
        if self.total_time <= 0.0 {
            return 0.0;
        }
        (self.active_time / self.total_time) * 100.0
    }
}

impl fmt::Display for RegenSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples:               {}", self.samples)?;
        writeln!(
            f,
            "Regen active time:     {:.2} s of {:.2} s ({:.1}%)",
            self.active_time,
            self.total_time,
            self.active_ratio()
        )?;
        match (self.avg_voltage_active, self.avg_current_active) {
            (Some(v), Some(i)) => {
                writeln!(f, "Avg voltage (regen):   {:.2} V", v)?;
                writeln!(f, "Avg current (regen):   {:.2} A", i)?;
            },
            _ => writeln!(f, "Avg voltage (regen):   n/a")?,
        }
        writeln!(f, "Max current:           {:.2} A", self.max_current)?;
        write!(f, "Energy recovered:      {:.4} Wh", self.energy_wh)
    }
}
