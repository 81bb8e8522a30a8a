//! # 母线电压曲线
//!
//! 离线仿真和台架回放使用的电压激励，`voltage_at(t)` 是纯函数。

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// 一段恒定电压
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hold {
    pub voltage: f64,
    /// 持续时间（秒）
    pub duration: f64,
}

impl Hold {
    pub const fn new(voltage: f64, duration: f64) -> Self {
        Self { voltage, duration }
    }
}

/// 电压曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoltageProfile {
    /// 恒定电压
    Constant { voltage: f64 },

    /// 阶跃：`[start, end)` 内为 `low`，其余为 `baseline`
    Step {
        baseline: f64,
        low: f64,
        start: f64,
        end: f64,
    },

    /// 斜坡：`start` 起以 `fall_rate` 下降到 `floor`，保持 `hold` 秒后以
    /// `rise_rate` 回升到 `baseline`
    Ramp {
        baseline: f64,
        floor: f64,
        start: f64,
        fall_rate: f64,
        hold: f64,
        rise_rate: f64,
    },

    /// 平滑回馈工况：余弦下降 → 带纹波保持 → 指数恢复 → 稳定
    SmoothDrop,

    /// 分段恒定电压，结束后保持最后一段
    Sequence { holds: Vec<Hold> },
}

impl VoltageProfile {
    /// 48V → 46V（2s ~ 8s）→ 48V
    pub fn step_drop() -> Self {
        VoltageProfile::Step {
            baseline: 48.0,
            low: 46.0,
            start: 2.0,
            end: 8.0,
        }
    }

    /// 2s 起以 0.5V/s 降到 45V，保持 2s，再以 0.6V/s 回升
    pub fn ramp() -> Self {
        VoltageProfile::Ramp {
            baseline: 48.0,
            floor: 45.0,
            start: 2.0,
            fall_rate: 0.5,
            hold: 2.0,
            rise_rate: 0.6,
        }
    }

    /// 快速跳变：48 → 45 → 47 → 46 → 48，每段 0.5s
    pub fn rapid() -> Self {
        VoltageProfile::Sequence {
            holds: [48.0, 45.0, 47.0, 46.0, 48.0]
                .into_iter()
                .map(|v| Hold::new(v, 0.5))
                .collect(),
        }
    }

    /// 按名称获取预设曲线（`smooth` / `step` / `ramp` / `rapid`）
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "smooth" => Some(VoltageProfile::SmoothDrop),
            "step" => Some(Self::step_drop()),
            "ramp" => Some(Self::ramp()),
            "rapid" => Some(Self::rapid()),
            _ => None,
        }
    }

    /// 覆盖整条曲线所需的仿真时长（秒）
    pub fn natural_duration(&self) -> f64 {
        match self {
            VoltageProfile::Constant { .. } => 10.0,
            VoltageProfile::Step { end, .. } => end + 2.0,
            VoltageProfile::Ramp {
                baseline,
                floor,
                start,
                fall_rate,
                hold,
                rise_rate,
            } => {
                let depth = (baseline - floor).max(0.0);
                start + depth / fall_rate + hold + depth / rise_rate
            },
            VoltageProfile::SmoothDrop => 20.0,
            VoltageProfile::Sequence { holds } => holds.iter().map(|h| h.duration).sum(),
        }
    }

    /// t 时刻的母线电压（V），t 为秒
    pub fn voltage_at(&self, t: f64) -> f64 {
        match self {
            VoltageProfile::Constant { voltage } => *voltage,

            VoltageProfile::Step {
                baseline,
                low,
                start,
                end,
            } => {
                if t >= *start && t < *end {
                    *low
                } else {
                    *baseline
                }
            },

            VoltageProfile::Ramp {
                baseline,
                floor,
                start,
                fall_rate,
                hold,
                rise_rate,
            } => {
                let fall_end = start + (baseline - floor).max(0.0) / fall_rate;
                let hold_end = fall_end + hold;
                if t < *start {
                    *baseline
                } else if t < fall_end {
                    (baseline - (t - start) * fall_rate).max(*floor)
                } else if t < hold_end {
                    *floor
                } else {
                    (floor + (t - hold_end) * rise_rate).min(*baseline)
                }
            },

            VoltageProfile::SmoothDrop => smooth_drop(t),

            VoltageProfile::Sequence { holds } => {
                let mut elapsed = 0.0;
                for hold in holds {
                    elapsed += hold.duration;
                    if t < elapsed {
                        return hold.voltage;
                    }
                }
                holds.last().map_or(f64::NAN, |h| h.voltage)
            },
        }
    }
}

fn smooth_drop(t: f64) -> f64 {
    let base = if t < 3.0 {
        48.0
    } else if t < 7.0 {
        let progress = (t - 3.0) / 4.0;
        48.0 - 2.5 * (1.0 - (progress * PI).cos()) / 2.0
    } else if t < 10.0 {
        45.5 + 0.3 * ((t - 7.0) * 2.0).sin()
    } else if t < 15.0 {
        let progress = (t - 10.0) / 5.0;
        45.5 + 2.5 * (1.0 - (-2.0 * progress).exp())
    } else {
        48.0 - 0.2 * (-(t - 15.0)).exp()
    };

    // 小幅高频纹波
    base + 0.01 * (t * 100.0).sin()
}

impl fmt::Display for VoltageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoltageProfile::Constant { voltage } => write!(f, "constant {:.2} V", voltage),
            VoltageProfile::Step { low, start, end, .. } => {
                write!(f, "step to {:.2} V ({:.1}s - {:.1}s)", low, start, end)
            },
            VoltageProfile::Ramp { floor, .. } => write!(f, "ramp down to {:.2} V", floor),
            VoltageProfile::SmoothDrop => write!(f, "smooth drop"),
            VoltageProfile::Sequence { holds } => write!(f, "sequence of {} holds", holds.len()),
        }
    }
}
