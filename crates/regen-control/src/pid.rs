//! PID 状态与算法
//!
//! # 算法
//!
//! ```text
//! output = Kp * e + Ki * ∫e dt + Kd * de/dt
//! ```
//!
//! 其中 `e = target_voltage - voltage`（电压低于目标时为正）。
//!
//! # 特性
//!
//! - **积分饱和保护**: 积分累积值钳位到 `[-integral_limit, +integral_limit]`
//! - **无隐藏输入**: 只依赖传入的误差、`dt`、增益和自身状态
//!
//! 输出的单向钳位（`[0, max_output_current]`）由调节器负责，见
//! [`VoltageRegulator`](crate::VoltageRegulator)。

use crate::config::{PidGains, TickPeriod};

/// PID 内部状态
///
/// 由调节器独占，跨 tick 保留；离开调节区时清零。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidState {
    /// 积分累积值（V·s）
    pub integral_accumulator: f64,
    /// 上一次误差（用于微分项）
    pub previous_error: f64,
}

/// 单步 PID 各项分量
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidTerms {
    pub error: f64,
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
}

impl PidTerms {
    /// 未钳位的原始输出
    pub fn raw_output(&self) -> f64 {
        self.proportional + self.integral + self.derivative
    }
}

impl PidState {
    pub const ZERO: PidState = PidState {
        integral_accumulator: 0.0,
        previous_error: 0.0,
    };

    /// 清零全部状态
    pub fn reset(&mut self) {
        *self = Self::ZERO;
    }

    /// 计算一步 PID
    ///
    /// 更新积分累积值（带限幅）和上一次误差，返回各项分量。
    pub fn update(
        &mut self,
        error: f64,
        dt: TickPeriod,
        gains: &PidGains,
        integral_limit: f64,
    ) -> PidTerms {
        let dt_sec = dt.as_secs_f64();

        // 1. 比例项（P）
        let proportional = gains.kp * error;

        // 2. 积分项（I）+ 饱和保护
        self.integral_accumulator =
            (self.integral_accumulator + error * dt_sec).clamp(-integral_limit, integral_limit);
        let integral = gains.ki * self.integral_accumulator;

        // 3. 微分项（D）
        let derivative = gains.kd * (error - self.previous_error) / dt_sec;

        // 4. 更新上一次误差
        self.previous_error = error;

        PidTerms {
            error,
            proportional,
            integral,
            derivative,
        }
    }
}
