//! 调节器配置
//!
//! [`ControllerConfig`] 在调节器构造时设置一次，之后只读。
//!
//! # 电压区间
//!
//! ```text
//!  SafetyCutoff |      Regulating       |        Idle
//! --------------+-----------------------+------------------------>  V
//!          minimum_voltage       threshold_voltage    target_voltage
//! ```
//!
//! # 示例
//!
//! ```rust
//! use regen_control::ControllerConfig;
//! use std::time::Duration;
//!
//! let config = ControllerConfig::default()
//!     .with_minimum_voltage(36.0)
//!     .with_gains(20.0, 5.0, 0.5)
//!     .with_tick_period(Duration::from_millis(10));
//!
//! assert!(config.validate().is_ok());
//! ```

use crate::error::ConfigError;
use std::time::Duration;

/// 默认目标母线电压（V）
pub const DEFAULT_TARGET_VOLTAGE: f64 = 48.0;
/// 默认回馈起始阈值（V）
pub const DEFAULT_THRESHOLD_VOLTAGE: f64 = 47.5;
/// 默认安全下限（V）
pub const DEFAULT_MINIMUM_VOLTAGE: f64 = 45.0;
/// 默认最大回馈电流（A）
pub const DEFAULT_MAX_OUTPUT_CURRENT: f64 = 50.0;
/// 默认积分限幅（V·s）
pub const DEFAULT_INTEGRAL_LIMIT: f64 = 10.0;
/// 默认输出死区（A）
pub const DEFAULT_DEADBAND_CURRENT: f64 = 0.1;
/// 默认控制频率（Hz）
pub const DEFAULT_TICK_RATE_HZ: u32 = 1000;

/// PID 增益
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidGains {
    /// 比例增益（A/V）
    pub kp: f64,
    /// 积分增益（A/(V·s)）
    pub ki: f64,
    /// 微分增益（A·s/V）
    pub kd: f64,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(20.0, 5.0, 0.5)
    }
}

/// 经过校验的控制周期（`dt`）
///
/// 只能通过 [`TickPeriod::new`] 或已校验的配置获得，因此 `tick()` 永远不会
/// 收到零或负的 `dt`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickPeriod(Duration);

impl TickPeriod {
    /// 创建控制周期，`period` 为零时返回错误
    pub fn new(period: Duration) -> Result<Self, ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::TickPeriod(period));
        }
        Ok(Self(period))
    }

    /// 由控制频率（Hz）创建
    pub fn from_hz(hz: u32) -> Result<Self, ConfigError> {
        if hz == 0 {
            return Err(ConfigError::TickPeriod(Duration::ZERO));
        }
        Self::new(Duration::from_secs_f64(1.0 / hz as f64))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }
}

impl From<TickPeriod> for Duration {
    fn from(period: TickPeriod) -> Self {
        period.0
    }
}

/// 调节器配置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    /// 目标母线电压（V）
    pub target_voltage: f64,
    /// 低于此电压开始回馈调节（V）
    pub threshold_voltage: f64,
    /// 安全下限，低于等于此电压强制释放（V）
    pub minimum_voltage: f64,
    /// 最大回馈电流（A，正值）
    pub max_output_current: f64,
    /// 积分项限幅（V·s）
    pub integral_limit: f64,
    /// PID 增益
    pub gains: PidGains,
    /// 控制周期
    pub tick_period: Duration,
    /// 输出死区：输出不超过此值时释放电机而非驱动（A）
    pub deadband_current: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_voltage: DEFAULT_TARGET_VOLTAGE,
            threshold_voltage: DEFAULT_THRESHOLD_VOLTAGE,
            minimum_voltage: DEFAULT_MINIMUM_VOLTAGE,
            max_output_current: DEFAULT_MAX_OUTPUT_CURRENT,
            integral_limit: DEFAULT_INTEGRAL_LIMIT,
            gains: PidGains::default(),
            tick_period: Duration::from_micros(1_000_000 / DEFAULT_TICK_RATE_HZ as u64),
            deadband_current: DEFAULT_DEADBAND_CURRENT,
        }
    }
}

impl ControllerConfig {
    pub fn with_target_voltage(mut self, volts: f64) -> Self {
        self.target_voltage = volts;
        self
    }

    pub fn with_threshold_voltage(mut self, volts: f64) -> Self {
        self.threshold_voltage = volts;
        self
    }

    pub fn with_minimum_voltage(mut self, volts: f64) -> Self {
        self.minimum_voltage = volts;
        self
    }

    pub fn with_max_output_current(mut self, amps: f64) -> Self {
        self.max_output_current = amps;
        self
    }

    /// 设置积分限幅（防止积分饱和）
    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = limit;
        self
    }

    /// 设置 PID 增益
    pub fn with_gains(mut self, kp: f64, ki: f64, kd: f64) -> Self {
        self.gains = PidGains::new(kp, ki, kd);
        self
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn with_deadband_current(mut self, amps: f64) -> Self {
        self.deadband_current = amps;
        self
    }

    /// 校验配置约束
    ///
    /// - 所有浮点参数必须是有限值
    /// - `minimum_voltage < threshold_voltage < target_voltage`
    /// - `max_output_current > 0`，`tick_period > 0`
    /// - `integral_limit >= 0`，`deadband_current >= 0`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("target_voltage", self.target_voltage),
            ("threshold_voltage", self.threshold_voltage),
            ("minimum_voltage", self.minimum_voltage),
            ("max_output_current", self.max_output_current),
            ("integral_limit", self.integral_limit),
            ("kp", self.gains.kp),
            ("ki", self.gains.ki),
            ("kd", self.gains.kd),
            ("deadband_current", self.deadband_current),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { name, value });
            }
        }

        if !(self.minimum_voltage < self.threshold_voltage
            && self.threshold_voltage < self.target_voltage)
        {
            return Err(ConfigError::VoltageOrdering {
                minimum: self.minimum_voltage,
                threshold: self.threshold_voltage,
                target: self.target_voltage,
            });
        }
        if self.max_output_current <= 0.0 {
            return Err(ConfigError::MaxCurrent(self.max_output_current));
        }
        if self.integral_limit < 0.0 {
            return Err(ConfigError::IntegralLimit(self.integral_limit));
        }
        if self.deadband_current < 0.0 {
            return Err(ConfigError::Deadband(self.deadband_current));
        }
        TickPeriod::new(self.tick_period)?;
        Ok(())
    }

    /// 获取校验后的控制周期
    pub fn tick_period(&self) -> Result<TickPeriod, ConfigError> {
        TickPeriod::new(self.tick_period)
    }

    /// 控制频率（Hz）
    pub fn tick_rate_hz(&self) -> f64 {
        1.0 / self.tick_period.as_secs_f64()
    }
}
