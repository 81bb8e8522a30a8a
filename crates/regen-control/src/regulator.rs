//! VoltageRegulator - 母线电压回馈调节器
//!
//! 由外部调度器以固定周期驱动，每个 tick 执行：
//!
//! 1. 按电压判定区间（[`Zone`]）
//! 2. 调节区内计算 PID，输出钳位到 `[0, max_output_current]`
//! 3. 区间外清零 PID 状态并释放电机
//! 4. 生成执行器命令（负电流 = 回馈制动）
//! 5. 更新遥测
//!
//! 调节器本身不做任何 I/O，`tick()` 返回的 [`ActuatorCommand`] 由调用方
//! 下发给执行器。
//!
//! # 示例
//!
//! ```rust
//! use regen_control::{ActuatorCommand, ControllerConfig, VoltageRegulator, Zone};
//!
//! let mut regulator = VoltageRegulator::new(ControllerConfig::default()).unwrap();
//! let dt = regulator.tick_period();
//!
//! let out = regulator.tick(46.0, dt);
//! assert_eq!(out.zone, Zone::Regulating);
//! assert!(matches!(out.command, ActuatorCommand::Apply { current } if current < 0.0));
//!
//! let out = regulator.tick(48.0, dt);
//! assert_eq!(out.command, ActuatorCommand::Release);
//! ```

use crate::config::{ControllerConfig, TickPeriod};
use crate::error::ConfigError;
use crate::pid::{PidState, PidTerms};
use crate::telemetry::Telemetry;
use crate::zone::Zone;
use tracing::{debug, warn};

/// 执行器命令
///
/// `Apply` 与 `Release` 是两个不同的信号：`Release` 让电机滑行（coast），
/// 而不是主动驱动零电流。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActuatorCommand {
    /// 以给定的有符号电流驱动（A，负值为回馈制动）
    Apply { current: f64 },
    /// 释放电机
    Release,
}

impl ActuatorCommand {
    /// 实际下发的电流幅值（释放时为 0）
    pub fn magnitude(&self) -> f64 {
        match self {
            ActuatorCommand::Apply { current } => current.abs(),
            ActuatorCommand::Release => 0.0,
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, ActuatorCommand::Release)
    }
}

/// 单个 tick 的输出
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerOutput {
    /// 本 tick 的母线电压（V）
    pub voltage: f64,
    /// 本 tick 的区间
    pub zone: Zone,
    /// 钳位后的 PID 输出（A，>= 0）
    pub output_current: f64,
    /// 下发给执行器的命令
    pub command: ActuatorCommand,
    /// PID 分量（非调节区为 0）
    pub terms: PidTerms,
}

impl ControllerOutput {
    fn released(voltage: f64, zone: Zone) -> Self {
        Self {
            voltage,
            zone,
            output_current: 0.0,
            command: ActuatorCommand::Release,
            terms: PidTerms::default(),
        }
    }

    /// 实际下发的回馈电流幅值（A）
    pub fn applied_current(&self) -> f64 {
        self.command.magnitude()
    }

    pub fn is_regulating(&self) -> bool {
        self.zone.is_regulating()
    }
}

/// 母线电压回馈调节器
///
/// 独占 PID 状态与遥测。`tick()` 必须串行调用（不可重叠），
/// 跨线程使用时由调度方负责互斥。
#[derive(Debug, Clone)]
pub struct VoltageRegulator {
    config: ControllerConfig,
    tick_period: TickPeriod,
    pid: PidState,
    telemetry: Telemetry,
    last_output: Option<ControllerOutput>,
}

impl VoltageRegulator {
    /// 创建调节器
    ///
    /// 配置在此处校验，非法配置（包括零控制周期）直接返回错误。
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tick_period = config.tick_period()?;
        Ok(Self {
            config,
            tick_period,
            pid: PidState::ZERO,
            telemetry: Telemetry::default(),
            last_output: None,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// 配置中的控制周期
    pub fn tick_period(&self) -> TickPeriod {
        self.tick_period
    }

    /// 当前 PID 状态（用于调试和监控）
    pub fn pid_state(&self) -> PidState {
        self.pid
    }

    pub fn telemetry(&self) -> Telemetry {
        self.telemetry
    }

    /// 清零遥测（仅在外部显式请求时调用）
    pub fn reset_telemetry(&mut self) {
        self.telemetry.reset();
    }

    /// 清零 PID 状态
    ///
    /// 启动时调用；遥测不受影响。
    pub fn reset(&mut self) {
        self.pid.reset();
        self.last_output = None;
    }

    /// 执行一个控制周期
    pub fn tick(&mut self, voltage_now: f64, dt: TickPeriod) -> ControllerOutput {
        let zone = Zone::classify(voltage_now, &self.config);
        self.log_transition(zone, voltage_now);

        let output = match zone {
            Zone::Idle | Zone::SafetyCutoff => {
                self.pid.reset();
                ControllerOutput::released(voltage_now, zone)
            },
            Zone::Regulating => self.regulate(voltage_now, dt),
        };

        self.telemetry.record(
            output.output_current,
            voltage_now,
            dt.as_secs_f64(),
            !output.command.is_release(),
        );
        self.last_output = Some(output);
        output
    }

    /// 以配置周期执行一个控制周期
    pub fn tick_nominal(&mut self, voltage_now: f64) -> ControllerOutput {
        self.tick(voltage_now, self.tick_period)
    }

    fn regulate(&mut self, voltage_now: f64, dt: TickPeriod) -> ControllerOutput {
        let error = self.config.target_voltage - voltage_now;
        let terms = self
            .pid
            .update(error, dt, &self.config.gains, self.config.integral_limit);

        // 回馈电流单向：负值钳位到 0，超限钳位到最大值
        let output = terms.raw_output().clamp(0.0, self.config.max_output_current);

        // 死区内释放，避免近零输出时命令抖动
        let command = if output > self.config.deadband_current {
            ActuatorCommand::Apply { current: -output }
        } else {
            ActuatorCommand::Release
        };

        ControllerOutput {
            voltage: voltage_now,
            zone: Zone::Regulating,
            output_current: output,
            command,
            terms,
        }
    }

    fn log_transition(&self, zone: Zone, voltage: f64) {
        let previous = self.last_output.map(|o| o.zone);
        if previous == Some(zone) {
            return;
        }
        match zone {
            Zone::SafetyCutoff => warn!(
                "Bus voltage {:.3} V at or below minimum {:.3} V, regen disabled",
                voltage, self.config.minimum_voltage
            ),
            _ => debug!("Zone {:?} -> {} at {:.3} V", previous, zone, voltage),
        }
    }

    /// 最近一次采样的母线电压
    pub fn current_voltage(&self) -> Option<f64> {
        self.last_output.map(|o| o.voltage)
    }

    /// 最近一个 tick 是否处于调节区
    pub fn is_regulating_active(&self) -> bool {
        self.last_output.is_some_and(|o| o.is_regulating())
    }

    /// 最近一个 tick 实际下发的回馈电流幅值（A，释放时为 0）
    pub fn last_applied_current(&self) -> f64 {
        self.last_output.map_or(0.0, |o| o.applied_current())
    }

    pub fn last_output(&self) -> Option<ControllerOutput> {
        self.last_output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regulator() -> VoltageRegulator {
        VoltageRegulator::new(ControllerConfig::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ControllerConfig::default().with_max_output_current(-5.0);
        assert_eq!(
            VoltageRegulator::new(config).unwrap_err(),
            ConfigError::MaxCurrent(-5.0)
        );
    }

    #[test]
    fn test_idle_releases_and_resets() {
        let mut reg = regulator();
        reg.tick_nominal(46.0);
        assert_ne!(reg.pid_state(), PidState::ZERO);

        let out = reg.tick_nominal(48.0);
        assert_eq!(out.zone, Zone::Idle);
        assert_eq!(out.output_current, 0.0);
        assert_eq!(out.command, ActuatorCommand::Release);
        assert_eq!(reg.pid_state(), PidState::ZERO);
    }

    #[test]
    fn test_safety_cutoff_overrides_pid() {
        let mut reg = regulator();
        for _ in 0..100 {
            reg.tick_nominal(45.5);
        }
        assert!(reg.last_applied_current() > 0.0);

        let out = reg.tick_nominal(44.0);
        assert_eq!(out.zone, Zone::SafetyCutoff);
        assert_eq!(out.output_current, 0.0);
        assert!(out.command.is_release());
        assert_eq!(reg.pid_state(), PidState::ZERO);
        assert!(!reg.is_regulating_active());
    }

    #[test]
    fn test_first_regulating_tick_values() {
        let mut reg = regulator();
        let out = reg.tick_nominal(47.0);

        // error = 1.0, dt = 1ms
        // P = 20, I = 5 * 0.001, D = 0.5 * 1.0 / 0.001 = 500 -> 钳位到 50
        assert_eq!(out.zone, Zone::Regulating);
        assert!((out.terms.proportional - 20.0).abs() < 1e-9);
        assert!((out.terms.integral - 0.005).abs() < 1e-9);
        assert!((out.terms.derivative - 500.0).abs() < 1e-6);
        assert_eq!(out.output_current, 50.0);
        assert_eq!(out.command, ActuatorCommand::Apply { current: -50.0 });

        // 第二个 tick 误差不变，微分为 0
        let out = reg.tick_nominal(47.0);
        assert!(out.terms.derivative.abs() < 1e-9);
        assert!((out.output_current - (20.0 + 5.0 * 0.002)).abs() < 1e-9);
    }

    #[test]
    fn test_negative_raw_output_clamped_to_zero() {
        let mut reg = regulator();
        reg.tick_nominal(46.0);

        // 误差从 2.0 降到 0.6，微分项 = 0.5 * (-1.4) / 0.001 = -700
        let out = reg.tick_nominal(47.4);
        assert!(out.terms.raw_output() < 0.0);
        assert_eq!(out.output_current, 0.0);
        assert!(out.command.is_release());
        assert!(out.is_regulating());
    }

    #[test]
    fn test_output_within_deadband_releases() {
        // kp 为 0 时只剩很小的积分输出
        let config = ControllerConfig::default().with_gains(0.0, 1.0, 0.0);
        let mut reg = VoltageRegulator::new(config).unwrap();
        let out = reg.tick_nominal(47.4);
        assert!(out.output_current >= 0.0);
        // 0.6 * 0.001 = 0.0006 A，低于死区 -> 释放
        assert!(out.command.is_release());
        assert!(reg.is_regulating_active());
        assert_eq!(reg.last_applied_current(), 0.0);
    }

    #[test]
    fn test_telemetry_accumulates_only_when_applied() {
        let mut reg = regulator();
        reg.tick_nominal(48.0);
        reg.tick_nominal(47.0);
        reg.tick_nominal(44.0);

        let telemetry = reg.telemetry();
        assert_eq!(telemetry.tick_count, 3);
        assert_eq!(telemetry.max_current_applied, 50.0);
        let expected = 50.0 * 47.0 * 0.001 / 3600.0;
        assert!((telemetry.cumulative_energy_recovered - expected).abs() < 1e-12);

        // reset() 不清遥测
        reg.reset();
        assert_eq!(reg.telemetry().tick_count, 3);

        reg.reset_telemetry();
        assert_eq!(reg.telemetry(), Telemetry::default());
    }

    #[test]
    fn test_queries() {
        let mut reg = regulator();
        assert_eq!(reg.current_voltage(), None);
        assert!(!reg.is_regulating_active());
        assert_eq!(reg.last_applied_current(), 0.0);

        reg.tick_nominal(46.0);
        assert_eq!(reg.current_voltage(), Some(46.0));
        assert!(reg.is_regulating_active());
        assert!(reg.last_applied_current() > 0.0);
        assert!(reg.last_applied_current() <= 50.0);
    }

    #[test]
    fn test_explicit_dt_is_used() {
        let mut reg = regulator();
        let dt = TickPeriod::new(std::time::Duration::from_millis(10)).unwrap();
        reg.tick(47.0, dt);
        assert!((reg.pid_state().integral_accumulator - 0.01).abs() < 1e-12);
    }
}
