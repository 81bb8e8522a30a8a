//! 单个控制周期（含 I/O）
//!
//! `step()` 把一次完整的 tick 串起来：读电压 → 调节器计算 → 下发命令 → 喂狗。
//! [`RegulatorRunner`](crate::RegulatorRunner) 的线程每个周期调用一次；
//! 由外部调度器（定时中断、事件循环）驱动时也可以直接调用。

use regen_control::{ActuatorCommand, ControllerOutput, TickPeriod, VoltageRegulator};
use regen_hal::{HalError, PowerStage};
use tracing::trace;

/// 单个周期的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// 调节器输出（电压读取失败时为 `None`）
    pub output: Option<ControllerOutput>,
    /// 电压读取错误
    pub sensor_error: Option<HalError>,
    /// 执行器命令错误
    pub actuator_error: Option<HalError>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.sensor_error.is_none() && self.actuator_error.is_none()
    }
}

/// 执行一个完整周期
///
/// 协作者故障不会中断流程：
/// - 电压读取失败按安全切断处理：清零 PID 并释放电机
/// - 执行器命令失败只记录在返回值中
///
/// 无论成败，最后都会调用一次 `reset_watchdog()`。
pub fn step<H>(regulator: &mut VoltageRegulator, hardware: &mut H, dt: TickPeriod) -> StepOutcome
where
    H: PowerStage + ?Sized,
{
    let mut outcome = StepOutcome::default();

    match hardware.read_bus_voltage() {
        Ok(voltage) => {
            let output = regulator.tick(voltage, dt);
            let result = match output.command {
                ActuatorCommand::Apply { current } => hardware.apply_current(current),
                ActuatorCommand::Release => hardware.release(),
            };
            trace!(
                "tick: {:.3} V, {} -> {:?}",
                voltage, output.zone, output.command
            );
            outcome.actuator_error = result.err();
            outcome.output = Some(output);
        },
        Err(e) => {
            regulator.reset();
            outcome.actuator_error = hardware.release().err();
            outcome.sensor_error = Some(e);
        },
    }

    hardware.reset_watchdog();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use regen_control::{ControllerConfig, PidState};
    use regen_hal::mock::{MockCommand, MockPowerStage};

    fn setup(voltage: f64) -> (VoltageRegulator, MockPowerStage, TickPeriod) {
        let regulator = VoltageRegulator::new(ControllerConfig::default()).unwrap();
        let dt = regulator.tick_period();
        (regulator, MockPowerStage::with_voltage(voltage), dt)
    }

    #[test]
    fn test_step_applies_regen_current() {
        let (mut reg, mut mock, dt) = setup(46.0);
        let outcome = step(&mut reg, &mut mock, dt);

        assert!(outcome.is_ok());
        let output = outcome.output.unwrap();
        assert!(output.is_regulating());
        match mock.last_command() {
            Some(MockCommand::Apply { current }) => assert!(current < 0.0),
            other => panic!("Expected Apply, got {:?}", other),
        }
        assert_eq!(mock.watchdog_resets(), 1);
    }

    #[test]
    fn test_step_releases_when_idle() {
        let (mut reg, mut mock, dt) = setup(48.0);
        step(&mut reg, &mut mock, dt);
        assert_eq!(mock.last_command(), Some(MockCommand::Release));
        assert!(mock.was_motor_released());
        assert_eq!(mock.set_current_call_count(), 0);
    }

    #[test]
    fn test_sensor_failure_releases_and_resets_pid() {
        let (mut reg, mut mock, dt) = setup(46.0);
        step(&mut reg, &mut mock, dt);
        assert_ne!(reg.pid_state(), PidState::ZERO);

        mock.fail_voltage_reads(true);
        let outcome = step(&mut reg, &mut mock, dt);

        assert!(matches!(outcome.sensor_error, Some(HalError::Sensor(_))));
        assert!(outcome.output.is_none());
        assert_eq!(reg.pid_state(), PidState::ZERO);
        assert!(!reg.is_regulating_active());
        assert_eq!(mock.last_command(), Some(MockCommand::Release));
        assert_eq!(mock.watchdog_resets(), 2);
    }

    #[test]
    fn test_actuator_failure_is_reported() {
        let (mut reg, mut mock, dt) = setup(46.0);
        mock.fail_actuator(true);
        let outcome = step(&mut reg, &mut mock, dt);

        assert!(outcome.output.is_some());
        assert!(matches!(outcome.actuator_error, Some(HalError::Actuator(_))));
        assert!(!outcome.is_ok());
        // 喂狗不受执行器故障影响
        assert_eq!(mock.watchdog_resets(), 1);
    }
}
