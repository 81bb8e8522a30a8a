//! Mock 功率级
//!
//! 用于测试的模拟母线电压与电机执行器。所有克隆共享同一份状态，
//! 测试代码持有一个克隆来注入电压、检查命令，另一个交给运行器。

use crate::{BusVoltageSource, CurrentActuator, HalError, Watchdog};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// 默认母线电压（V）
pub const DEFAULT_MOCK_VOLTAGE: f64 = 48.0;

/// 默认保留的命令历史条数
pub const DEFAULT_COMMAND_LOG_CAPACITY: usize = 10_000;

/// 记录下来的执行器命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockCommand {
    Apply { current: f64 },
    Release,
}

#[derive(Debug, Clone)]
struct MockState {
    input_voltage: f64,
    /// 按顺序消费的脚本电压，耗尽后回落到 `input_voltage`
    scripted: VecDeque<f64>,
    applied_current: f64,
    motor_released: bool,
    set_current_calls: u32,
    release_calls: u32,
    voltage_reads: u64,
    watchdog_resets: u64,
    fail_voltage_reads: bool,
    fail_actuator: bool,
    /// 最近的命令（环形，最多 `log_capacity` 条）
    commands: VecDeque<MockCommand>,
    log_capacity: usize,
    commands_issued: usize,
    last_command: Option<MockCommand>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            input_voltage: DEFAULT_MOCK_VOLTAGE,
            scripted: VecDeque::new(),
            applied_current: 0.0,
            motor_released: false,
            set_current_calls: 0,
            release_calls: 0,
            voltage_reads: 0,
            watchdog_resets: 0,
            fail_voltage_reads: false,
            fail_actuator: false,
            commands: VecDeque::new(),
            log_capacity: DEFAULT_COMMAND_LOG_CAPACITY,
            commands_issued: 0,
            last_command: None,
        }
    }
}

/// 模拟功率级
#[derive(Debug, Clone, Default)]
pub struct MockPowerStage {
    state: Arc<Mutex<MockState>>,
}

impl MockState {
    fn record(&mut self, command: MockCommand) {
        self.commands_issued += 1;
        self.last_command = Some(command);
        if self.log_capacity == 0 {
            return;
        }
        if self.commands.len() == self.log_capacity {
            self.commands.pop_front();
        }
        self.commands.push_back(command);
    }
}

impl MockPowerStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定母线电压创建
    pub fn with_voltage(voltage: f64) -> Self {
        let mock = Self::default();
        mock.set_input_voltage(voltage);
        mock
    }

    /// 指定命令历史容量，超出后丢弃最早的记录
    ///
    /// 长时间运行（如实时演示）时用较小的容量；计数器不受影响。
    pub fn with_command_log_capacity(self, capacity: usize) -> Self {
        {
            let mut state = self.state.lock();
            state.log_capacity = capacity;
            while state.commands.len() > capacity {
                state.commands.pop_front();
            }
        }
        self
    }

    /// 设置传感器读数
    pub fn set_input_voltage(&self, voltage: f64) {
        self.state.lock().input_voltage = voltage;
    }

    /// 追加脚本电压，每次读取消费一个
    pub fn push_voltages(&self, voltages: impl IntoIterator<Item = f64>) {
        self.state.lock().scripted.extend(voltages);
    }

    /// 剩余未消费的脚本电压数
    pub fn pending_voltages(&self) -> usize {
        self.state.lock().scripted.len()
    }

    /// 模拟传感器故障
    pub fn fail_voltage_reads(&self, fail: bool) {
        self.state.lock().fail_voltage_reads = fail;
    }

    /// 模拟执行器故障
    pub fn fail_actuator(&self, fail: bool) {
        self.state.lock().fail_actuator = fail;
    }

    /// 最近一次下发的电流（释放后为 0）
    pub fn applied_current(&self) -> f64 {
        self.state.lock().applied_current
    }

    /// 是否下发过非零电流且当前仍在驱动
    pub fn was_current_applied(&self) -> bool {
        let state = self.state.lock();
        state.set_current_calls > 0 && state.applied_current != 0.0
    }

    /// 最近一次命令是否为释放
    pub fn was_motor_released(&self) -> bool {
        self.state.lock().motor_released
    }

    pub fn set_current_call_count(&self) -> u32 {
        self.state.lock().set_current_calls
    }

    pub fn release_call_count(&self) -> u32 {
        self.state.lock().release_calls
    }

    pub fn voltage_read_count(&self) -> u64 {
        self.state.lock().voltage_reads
    }

    pub fn watchdog_resets(&self) -> u64 {
        self.state.lock().watchdog_resets
    }

    pub fn last_command(&self) -> Option<MockCommand> {
        self.state.lock().last_command
    }

    /// 保留的命令历史（按下发顺序，最多为容量条）
    pub fn command_log(&self) -> Vec<MockCommand> {
        self.state.lock().commands.iter().copied().collect()
    }

    /// 成功下发的命令总数（不受历史容量限制）
    pub fn command_count(&self) -> usize {
        self.state.lock().commands_issued
    }

    /// 恢复初始状态（电压回到 48V，计数与历史清零，保留历史容量）
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let log_capacity = state.log_capacity;
        *state = MockState {
            log_capacity,
            ..MockState::default()
        };
    }
}

impl BusVoltageSource for MockPowerStage {
    fn read_bus_voltage(&mut self) -> Result<f64, HalError> {
        let mut state = self.state.lock();
        state.voltage_reads += 1;
        if state.fail_voltage_reads {
            return Err(HalError::Sensor("mock sensor failure".to_string()));
        }
        if let Some(voltage) = state.scripted.pop_front() {
            state.input_voltage = voltage;
        }
        Ok(state.input_voltage)
    }
}

impl CurrentActuator for MockPowerStage {
    fn apply_current(&mut self, current: f64) -> Result<(), HalError> {
        let mut state = self.state.lock();
        if state.fail_actuator {
            return Err(HalError::Actuator("mock actuator failure".to_string()));
        }
        trace!("mock apply_current({:.3})", current);
        state.applied_current = current;
        state.set_current_calls += 1;
        state.motor_released = false;
        state.record(MockCommand::Apply { current });
        Ok(())
    }

    fn release(&mut self) -> Result<(), HalError> {
        let mut state = self.state.lock();
        if state.fail_actuator {
            return Err(HalError::Actuator("mock actuator failure".to_string()));
        }
        state.applied_current = 0.0;
        state.motor_released = true;
        state.release_calls += 1;
        state.record(MockCommand::Release);
        Ok(())
    }
}

impl Watchdog for MockPowerStage {
    fn reset_watchdog(&mut self) {
        self.state.lock().watchdog_resets += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PowerStage;

    fn assert_power_stage<T: PowerStage>(_: &T) {}

    #[test]
    fn test_default_voltage() {
        let mut mock = MockPowerStage::new();
        assert_power_stage(&mock);
        assert_eq!(mock.read_bus_voltage().unwrap(), 48.0);
        assert_eq!(mock.voltage_read_count(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let handle = MockPowerStage::new();
        let mut stage = handle.clone();

        handle.set_input_voltage(46.5);
        assert_eq!(stage.read_bus_voltage().unwrap(), 46.5);

        stage.apply_current(-12.0).unwrap();
        assert_eq!(handle.applied_current(), -12.0);
        assert!(handle.was_current_applied());
        assert!(!handle.was_motor_released());
        assert_eq!(handle.set_current_call_count(), 1);
    }

    #[test]
    fn test_release_is_distinct_from_zero_current() {
        let mut mock = MockPowerStage::new();
        mock.apply_current(0.0).unwrap();
        assert!(!mock.was_motor_released());
        assert!(!mock.was_current_applied());

        mock.release().unwrap();
        assert!(mock.was_motor_released());
        assert_eq!(mock.release_call_count(), 1);
        assert_eq!(
            mock.command_log(),
            vec![MockCommand::Apply { current: 0.0 }, MockCommand::Release]
        );
        assert_eq!(mock.last_command(), Some(MockCommand::Release));
    }

    #[test]
    fn test_scripted_voltages() {
        let mut mock = MockPowerStage::new();
        mock.push_voltages([47.0, 46.0]);
        assert_eq!(mock.pending_voltages(), 2);

        assert_eq!(mock.read_bus_voltage().unwrap(), 47.0);
        assert_eq!(mock.read_bus_voltage().unwrap(), 46.0);
        // 脚本耗尽后保持最后一个值
        assert_eq!(mock.read_bus_voltage().unwrap(), 46.0);
        assert_eq!(mock.pending_voltages(), 0);
    }

    #[test]
    fn test_injected_failures() {
        let mut mock = MockPowerStage::new();
        mock.fail_voltage_reads(true);
        assert!(matches!(mock.read_bus_voltage(), Err(HalError::Sensor(_))));

        mock.fail_actuator(true);
        assert!(matches!(
            mock.apply_current(-5.0),
            Err(HalError::Actuator(_))
        ));
        assert!(mock.release().is_err());
        assert_eq!(mock.command_count(), 0);
    }

    #[test]
    fn test_watchdog_and_reset() {
        let mut mock = MockPowerStage::with_voltage(40.0);
        mock.reset_watchdog();
        mock.reset_watchdog();
        mock.apply_current(-1.0).unwrap();
        assert_eq!(mock.watchdog_resets(), 2);

        mock.reset();
        assert_eq!(mock.watchdog_resets(), 0);
        assert_eq!(mock.command_count(), 0);
        assert_eq!(mock.read_bus_voltage().unwrap(), 48.0);
    }

    #[test]
    fn test_command_log_is_bounded() {
        let mut mock = MockPowerStage::new().with_command_log_capacity(3);
        for i in 0..10 {
            mock.apply_current(-(i as f64)).unwrap();
        }
        mock.release().unwrap();

        assert_eq!(
            mock.command_log(),
            vec![
                MockCommand::Apply { current: -8.0 },
                MockCommand::Apply { current: -9.0 },
                MockCommand::Release,
            ]
        );
        assert_eq!(mock.command_count(), 11);
        assert_eq!(mock.set_current_call_count(), 10);
        assert_eq!(mock.last_command(), Some(MockCommand::Release));

        mock.reset();
        for _ in 0..5 {
            mock.release().unwrap();
        }
        assert_eq!(mock.command_log().len(), 3);
    }

    #[test]
    fn test_zero_capacity_keeps_counters() {
        let mut mock = MockPowerStage::new().with_command_log_capacity(0);
        mock.apply_current(-2.0).unwrap();
        mock.release().unwrap();

        assert!(mock.command_log().is_empty());
        assert_eq!(mock.command_count(), 2);
        assert_eq!(mock.last_command(), Some(MockCommand::Release));
    }

    #[test]
    fn test_default_capacity_caps_long_runs() {
        let mut mock = MockPowerStage::new();
        for _ in 0..DEFAULT_COMMAND_LOG_CAPACITY + 500 {
            mock.release().unwrap();
        }
        assert_eq!(mock.command_log().len(), DEFAULT_COMMAND_LOG_CAPACITY);
        assert_eq!(mock.command_count(), DEFAULT_COMMAND_LOG_CAPACITY + 500);
    }

    #[test]
    fn test_boxed_dyn_power_stage() {
        let handle = MockPowerStage::with_voltage(46.0);
        let mut boxed: Box<dyn PowerStage + Send> = Box::new(handle.clone());
        assert_eq!(boxed.read_bus_voltage().unwrap(), 46.0);
        boxed.release().unwrap();
        boxed.reset_watchdog();
        assert!(handle.was_motor_released());
        assert_eq!(handle.watchdog_resets(), 1);
    }
}
