//! # 自检场景
//!
//! 固件自检套件：每个场景在全新的调节器 + [`MockPowerStage`] 上运行，
//! 通过 [`regen_driver::step`] 走完整的读电压 → 计算 → 下发命令路径。
//!
//! 期望的调节状态由配置推导（`minimum < v < threshold`），因此套件也可用于
//! 校验自定义配置。

use anyhow::{Context, Result};
use regen_control::{ControllerConfig, PidState, TickPeriod, VoltageRegulator};
use regen_driver::step;
use regen_hal::mock::{MockCommand, MockPowerStage};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// 场景分组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioGroup {
    /// 单项功能
    Unit,
    /// 完整工况
    Integration,
}

impl fmt::Display for ScenarioGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioGroup::Unit => write!(f, "unit"),
            ScenarioGroup::Integration => write!(f, "integration"),
        }
    }
}

type ScenarioFn = fn(&ControllerConfig) -> Result<(), String>;

/// 自检场景
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub group: ScenarioGroup,
    run: ScenarioFn,
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish()
    }
}

impl Scenario {
    const fn unit(name: &'static str, run: ScenarioFn) -> Self {
        Self {
            name,
            group: ScenarioGroup::Unit,
            run,
        }
    }

    const fn integration(name: &'static str, run: ScenarioFn) -> Self {
        Self {
            name,
            group: ScenarioGroup::Integration,
            run,
        }
    }

    /// 运行场景
    pub fn run(&self, config: &ControllerConfig) -> ScenarioReport {
        let result = (self.run)(config);
        match &result {
            Ok(()) => debug!("Scenario {} passed", self.name),
            Err(message) => warn!("Scenario {} failed: {}", self.name, message),
        }
        ScenarioReport {
            name: self.name.to_string(),
            group: self.group,
            passed: result.is_ok(),
            message: result.err(),
        }
    }
}

/// 单个场景结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub group: ScenarioGroup,
    pub passed: bool,
    /// 失败原因
    pub message: Option<String>,
}

/// 套件汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub reports: Vec<ScenarioReport>,
    pub passed: usize,
    pub failed: usize,
}

impl SuiteSummary {
    fn push(&mut self, report: ScenarioReport) {
        if report.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.reports.push(report);
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    /// 通过率（%）
    pub fn success_rate(&self) -> f64 {
        if self.reports.is_empty() {
            return 0.0;
        }
        (self.passed as f64 / self.total() as f64) * 100.0
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.reports.iter().filter(|r| !r.passed)
    }
}

/// 全部场景
pub fn all_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::unit("pid_proportional_response", pid_proportional_response),
        Scenario::unit("pid_integral_buildup", pid_integral_buildup),
        Scenario::unit("pid_derivative_damping", pid_derivative_damping),
        Scenario::unit("pid_anti_windup", pid_anti_windup),
        Scenario::unit("pid_reset_behavior", pid_reset_behavior),
        Scenario::unit("voltage_threshold_detection", voltage_threshold_detection),
        Scenario::unit("voltage_boundary_conditions", voltage_boundary_conditions),
        Scenario::unit("safety_voltage_cutoff", safety_voltage_cutoff),
        Scenario::unit("current_output_limits", current_output_limits),
        Scenario::unit("current_scaling", current_scaling),
        Scenario::integration("voltage_drop_scenario", voltage_drop_scenario),
        Scenario::integration("voltage_recovery_scenario", voltage_recovery_scenario),
        Scenario::integration("oscillation_damping", oscillation_damping),
        Scenario::integration("steady_state_regulation", steady_state_regulation),
        Scenario::integration("response_time", response_time),
        Scenario::integration("stability_margins", stability_margins),
        Scenario::integration("energy_recovery_accounting", energy_recovery_accounting),
        Scenario::integration("rapid_voltage_changes", rapid_voltage_changes),
        Scenario::integration("long_duration_operation", long_duration_operation),
        Scenario::integration("extreme_voltage_conditions", extreme_voltage_conditions),
    ]
}

/// 运行完整套件
pub fn run_suite(config: &ControllerConfig) -> Result<SuiteSummary> {
    config.validate().context("调节器配置无效")?;

    let mut summary = SuiteSummary::default();
    for scenario in all_scenarios() {
        summary.push(scenario.run(config));
    }
    Ok(summary)
}

// ==================== 测试台 ====================

/// 调节器 + Mock 功率级
struct Bench {
    regulator: VoltageRegulator,
    stage: MockPowerStage,
    dt: TickPeriod,
}

impl Bench {
    fn new(config: &ControllerConfig) -> Result<Self, String> {
        let regulator = VoltageRegulator::new(config.clone()).map_err(|e| e.to_string())?;
        let dt = regulator.tick_period();
        Ok(Self {
            regulator,
            stage: MockPowerStage::new(),
            dt,
        })
    }

    fn hold(&mut self, voltage: f64, ticks: usize) {
        self.stage.set_input_voltage(voltage);
        for _ in 0..ticks {
            step(&mut self.regulator, &mut self.stage, self.dt);
        }
    }

    fn is_active(&self) -> bool {
        self.regulator.is_regulating_active()
    }

    fn applied(&self) -> f64 {
        self.stage.applied_current().abs()
    }

    fn expect_active(&self, voltage: f64) -> bool {
        let config = self.regulator.config();
        voltage > config.minimum_voltage && voltage < config.threshold_voltage
    }

    /// 依次保持每个电压 `ticks` 个周期，检查调节状态
    fn check_sequence(&mut self, voltages: &[f64], ticks: usize) -> Result<(), String> {
        for (i, &v) in voltages.iter().enumerate() {
            self.hold(v, ticks);
            let expected = self.expect_active(v);
            ensure(
                self.is_active() == expected,
                format!(
                    "step {}: {:.2} V should {}be regulating",
                    i,
                    v,
                    if expected { "" } else { "not " }
                ),
            )?;
        }
        Ok(())
    }
}

fn ensure(condition: bool, message: impl Into<String>) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.into())
    }
}

// ==================== 单项场景 ====================

fn pid_proportional_response(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.hold(47.0, 10);
    ensure(
        bench.stage.was_current_applied(),
        "current should be applied 1 V below target",
    )
}

fn pid_integral_buildup(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.hold(46.5, 10);
    let early = bench.regulator.pid_state().integral_accumulator;
    bench.hold(46.5, 90);
    let late = bench.regulator.pid_state().integral_accumulator;

    ensure(late > early, format!("integral should grow: {} -> {}", early, late))?;
    ensure(
        bench.stage.was_current_applied(),
        "current should be applied under sustained drop",
    )
}

fn pid_derivative_damping(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.hold(48.0, 5);
    bench.hold(46.0, 1);

    let derivative = bench
        .regulator
        .last_output()
        .map_or(0.0, |o| o.terms.derivative);
    if config.gains.kd > 0.0 {
        ensure(
            derivative > 0.0,
            format!("derivative should react to the drop, got {}", derivative),
        )?;
    }

    bench.hold(46.0, 4);
    ensure(
        bench.stage.was_current_applied(),
        "current should be applied after sudden drop",
    )
}

fn pid_anti_windup(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    let limit = config.integral_limit;

    bench.hold(config.minimum_voltage - 1.0, 1000);
    ensure(
        bench.regulator.pid_state() == PidState::ZERO,
        "PID state should stay zero in safety cutoff",
    )?;

    let lowest = config.minimum_voltage + 0.1;
    for _ in 0..10_000 {
        bench.hold(lowest, 1);
        let integral = bench.regulator.pid_state().integral_accumulator;
        ensure(
            integral.abs() <= limit,
            format!("integral {} exceeds limit {}", integral, limit),
        )?;
    }
    Ok(())
}

fn pid_reset_behavior(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.hold(46.5, 50);
    bench.hold(config.threshold_voltage + 1.0, 10);

    ensure(
        bench.stage.was_motor_released(),
        "motor should be released above threshold",
    )?;
    ensure(
        bench.regulator.pid_state() == PidState::ZERO,
        "PID state should reset outside the regulating zone",
    )
}

fn voltage_threshold_detection(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.check_sequence(&[47.5, 47.4, 47.6], 1)
}

fn voltage_boundary_conditions(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.check_sequence(&[50.0, 48.1, 47.9, 47.5, 47.4, 45.1, 45.0, 44.9], 1)
}

fn safety_voltage_cutoff(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.hold(config.minimum_voltage - 1.0, 10);
    ensure(!bench.is_active(), "regen should be disabled below minimum")?;
    ensure(
        bench.stage.set_current_call_count() == 0,
        "no current should be commanded below minimum",
    )?;

    bench.hold(config.minimum_voltage + 0.1, 1);
    ensure(bench.is_active(), "regen should be enabled just above minimum")
}

fn current_output_limits(config: &ControllerConfig) -> Result<(), String> {
    let max = config.max_output_current;
    for voltage in [40.0, config.minimum_voltage + 0.1, 46.0] {
        let mut bench = Bench::new(config)?;
        for _ in 0..100 {
            bench.hold(voltage, 1);
            ensure(
                bench.applied() <= max,
                format!("{:.2} A exceeds limit {:.2} A at {:.2} V", bench.applied(), max, voltage),
            )?;
        }
    }
    Ok(())
}

fn current_scaling(config: &ControllerConfig) -> Result<(), String> {
    let mut small = Bench::new(config)?;
    small.hold(47.0, 20);
    let mut large = Bench::new(config)?;
    large.hold(46.0, 20);

    ensure(
        large.applied() > small.applied(),
        format!(
            "larger drop should produce larger current: {:.2} A (46 V) vs {:.2} A (47 V)",
            large.applied(),
            small.applied()
        ),
    )
}

// ==================== 完整工况 ====================

fn voltage_drop_scenario(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.check_sequence(&[48.0, 47.8, 47.4, 47.0, 46.5, 47.0, 47.5, 48.0], 10)
}

fn voltage_recovery_scenario(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.hold(46.0, 50);
    ensure(bench.is_active(), "regen should be active at 46 V")?;
    bench.check_sequence(&[46.2, 46.5, 47.0, 47.3, 47.6, 48.0], 20)
}

fn oscillation_damping(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.check_sequence(&[47.4, 47.6, 47.4, 47.6, 47.4], 30)
}

fn steady_state_regulation(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.hold(46.5, 190);

    let mut outputs = Vec::with_capacity(10);
    for _ in 0..10 {
        bench.hold(46.5, 1);
        outputs.push(bench.applied());
    }
    ensure(bench.is_active(), "should keep regulating at constant 46.5 V")?;

    let min = outputs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = outputs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    ensure(
        max - min < 1.0,
        format!("output should be steady, spread {:.3} A", max - min),
    )
}

fn response_time(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.hold(48.0, 10);
    bench.hold(46.0, 1);
    ensure(bench.is_active(), "should react on the first tick after a drop")?;
    bench.hold(46.0, 4);
    ensure(bench.is_active(), "should stay active after the drop")
}

fn stability_margins(config: &ControllerConfig) -> Result<(), String> {
    let gain_sets = [(10.0, 2.0, 0.1), (30.0, 8.0, 1.0), (20.0, 5.0, 0.5)];
    for (kp, ki, kd) in gain_sets {
        let tuned = config.clone().with_gains(kp, ki, kd);
        let mut bench = Bench::new(&tuned)?;
        bench.hold(46.5, 50);
        let applied = bench.applied();

        ensure(
            bench.is_active(),
            format!("should regulate with gains ({}, {}, {})", kp, ki, kd),
        )?;
        ensure(
            applied.is_finite() && applied <= tuned.max_output_current,
            format!("output {} out of range with gains ({}, {}, {})", applied, kp, ki, kd),
        )?;
    }
    Ok(())
}

fn energy_recovery_accounting(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    let voltage = 46.5;
    bench.hold(voltage, 1000);

    let dt = bench.dt.as_secs_f64();
    let expected: f64 = bench
        .stage
        .command_log()
        .iter()
        .map(|c| match c {
            MockCommand::Apply { current } => current.abs() * voltage * dt / 3600.0,
            MockCommand::Release => 0.0,
        })
        .sum();
    let recorded = bench.regulator.telemetry().cumulative_energy_recovered;

    ensure(recorded > 0.0, "energy should be recovered at 46.5 V")?;
    ensure(
        (recorded - expected).abs() <= expected * 1e-9,
        format!("telemetry {:.6} Wh vs commanded {:.6} Wh", recorded, expected),
    )
}

fn rapid_voltage_changes(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    bench.check_sequence(&[48.0, 45.0, 47.0, 46.0, 48.0], 5)
}

fn long_duration_operation(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    for i in 0..10 {
        bench.hold(46.8, 100);
        ensure(
            bench.is_active(),
            format!("should keep regulating after {} ticks", (i + 1) * 100),
        )?;
    }
    ensure(
        bench.stage.watchdog_resets() == 1000,
        format!("watchdog resets {} != 1000", bench.stage.watchdog_resets()),
    )
}

fn extreme_voltage_conditions(config: &ControllerConfig) -> Result<(), String> {
    let mut bench = Bench::new(config)?;
    for voltage in [55.0, config.minimum_voltage - 5.0, f64::NAN] {
        bench.hold(voltage, 10);
        ensure(
            !bench.is_active(),
            format!("should not regulate at {} V", voltage),
        )?;
        ensure(
            bench.stage.was_motor_released(),
            format!("motor should be released at {} V", voltage),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_passes_suite() {
        let summary = run_suite(&ControllerConfig::default()).unwrap();
        let failures: Vec<_> = summary.failures().collect();
        assert!(failures.is_empty(), "failures: {:?}", failures);
        assert_eq!(summary.total(), 20);
        assert_eq!(summary.passed, 20);
        assert_eq!(summary.success_rate(), 100.0);
    }

    #[test]
    fn test_lower_minimum_passes_with_derived_expectations() {
        let config = ControllerConfig::default()
            .with_minimum_voltage(36.0)
            .with_tick_period(Duration::from_millis(10));
        let summary = run_suite(&config).unwrap();
        assert!(summary.all_passed(), "{:?}", summary.failures().collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ControllerConfig::default().with_max_output_current(0.0);
        assert!(run_suite(&config).is_err());
    }

    #[test]
    fn test_failure_reported() {
        // 增益全为 0 时不会有电流输出
        let config = ControllerConfig::default().with_gains(0.0, 0.0, 0.0);
        let report = all_scenarios()
            .into_iter()
            .find(|s| s.name == "pid_proportional_response")
            .unwrap()
            .run(&config);
        assert!(!report.passed);
        assert!(report.message.unwrap().contains("current should be applied"));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = SuiteSummary::default();
        assert_eq!(summary.success_rate(), 0.0);
        summary.push(ScenarioReport {
            name: "a".into(),
            group: ScenarioGroup::Unit,
            passed: true,
            message: None,
        });
        summary.push(ScenarioReport {
            name: "b".into(),
            group: ScenarioGroup::Integration,
            passed: false,
            message: Some("boom".into()),
        });
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.success_rate(), 50.0);
        assert!(!summary.all_passed());
        assert_eq!(summary.failures().count(), 1);
    }
}
