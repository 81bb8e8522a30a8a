//! 调节器行为测试
//!
//! 覆盖区间边界、收敛、单调性、积分饱和保护和状态复位等性质。

use proptest::prelude::*;
use regen_control::{
    ActuatorCommand, ControllerConfig, PidState, TickPeriod, VoltageRegulator, Zone,
};
use std::time::Duration;

fn default_regulator() -> VoltageRegulator {
    VoltageRegulator::new(ControllerConfig::default()).unwrap()
}

/// 10ms 周期的调节器（减少长时间仿真的 tick 数）
fn coarse_regulator() -> VoltageRegulator {
    let config = ControllerConfig::default().with_tick_period(Duration::from_millis(10));
    VoltageRegulator::new(config).unwrap()
}

fn hold(reg: &mut VoltageRegulator, voltage: f64, ticks: usize) -> f64 {
    let mut last = 0.0;
    for _ in 0..ticks {
        last = reg.tick_nominal(voltage).output_current;
    }
    last
}

#[test]
fn test_end_to_end_zone_sequence() {
    let config = ControllerConfig::default()
        .with_target_voltage(48.0)
        .with_threshold_voltage(47.5)
        .with_minimum_voltage(45.0)
        .with_max_output_current(50.0)
        .with_gains(20.0, 5.0, 0.5);
    let mut reg = VoltageRegulator::new(config).unwrap();

    let voltages = [48.0, 47.0, 46.0, 45.0, 44.0];
    let expected = [false, true, true, false, false];

    for (voltage, expected_active) in voltages.iter().zip(expected) {
        hold(&mut reg, *voltage, 500);
        assert_eq!(
            reg.is_regulating_active(),
            expected_active,
            "voltage {} V",
            voltage
        );
    }
}

#[test]
fn test_exact_threshold_boundary() {
    let mut reg = default_regulator();
    let out = reg.tick_nominal(47.5);
    assert_eq!(out.zone, Zone::Idle);
    assert_eq!(out.command, ActuatorCommand::Release);

    let out = reg.tick_nominal(47.49);
    assert_eq!(out.zone, Zone::Regulating);
    assert!(reg.is_regulating_active());
}

#[test]
fn test_exact_minimum_boundary() {
    let mut reg = default_regulator();
    let out = reg.tick_nominal(45.0);
    assert_eq!(out.zone, Zone::SafetyCutoff);
    assert!(!reg.is_regulating_active());

    let out = reg.tick_nominal(45.01);
    assert_eq!(out.zone, Zone::Regulating);
    assert!(reg.is_regulating_active());
}

#[test]
fn test_constant_voltage_converges() {
    for voltage in [47.4, 47.0, 46.5, 46.0, 45.5, 45.01] {
        let mut reg = coarse_regulator();
        // 25 秒：积分项在最小误差 0.6V 下也会饱和
        hold(&mut reg, voltage, 2500);

        let a = reg.tick_nominal(voltage).output_current;
        let b = reg.tick_nominal(voltage).output_current;
        assert!((a - b).abs() < 1e-9, "voltage {} V: {} vs {}", voltage, a, b);
        assert!(a <= 50.0);
        assert!(a > 0.0);
    }
}

#[test]
fn test_anti_windup_at_lowest_regulating_voltage() {
    let mut reg = coarse_regulator();
    let voltage = 45.0 + 1e-6;
    for _ in 0..10_000 {
        reg.tick_nominal(voltage);
        let integral = reg.pid_state().integral_accumulator;
        assert!(integral.abs() <= 10.0, "integral {}", integral);
    }
    assert!((reg.pid_state().integral_accumulator - 10.0).abs() < 1e-9);
}

#[test]
fn test_idle_excursion_clears_memory() {
    let mut reg = default_regulator();

    reg.tick_nominal(46.0);
    let first_entry = reg.pid_state();
    hold(&mut reg, 46.0, 200);
    assert_ne!(reg.pid_state(), first_entry);

    // 完整的 Idle 回合
    hold(&mut reg, 48.0, 10);
    assert_eq!(reg.pid_state(), PidState::ZERO);

    reg.tick_nominal(46.0);
    assert_eq!(reg.pid_state(), first_entry);
}

#[test]
fn test_safety_excursion_clears_memory() {
    let mut reg = default_regulator();
    reg.tick_nominal(46.0);
    let first_entry = reg.pid_state();
    hold(&mut reg, 46.0, 200);

    reg.tick_nominal(44.0);
    assert_eq!(reg.pid_state(), PidState::ZERO);

    reg.tick_nominal(46.0);
    assert_eq!(reg.pid_state(), first_entry);
}

#[test]
fn test_current_scaling_with_voltage_drop() {
    // 较大的压降产生不小于较小压降的电流
    let mut small = default_regulator();
    let mut large = default_regulator();
    let small_out = hold(&mut small, 47.4, 20);
    let large_out = hold(&mut large, 47.2, 20);
    assert!(large_out > small_out, "{} vs {}", large_out, small_out);
}

#[test]
fn test_explicit_tick_period_required() {
    assert!(TickPeriod::new(Duration::ZERO).is_err());
    let config = ControllerConfig::default().with_tick_period(Duration::ZERO);
    assert!(VoltageRegulator::new(config).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// 阈值及以上：输出为 0 且释放
    #[test]
    fn idle_zone_always_releases(voltage in 47.5..100.0f64, warmup in 0usize..50) {
        let mut reg = default_regulator();
        hold(&mut reg, 46.0, warmup);
        let out = reg.tick_nominal(voltage);
        prop_assert_eq!(out.output_current, 0.0);
        prop_assert_eq!(out.command, ActuatorCommand::Release);
    }

    /// 下限及以下：无论之前的 PID 状态如何，输出为 0 且释放
    #[test]
    fn safety_zone_always_releases(voltage in -10.0..=45.0f64, warmup in 0usize..200) {
        let mut reg = default_regulator();
        hold(&mut reg, 45.5, warmup);
        let out = reg.tick_nominal(voltage);
        prop_assert_eq!(out.zone, Zone::SafetyCutoff);
        prop_assert_eq!(out.output_current, 0.0);
        prop_assert_eq!(out.command, ActuatorCommand::Release);
        prop_assert_eq!(reg.pid_state(), PidState::ZERO);
    }

    /// 单调性：v1 < v2 时 output(v1) >= output(v2)
    #[test]
    fn output_monotonic_in_error(
        a in 45.001..47.499f64,
        b in 45.001..47.499f64,
        ticks in 1usize..300,
    ) {
        let (v1, v2) = if a <= b { (a, b) } else { (b, a) };
        let mut r1 = default_regulator();
        let mut r2 = default_regulator();
        let o1 = hold(&mut r1, v1, ticks);
        let o2 = hold(&mut r2, v2, ticks);
        prop_assert!(o1 >= o2, "output({}) = {} < output({}) = {}", v1, o1, v2, o2);
    }

    /// 任意电压序列下：积分不超限，输出在 [0, max] 内
    #[test]
    fn integral_and_output_bounded(voltages in prop::collection::vec(40.0..50.0f64, 1..400)) {
        let mut reg = coarse_regulator();
        for v in voltages {
            let out = reg.tick_nominal(v);
            prop_assert!(reg.pid_state().integral_accumulator.abs() <= 10.0);
            prop_assert!(out.output_current >= 0.0);
            prop_assert!(out.output_current <= 50.0);
            if let ActuatorCommand::Apply { current } = out.command {
                prop_assert!(current < -0.1);
            }
        }
    }
}
