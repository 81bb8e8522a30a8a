//! # 离线仿真
//!
//! 以配置的控制周期，用电压曲线驱动一个全新的调节器并记录轨迹。
//! 不经过功率级，纯计算。

use crate::profile::VoltageProfile;
use crate::trace::{RegenTrace, TraceMetadata, TracePoint};
use anyhow::{Context, Result};
use regen_control::{ControllerConfig, Telemetry, VoltageRegulator};
use std::time::Duration;
use tracing::debug;

/// 单次仿真的最大 tick 数（1 kHz 下约 2.7 小时）
pub const MAX_SIMULATION_STEPS: usize = 10_000_000;

/// 离线仿真器
#[derive(Debug, Clone)]
pub struct Simulator {
    regulator: VoltageRegulator,
}

impl Simulator {
    pub fn new(config: ControllerConfig) -> Result<Self> {
        let regulator = VoltageRegulator::new(config).context("创建调节器失败")?;
        Ok(Self { regulator })
    }

    /// 运行一条曲线
    ///
    /// 每次运行前清零 PID 状态和遥测。tick 数超过 [`MAX_SIMULATION_STEPS`]
    /// 时返回错误，不分配轨迹。
    pub fn run(&mut self, profile: &VoltageProfile, duration: Duration) -> Result<RegenTrace> {
        let dt = self.regulator.tick_period();
        let dt_sec = dt.as_secs_f64();
        let steps = (duration.as_secs_f64() / dt_sec).round();
        if steps > MAX_SIMULATION_STEPS as f64 {
            anyhow::bail!(
                "仿真时长 {:.1} s 需要 {:.0} 个 tick，超过上限 {}",
                duration.as_secs_f64(),
                steps,
                MAX_SIMULATION_STEPS
            );
        }
        let steps = steps as usize;

        self.regulator.reset();
        self.regulator.reset_telemetry();
        let config = self.regulator.config();

        let mut trace = RegenTrace::new(TraceMetadata {
            source: profile.to_string(),
            tick_period_us: dt.as_duration().as_micros() as u64,
            target_voltage: config.target_voltage,
            threshold_voltage: config.threshold_voltage,
            minimum_voltage: config.minimum_voltage,
        });
        trace.points.reserve(steps);

        for i in 0..steps {
            let t = i as f64 * dt_sec;
            let voltage = profile.voltage_at(t);
            let output = self.regulator.tick(voltage, dt);
            trace.push(TracePoint {
                t,
                voltage,
                current: output.applied_current(),
                zone: output.zone,
                active: output.is_regulating(),
            });
        }

        debug!("Simulated {} ticks of '{}'", steps, profile);
        Ok(trace)
    }

    /// 最近一次运行的遥测
    pub fn telemetry(&self) -> Telemetry {
        self.regulator.telemetry()
    }

    pub fn regulator(&self) -> &VoltageRegulator {
        &self.regulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regen_control::Zone;

    fn simulator() -> Simulator {
        let config = ControllerConfig::default().with_tick_period(Duration::from_millis(10));
        Simulator::new(config).unwrap()
    }

    #[test]
    fn test_step_profile_simulation() {
        let mut sim = simulator();
        let trace = sim.run(&VoltageProfile::step_drop(), Duration::from_secs(10)).unwrap();

        assert_eq!(trace.len(), 1000);
        assert_eq!(trace.metadata.tick_period_us, 10_000);

        // 阶跃前后不回馈，阶跃期间回馈
        assert!(!trace.points[100].active);
        assert_eq!(trace.points[100].current, 0.0);
        assert!(trace.points[500].active);
        assert!(trace.points[500].current > 0.0);
        assert!(!trace.points[900].active);

        for p in &trace.points {
            assert!(p.current <= 50.0);
        }
        assert_eq!(sim.telemetry().tick_count, 1000);
    }

    #[test]
    fn test_ramp_reaches_safety_cutoff() {
        let mut sim = simulator();
        let trace = sim.run(&VoltageProfile::ramp(), Duration::from_secs(15)).unwrap();

        // 8s ~ 10s 保持在 45V（下限），应为安全切断
        let at_floor = &trace.points[900];
        assert_eq!(at_floor.zone, Zone::SafetyCutoff);
        assert_eq!(at_floor.current, 0.0);
    }

    #[test]
    fn test_oversized_run_rejected() {
        let mut sim = simulator();
        let err = sim
            .run(&VoltageProfile::step_drop(), Duration::from_secs(1_000_000_000))
            .unwrap_err();
        assert!(err.to_string().contains("超过上限"));
        assert_eq!(sim.telemetry().tick_count, 0);
    }

    #[test]
    fn test_runs_are_independent() {
        let mut sim = simulator();
        let first = sim.run(&VoltageProfile::SmoothDrop, Duration::from_secs(20)).unwrap();
        let second = sim.run(&VoltageProfile::SmoothDrop, Duration::from_secs(20)).unwrap();
        assert_eq!(first, second);
    }
}
