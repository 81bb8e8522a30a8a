//! 无锁状态发布
//!
//! 控制线程在每个 tick 之后写入，监控方无锁读取，最多滞后一个 tick。
//! 浮点值以 `f64::to_bits` 存入 `AtomicU64`。

use regen_control::{Telemetry, VoltageRegulator, Zone};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// 区间未知（尚未采样或采样失败）
const ZONE_UNKNOWN: u8 = u8::MAX;

#[derive(Debug)]
pub(crate) struct LiveStatus {
    /// NaN 表示没有有效采样
    voltage_bits: AtomicU64,
    zone: AtomicU8,
    output_current_bits: AtomicU64,
    applied_current_bits: AtomicU64,
    tick_count: AtomicU64,
    max_current_bits: AtomicU64,
    energy_bits: AtomicU64,
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self {
            voltage_bits: AtomicU64::new(f64::NAN.to_bits()),
            zone: AtomicU8::new(ZONE_UNKNOWN),
            output_current_bits: AtomicU64::new(0.0f64.to_bits()),
            applied_current_bits: AtomicU64::new(0.0f64.to_bits()),
            tick_count: AtomicU64::new(0),
            max_current_bits: AtomicU64::new(0.0f64.to_bits()),
            energy_bits: AtomicU64::new(0.0f64.to_bits()),
        }
    }
}

impl LiveStatus {
    /// 从调节器当前状态发布
    pub(crate) fn publish(&self, regulator: &VoltageRegulator) {
        match regulator.last_output() {
            Some(output) => {
                store_f64(&self.voltage_bits, output.voltage);
                self.zone.store(output.zone.as_u8(), Ordering::Release);
                store_f64(&self.output_current_bits, output.output_current);
                store_f64(&self.applied_current_bits, output.applied_current());
            },
            None => {
                store_f64(&self.voltage_bits, f64::NAN);
                self.zone.store(ZONE_UNKNOWN, Ordering::Release);
                store_f64(&self.output_current_bits, 0.0);
                store_f64(&self.applied_current_bits, 0.0);
            },
        }

        let telemetry = regulator.telemetry();
        self.tick_count.store(telemetry.tick_count, Ordering::Release);
        store_f64(&self.max_current_bits, telemetry.max_current_applied);
        store_f64(&self.energy_bits, telemetry.cumulative_energy_recovered);
    }

    /// 停止后清除实时量（遥测保留）
    pub(crate) fn mark_released(&self) {
        store_f64(&self.output_current_bits, 0.0);
        store_f64(&self.applied_current_bits, 0.0);
        if self.zone() == Some(Zone::Regulating) {
            self.zone.store(ZONE_UNKNOWN, Ordering::Release);
        }
    }

    pub(crate) fn voltage(&self) -> Option<f64> {
        let voltage = load_f64(&self.voltage_bits);
        (!voltage.is_nan()).then_some(voltage)
    }

    pub(crate) fn zone(&self) -> Option<Zone> {
        Zone::from_u8(self.zone.load(Ordering::Acquire))
    }

    pub(crate) fn output_current(&self) -> f64 {
        load_f64(&self.output_current_bits)
    }

    pub(crate) fn applied_current(&self) -> f64 {
        load_f64(&self.applied_current_bits)
    }

    /// 逐字段读取的遥测快照
    ///
    /// 三个字段分别来自独立的原子量：运行中读取时，各字段可能分属相邻的两个
    /// tick（每个字段最多滞后一个 tick），字段之间不保证一致。循环停止后读取
    /// 的结果是一致的。
    pub(crate) fn telemetry(&self) -> Telemetry {
        Telemetry {
            tick_count: self.tick_count.load(Ordering::Acquire),
            max_current_applied: load_f64(&self.max_current_bits),
            cumulative_energy_recovered: load_f64(&self.energy_bits),
        }
    }
}

fn store_f64(slot: &AtomicU64, value: f64) {
    slot.store(value.to_bits(), Ordering::Release);
}

fn load_f64(slot: &AtomicU64) -> f64 {
    f64::from_bits(slot.load(Ordering::Acquire))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regen_control::ControllerConfig;

    #[test]
    fn test_initial_status_is_empty() {
        let status = LiveStatus::default();
        assert_eq!(status.voltage(), None);
        assert_eq!(status.zone(), None);
        assert_eq!(status.applied_current(), 0.0);
        assert_eq!(status.telemetry(), Telemetry::default());
    }

    #[test]
    fn test_publish_mirrors_regulator() {
        let mut regulator = VoltageRegulator::new(ControllerConfig::default()).unwrap();
        regulator.tick_nominal(46.0);

        let status = LiveStatus::default();
        status.publish(&regulator);

        assert_eq!(status.voltage(), Some(46.0));
        assert_eq!(status.zone(), Some(Zone::Regulating));
        assert_eq!(status.applied_current(), regulator.last_applied_current());
        assert_eq!(status.telemetry(), regulator.telemetry());

        status.mark_released();
        assert_eq!(status.applied_current(), 0.0);
        assert_eq!(status.zone(), None);
        assert_eq!(status.voltage(), Some(46.0));
    }
}
