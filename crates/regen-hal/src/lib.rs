//! # regen-hal - 功率级协作者抽象
//!
//! 调节器依赖的三个外部能力：
//!
//! - [`BusVoltageSource`] - 读取直流母线电压
//! - [`CurrentActuator`] - 下发电机电流命令 / 释放电机
//! - [`Watchdog`] - 每个控制周期喂狗
//!
//! 同时实现三者的类型自动获得 [`PowerStage`]，运行器只依赖这一个约束。
//! [`mock::MockPowerStage`] 是无硬件的测试替身，在构造时直接替换真实实现。

mod error;
pub mod mock;

pub use error::HalError;

/// 母线电压传感器
pub trait BusVoltageSource {
    /// 读取当前母线电压（V）
    fn read_bus_voltage(&mut self) -> Result<f64, HalError>;
}

/// 电机电流执行器
///
/// `apply_current` 与 `release` 是两个不同的信号：`release` 让电机滑行，
/// 而不是驱动零电流。
pub trait CurrentActuator {
    /// 以给定的有符号电流驱动电机（A，负值为回馈制动）
    fn apply_current(&mut self, current: f64) -> Result<(), HalError>;

    /// 释放电机
    fn release(&mut self) -> Result<(), HalError>;
}

/// 看门狗
pub trait Watchdog {
    /// 喂狗（每个 tick 在执行器命令之后调用一次）
    fn reset_watchdog(&mut self);
}

/// 完整功率级
pub trait PowerStage: BusVoltageSource + CurrentActuator + Watchdog {}

impl<T: BusVoltageSource + CurrentActuator + Watchdog> PowerStage for T {}

impl<T: BusVoltageSource + ?Sized> BusVoltageSource for Box<T> {
    fn read_bus_voltage(&mut self) -> Result<f64, HalError> {
        (**self).read_bus_voltage()
    }
}

impl<T: CurrentActuator + ?Sized> CurrentActuator for Box<T> {
    fn apply_current(&mut self, current: f64) -> Result<(), HalError> {
        (**self).apply_current(current)
    }

    fn release(&mut self) -> Result<(), HalError> {
        (**self).release()
    }
}

impl<T: Watchdog + ?Sized> Watchdog for Box<T> {
    fn reset_watchdog(&mut self) {
        (**self).reset_watchdog()
    }
}
