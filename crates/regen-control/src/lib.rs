//! # regen-control - 母线电压回馈调节核心
//!
//! 闭环回馈制动电压调节器：周期读取直流母线电压，经区间判定、PID 计算和
//! 安全钳位后，生成电机电流命令。
//!
//! ## 模块
//!
//! - `config` - 调节器配置与校验
//! - `zone` - 电压区间判定（Idle / Regulating / SafetyCutoff）
//! - `pid` - PID 状态与算法（带积分饱和保护）
//! - `telemetry` - 回馈遥测计数
//! - `regulator` - `VoltageRegulator`，每个 tick 的完整流程
//!
//! 本 crate 不做 I/O、不创建线程，周期调度和执行器驱动见 `regen-driver`
//! 与 `regen-hal`。

pub mod config;
mod error;
pub mod pid;
pub mod regulator;
pub mod telemetry;
pub mod zone;

pub use config::{ControllerConfig, PidGains, TickPeriod};
pub use error::ConfigError;
pub use pid::{PidState, PidTerms};
pub use regulator::{ActuatorCommand, ControllerOutput, VoltageRegulator};
pub use telemetry::Telemetry;
pub use zone::Zone;
