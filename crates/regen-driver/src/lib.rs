//! # regen-driver - 调节器周期运行器
//!
//! 把 `regen-control` 的纯计算调节器与 `regen-hal` 的功率级连接起来：
//!
//! - [`step()`] - 一个完整的控制周期（读电压 → 计算 → 下发命令 → 喂狗）
//! - [`RegulatorRunner`] - 固定周期的控制线程，`start()` / `stop()` 生命周期
//! - [`LoopMetrics`] - 循环健康指标（overrun、协作者故障）
//!
//! ## 实时优先级
//!
//! 启用 `realtime` feature 后，控制线程会尝试提升到最高优先级；失败时只打
//! 警告，不影响运行。

mod error;
mod metrics;
mod runner;
mod status;
mod step;

pub use error::DriverError;
pub use metrics::{LoopMetrics, LoopMetricsSnapshot};
pub use runner::{LoopConfig, RegulatorRunner};
pub use step::{StepOutcome, step};
