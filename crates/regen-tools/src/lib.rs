//! # regen-tools - 上位机工具
//!
//! **依赖原则**: 只依赖调节器核心、功率级抽象和 `step()`，不依赖任何真实硬件
//!
//! ## 包含模块
//!
//! - `config` - TOML 配置文件
//! - `profile` - 母线电压激励曲线
//! - `simulator` - 离线仿真
//! - `trace` - 轨迹格式（bincode 文件 / CSV 导出）
//! - `statistics` - 回馈统计
//! - `scenarios` - 固件自检套件

pub mod config;
pub mod profile;
pub mod scenarios;
pub mod simulator;
pub mod statistics;
pub mod trace;

pub use config::RegulatorConfigFile;
pub use profile::{Hold, VoltageProfile};
pub use scenarios::{ScenarioGroup, ScenarioReport, SuiteSummary, run_suite};
pub use simulator::Simulator;
pub use statistics::RegenSummary;
pub use trace::{RegenTrace, TraceMetadata, TracePoint};
