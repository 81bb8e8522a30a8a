//! 命令定义和实现

pub mod config;
pub mod live;
pub mod simulate;
pub mod suite;

pub use config::ConfigCommand;
pub use live::LiveCommand;
pub use simulate::SimulateCommand;
pub use suite::SuiteCommand;
