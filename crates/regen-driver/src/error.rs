//! 运行器错误类型

use regen_control::ConfigError;
use thiserror::Error;

/// 运行器生命周期错误
#[derive(Error, Debug)]
pub enum DriverError {
    /// 调节器已在运行
    #[error("Regulator loop is already running")]
    AlreadyRunning,

    /// 配置非法
    #[error("Invalid regulator configuration: {0}")]
    Config(#[from] ConfigError),

    /// 循环配置非法
    #[error("Invalid loop configuration: {0}")]
    LoopConfig(String),

    /// 控制线程创建失败
    #[error("Failed to spawn regulator thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::AlreadyRunning;
        assert_eq!(format!("{}", err), "Regulator loop is already running");

        let err: DriverError = ConfigError::MaxCurrent(-1.0).into();
        assert!(matches!(err, DriverError::Config(_)));
        assert!(format!("{}", err).starts_with("Invalid regulator configuration"));
    }
}
