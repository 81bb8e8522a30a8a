//! 功率级错误类型

use thiserror::Error;

/// 功率级（传感器 / 执行器）错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    #[error("Bus voltage sensor error: {0}")]
    Sensor(String),

    #[error("Current actuator error: {0}")]
    Actuator(String),

    #[error("Power stage disconnected")]
    Disconnected,
}

impl HalError {
    /// 是否为传感器侧错误
    pub fn is_sensor(&self) -> bool {
        matches!(self, HalError::Sensor(_))
    }
}
