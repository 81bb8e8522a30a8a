//! 控制层错误类型定义

use thiserror::Error;

/// 配置错误
///
/// 所有配置约束都在构造阶段检查，`tick()` 本身不会返回错误。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 电压阈值顺序错误（必须满足 minimum < threshold < target）
    #[error(
        "Invalid voltage ordering: minimum ({minimum} V) < threshold ({threshold} V) < target ({target} V) is required"
    )]
    VoltageOrdering {
        minimum: f64,
        threshold: f64,
        target: f64,
    },

    /// 最大输出电流必须为正
    #[error("Invalid max output current: {0} A (must be > 0)")]
    MaxCurrent(f64),

    /// 积分限幅不能为负
    #[error("Invalid integral limit: {0} (must be >= 0)")]
    IntegralLimit(f64),

    /// 死区电流不能为负
    #[error("Invalid deadband current: {0} A (must be >= 0)")]
    Deadband(f64),

    /// 控制周期必须为正
    #[error("Invalid tick period: {0:?} (must be > 0)")]
    TickPeriod(std::time::Duration),

    /// 参数不是有限浮点数（NaN / Inf）
    #[error("Parameter `{name}` is not finite: {value}")]
    NotFinite { name: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::ConfigError;
    use std::time::Duration;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::VoltageOrdering {
            minimum: 46.0,
            threshold: 45.0,
            target: 48.0,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("minimum (46 V)"), "message: {}", msg);
        assert!(msg.contains("threshold (45 V)"), "message: {}", msg);

        let msg = format!("{}", ConfigError::MaxCurrent(-1.0));
        assert_eq!(msg, "Invalid max output current: -1 A (must be > 0)");

        let msg = format!("{}", ConfigError::TickPeriod(Duration::ZERO));
        assert!(msg.contains("tick period") && msg.contains("0ns"));

        let msg = format!(
            "{}",
            ConfigError::NotFinite {
                name: "kp",
                value: f64::NAN
            }
        );
        assert!(msg.contains("`kp`") && msg.contains("NaN"));
    }
}
