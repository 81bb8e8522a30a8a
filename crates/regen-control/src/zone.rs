//! 电压区间判定

use crate::config::ControllerConfig;
use std::fmt;

/// 电压区间
///
/// 每个 tick 由当前电压和配置推导，不单独存储。
///
/// 边界规则：
/// - `voltage == threshold_voltage` → `Idle`
/// - `voltage == minimum_voltage` → `SafetyCutoff`
/// - `Regulating` 为开区间 `(minimum_voltage, threshold_voltage)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Zone {
    /// 电压不低于阈值，无需回馈
    Idle,
    /// 回馈调节区
    Regulating,
    /// 电压过低，强制释放
    SafetyCutoff,
}

impl Zone {
    /// 按配置对电压分区
    ///
    /// 非有限值（NaN / Inf）的读数按 `SafetyCutoff` 处理。
    pub fn classify(voltage: f64, config: &ControllerConfig) -> Self {
        if !voltage.is_finite() || voltage <= config.minimum_voltage {
            Zone::SafetyCutoff
        } else if voltage >= config.threshold_voltage {
            Zone::Idle
        } else {
            Zone::Regulating
        }
    }

    pub fn is_regulating(self) -> bool {
        self == Zone::Regulating
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Zone::Idle => 0,
            Zone::Regulating => 1,
            Zone::SafetyCutoff => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Zone::Idle),
            1 => Some(Zone::Regulating),
            2 => Some(Zone::SafetyCutoff),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Idle => write!(f, "Idle"),
            Zone::Regulating => write!(f, "Regulating"),
            Zone::SafetyCutoff => write!(f, "SafetyCutoff"),
        }
    }
}
