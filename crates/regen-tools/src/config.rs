//! # 调节器配置文件
//!
//! TOML 格式，缺省字段取默认值：
//!
//! ```toml
//! [regulator]
//! target_voltage = 48.0
//! threshold_voltage = 47.5
//! minimum_voltage = 45.0
//! max_output_current = 50.0
//! integral_limit = 10.0
//! kp = 20.0
//! ki = 5.0
//! kd = 0.5
//! tick_period_us = 1000
//! deadband_current = 0.1
//!
//! [loop]
//! dt_clamp_multiplier = 2.0
//! spin = false
//! ```

use anyhow::{Context, Result};
use regen_control::config::{
    DEFAULT_DEADBAND_CURRENT, DEFAULT_INTEGRAL_LIMIT, DEFAULT_MAX_OUTPUT_CURRENT,
    DEFAULT_MINIMUM_VOLTAGE, DEFAULT_TARGET_VOLTAGE, DEFAULT_THRESHOLD_VOLTAGE,
    DEFAULT_TICK_RATE_HZ,
};
use regen_control::{ControllerConfig, PidGains};
use regen_driver::LoopConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 配置文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatorConfigFile {
    /// 调节器参数
    pub regulator: RegulatorSection,

    /// 控制循环参数
    #[serde(rename = "loop")]
    pub loop_: LoopSection,
}

/// `[regulator]` 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatorSection {
    pub target_voltage: f64,
    pub threshold_voltage: f64,
    pub minimum_voltage: f64,
    pub max_output_current: f64,
    pub integral_limit: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// 控制周期（微秒）
    pub tick_period_us: u64,
    pub deadband_current: f64,
}

impl Default for RegulatorSection {
    fn default() -> Self {
        let gains = PidGains::default();
        Self {
            target_voltage: DEFAULT_TARGET_VOLTAGE,
            threshold_voltage: DEFAULT_THRESHOLD_VOLTAGE,
            minimum_voltage: DEFAULT_MINIMUM_VOLTAGE,
            max_output_current: DEFAULT_MAX_OUTPUT_CURRENT,
            integral_limit: DEFAULT_INTEGRAL_LIMIT,
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            tick_period_us: 1_000_000 / DEFAULT_TICK_RATE_HZ as u64,
            deadband_current: DEFAULT_DEADBAND_CURRENT,
        }
    }
}

/// `[loop]` 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSection {
    pub dt_clamp_multiplier: f64,
    pub max_iterations: Option<usize>,
    pub spin: bool,
}

impl Default for LoopSection {
    fn default() -> Self {
        let defaults = LoopConfig::default();
        Self {
            dt_clamp_multiplier: defaults.dt_clamp_multiplier,
            max_iterations: defaults.max_iterations,
            spin: defaults.spin,
        }
    }
}

impl RegulatorConfigFile {
    /// 从 TOML 文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("TOML 格式错误")
    }

    /// 保存为 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        fs::write(path.as_ref(), content).context("写入配置文件失败")?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置失败")
    }

    /// 转换为调节器配置（并校验）
    pub fn to_controller_config(&self) -> Result<ControllerConfig> {
        let r = &self.regulator;
        let config = ControllerConfig::default()
            .with_target_voltage(r.target_voltage)
            .with_threshold_voltage(r.threshold_voltage)
            .with_minimum_voltage(r.minimum_voltage)
            .with_max_output_current(r.max_output_current)
            .with_integral_limit(r.integral_limit)
            .with_gains(r.kp, r.ki, r.kd)
            .with_tick_period(Duration::from_micros(r.tick_period_us))
            .with_deadband_current(r.deadband_current);

        config.validate().context("调节器配置无效")?;
        Ok(config)
    }

    /// 转换为循环配置
    pub fn to_loop_config(&self) -> LoopConfig {
        LoopConfig {
            dt_clamp_multiplier: self.loop_.dt_clamp_multiplier,
            max_iterations: self.loop_.max_iterations,
            spin: self.loop_.spin,
        }
    }

    /// 读取可选配置文件，缺省时使用默认配置
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}
