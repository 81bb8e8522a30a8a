//! 仿真命令
//!
//! 用电压曲线离线驱动调节器，输出回馈统计，可选保存轨迹

use anyhow::{Context, Result};
use clap::Args;
use regen_tools::{RegenSummary, RegulatorConfigFile, Simulator, VoltageProfile};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// 仿真命令参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 预设曲线：smooth / step / ramp / rapid
    #[arg(short, long, default_value = "smooth")]
    pub profile: String,

    /// 从 JSON 文件读取曲线（覆盖 --profile）
    #[arg(long)]
    pub profile_file: Option<PathBuf>,

    /// 仿真时长（秒），缺省覆盖整条曲线
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// 调节器配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 保存轨迹文件
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 导出 CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// 以 JSON 输出统计
    #[arg(long)]
    pub json: bool,
}

impl SimulateCommand {
    pub async fn execute(&self) -> Result<()> {
        let file = RegulatorConfigFile::load_or_default(self.config.as_deref())?;
        let config = file.to_controller_config()?;
        let profile = resolve_profile(&self.profile, self.profile_file.as_deref())?;

        let seconds = self.duration.unwrap_or_else(|| profile.natural_duration());
        let duration = parse_duration(seconds)?;

        info!("Simulating '{}' for {:.2} s", profile, seconds);

        let mut simulator = Simulator::new(config)?;
        let trace = simulator.run(&profile, duration)?;
        let summary = RegenSummary::from_trace(&trace);
        let telemetry = simulator.telemetry();

        if let Some(path) = &self.output {
            trace.save(path).with_context(|| format!("保存轨迹失败: {}", path.display()))?;
            info!("Trace saved to {}", path.display());
        }
        if let Some(path) = &self.csv {
            trace.save_csv(path)?;
            info!("CSV exported to {}", path.display());
        }

        if self.json {
            let report = serde_json::json!({
                "profile": profile,
                "summary": summary,
                "telemetry": telemetry,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("📈 仿真: {} ({:.2} s, {} ticks)", profile, seconds, trace.len());
        println!("{}", summary);
        println!();
        println!("遥测:");
        println!("  Tick count:          {}", telemetry.tick_count);
        println!("  Max current applied: {:.2} A", telemetry.max_current_applied);
        println!(
            "  Energy recovered:    {:.4} Wh",
            telemetry.cumulative_energy_recovered
        );

        Ok(())
    }
}

/// 校验并转换时长（秒）
pub(crate) fn parse_duration(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        anyhow::bail!("时长必须为正数: {}", seconds);
    }
    Duration::try_from_secs_f64(seconds).with_context(|| format!("时长超出范围: {} s", seconds))
}

/// 解析曲线：文件优先，其次预设名称
pub(crate) fn resolve_profile(name: &str, file: Option<&Path>) -> Result<VoltageProfile> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取曲线文件失败: {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("解析曲线文件失败: {}", path.display()));
    }

    VoltageProfile::preset(name).ok_or_else(|| {
        anyhow::anyhow!("未知曲线 '{}'（可选: smooth, step, ramp, rapid）", name)
    })
}
