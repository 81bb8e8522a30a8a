//! 自检命令
//!
//! 运行单元 / 集成场景套件，任一失败时返回错误

use anyhow::Result;
use clap::Args;
use regen_tools::{RegulatorConfigFile, ScenarioGroup, run_suite};
use std::path::PathBuf;

/// 自检命令参数
#[derive(Args, Debug)]
pub struct SuiteCommand {
    /// 调节器配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 以 JSON 输出结果
    #[arg(long)]
    pub json: bool,
}

impl SuiteCommand {
    pub async fn execute(&self) -> Result<()> {
        let file = RegulatorConfigFile::load_or_default(self.config.as_deref())?;
        let config = file.to_controller_config()?;

        let summary = run_suite(&config)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            for group in [ScenarioGroup::Unit, ScenarioGroup::Integration] {
                println!("── {} ──", group);
                for report in summary.reports.iter().filter(|r| r.group == group) {
                    match &report.message {
                        None => println!("  ✅ {}", report.name),
                        Some(message) => println!("  ❌ {}: {}", report.name, message),
                    }
                }
            }
            println!();
            println!(
                "通过 {}/{} ({:.1}%)",
                summary.passed,
                summary.total(),
                summary.success_rate()
            );
        }

        if !summary.all_passed() {
            anyhow::bail!("{} 个场景失败", summary.failed);
        }
        Ok(())
    }
}
