//! 配置管理命令
//!
//! 打印、生成和校验调节器 TOML 配置文件

use anyhow::{Context, Result};
use clap::Subcommand;
use regen_tools::RegulatorConfigFile;
use std::path::PathBuf;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印配置（缺省为默认配置）
    Show {
        /// 配置文件路径
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// 将默认配置写入文件
    Init {
        /// 输出路径
        path: PathBuf,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 校验配置文件
    Check {
        /// 配置文件路径
        path: PathBuf,
    },
}

impl ConfigCommand {
    pub async fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show { file } => Self::show_(file).await,

            ConfigCommand::Init { path, force } => Self::init_(path, force).await,

            ConfigCommand::Check { path } => Self::check_(path).await,
        }
    }

    async fn show_(file: Option<PathBuf>) -> Result<()> {
        let config = RegulatorConfigFile::load_or_default(file.as_deref())?;
        print!("{}", config.to_toml_string()?);
        Ok(())
    }

    async fn init_(path: PathBuf, force: bool) -> Result<()> {
        if path.exists() && !force {
            anyhow::bail!("文件已存在: {}（使用 --force 覆盖）", path.display());
        }

        RegulatorConfigFile::default()
            .save_to_file(&path)
            .with_context(|| format!("写入 {} 失败", path.display()))?;

        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }

    async fn check_(path: PathBuf) -> Result<()> {
        println!("🔍 检查配置: {}", path.display());

        let file = RegulatorConfigFile::load_from_file(&path)?;
        let config = file.to_controller_config()?;

        println!("✅ 配置有效");
        println!(
            "  区间: minimum {:.2} V < threshold {:.2} V < target {:.2} V",
            config.minimum_voltage, config.threshold_voltage, config.target_voltage
        );
        println!(
            "  PID: kp={} ki={} kd={}  积分限幅 ±{}",
            config.gains.kp, config.gains.ki, config.gains.kd, config.integral_limit
        );
        println!(
            "  最大电流 {:.1} A, 死区 {:.2} A, 控制频率 {:.0} Hz",
            config.max_output_current,
            config.deadband_current,
            config.tick_rate_hz()
        );

        Ok(())
    }
}
