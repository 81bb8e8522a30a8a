//! # Regen CLI
//!
//! Command-line interface for the regenerative-braking voltage regulator.
//!
//! ```bash
//! # 离线仿真（平滑下降工况），打印回馈统计
//! regen-cli simulate --profile smooth
//!
//! # 运行固件自检套件
//! regen-cli suite --config regen.toml
//!
//! # 打印默认配置 / 校验配置文件
//! regen-cli config show
//! regen-cli config check regen.toml
//!
//! # 在 Mock 功率级上实时运行控制线程
//! regen-cli live --profile step --duration 5
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigCommand, LiveCommand, SimulateCommand, SuiteCommand};

/// Regen CLI - 母线电压回馈调节工具
#[derive(Parser, Debug)]
#[command(name = "regen-cli")]
#[command(about = "Command-line interface for the regenerative-braking voltage regulator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 离线仿真电压曲线
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// 运行自检套件
    Suite {
        #[command(flatten)]
        args: SuiteCommand,
    },

    /// 在 Mock 功率级上实时运行
    Live {
        #[command(flatten)]
        args: LiveCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("regen_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute().await,
        Commands::Simulate { args } => args.execute().await,
        Commands::Suite { args } => args.execute().await,
        Commands::Live { args } => args.execute().await,
    }
}
