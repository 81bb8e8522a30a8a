//! 实时运行命令
//!
//! 在 Mock 功率级上启动控制线程，按曲线实时注入母线电压并监控状态

use anyhow::{Context, Result};
use clap::Args;
use regen_driver::RegulatorRunner;
use regen_hal::mock::MockPowerStage;
use regen_tools::RegulatorConfigFile;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::simulate::{parse_duration, resolve_profile};

/// 电压注入周期
const FEED_INTERVAL: Duration = Duration::from_millis(5);

/// 实时运行只需要计数器，命令历史保留少量即可
const LIVE_COMMAND_LOG_CAPACITY: usize = 64;

/// 实时运行参数
#[derive(Args, Debug)]
pub struct LiveCommand {
    /// 预设曲线：smooth / step / ramp / rapid
    #[arg(short, long, default_value = "step")]
    pub profile: String,

    /// 从 JSON 文件读取曲线（覆盖 --profile）
    #[arg(long)]
    pub profile_file: Option<PathBuf>,

    /// 运行时长（秒），缺省覆盖整条曲线
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// 调节器配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 状态打印频率（Hz）
    #[arg(short, long, default_value_t = 2)]
    pub frequency: u32,
}

impl LiveCommand {
    pub async fn execute(&self) -> Result<()> {
        let file = RegulatorConfigFile::load_or_default(self.config.as_deref())?;
        let config = file.to_controller_config()?;
        let loop_config = file.to_loop_config();
        let profile = resolve_profile(&self.profile, self.profile_file.as_deref())?;

        let seconds = self.duration.unwrap_or_else(|| profile.natural_duration());
        let deadline = parse_duration(seconds)?;
        if self.frequency == 0 {
            anyhow::bail!("打印频率必须大于 0");
        }

        let stage = MockPowerStage::with_voltage(profile.voltage_at(0.0))
            .with_command_log_capacity(LIVE_COMMAND_LOG_CAPACITY);
        let runner = RegulatorRunner::new(config, loop_config, stage.clone())?;

        runner.start().context("启动控制线程失败")?;
        println!(
            "▶️  实时运行: {} ({:.2} s, {:.0} Hz)",
            profile,
            seconds,
            runner.config().tick_rate_hz()
        );
        println!("按 Ctrl+C 停止");

        let mut feed = tokio::time::interval(FEED_INTERVAL);
        let mut monitor = tokio::time::interval(Duration::from_secs_f64(
            1.0 / self.frequency as f64,
        ));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let start = Instant::now();
        loop {
            tokio::select! {
                _ = feed.tick() => {
                    let elapsed = start.elapsed();
                    if elapsed >= deadline {
                        break;
                    }
                    stage.set_input_voltage(profile.voltage_at(elapsed.as_secs_f64()));
                },
                _ = monitor.tick() => {
                    print_status(&runner, start.elapsed());
                },
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        warn!("Failed to listen for Ctrl+C: {}", e);
                    }
                    println!("\n🛑 收到 Ctrl+C");
                    break;
                },
            }
        }

        runner.stop();
        info!("Live run stopped after {:.2} s", start.elapsed().as_secs_f64());

        let telemetry = runner.telemetry();
        let metrics = runner.metrics();
        println!();
        println!("遥测:");
        println!("  Tick count:          {}", telemetry.tick_count);
        println!("  Max current applied: {:.2} A", telemetry.max_current_applied);
        println!(
            "  Energy recovered:    {:.4} Wh",
            telemetry.cumulative_energy_recovered
        );
        println!("循环:");
        println!("  Overruns:            {} ({:.2}%)", metrics.overruns, metrics.overrun_rate());
        println!("  Max tick:            {} µs", metrics.max_tick_us);
        println!(
            "  Faults:              sensor {}, actuator {}",
            metrics.sensor_errors, metrics.actuator_errors
        );
        println!(
            "  Motor released:      {}",
            if stage.was_motor_released() { "yes" } else { "no" }
        );

        Ok(())
    }
}

fn print_status(runner: &RegulatorRunner<MockPowerStage>, elapsed: Duration) {
    let voltage = runner
        .current_voltage()
        .map_or_else(|| "--".to_string(), |v| format!("{:.3} V", v));
    let zone = runner
        .zone()
        .map_or_else(|| "--".to_string(), |z| z.to_string());
    let marker = if runner.is_regulating_active() { "⚡" } else { "  " };

    println!(
        "{} [{:>6.2}s] {:>10}  {:<12} current {:>6.2} A",
        marker,
        elapsed.as_secs_f64(),
        voltage,
        zone,
        runner.last_applied_current()
    );
}
