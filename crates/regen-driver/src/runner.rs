//! RegulatorRunner - 周期控制线程
//!
//! 在独立线程中以固定周期执行 [`step()`]，并对外提供生命周期控制和无锁监控。
//!
//! # 并发模型
//!
//! - 调节器与功率级放在同一把 `parking_lot::Mutex` 中，每个 tick 持锁执行，
//!   因此 tick 之间绝不重叠
//! - `stop()` 获取同一把锁：只等待正在执行的 tick，然后置 `halted` 并调用
//!   `release()`，此后不会再有任何执行器命令
//! - 周期等待使用 `crossbeam-channel` 的 `recv_deadline`，`stop()` 可立即唤醒；
//!   `spin` 模式下使用 `spin_sleep` 获得更低抖动
//! - 状态查询读取每个 tick 后发布的原子量，不加锁
//!
//! # 示例
//!
//! ```rust
//! use regen_control::ControllerConfig;
//! use regen_driver::{LoopConfig, RegulatorRunner};
//! use regen_hal::mock::MockPowerStage;
//!
//! let hardware = MockPowerStage::with_voltage(46.5);
//! let runner = RegulatorRunner::new(
//!     ControllerConfig::default(),
//!     LoopConfig::default(),
//!     hardware.clone(),
//! )
//! .unwrap();
//!
//! runner.start().unwrap();
//! std::thread::sleep(std::time::Duration::from_millis(20));
//! runner.stop();
//!
//! assert!(hardware.was_motor_released());
//! ```

use crate::error::DriverError;
use crate::metrics::{LoopMetrics, LoopMetricsSnapshot};
use crate::status::LiveStatus;
use crate::step::{StepOutcome, step};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use regen_control::{ControllerConfig, Telemetry, TickPeriod, VoltageRegulator, Zone};
use regen_hal::PowerStage;
use spin_sleep::SpinSleeper;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 等待控制线程退出的最长时间
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 控制循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 超时判定倍数
    ///
    /// 两次 tick 的实际间隔超过 `tick_period * dt_clamp_multiplier` 时记为一次
    /// overrun。调节器始终使用配置的标称 `dt`。
    pub dt_clamp_multiplier: f64,

    /// 最大迭代次数（None 表示一直运行到 `stop()`）
    pub max_iterations: Option<usize>,

    /// 使用 `spin_sleep` 精确等待（占用更多 CPU）
    pub spin: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            dt_clamp_multiplier: 2.0,
            max_iterations: None,
            spin: false,
        }
    }
}

impl LoopConfig {
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    pub fn with_spin(mut self, spin: bool) -> Self {
        self.spin = spin;
        self
    }

    /// 判定 overrun 的间隔上限：`period * dt_clamp_multiplier`
    fn overrun_limit(&self, period: TickPeriod) -> Result<Duration, DriverError> {
        Duration::try_from_secs_f64(period.as_duration().as_secs_f64() * self.dt_clamp_multiplier)
            .ok()
            .ok_or_else(|| {
                DriverError::LoopConfig(format!(
                    "dt_clamp_multiplier {} overflows the tick period {:?}",
                    self.dt_clamp_multiplier,
                    period.as_duration()
                ))
            })
    }

    fn validate(&self) -> Result<(), DriverError> {
        if !(self.dt_clamp_multiplier.is_finite() && self.dt_clamp_multiplier >= 1.0) {
            return Err(DriverError::LoopConfig(format!(
                "Invalid dt_clamp_multiplier: {} (must be >= 1)",
                self.dt_clamp_multiplier
            )));
        }
        if self.max_iterations == Some(0) {
            return Err(DriverError::LoopConfig(
                "max_iterations must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// 受 tick 锁保护的部分
struct Core<H> {
    regulator: VoltageRegulator,
    hardware: H,
    /// 置位后控制线程不再下发任何命令
    halted: bool,
}

struct Shared<H> {
    core: Mutex<Core<H>>,
    status: LiveStatus,
    metrics: LoopMetrics,
    running: AtomicBool,
}

impl<H: PowerStage> Shared<H> {
    /// 停止命令下发并释放电机（调用方不得持有 tick 锁）
    fn halt(&self) {
        let mut core = self.core.lock();
        core.halted = true;
        if let Err(e) = core.hardware.release() {
            self.metrics.actuator_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Failed to release motor on stop: {}", e);
        }
        self.status.mark_released();
    }
}

/// 控制线程退出时（包括 panic）清除 `running`
///
/// panic 时先尝试释放电机。
struct ExitGuard<'a, H: PowerStage> {
    shared: &'a Shared<H>,
}

impl<H: PowerStage> Drop for ExitGuard<'_, H> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("Regulator thread panicked, releasing motor");
            let shared = self.shared;
            if catch_unwind(AssertUnwindSafe(|| shared.halt())).is_err() {
                error!("Motor release panicked during regulator shutdown");
            }
        }
        self.shared.running.store(false, Ordering::Release);
    }
}

struct Worker {
    handle: JoinHandle<()>,
    shutdown_tx: Sender<()>,
}

/// 周期调节运行器
///
/// `start()` / `stop()` 以及所有查询都是 `&self`，可以放在 `Arc` 中跨线程共享。
/// Drop 时自动停止。
pub struct RegulatorRunner<H: PowerStage + Send + 'static> {
    shared: Arc<Shared<H>>,
    config: ControllerConfig,
    tick_period: TickPeriod,
    loop_config: LoopConfig,
    overrun_limit: Duration,
    worker: Mutex<Option<Worker>>,
}

impl<H: PowerStage + Send + 'static> RegulatorRunner<H> {
    /// 创建运行器（处于停止状态）
    pub fn new(
        config: ControllerConfig,
        loop_config: LoopConfig,
        hardware: H,
    ) -> Result<Self, DriverError> {
        loop_config.validate()?;
        let regulator = VoltageRegulator::new(config.clone())?;
        let tick_period = regulator.tick_period();
        let overrun_limit = loop_config.overrun_limit(tick_period)?;

        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    regulator,
                    hardware,
                    halted: true,
                }),
                status: LiveStatus::default(),
                metrics: LoopMetrics::new(),
                running: AtomicBool::new(false),
            }),
            config,
            tick_period,
            loop_config,
            overrun_limit,
            worker: Mutex::new(None),
        })
    }

    /// 启动控制线程
    ///
    /// PID 状态清零，遥测保留。已在运行时返回 [`DriverError::AlreadyRunning`]。
    pub fn start(&self) -> Result<(), DriverError> {
        let mut worker = self.worker.lock();

        if self.shared.running.load(Ordering::Acquire) {
            return Err(DriverError::AlreadyRunning);
        }

        // 上一轮因 max_iterations 自行结束的线程
        if let Some(finished) = worker.take() {
            join_worker(finished);
        }

        {
            let mut core = self.shared.core.lock();
            core.regulator.reset();
            core.halted = false;
            self.shared.status.publish(&core.regulator);
        }
        self.shared.running.store(true, Ordering::Release);

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let shared = Arc::clone(&self.shared);
        let period = self.tick_period;
        let loop_config = self.loop_config.clone();
        let overrun_limit = self.overrun_limit;

        let spawned = std::thread::Builder::new()
            .name("regen_loop".into())
            .spawn(move || run_loop(shared, shutdown_rx, period, overrun_limit, loop_config));

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker {
                    handle,
                    shutdown_tx,
                });
                info!(
                    "Regulator started: target {:.2} V, threshold {:.2} V, minimum {:.2} V, {:.0} Hz",
                    self.config.target_voltage,
                    self.config.threshold_voltage,
                    self.config.minimum_voltage,
                    self.config.tick_rate_hz()
                );
                Ok(())
            },
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                self.shared.core.lock().halted = true;
                Err(DriverError::ThreadSpawn(e))
            },
        }
    }

    /// 停止控制线程
    ///
    /// 返回后不会再有任何执行器命令，最后一个命令是 `release()`。
    /// 只等待正在执行的 tick；未运行时为空操作。
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(active) = worker.take() else {
            return;
        };

        let was_running = self.shared.running.swap(false, Ordering::AcqRel);
        let _ = active.shutdown_tx.try_send(());

        // 自行结束（max_iterations）的线程已经释放过电机
        if was_running {
            self.shared.halt();
        }
        join_worker(active);
        info!("Regulator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// 最近一次采样的母线电压（尚无有效采样时为 `None`）
    pub fn current_voltage(&self) -> Option<f64> {
        self.shared.status.voltage()
    }

    /// 最近一个 tick 所在区间
    pub fn zone(&self) -> Option<Zone> {
        self.shared.status.zone()
    }

    pub fn is_regulating_active(&self) -> bool {
        self.zone().is_some_and(Zone::is_regulating)
    }

    /// 最近一个 tick 实际下发的回馈电流幅值（A，释放时为 0）
    pub fn last_applied_current(&self) -> f64 {
        self.shared.status.applied_current()
    }

    /// 最近一个 tick 钳位后的 PID 输出（A）
    pub fn output_current(&self) -> f64 {
        self.shared.status.output_current()
    }

    /// 遥测快照（无锁）
    ///
    /// 运行中各字段可能来自相邻的两个 tick，不保证字段之间一致；需要一致
    /// 快照时在 `stop()` 之后读取。
    pub fn telemetry(&self) -> Telemetry {
        self.shared.status.telemetry()
    }

    /// 清零遥测
    ///
    /// 需要获取 tick 锁，最多等待一个 tick。
    pub fn reset_telemetry(&self) {
        let mut core = self.shared.core.lock();
        core.regulator.reset_telemetry();
        self.shared.status.publish(&core.regulator);
    }

    pub fn metrics(&self) -> LoopMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn target_voltage(&self) -> f64 {
        self.config.target_voltage
    }

    pub fn threshold_voltage(&self) -> f64 {
        self.config.threshold_voltage
    }

    pub fn minimum_voltage(&self) -> f64 {
        self.config.minimum_voltage
    }

    pub fn max_output_current(&self) -> f64 {
        self.config.max_output_current
    }

    pub fn tick_period(&self) -> TickPeriod {
        self.tick_period
    }
}

impl<H: PowerStage + Send + 'static> Drop for RegulatorRunner<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 关闭通道并等待控制线程退出，最多 `JOIN_TIMEOUT`
///
/// `JoinHandle::join` 没有超时，由辅助线程代为 join 并回报结果。
fn join_worker(worker: Worker) {
    let Worker {
        handle,
        shutdown_tx,
    } = worker;
    drop(shutdown_tx);

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    spawn(move || {
        let _ = done_tx.send(handle.join().is_ok());
    });

    match done_rx.recv_timeout(JOIN_TIMEOUT) {
        Ok(true) => {},
        Ok(false) => error!("Regulator thread exited with a panic"),
        Err(RecvTimeoutError::Timeout) => {
            error!("Regulator thread did not exit within {:?}", JOIN_TIMEOUT)
        },
        Err(RecvTimeoutError::Disconnected) => error!("Regulator join helper failed"),
    }
}

/// 控制线程主循环
fn run_loop<H: PowerStage>(
    shared: Arc<Shared<H>>,
    shutdown_rx: Receiver<()>,
    period: TickPeriod,
    max_interval: Duration,
    loop_config: LoopConfig,
) {
    let _exit = ExitGuard {
        shared: shared.as_ref(),
    };

    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Regulator thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set regulator thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let nominal = period.as_duration();
    let sleeper = SpinSleeper::default();

    let mut next_deadline = Instant::now();
    let mut last_tick: Option<Instant> = None;
    let mut iterations = 0usize;
    let mut sensor_faulted = false;
    let mut actuator_faulted = false;

    debug!("Regulator loop running with period {:?}", nominal);

    loop {
        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        let tick_start = Instant::now();
        let outcome = {
            let mut guard = shared.core.lock();
            if guard.halted {
                break;
            }
            let core = &mut *guard;
            let outcome = step(&mut core.regulator, &mut core.hardware, period);
            shared.status.publish(&core.regulator);
            outcome
        };

        record_outcome(&shared.metrics, &outcome, &mut sensor_faulted, &mut actuator_faulted);
        shared.metrics.ticks.fetch_add(1, Ordering::Relaxed);
        shared
            .metrics
            .record_tick_duration(tick_start.elapsed().as_micros() as u64);

        if let Some(previous) = last_tick {
            let interval = tick_start - previous;
            if interval > max_interval {
                shared.metrics.overruns.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Regulator tick overrun: {:?} since previous tick (nominal {:?})",
                    interval, nominal
                );
            }
        }
        last_tick = Some(tick_start);

        iterations += 1;
        if let Some(max) = loop_config.max_iterations
            && iterations >= max
        {
            debug!("Regulator loop reached {} iterations", max);
            shared.halt();
            break;
        }

        next_deadline += nominal;
        let now = Instant::now();
        if next_deadline < now {
            // 落后超过一个周期时重新对齐，不补跑
            next_deadline = now;
        }

        if loop_config.spin {
            sleeper.sleep(next_deadline.saturating_duration_since(now));
            match shutdown_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {},
            }
        } else {
            match shutdown_rx.recv_deadline(next_deadline) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {},
            }
        }
    }

    debug!("Regulator loop exited after {} iterations", iterations);
}

/// 累计协作者故障，只在故障开始和恢复时打日志
fn record_outcome(
    metrics: &LoopMetrics,
    outcome: &StepOutcome,
    sensor_faulted: &mut bool,
    actuator_faulted: &mut bool,
) {
    match &outcome.sensor_error {
        Some(e) => {
            metrics.sensor_errors.fetch_add(1, Ordering::Relaxed);
            if !*sensor_faulted {
                warn!("Bus voltage read failed: {}, motor released", e);
                *sensor_faulted = true;
            }
        },
        None if *sensor_faulted => {
            info!("Bus voltage readings recovered");
            *sensor_faulted = false;
        },
        None => {},
    }

    match &outcome.actuator_error {
        Some(e) => {
            metrics.actuator_errors.fetch_add(1, Ordering::Relaxed);
            if !*actuator_faulted {
                warn!("Actuator command failed: {}", e);
                *actuator_faulted = true;
            }
        },
        None if *actuator_faulted => {
            info!("Actuator commands recovered");
            *actuator_faulted = false;
        },
        None => {},
    }
}
