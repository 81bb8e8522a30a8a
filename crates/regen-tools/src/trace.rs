//! # 回馈轨迹
//!
//! 仿真或台架运行的逐 tick 记录。
//!
//! 文件格式：
//!
//! ```text
//! [MAGIC: 8 bytes]
//! [Version: 1 byte]
//! [Data: bincode serialized RegenTrace]
//! ```

use anyhow::{Context, Result};
use regen_control::Zone;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 轨迹文件魔数
pub const MAGIC: &[u8; 8] = b"REGENV1\0";

/// 当前格式版本
pub const TRACE_VERSION: u8 = 1;

/// 单个采样点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    /// 时间（秒）
    pub t: f64,
    /// 母线电压（V）
    pub voltage: f64,
    /// 实际下发的回馈电流幅值（A）
    pub current: f64,
    pub zone: Zone,
    /// 是否处于调节区
    pub active: bool,
}

/// 轨迹元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMetadata {
    /// 激励来源描述
    pub source: String,
    /// 控制周期（微秒）
    pub tick_period_us: u64,
    pub target_voltage: f64,
    pub threshold_voltage: f64,
    pub minimum_voltage: f64,
}

/// 回馈轨迹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenTrace {
    pub version: u8,
    pub metadata: TraceMetadata,
    pub points: Vec<TracePoint>,
}

impl RegenTrace {
    pub fn new(metadata: TraceMetadata) -> Self {
        Self {
            version: TRACE_VERSION,
            metadata,
            points: Vec::new(),
        }
    }

    pub fn push(&mut self, point: TracePoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 控制周期（秒）
    pub fn dt(&self) -> f64 {
        self.metadata.tick_period_us as f64 / 1_000_000.0
    }

    /// 按时间范围过滤（闭区间）
    pub fn filter_by_time(&self, start: f64, end: f64) -> RegenTrace {
        RegenTrace {
            version: self.version,
            metadata: self.metadata.clone(),
            points: self
                .points
                .iter()
                .filter(|p| p.t >= start && p.t <= end)
                .copied()
                .collect(),
        }
    }

    /// 保存到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref()).context("创建轨迹文件失败")?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC).context("写入魔数失败")?;
        writer.write_all(&[self.version]).context("写入版本失败")?;

        let data = bincode::serialize(self).context("序列化轨迹失败")?;
        writer.write_all(&data).context("写入轨迹数据失败")?;
        writer.flush().context("刷新缓冲区失败")?;

        Ok(())
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).context("打开轨迹文件失败")?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic).context("读取魔数失败")?;
        if &magic != MAGIC {
            anyhow::bail!("无效的轨迹文件格式（魔数不匹配）");
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version).context("读取版本失败")?;
        if version[0] != TRACE_VERSION {
            anyhow::bail!("不支持的轨迹文件版本: {}", version[0]);
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data).context("读取轨迹数据失败")?;

        let trace: RegenTrace = bincode::deserialize(&data).context("反序列化轨迹失败")?;
        Ok(trace)
    }

    /// 导出 CSV（`t,voltage,current,zone,active`）
    pub fn to_csv(&self) -> String {
        let mut csv = String::with_capacity(32 * (self.points.len() + 1));
        csv.push_str("t,voltage,current,zone,active\n");
        for p in &self.points {
            let _ = writeln!(
                csv,
                "{:.4},{:.4},{:.4},{},{}",
                p.t, p.voltage, p.current, p.zone, p.active
            );
        }
        csv
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_csv()).context("写入 CSV 失败")
    }
}
