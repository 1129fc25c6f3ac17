//! 获取完成后的统计摘要
//! Statistics summary produced when a fetch completes

use std::fmt;
use std::time::Duration;

const UNITS: [&str; 5] = ["bit/s", "kbit/s", "Mbit/s", "Gbit/s", "Tbit/s"];

/// 以自动缩放单位显示的有效吞吐量
/// Goodput rendered with an auto-scaled unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goodput {
    pub bits_per_second: f64,
}

impl Goodput {
    /// 缩放后的数值和单位
    /// Scaled value and its unit
    pub fn scaled(&self) -> (f64, &'static str) {
        let mut value = self.bits_per_second;
        let mut unit = 0;
        while value >= 1000.0 && unit < UNITS.len() - 1 {
            value /= 1000.0;
            unit += 1;
        }
        (value, UNITS[unit])
    }
}

impl fmt::Display for Goodput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (value, unit) = self.scaled();
        write!(f, "{value:.6} {unit}")
    }
}

/// 一次成功获取的摘要
/// Summary of one successful fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSummary {
    /// 从开始到收到最终分段的时间
    /// Time from start until the final segment arrived
    pub elapsed: Duration,
    /// 接受的分段数，包括首个分段
    /// Segments accepted, the first segment included
    pub segments_received: u64,
    /// 接受的内容字节数
    /// Content bytes accepted
    pub received_bytes: u64,
    pub loss_events: u64,
    pub retransmissions: u64,
}

impl FetchSummary {
    /// 每个接受分段对应的丢包事件比例
    /// Loss events per accepted segment
    pub fn loss_rate(&self) -> f64 {
        if self.segments_received == 0 {
            return 0.0;
        }
        self.loss_events as f64 / self.segments_received as f64
    }

    pub fn goodput(&self) -> Goodput {
        let secs = self.elapsed.as_secs_f64();
        let bits_per_second = if secs > 0.0 {
            self.received_bytes as f64 * 8.0 / secs
        } else {
            0.0
        };
        Goodput { bits_per_second }
    }
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "All segments have been received.")?;
        writeln!(
            f,
            "Time elapsed: {:.3} milliseconds",
            self.elapsed.as_secs_f64() * 1000.0
        )?;
        writeln!(f, "Total # of segments received: {}", self.segments_received)?;
        writeln!(f, "Total size: {:.3}kB", self.received_bytes as f64 / 1000.0)?;
        writeln!(f, "Goodput: {}", self.goodput())?;
        writeln!(f, "Total # of lost/retransmitted segments: {}", self.retransmissions)?;
        write!(
            f,
            "Total # of window decreases: {} (loss rate {:.4}%)",
            self.loss_events,
            self.loss_rate() * 100.0
        )
    }
}
