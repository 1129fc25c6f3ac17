//! Converts packet and bit counts observed over a fixed interval into rates.
//! 将固定间隔内观察到的包数和比特数转换为速率。

use std::time::Duration;

/// One throughput measurement.
///
/// 一次吞吐量测量。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    /// Seconds since the fetch started.
    /// 自获取开始以来的秒数。
    pub now: f64,
    pub packets_per_second: f64,
    pub kilobits_per_second: f64,
}

/// A stateless rate estimator bound to one sampling interval.
///
/// 绑定到一个采样间隔的无状态速率估算器。
#[derive(Debug, Clone)]
pub struct RateEstimator {
    interval: f64,
}

impl RateEstimator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.as_secs_f64(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval)
    }

    /// Turns the counts gathered during one interval into a sample.
    ///
    /// 将一个间隔内收集的计数转换为样本。
    pub fn add_measurement(&self, now: f64, packets: u64, bits: u64) -> RateSample {
        RateSample {
            now,
            packets_per_second: packets as f64 / self.interval,
            kilobits_per_second: (bits as f64 / self.interval) / 1000.0,
        }
    }
}
