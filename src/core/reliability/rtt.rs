//! An estimator for the round-trip time (RTT) and retransmission timeout (RTO).
//! RTT 与 RTO 估算器。

use crate::config::RttConfig;
use std::time::Duration;

/// One RTT measurement together with the estimator state it produced.
///
/// 一次 RTT 测量及其产生的估算器状态。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttSample {
    pub segment: u64,
    /// Seconds since the fetch started.
    /// 自获取开始以来的秒数。
    pub now: f64,
    pub rtt: Duration,
    pub rtt_var: Duration,
    pub srtt: Duration,
    pub rto: Duration,
}

/// The contract the pipeline needs from an RTT/RTO estimator.
///
/// 流水线对 RTT/RTO 估算器的要求。
pub trait RtoEstimator: Send + 'static {
    /// Feeds one round-trip sample.
    ///
    /// `expected_samples` is the number of samples expected within the same
    /// round trip; the smoothing gains are divided by it.
    ///
    /// 输入一个往返样本。`expected_samples` 是同一往返内预期的样本数，
    /// 平滑增益会除以该值。
    fn add_sample(
        &mut self,
        segment: u64,
        now: f64,
        rtt: Duration,
        expected_samples: usize,
    ) -> RttSample;

    /// Returns the current RTO value.
    ///
    /// 返回当前的 RTO 值。
    fn estimated_rto(&self) -> Duration;

    /// Multiplicatively backs the RTO off after a loss.
    ///
    /// 丢包后对 RTO 进行乘性退避。
    fn backoff_rto(&mut self);
}

/// An RFC 6298 style estimator with per-round-trip gain scaling.
///
/// 一个 RFC 6298 风格、按往返缩放增益的估算器。
#[derive(Debug, Clone)]
pub struct RttEstimator {
    /// The smoothed round-trip time, in seconds.
    /// 平滑的往返时间（秒）。
    srtt: f64,
    /// The round-trip time variation, in seconds.
    /// 往返时间变化量（秒）。
    rttvar: f64,
    /// The retransmission timeout.
    /// 重传超时时间。
    rto: Duration,
    samples: u64,
    config: RttConfig,
}

impl RttEstimator {
    /// Creates a new RTT estimator starting at `config.initial_rto`.
    ///
    /// 创建一个以 `config.initial_rto` 开始的 RTT 估算器。
    pub fn new(config: RttConfig) -> Self {
        Self {
            srtt: 0.0,
            rttvar: 0.0,
            rto: config.initial_rto,
            samples: 0,
            config,
        }
    }

    fn clamp_rto(&self, rto: f64) -> Duration {
        Duration::from_secs_f64(rto.max(0.0)).clamp(self.config.min_rto, self.config.max_rto)
    }
}

impl RtoEstimator for RttEstimator {
    fn add_sample(
        &mut self,
        segment: u64,
        now: f64,
        rtt: Duration,
        expected_samples: usize,
    ) -> RttSample {
        let rtt_sample = rtt.as_secs_f64();

        if self.samples == 0 {
            // First sample
            self.srtt = rtt_sample;
            self.rttvar = rtt_sample / 2.0;
        } else {
            let n = expected_samples.max(1) as f64;
            let alpha = self.config.alpha / n;
            let beta = self.config.beta / n;
            let delta = (self.srtt - rtt_sample).abs();
            self.rttvar = (1.0 - beta) * self.rttvar + beta * delta;
            self.srtt = (1.0 - alpha) * self.srtt + alpha * rtt_sample;
        }
        self.rto = self.clamp_rto(self.srtt + self.config.k * self.rttvar);

        self.samples += 1;

        RttSample {
            segment,
            now,
            rtt,
            rtt_var: Duration::from_secs_f64(self.rttvar),
            srtt: Duration::from_secs_f64(self.srtt),
            rto: self.rto,
        }
    }

    fn estimated_rto(&self) -> Duration {
        self.rto
    }

    fn backoff_rto(&mut self) {
        let backed_off = self.rto.as_secs_f64() * self.config.rto_backoff_multiplier;
        self.rto = self.clamp_rto(backed_off);
    }
}
