//! 定义了流水线、拥塞控制和RTT估算的可配置参数。
//! Defines configurable parameters for the pipeline, congestion control and RTT estimation.

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// A structure containing all configurable parameters for a fetch.
///
/// 包含一次获取所有可配置参数的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Request scheduling, retry and timer parameters.
    /// 请求调度、重试和定时器参数。
    pub pipeline: PipelineConfig,

    /// Congestion control-related parameters.
    /// 拥塞控制相关参数。
    pub congestion_control: CongestionControlConfig,

    /// RTT/RTO estimator parameters.
    /// RTT/RTO 估算器参数。
    pub rtt: RttConfig,
}

/// Request scheduling, retry and timer parameters.
///
/// 请求调度、重试和定时器参数。
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How often the segment table is scanned for expired retransmission timers.
    /// 扫描分段表中已过期重传定时器的间隔。
    pub rto_check_interval: Duration,
    /// The interval over which packet and bit counts are turned into rates.
    /// 将包数和比特数转换为速率的统计间隔。
    pub rate_interval: Duration,
    /// Retransmissions allowed per segment before the segment fails.
    /// 每个分段在判定失败前允许的重传次数。
    pub max_retries_on_timeout_or_nack: u32,
    /// React to every loss instead of at most one loss per round trip.
    /// 对每次丢包都做出反应，而不是每个往返最多一次。
    pub disable_cwa: bool,
    /// Lifetime carried by every outgoing request.
    /// 每个发出请求携带的生存期。
    pub interest_lifetime: Duration,
    /// Whether requests may only be satisfied by fresh data.
    /// 请求是否只能由新鲜数据满足。
    pub must_be_fresh: bool,
    /// Raise per-segment diagnostics to `info` level.
    /// 将逐分段诊断信息提升到 `info` 级别。
    pub verbose: bool,
}

/// Which window-update policy drives the congestion window.
///
/// 驱动拥塞窗口的窗口更新策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionAlgorithm {
    Aimd,
    Cubic,
    Bic,
}

impl fmt::Display for CongestionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CongestionAlgorithm::Aimd => f.write_str("AIMD"),
            CongestionAlgorithm::Cubic => f.write_str("CUBIC"),
            CongestionAlgorithm::Bic => f.write_str("BIC"),
        }
    }
}

/// Congestion control-related parameters.
///
/// 拥塞控制相关参数。
#[derive(Debug, Clone)]
pub struct CongestionControlConfig {
    /// The window-update policy.
    /// 窗口更新策略。
    pub algorithm: CongestionAlgorithm,
    /// The initial congestion window size in segments.
    /// 初始拥塞窗口大小（以分段为单位）。
    pub initial_cwnd: f64,
    /// The initial slow start threshold in segments.
    /// 初始慢启动阈值（以分段为单位）。
    pub initial_ssthresh: f64,
    /// The window never drops below this many segments.
    /// 窗口永远不会低于这个分段数。
    pub min_cwnd: f64,
    /// On loss, restart from `initial_cwnd` instead of the new slow start threshold.
    /// 丢包时从 `initial_cwnd` 重新开始，而不是从新的慢启动阈值开始。
    pub reset_cwnd_to_init: bool,
    /// Below this window BIC behaves like classic TCP.
    /// 低于该窗口时 BIC 的行为与经典 TCP 相同。
    pub bic_low_window: f64,
    /// Cap on the per-round growth of BIC.
    /// BIC 每轮增长的上限。
    pub bic_max_increment: f64,
    /// Multiplicative decrease factor of BIC.
    /// BIC 的乘性减小因子。
    pub bic_beta: f64,
    /// Multiplicative decrease factor of AIMD.
    /// AIMD 的乘性减小因子。
    pub aimd_md_coef: f64,
    /// Additive increase step of AIMD, per round trip.
    /// AIMD 每个往返的加性增长步长。
    pub aimd_ai_step: f64,
    /// CUBIC scaling constant C.
    /// CUBIC 缩放常数 C。
    pub cubic_c: f64,
    /// Multiplicative decrease factor of CUBIC.
    /// CUBIC 的乘性减小因子。
    pub cubic_beta: f64,
}

/// RTT/RTO estimator parameters.
///
/// RTT/RTO 估算器参数。
#[derive(Debug, Clone)]
pub struct RttConfig {
    /// Smoothing gain of the RTT average.
    /// RTT 平均值的平滑增益。
    pub alpha: f64,
    /// Smoothing gain of the RTT variation.
    /// RTT 变化量的平滑增益。
    pub beta: f64,
    /// Weight of the variation in the RTO.
    /// 变化量在 RTO 中的权重。
    pub k: f64,
    /// RTO used before the first sample.
    /// 第一个样本之前使用的 RTO。
    pub initial_rto: Duration,
    /// The RTO will not be allowed to fall below this.
    /// RTO 不允许低于此值。
    pub min_rto: Duration,
    /// The RTO will not be allowed to grow above this.
    /// RTO 不允许高于此值。
    pub max_rto: Duration,
    /// Multiplier applied by a back-off after loss.
    /// 丢包后退避时使用的乘数。
    pub rto_backoff_multiplier: f64,
}

impl Config {
    /// Checks that every parameter is within its valid range.
    ///
    /// 检查每个参数是否在有效范围内。
    pub fn validate(&self) -> Result<()> {
        let cc = &self.congestion_control;
        if !(cc.min_cwnd > 0.0) {
            return Err(Error::InvalidConfig("min_cwnd must be positive".into()));
        }
        if cc.initial_cwnd < cc.min_cwnd {
            return Err(Error::InvalidConfig(
                "initial_cwnd must not be below min_cwnd".into(),
            ));
        }
        for (name, beta) in [
            ("bic_beta", cc.bic_beta),
            ("aimd_md_coef", cc.aimd_md_coef),
            ("cubic_beta", cc.cubic_beta),
        ] {
            if !(beta > 0.0 && beta < 1.0) {
                return Err(Error::InvalidConfig(format!("{name} must be in (0, 1)")));
            }
        }
        if !(cc.bic_max_increment > 0.0) || !(cc.aimd_ai_step > 0.0) || !(cc.cubic_c > 0.0) {
            return Err(Error::InvalidConfig(
                "growth parameters must be positive".into(),
            ));
        }
        if self.pipeline.rto_check_interval.is_zero() || self.pipeline.rate_interval.is_zero() {
            return Err(Error::InvalidConfig("timer intervals must be non-zero".into()));
        }
        let rtt = &self.rtt;
        if rtt.min_rto > rtt.max_rto {
            return Err(Error::InvalidConfig("min_rto must not exceed max_rto".into()));
        }
        if !(rtt.rto_backoff_multiplier >= 1.0) {
            return Err(Error::InvalidConfig(
                "rto_backoff_multiplier must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rto_check_interval: Duration::from_millis(10),
            rate_interval: Duration::from_millis(500),
            max_retries_on_timeout_or_nack: 15,
            disable_cwa: false,
            interest_lifetime: Duration::from_secs(4),
            must_be_fresh: false,
            verbose: false,
        }
    }
}

impl Default for CongestionControlConfig {
    fn default() -> Self {
        Self {
            algorithm: CongestionAlgorithm::Bic,
            initial_cwnd: 1.0,
            initial_ssthresh: f64::MAX,
            min_cwnd: 1.0,
            reset_cwnd_to_init: false,
            bic_low_window: 14.0,
            bic_max_increment: 16.0,
            bic_beta: 0.8,
            aimd_md_coef: 0.5,
            aimd_ai_step: 1.0,
            cubic_c: 0.4,
            cubic_beta: 0.7,
        }
    }
}

impl Default for RttConfig {
    fn default() -> Self {
        Self {
            alpha: 0.125,
            beta: 0.25,
            k: 4.0,
            initial_rto: Duration::from_secs(1),
            min_rto: Duration::from_millis(200),
            max_rto: Duration::from_secs(60),
            rto_backoff_multiplier: 2.0,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cc = &self.congestion_control;
        let p = &self.pipeline;
        writeln!(f, "Pipeline ({}) initial parameters:", cc.algorithm)?;
        writeln!(f, "\tInitial congestion window size = {}", cc.initial_cwnd)?;
        writeln!(f, "\tInitial slow start threshold = {}", cc.initial_ssthresh)?;
        match cc.algorithm {
            CongestionAlgorithm::Bic => {
                writeln!(f, "\tLow window = {}", cc.bic_low_window)?;
                writeln!(f, "\tMax increment = {}", cc.bic_max_increment)?;
                writeln!(f, "\tMultiplicative decrease factor = {}", cc.bic_beta)?;
            }
            CongestionAlgorithm::Aimd => {
                writeln!(f, "\tMultiplicative decrease factor = {}", cc.aimd_md_coef)?;
                writeln!(f, "\tAdditive increase step = {}", cc.aimd_ai_step)?;
            }
            CongestionAlgorithm::Cubic => {
                writeln!(f, "\tC = {}", cc.cubic_c)?;
                writeln!(f, "\tMultiplicative decrease factor = {}", cc.cubic_beta)?;
            }
        }
        writeln!(f, "\tRTO check interval = {:?}", p.rto_check_interval)?;
        writeln!(f, "\tMax retries on timeout or Nack = {}", p.max_retries_on_timeout_or_nack)?;
        let cwa = if p.disable_cwa { "disabled" } else { "enabled" };
        writeln!(f, "\tConservative Window Adaptation {cwa}")?;
        let reset = if cc.reset_cwnd_to_init { "initCwnd" } else { "ssthresh" };
        write!(f, "\tResetting cwnd to {reset} when loss event occurs")
    }
}
