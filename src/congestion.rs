//! Defines the pluggable window-update policy interface.
//! 定义了可插拔的窗口更新策略接口。
//!
//! The pipeline owns exactly one policy. It asks the policy to grow the window
//! once per accepted response and to shrink it at most once per round trip.
//!
//! 流水线只拥有一个策略。每接受一个响应，流水线请求策略增大窗口；
//! 每个往返最多请求一次减小窗口。

use crate::config::{CongestionAlgorithm, CongestionControlConfig};
use tokio::time::Instant;

pub mod aimd;
pub mod bic;
pub mod cubic;


/// A trait for window-update policies.
///
/// 窗口更新策略的 trait。
pub trait CongestionControl: Send + 'static {
    /// Called once per accepted response. Returns the new window.
    ///
    /// 每接受一个响应调用一次。返回新的窗口。
    fn on_success(&mut self, now: Instant) -> f64;

    /// Called when a loss reaction is due. Returns the new window.
    ///
    /// 需要对丢包做出反应时调用。返回新的窗口。
    fn on_loss(&mut self, now: Instant) -> f64;

    /// Gets the current congestion window size in segments.
    ///
    /// 获取当前的拥塞窗口大小（以分段为单位）。
    fn congestion_window(&self) -> f64;

    /// Gets the current slow start threshold in segments.
    ///
    /// 获取当前的慢启动阈值（以分段为单位）。
    fn slow_start_threshold(&self) -> f64;

    /// Name of the algorithm, for diagnostics.
    /// 算法名称，用于诊断。
    fn name(&self) -> &'static str;
}

/// Builds the policy selected by `config.algorithm`.
///
/// 构建 `config.algorithm` 所选择的策略。
pub fn new_controller(config: &CongestionControlConfig) -> Box<dyn CongestionControl> {
    match config.algorithm {
        CongestionAlgorithm::Aimd => Box::new(aimd::Aimd::new(config.clone())),
        CongestionAlgorithm::Cubic => Box::new(cubic::Cubic::new(config.clone())),
        CongestionAlgorithm::Bic => Box::new(bic::Bic::new(config.clone())),
    }
}
