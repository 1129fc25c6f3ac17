//! Additive-increase / multiplicative-decrease window policy.
//!
//! 加性增长/乘性减小窗口策略。

use crate::config::CongestionControlConfig;
use crate::congestion::CongestionControl;
use tokio::time::Instant;
use tracing::{debug, trace};

/// An AIMD congestion controller with slow start.
///
/// 带慢启动的 AIMD 拥塞控制器。
#[derive(Debug)]
pub struct Aimd {
    pub(super) cwnd: f64,
    pub(super) ssthresh: f64,
    config: CongestionControlConfig,
}

impl Aimd {
    pub fn new(config: CongestionControlConfig) -> Self {
        Self {
            cwnd: config.initial_cwnd,
            ssthresh: config.initial_ssthresh,
            config,
        }
    }
}

impl CongestionControl for Aimd {
    fn on_success(&mut self, _now: Instant) -> f64 {
        if self.cwnd < self.ssthresh {
            self.cwnd += self.config.aimd_ai_step;
        } else {
            self.cwnd += self.config.aimd_ai_step / self.cwnd.floor();
        }
        trace!(cwnd = self.cwnd, "AIMD window increased");
        self.cwnd
    }

    fn on_loss(&mut self, _now: Instant) -> f64 {
        let floor = self.config.min_cwnd;
        self.ssthresh = (self.cwnd * self.config.aimd_md_coef).max(floor);
        self.cwnd = if self.config.reset_cwnd_to_init {
            self.config.initial_cwnd.max(floor)
        } else {
            self.ssthresh
        };
        debug!(cwnd = self.cwnd, ssthresh = self.ssthresh, "AIMD window decreased");
        self.cwnd
    }

    fn congestion_window(&self) -> f64 {
        self.cwnd
    }

    fn slow_start_threshold(&self) -> f64 {
        self.ssthresh
    }

    fn name(&self) -> &'static str {
        "AIMD"
    }
}
