//! A segment-counted CUBIC window policy.
//!
//! After a loss the window follows `W(t) = C * (t - K)^3 + W_max`, where `t` is
//! the time since the loss and `K` the time needed to climb back to `W_max`.
//! A Reno-friendly estimate keeps the window from growing slower than AIMD.
//!
//! 以分段计数的 CUBIC 窗口策略。

use crate::config::CongestionControlConfig;
use crate::congestion::CongestionControl;
use tokio::time::Instant;
use tracing::{debug, trace};

/// A CUBIC congestion controller.
///
/// CUBIC 拥塞控制器。
#[derive(Debug)]
pub struct Cubic {
    pub(super) cwnd: f64,
    pub(super) ssthresh: f64,
    /// Window just before the last reduction.
    /// 上次减小之前的窗口。
    pub(super) w_max: f64,
    /// Time to grow back to `w_max`, in seconds.
    /// 增长回 `w_max` 所需的时间（秒）。
    pub(super) k: f64,
    /// Window an AIMD flow would have reached.
    /// AIMD 流会达到的窗口。
    pub(super) w_est: f64,
    pub(super) epoch_start: Option<Instant>,
    config: CongestionControlConfig,
}

impl Cubic {
    pub fn new(config: CongestionControlConfig) -> Self {
        Self {
            cwnd: config.initial_cwnd,
            ssthresh: config.initial_ssthresh,
            w_max: 0.0,
            k: 0.0,
            w_est: 0.0,
            epoch_start: None,
            config,
        }
    }

    fn w_cubic(&self, t: f64) -> f64 {
        self.config.cubic_c * (t - self.k).powi(3) + self.w_max
    }

    fn reno_alpha(&self) -> f64 {
        let beta = self.config.cubic_beta;
        3.0 * (1.0 - beta) / (1.0 + beta)
    }
}

impl CongestionControl for Cubic {
    fn on_success(&mut self, now: Instant) -> f64 {
        if self.cwnd < self.ssthresh {
            self.cwnd += 1.0;
            trace!(cwnd = self.cwnd, "CUBIC slow start");
            return self.cwnd;
        }

        let epoch_start = match self.epoch_start {
            Some(start) => start,
            None => {
                self.epoch_start = Some(now);
                self.w_max = self.cwnd;
                self.k = 0.0;
                self.w_est = self.cwnd;
                now
            }
        };
        let t = now.saturating_duration_since(epoch_start).as_secs_f64();

        self.w_est += self.reno_alpha() / self.cwnd;
        let target = self
            .w_cubic(t)
            .max(self.w_est)
            .clamp(self.cwnd, 1.5 * self.cwnd);
        self.cwnd += (target - self.cwnd) / self.cwnd;
        trace!(cwnd = self.cwnd, target, t, "CUBIC window increased");
        self.cwnd
    }

    fn on_loss(&mut self, now: Instant) -> f64 {
        let floor = self.config.min_cwnd;
        let beta = self.config.cubic_beta;
        let before = self.cwnd;

        // Fast convergence: release bandwidth when the peak moved down.
        self.w_max = if before < self.w_max {
            before * (1.0 + beta) / 2.0
        } else {
            before
        };
        self.ssthresh = (before * beta).max(floor);
        self.cwnd = if self.config.reset_cwnd_to_init {
            self.config.initial_cwnd.max(floor)
        } else {
            self.ssthresh
        };
        self.k = (self.w_max * (1.0 - beta) / self.config.cubic_c).cbrt();
        self.w_est = self.cwnd;
        self.epoch_start = Some(now);

        debug!(
            cwnd = self.cwnd,
            ssthresh = self.ssthresh,
            w_max = self.w_max,
            k = self.k,
            "CUBIC window decreased"
        );
        self.cwnd
    }

    fn congestion_window(&self) -> f64 {
        self.cwnd
    }

    fn slow_start_threshold(&self) -> f64 {
        self.ssthresh
    }

    fn name(&self) -> &'static str {
        "CUBIC"
    }
}
