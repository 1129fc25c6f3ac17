//! An implementation of BIC (Binary Increase Congestion control) over a
//! segment-counted window.
//!
//! Below `bic_low_window` the window follows classic TCP. Above it, the window
//! binary-searches towards the midpoint between the last window that saw no
//! loss (`min_win`) and the window at the last loss (`max_win`), with each step
//! capped at `bic_max_increment`. Once the search converges on `max_win` the
//! controller probes for a new maximum with a doubling sub-mode.
//!
//! 基于分段计数窗口的 BIC（二分增长拥塞控制）实现。

use crate::config::CongestionControlConfig;
use crate::congestion::CongestionControl;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Tolerance used when comparing the window against `max_win`.
const CONVERGENCE_EPSILON: f64 = 0.00001;

/// A BIC congestion controller.
///
/// BIC 拥塞控制器。
#[derive(Debug)]
pub struct Bic {
    pub(super) cwnd: f64,

    pub(super) ssthresh: f64,

    /// Midpoint the binary search is heading for.
    /// 二分搜索的目标中点。
    pub(super) target_win: f64,

    /// Largest window known not to cause loss.
    /// 已知不会导致丢包的最大窗口。
    pub(super) min_win: f64,

    /// Window at the last loss. Zero until the first loss, `f64::MAX` while probing.
    /// 上次丢包时的窗口。首次丢包前为零，探测期间为 `f64::MAX`。
    pub(super) max_win: f64,

    pub(super) bss_active: bool,

    pub(super) bss_cwnd: f64,

    pub(super) bss_target: f64,

    config: CongestionControlConfig,
}

impl Bic {
    pub fn new(config: CongestionControlConfig) -> Self {
        Self {
            cwnd: config.initial_cwnd,
            ssthresh: config.initial_ssthresh,
            target_win: 0.0,
            min_win: 0.0,
            max_win: 0.0,
            bss_active: false,
            bss_cwnd: 0.0,
            bss_target: 0.0,
            config,
        }
    }

    fn binary_increase(&mut self) {
        // A target left behind by an older epoch must not shrink the window.
        let distance = (self.target_win - self.cwnd).max(0.0);
        if distance < self.config.bic_max_increment {
            self.cwnd += distance / self.cwnd;
        } else {
            self.cwnd += self.config.bic_max_increment / self.cwnd;
        }

        if self.cwnd + CONVERGENCE_EPSILON < self.max_win {
            self.min_win = self.cwnd;
            self.target_win = midpoint(self.min_win, self.max_win);
        } else {
            self.bss_active = true;
            self.bss_cwnd = 1.0;
            self.bss_target = self.cwnd + 1.0;
            self.max_win = f64::MAX;
            debug!(cwnd = self.cwnd, "BIC search converged, probing for a new maximum");
        }
    }

    fn slow_start_probe(&mut self) {
        self.cwnd += self.bss_cwnd / self.cwnd;
        if self.cwnd >= self.bss_target {
            self.bss_cwnd *= 2.0;
            self.bss_target = self.cwnd + self.bss_cwnd;
        }
        if self.bss_cwnd >= self.config.bic_max_increment {
            self.bss_active = false;
            trace!(cwnd = self.cwnd, "BIC probing finished");
        }
    }
}

/// `(low + high) / 2` without overflowing when `high` is `f64::MAX`.
fn midpoint(low: f64, high: f64) -> f64 {
    low + (high - low) / 2.0
}

impl CongestionControl for Bic {
    fn on_success(&mut self, _now: Instant) -> f64 {
        if self.cwnd < self.config.bic_low_window {
            if self.cwnd <= self.ssthresh {
                self.cwnd += 1.0;
            } else {
                self.cwnd += 1.0 / self.cwnd;
            }
        } else if self.cwnd < self.ssthresh {
            // No loss has set a threshold yet.
            self.cwnd += 1.0;
        } else if !self.bss_active {
            self.binary_increase();
        } else {
            self.slow_start_probe();
        }
        trace!(cwnd = self.cwnd, target = self.target_win, "BIC window increased");
        self.cwnd
    }

    fn on_loss(&mut self, _now: Instant) -> f64 {
        let floor = self.config.min_cwnd;
        let before = self.cwnd;

        if self.config.reset_cwnd_to_init {
            self.ssthresh = (before * 0.5).max(floor);
            self.cwnd = self.config.initial_cwnd.max(floor);
            if before >= self.config.bic_low_window {
                self.max_win = before;
                self.min_win = self.cwnd;
                self.target_win = midpoint(self.min_win, self.max_win);
            }
        } else if before >= self.config.bic_low_window {
            let prev_max = self.max_win;
            self.max_win = before;
            self.cwnd = (before * self.config.bic_beta).max(floor);
            self.min_win = self.cwnd;
            if prev_max > self.max_win {
                // Fast convergence: the available bandwidth shrank.
                self.max_win = midpoint(self.min_win, self.max_win);
            }
            self.target_win = midpoint(self.min_win, self.max_win);
            self.ssthresh = self.cwnd;
        } else {
            self.ssthresh = (before * 0.5).max(floor);
            self.cwnd = self.ssthresh;
        }
        self.bss_active = false;

        debug!(
            cwnd = self.cwnd,
            ssthresh = self.ssthresh,
            max_win = self.max_win,
            target = self.target_win,
            "BIC window decreased"
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
        "BIC"
    }
}
