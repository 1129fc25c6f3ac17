//! 拥塞控制的分段获取流水线
//! Congestion-controlled segment fetching pipeline
//!
//! 流水线是一个同步状态机：所有入口都接收调用者提供的 `now`，
//! 由驱动者（见 [`crate::fetcher`]）在传输事件到达或定时器截止时调用。
//! 它从不阻塞，也不持有自己的任务。
//!
//! The pipeline is a synchronous state machine: every entry point takes a
//! caller-supplied `now` and is invoked by a driver (see [`crate::fetcher`])
//! when a transport event arrives or a timer deadline passes. It never blocks
//! and owns no task of its own.

pub mod summary;


pub use summary::{FetchSummary, Goodput};

use crate::config::Config;
use crate::congestion::CongestionControl;
use crate::core::event::{PipelineEvents, WindowChange};
use crate::core::reliability::{
    rate::RateEstimator,
    retransmission::{RetransmissionScheduler, RetxQueue},
    rtt::RtoEstimator,
    segment_table::{ResponseOutcome, SegmentState, SegmentTable},
};
use crate::error::{Error, Result};
use crate::packet::{Data, Interest, NackReason, Name};
use crate::timer::Scheduler;
use crate::transport::{Outcome, RequestId, Transport, TransportEvent};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// 逐分段诊断：开启 verbose 时提升到 `info`
/// Per-segment diagnostics, raised to `info` when verbose is on
macro_rules! diag {
    ($self:expr, $($arg:tt)+) => {
        if $self.config.pipeline.verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// 流水线的生命周期状态
/// Lifecycle state of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl FetchState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FetchState::Completed | FetchState::Failed | FetchState::Cancelled
        )
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchState::Idle => "Idle",
            FetchState::Running => "Running",
            FetchState::Completed => "Completed",
            FetchState::Failed => "Failed",
            FetchState::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    RtoCheck,
    RateSample,
}

/// 获取进度计数器
/// Fetch progress counters
#[derive(Debug, Default)]
struct Progress {
    /// 下一个尚未请求过的分段号
    /// Next segment number never requested
    next_segment: u64,
    /// 由首个 Data 提供、不再请求的分段号
    /// Segment number delivered by the first Data, never requested again
    excluded: Option<u64>,
    high_data: u64,
    high_interest: u64,
    rec_point: u64,
    in_flight: u64,
    /// 已接受的分段号 -> 内容字节数
    /// Accepted segment number -> content bytes
    received: BTreeMap<u64, u64>,
    received_bytes: u64,
    loss_events: u64,
    retransmissions: u64,
    final_segment: Option<u64>,
    /// 当前速率采样间隔内的计数
    /// Counts within the current rate interval
    interval_packets: u64,
    interval_bits: u64,
}

/// 尚不能确定是否致命的失败：出现在最终分段号已知之前
/// A failure not yet known to be fatal, seen before the final segment number was known
#[derive(Debug)]
struct SoftFailure {
    segment: u64,
    error: Error,
}

/// 分段获取流水线
/// Segment fetching pipeline
pub struct Pipeline<T: Transport> {
    config: Config,
    transport: T,
    congestion_control: Box<dyn CongestionControl>,
    rtt: Box<dyn RtoEstimator>,
    rate: RateEstimator,
    table: SegmentTable,
    retx_queue: RetxQueue,
    retx_scheduler: RetransmissionScheduler,
    retx_count: HashMap<u64, u32>,
    timers: Scheduler<TimerKind>,
    events: PipelineEvents,
    prefix: Option<Name>,
    progress: Progress,
    failure: Option<SoftFailure>,
    state: FetchState,
    start_time: Option<Instant>,
    result: Option<Result<FetchSummary>>,
}

impl<T: Transport> Pipeline<T> {
    /// 创建流水线。配置在这里校验。
    /// Create a pipeline. The configuration is validated here.
    pub fn new(
        config: Config,
        transport: T,
        congestion_control: Box<dyn CongestionControl>,
        rtt: Box<dyn RtoEstimator>,
        rate: RateEstimator,
    ) -> Result<Self> {
        config.validate()?;
        let retx_scheduler = RetransmissionScheduler::new(config.pipeline.rto_check_interval);
        Ok(Self {
            config,
            transport,
            congestion_control,
            rtt,
            rate,
            table: SegmentTable::new(),
            retx_queue: RetxQueue::new(),
            retx_scheduler,
            retx_count: HashMap::new(),
            timers: Scheduler::new(),
            events: PipelineEvents::default(),
            prefix: None,
            progress: Progress::default(),
            failure: None,
            state: FetchState::Idle,
            start_time: None,
            result: None,
        })
    }

    /// 用于挂接事件处理函数
    /// Used to attach event handlers
    pub fn events_mut(&mut self) -> &mut PipelineEvents {
        &mut self.events
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn congestion_window(&self) -> f64 {
        self.congestion_control.congestion_window()
    }

    pub fn in_flight(&self) -> u64 {
        self.progress.in_flight
    }

    pub fn outstanding_segments(&self) -> usize {
        self.table.len()
    }

    pub fn pending_retransmissions(&self) -> usize {
        self.retx_queue.len()
    }

    pub fn loss_events(&self) -> u64 {
        self.progress.loss_events
    }

    pub fn retransmissions(&self) -> u64 {
        self.progress.retransmissions
    }

    pub fn segments_received(&self) -> u64 {
        self.progress.received.len() as u64
    }

    pub fn final_segment(&self) -> Option<u64> {
        self.progress.final_segment
    }

    /// 下一个定时器截止时间。流水线未运行时为 `None`。
    /// Next timer deadline. `None` while the pipeline is not running.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.state != FetchState::Running {
            return None;
        }
        self.timers.next_deadline()
    }

    /// 取出终止结果。仅在进入终止状态后返回 `Some`，且只返回一次。
    /// Take the terminal result. `Some` only once a terminal state is reached, and only once.
    pub fn take_result(&mut self) -> Option<Result<FetchSummary>> {
        self.result.take()
    }

    /// 以首个 Data 开始获取。
    /// Start the fetch from the first Data.
    ///
    /// 首个 Data 决定名称前缀，其分段号此后不再请求。
    /// 如果它携带的最终分段号表明内容已经完整，获取立即完成。
    ///
    /// The first Data fixes the name prefix and its segment number is never
    /// requested again. If its final segment number shows the content is
    /// already complete, the fetch completes immediately.
    pub fn start(&mut self, first: Data, now: Instant) -> Result<()> {
        if self.state != FetchState::Idle {
            return Err(Error::InvalidState("start requires an idle pipeline"));
        }
        let Some(segment) = first.segment() else {
            return Err(Error::MissingSegment {
                name: first.name.to_string(),
            });
        };

        if self.config.pipeline.verbose {
            info!("{}", self.config);
        }
        self.prefix = Some(first.name.prefix());
        self.state = FetchState::Running;
        self.start_time = Some(now);
        self.progress.excluded = Some(segment);
        self.progress.final_segment = first.final_segment;
        self.record_received(segment, first.content.len() as u64);
        if let Some(final_segment) = first.final_segment {
            self.discard_received_beyond(final_segment);
        }
        debug!(
            prefix = %first.name.prefix(),
            segment,
            final_segment = ?first.final_segment,
            algorithm = self.congestion_control.name(),
            "Fetch started"
        );
        self.events.data_received.emit(&first);

        if self.is_complete() {
            self.complete(now);
            return Ok(());
        }

        self.timers.schedule_after(
            now,
            self.retx_scheduler.interval(),
            TimerKind::RtoCheck,
        );
        self.timers
            .schedule_after(now, self.rate.interval(), TimerKind::RateSample);
        self.schedule_packets(now);
        Ok(())
    }

    /// 处理一个传输事件
    /// Handle one transport event
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) {
        match event.outcome {
            Outcome::Data(data) => self.handle_data(event.request, data, now),
            Outcome::Nack(reason) => self.handle_nack(event.request, &event.name, reason, now),
            Outcome::Expired => self.handle_lifetime_expiration(event.request, &event.name, now),
        }
    }

    /// 运行所有截止时间已到的定时器任务
    /// Run every timer task whose deadline has passed
    pub fn on_timer(&mut self, now: Instant) {
        while self.state == FetchState::Running {
            let Some(kind) = self.timers.pop_expired(now) else {
                break;
            };
            match kind {
                TimerKind::RtoCheck => self.check_rto(now),
                TimerKind::RateSample => self.sample_rate(now),
            }
        }
    }

    /// 取消获取：撤回所有未完成的请求并停止所有定时器
    /// Cancel the fetch: withdraw every outstanding request and stop every timer
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        debug!(outstanding = self.table.len(), "Fetch cancelled");
        self.stop();
        self.state = FetchState::Cancelled;
        self.result = Some(Err(Error::Cancelled));
    }

    fn handle_data(&mut self, request: RequestId, data: Data, now: Instant) {
        if self.state != FetchState::Running {
            return;
        }
        let Some(seg) = data.segment() else {
            warn!(name = %data.name, "Ignoring Data without segment number");
            return;
        };
        match self.table.get(seg) {
            None => {
                trace!(seg, %request, "Ignoring Data for unknown segment");
                return;
            }
            Some(info) if info.state == SegmentState::RetxReceived => {
                self.table.on_response(seg);
                trace!(seg, "Ignoring duplicate Data");
                return;
            }
            Some(_) => {}
        }

        if self.progress.final_segment.is_none() {
            if let Some(final_segment) = data.final_segment {
                self.on_final_segment_discovered(final_segment);
                if self.state != FetchState::Running || seg > final_segment {
                    return;
                }
            }
        }

        let bytes = data.content.len() as u64;
        self.progress.interval_packets += 1;
        self.progress.interval_bits += bytes * 8;

        if self.progress.high_data < seg {
            self.progress.high_data = seg;
        }

        let ResponseOutcome::Accepted(info) = self.table.on_response(seg) else {
            return;
        };
        self.retx_count.remove(&seg);
        let rtt = now.saturating_duration_since(info.time_sent);
        diag!(self, seg, rtt_ms = rtt.as_secs_f64() * 1000.0, bytes, "Received segment");

        if info.state != SegmentState::InRetxQueue {
            self.progress.in_flight = self.progress.in_flight.saturating_sub(1);
        }
        self.record_received(seg, bytes);

        self.increase_window(now);
        self.events.data_received.emit(&data);

        // 只有未重传过的请求才能提供无歧义的 RTT 样本
        // Only a request that was never retransmitted gives an unambiguous RTT sample
        if matches!(
            info.state,
            SegmentState::FirstTimeSent | SegmentState::InRetxQueue
        ) {
            let expected_samples = self.progress.in_flight.div_ceil(2).max(1) as usize;
            let elapsed = self.elapsed(now).as_secs_f64();
            let sample = self.rtt.add_sample(seg, elapsed, rtt, expected_samples);
            self.events.rtt_sampled.emit(&sample);
        }

        if self.is_complete() {
            self.complete(now);
            return;
        }

        if self.failure.is_some() && !self.table.has_pending() {
            if let Some(failure) = self.failure.take() {
                self.fail(failure.error);
            }
            return;
        }

        self.schedule_packets(now);
    }

    fn handle_nack(&mut self, request: RequestId, name: &Name, reason: NackReason, now: Instant) {
        if self.state != FetchState::Running {
            return;
        }
        let Some(seg) = name.segment() else {
            return;
        };
        if !self.is_current_request(seg, request) {
            trace!(seg, %request, %reason, "Ignoring stale Nack");
            return;
        }
        diag!(self, seg, %reason, "Received Nack");

        match reason {
            NackReason::Duplicate => {}
            NackReason::Congestion => {
                if self.retx_scheduler.queue_single(&mut self.table, &mut self.retx_queue, seg) {
                    self.handle_timeout(1, now);
                }
            }
            reason => self.handle_fail(
                seg,
                Error::Nack {
                    name: name.to_string(),
                    reason,
                },
            ),
        }
    }

    fn handle_lifetime_expiration(&mut self, request: RequestId, name: &Name, now: Instant) {
        if self.state != FetchState::Running {
            return;
        }
        let Some(seg) = name.segment() else {
            return;
        };
        if !self.is_current_request(seg, request) {
            trace!(seg, %request, "Ignoring stale lifetime expiration");
            return;
        }
        diag!(self, seg, "Lifetime expired");
        if self.retx_scheduler.queue_single(&mut self.table, &mut self.retx_queue, seg) {
            self.handle_timeout(1, now);
        }
    }

    fn is_current_request(&self, seg: u64, request: RequestId) -> bool {
        self.table.get(seg).is_some_and(|info| info.request == request)
    }

    fn check_rto(&mut self, now: Instant) {
        let timed_out = self
            .retx_scheduler
            .scan(&mut self.table, &mut self.retx_queue, now);
        if timed_out > 0 {
            self.handle_timeout(timed_out as u64, now);
        }
        if self.state == FetchState::Running {
            self.timers.schedule_after(
                now,
                self.retx_scheduler.interval(),
                TimerKind::RtoCheck,
            );
        }
    }

    fn sample_rate(&mut self, now: Instant) {
        let sample = self.rate.add_measurement(
            self.elapsed(now).as_secs_f64(),
            self.progress.interval_packets,
            self.progress.interval_bits,
        );
        self.progress.interval_packets = 0;
        self.progress.interval_bits = 0;
        trace!(
            pps = sample.packets_per_second,
            kbps = sample.kilobits_per_second,
            "Rate sampled"
        );
        self.events.rate_sampled.emit(&sample);
        self.timers
            .schedule_after(now, self.rate.interval(), TimerKind::RateSample);
    }

    /// 处理一批超时（或等同于超时的单个丢失信号）。
    /// 每个往返最多触发一次窗口减小，除非禁用了保守窗口调整。
    ///
    /// Handle a batch of timeouts (or a single loss signal treated as one).
    /// At most one window decrease per round trip unless conservative window
    /// adaptation is disabled.
    fn handle_timeout(&mut self, timeout_count: u64, now: Instant) {
        if timeout_count == 0 {
            return;
        }
        if self.config.pipeline.disable_cwa || self.progress.high_data > self.progress.rec_point {
            self.progress.rec_point = self.progress.high_interest;
            self.decrease_window(now);
            self.rtt.backoff_rto();
            self.progress.loss_events += 1;
            diag!(
                self,
                timeout_count,
                cwnd = self.congestion_control.congestion_window(),
                ssthresh = self.congestion_control.slow_start_threshold(),
                rto_ms = self.rtt.estimated_rto().as_secs_f64() * 1000.0,
                "Packet loss event"
            );
        } else {
            trace!(timeout_count, "Loss within the same round trip, no window reaction");
        }
        self.progress.in_flight = self.progress.in_flight.saturating_sub(timeout_count);
        self.schedule_packets(now);
    }

    /// 在窗口允许的范围内发送请求，重传优先于新分段
    /// Send requests as far as the window allows, retransmissions before new segments
    fn schedule_packets(&mut self, now: Instant) {
        let window = self.congestion_control.congestion_window().floor();
        let mut available = window as i64 - self.progress.in_flight as i64;
        while available > 0 && self.state == FetchState::Running {
            if let Some(seg) = self.retx_queue.pop_pending(&self.table) {
                self.send_interest(seg, true, now);
            } else if self.can_request_new_segment() {
                let seg = self.next_segment();
                self.send_interest(seg, false, now);
            } else {
                break;
            }
            available -= 1;
        }
    }

    fn peek_next_segment(&self) -> u64 {
        let next = self.progress.next_segment;
        if Some(next) == self.progress.excluded {
            next + 1
        } else {
            next
        }
    }

    fn next_segment(&mut self) -> u64 {
        let seg = self.peek_next_segment();
        self.progress.next_segment = seg + 1;
        seg
    }

    fn can_request_new_segment(&self) -> bool {
        if self.failure.is_some() {
            return false;
        }
        match self.progress.final_segment {
            Some(final_segment) => self.peek_next_segment() <= final_segment,
            None => true,
        }
    }

    fn send_interest(&mut self, seg: u64, is_retransmission: bool, now: Instant) {
        if self.state != FetchState::Running {
            return;
        }
        if !is_retransmission {
            if self.progress.final_segment.is_some_and(|last| seg > last) {
                return;
            }
            if self.failure.is_some() {
                return;
            }
        }
        let Some(prefix) = self.prefix.as_ref() else {
            return;
        };
        let name = prefix.append_segment(seg);

        if is_retransmission {
            let max_retries = self.config.pipeline.max_retries_on_timeout_or_nack;
            let attempt = {
                let count = self.retx_count.entry(seg).or_insert(0);
                *count += 1;
                *count
            };
            if attempt > max_retries {
                self.handle_fail(
                    seg,
                    Error::RetriesExhausted {
                        segment: seg,
                        max_retries,
                    },
                );
                return;
            }
            diag!(self, seg, attempt, "Retransmitting segment");
            if let Some(info) = self.table.get(seg) {
                self.transport.remove_pending_interest(info.request);
            }
        }

        let interest = Interest::new(
            name,
            self.config.pipeline.interest_lifetime,
            self.config.pipeline.must_be_fresh,
        );
        let request = self.transport.express_interest(interest);
        self.progress.in_flight += 1;
        let rto = self.rtt.estimated_rto();

        if is_retransmission {
            self.table.on_retransmit_sent(seg, request, rto, now);
            self.progress.retransmissions += 1;
        } else {
            self.progress.high_interest = seg;
            self.table.record(seg, request, rto, now);
        }
        trace!(seg, %request, in_flight = self.progress.in_flight, "Interest sent");
    }

    /// 分段无法取回时调用
    /// Called when a segment cannot be retrieved
    ///
    /// 最终分段号已知且该分段在内容范围内：致命。
    /// 最终分段号未知：该分段可能已超出内容末尾，因此只撤回它之后的请求，
    /// 并暂存失败，等到最终分段号揭晓再决定。
    ///
    /// Final segment known and the segment is within the content: fatal.
    /// Final segment unknown: the segment may lie past the end of the content,
    /// so only the requests beyond it are withdrawn and the failure is held
    /// until the final segment number is revealed.
    fn handle_fail(&mut self, seg: u64, error: Error) {
        if self.state != FetchState::Running {
            return;
        }
        match self.progress.final_segment {
            Some(final_segment) if seg <= final_segment => self.fail(error),
            Some(_) => {
                self.remove_segment(seg);
            }
            None => {
                self.remove_segment(seg);
                if !self.table.has_pending() {
                    warn!(seg, %error, "No outstanding segments left and no final segment known");
                    self.fail(Error::NoFinalSegment);
                } else {
                    self.cancel_in_flight_greater_than(seg);
                    debug!(seg, %error, "Holding failure until the final segment is known");
                    self.failure = Some(SoftFailure {
                        segment: seg,
                        error,
                    });
                }
            }
        }
    }

    fn on_final_segment_discovered(&mut self, final_segment: u64) {
        debug!(final_segment, "Final segment number discovered");
        self.progress.final_segment = Some(final_segment);
        self.cancel_in_flight_greater_than(final_segment);
        self.discard_received_beyond(final_segment);
        if let Some(failure) = self.failure.take() {
            if failure.segment <= final_segment {
                self.fail(failure.error);
            } else {
                debug!(seg = failure.segment, "Held failure lies past the final segment, dropped");
            }
        }
    }

    fn record_received(&mut self, seg: u64, bytes: u64) {
        if self.progress.received.insert(seg, bytes).is_none() {
            self.progress.received_bytes += bytes;
        }
    }

    /// 撤销在最终分段号揭晓前接受的、超出内容末尾的分段
    /// Undo segments accepted before the final segment number was known that lie past it
    fn discard_received_beyond(&mut self, final_segment: u64) {
        let Some(first_beyond) = final_segment.checked_add(1) else {
            return;
        };
        let beyond = self.progress.received.split_off(&first_beyond);
        if beyond.is_empty() {
            return;
        }
        let bytes: u64 = beyond.values().sum();
        self.progress.received_bytes = self.progress.received_bytes.saturating_sub(bytes);
        debug!(
            final_segment,
            discarded = beyond.len(),
            bytes,
            "Discarded segments received past the final segment"
        );
    }

    fn remove_segment(&mut self, seg: u64) {
        self.retx_count.remove(&seg);
        if let Some(info) = self.table.remove(seg) {
            self.transport.remove_pending_interest(info.request);
            if info.state.is_in_flight() {
                self.progress.in_flight = self.progress.in_flight.saturating_sub(1);
            }
        }
    }

    fn cancel_in_flight_greater_than(&mut self, bound: u64) -> usize {
        let removed = self.table.cancel_greater_than(bound);
        for (seg, info) in &removed {
            self.retx_count.remove(seg);
            self.transport.remove_pending_interest(info.request);
            if info.state.is_in_flight() {
                self.progress.in_flight = self.progress.in_flight.saturating_sub(1);
            }
        }
        removed.len()
    }

    fn increase_window(&mut self, now: Instant) {
        let window = self.congestion_control.on_success(now);
        self.emit_window(window, now);
    }

    fn decrease_window(&mut self, now: Instant) {
        let window = self.congestion_control.on_loss(now);
        self.emit_window(window, now);
    }

    fn emit_window(&mut self, window: f64, now: Instant) {
        let change = WindowChange {
            elapsed: self.elapsed(now),
            window,
        };
        self.events.window_changed.emit(&change);
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.start_time
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// 每个不超过最终分段号的分段都已收到。
    /// 最终分段号揭晓后 `received` 中只剩不超过它的分段。
    ///
    /// Every segment up to the final segment number has been received.
    /// Once the final number is known `received` holds nothing beyond it.
    fn is_complete(&self) -> bool {
        self.progress
            .final_segment
            .is_some_and(|last| self.progress.received.len() as u64 > last)
    }

    fn complete(&mut self, now: Instant) {
        let summary = FetchSummary {
            elapsed: self.elapsed(now),
            segments_received: self.segments_received(),
            received_bytes: self.progress.received_bytes,
            loss_events: self.progress.loss_events,
            retransmissions: self.progress.retransmissions,
        };
        self.stop();
        self.state = FetchState::Completed;
        if self.config.pipeline.verbose {
            info!("{summary}");
        } else {
            debug!(
                segments = summary.segments_received,
                bytes = summary.received_bytes,
                goodput = %summary.goodput(),
                "Fetch completed"
            );
        }
        self.result = Some(Ok(summary));
    }

    fn fail(&mut self, error: Error) {
        error!(%error, "Fetch failed");
        self.stop();
        self.state = FetchState::Failed;
        self.result = Some(Err(error));
    }

    fn stop(&mut self) {
        for request in self.table.drain() {
            self.transport.remove_pending_interest(request);
        }
        self.retx_queue.clear();
        self.retx_count.clear();
        self.failure = None;
        self.progress.in_flight = 0;
        self.timers.cancel_all();
    }
}
