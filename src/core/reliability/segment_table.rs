//! 分段表 - 所有在途和待重传分段的权威记录
//! Segment Table - the authoritative record of in-flight and pending-retransmission segments
//!
//! 职责：
//! - 按分段号存储每个分段的投递状态、RTO快照和发送时间
//! - 驱动分段状态机
//! - 无拥塞控制逻辑，只管理数据
//!
//! Responsibilities:
//! - store delivery state, RTO snapshot and send time per segment number
//! - drive the per-segment state machine
//! - no congestion logic, data only

use crate::transport::RequestId;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// 分段的投递状态
/// Delivery state of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentState {
    /// 第一次请求已发送
    /// The first request has been sent
    FirstTimeSent,
    /// 已超时，等待重传
    /// Timed out, waiting in the retransmission queue
    InRetxQueue,
    /// 重传请求已发送
    /// A retransmitted request has been sent
    Retransmitted,
    /// 重传请求的响应已到达，只保留用于识别重复响应
    /// The retransmitted request was answered; kept only to recognise a duplicate
    RetxReceived,
}

impl SegmentState {
    /// Whether a request for the segment counts against the window.
    /// 该分段的请求是否占用窗口。
    pub fn is_in_flight(self) -> bool {
        matches!(self, SegmentState::FirstTimeSent | SegmentState::Retransmitted)
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentState::FirstTimeSent => "FirstTimeSent",
            SegmentState::InRetxQueue => "InRetxQueue",
            SegmentState::Retransmitted => "Retransmitted",
            SegmentState::RetxReceived => "RetxReceived",
        };
        f.write_str(s)
    }
}

/// 分段记录
/// Segment record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    /// 当前未完成的请求
    /// The currently outstanding request
    pub request: RequestId,
    pub state: SegmentState,
    /// 发送时的RTO快照
    /// RTO snapshot taken at send time
    pub rto: Duration,
    pub time_sent: Instant,
}

/// `on_response` 的结果
/// Result of `on_response`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// 响应被接受。携带转换之前的记录。
    /// The response is accepted. Carries the record as it was before the transition.
    Accepted(SegmentInfo),
    /// 已经收到过该分段，忽略。
    /// The segment was already received; ignore.
    Duplicate,
    /// 没有该分段的记录（已取消或已完成）。
    /// No record for the segment (cancelled or finished).
    Unknown,
}

/// 分段表
/// Segment table
#[derive(Debug, Default)]
pub struct SegmentTable {
    segments: BTreeMap<u64, SegmentInfo>,
}

impl SegmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录首次发送的分段
    /// Record a segment sent for the first time
    pub fn record(&mut self, seg: u64, request: RequestId, rto: Duration, now: Instant) {
        trace!(seg, %request, "Recording segment");
        self.segments.insert(
            seg,
            SegmentInfo {
                request,
                state: SegmentState::FirstTimeSent,
                rto,
                time_sent: now,
            },
        );
    }

    /// 标记为待重传。记录不存在时不做任何事。
    /// Mark for retransmission. No-op when the record is absent.
    pub fn mark_for_retx(&mut self, seg: u64) -> bool {
        match self.segments.get_mut(&seg) {
            Some(info) => {
                info.state = SegmentState::InRetxQueue;
                true
            }
            None => false,
        }
    }

    /// 记录重传请求已发送，并刷新RTO快照和发送时间
    /// Record that a retransmission went out, refreshing the RTO snapshot and send time
    pub fn on_retransmit_sent(
        &mut self,
        seg: u64,
        request: RequestId,
        rto: Duration,
        now: Instant,
    ) -> bool {
        match self.segments.get_mut(&seg) {
            Some(info) => {
                info.request = request;
                info.state = SegmentState::Retransmitted;
                info.rto = rto;
                info.time_sent = now;
                true
            }
            None => false,
        }
    }

    /// 处理分段的响应
    /// Handle a response for a segment
    ///
    /// 首次请求或仍在重传队列中的分段：记录被立即删除。
    /// 已重传的分段：记录转为 `RetxReceived`，以便识别重复响应。
    /// `RetxReceived` 状态下的第二次响应：记录被删除并报告重复。
    ///
    /// First attempt or still queued: the record is erased immediately.
    /// Retransmitted: the record flips to `RetxReceived` to catch a duplicate.
    /// A second response while `RetxReceived`: the record is erased, duplicate reported.
    pub fn on_response(&mut self, seg: u64) -> ResponseOutcome {
        let Some(info) = self.segments.get_mut(&seg) else {
            return ResponseOutcome::Unknown;
        };
        let before = *info;
        match before.state {
            SegmentState::RetxReceived => {
                self.segments.remove(&seg);
                trace!(seg, "Duplicate response discarded");
                ResponseOutcome::Duplicate
            }
            SegmentState::Retransmitted => {
                info.state = SegmentState::RetxReceived;
                ResponseOutcome::Accepted(before)
            }
            SegmentState::FirstTimeSent | SegmentState::InRetxQueue => {
                self.segments.remove(&seg);
                ResponseOutcome::Accepted(before)
            }
        }
    }

    /// 收集RTO已过期的分段并将其标记为待重传
    /// Collect segments whose RTO elapsed and mark them for retransmission
    ///
    /// 已在重传队列中或已收到重传响应的分段会被跳过。
    /// Segments already queued or already answered are skipped.
    pub fn collect_expired(&mut self, now: Instant) -> Vec<u64> {
        let mut expired = Vec::new();
        for (&seg, info) in self.segments.iter_mut() {
            if matches!(
                info.state,
                SegmentState::InRetxQueue | SegmentState::RetxReceived
            ) {
                continue;
            }
            if now.saturating_duration_since(info.time_sent) > info.rto {
                info.state = SegmentState::InRetxQueue;
                expired.push(seg);
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Segments timed out");
        }
        expired
    }

    /// 删除所有大于 `bound` 的分段，返回被删除的记录
    /// Remove every segment numbered above `bound`, returning the removed records
    pub fn cancel_greater_than(&mut self, bound: u64) -> Vec<(u64, SegmentInfo)> {
        let Some(first) = bound.checked_add(1) else {
            return Vec::new();
        };
        let removed: Vec<(u64, SegmentInfo)> = self.segments.split_off(&first).into_iter().collect();
        if !removed.is_empty() {
            debug!(bound, removed = removed.len(), "Cancelled segments beyond bound");
        }
        removed
    }

    pub fn get(&self, seg: u64) -> Option<&SegmentInfo> {
        self.segments.get(&seg)
    }

    pub fn remove(&mut self, seg: u64) -> Option<SegmentInfo> {
        self.segments.remove(&seg)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 是否还有分段在途或等待重传
    /// Whether any segment is still in flight or waiting for a resend
    pub fn has_pending(&self) -> bool {
        self.segments
            .values()
            .any(|info| info.state != SegmentState::RetxReceived)
    }

    /// 清空所有记录，返回它们未完成的请求
    /// Clear every record, returning their outstanding requests
    pub fn drain(&mut self) -> Vec<RequestId> {
        let requests = self.segments.values().map(|info| info.request).collect();
        self.segments.clear();
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rto() -> Duration {
        Duration::from_millis(100)
    }

    #[test]
    fn test_first_attempt_response_erases_entry() {
        let mut table = SegmentTable::new();
        let now = Instant::now();
        table.record(1, RequestId(1), rto(), now);

        match table.on_response(1) {
            ResponseOutcome::Accepted(info) => {
                assert_eq!(info.state, SegmentState::FirstTimeSent);
                assert_eq!(info.time_sent, now);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(table.is_empty());
        assert_eq!(table.on_response(1), ResponseOutcome::Unknown);
    }

    #[test]
    fn test_retransmitted_response_keeps_guard_then_drops_duplicate() {
        let mut table = SegmentTable::new();
        let now = Instant::now();
        table.record(3, RequestId(1), rto(), now);
        assert!(table.mark_for_retx(3));
        assert!(table.on_retransmit_sent(3, RequestId(2), rto(), now));
        assert_eq!(table.get(3).map(|i| i.request), Some(RequestId(2)));

        assert!(matches!(
            table.on_response(3),
            ResponseOutcome::Accepted(SegmentInfo {
                state: SegmentState::Retransmitted,
                ..
            })
        ));
        assert_eq!(table.get(3).map(|i| i.state), Some(SegmentState::RetxReceived));

        assert_eq!(table.on_response(3), ResponseOutcome::Duplicate);
        assert!(table.is_empty());
    }

    #[test]
    fn test_queued_response_erases_entry() {
        let mut table = SegmentTable::new();
        table.record(2, RequestId(1), rto(), Instant::now());
        table.mark_for_retx(2);
        assert!(matches!(
            table.on_response(2),
            ResponseOutcome::Accepted(SegmentInfo {
                state: SegmentState::InRetxQueue,
                ..
            })
        ));
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_mark_for_retx_absent_is_noop() {
        let mut table = SegmentTable::new();
        assert!(!table.mark_for_retx(9));
        assert!(!table.on_retransmit_sent(9, RequestId(1), rto(), Instant::now()));
        assert!(table.is_empty());
    }

    #[test]
    fn test_collect_expired_skips_queued_and_received() {
        let mut table = SegmentTable::new();
        let start = Instant::now();
        table.record(0, RequestId(1), rto(), start);
        table.record(1, RequestId(2), rto(), start);
        table.record(2, RequestId(3), rto(), start);
        table.record(3, RequestId(4), Duration::from_secs(10), start);
        table.mark_for_retx(1);
        table.mark_for_retx(2);
        table.on_retransmit_sent(2, RequestId(5), rto(), start);
        table.on_response(2);

        let later = start + Duration::from_millis(150);
        assert_eq!(table.collect_expired(later), vec![0]);
        assert_eq!(table.get(0).map(|i| i.state), Some(SegmentState::InRetxQueue));
        // Already queued now; a second scan finds nothing.
        assert!(table.collect_expired(later).is_empty());
    }

    #[test]
    fn test_rto_not_elapsed_is_not_expired() {
        let mut table = SegmentTable::new();
        let start = Instant::now();
        table.record(0, RequestId(1), rto(), start);
        assert!(table.collect_expired(start + rto()).is_empty());
    }

    #[test]
    fn test_cancel_greater_than() {
        let mut table = SegmentTable::new();
        let now = Instant::now();
        for seg in 0..6 {
            table.record(seg, RequestId(seg), rto(), now);
        }
        let removed = table.cancel_greater_than(3);
        let removed_segs: Vec<u64> = removed.iter().map(|(seg, _)| *seg).collect();
        assert_eq!(removed_segs, vec![4, 5]);
        assert_eq!(table.len(), 4);
        assert!(table.cancel_greater_than(u64::MAX).is_empty());
    }

    #[test]
    fn test_has_pending_ignores_answered_retransmissions() {
        let mut table = SegmentTable::new();
        let now = Instant::now();
        table.record(1, RequestId(1), rto(), now);
        table.mark_for_retx(1);
        assert!(table.has_pending());
        table.on_retransmit_sent(1, RequestId(2), rto(), now);
        table.on_response(1);
        assert!(!table.is_empty());
        assert!(!table.has_pending());
    }

    #[test]
    fn test_drain_returns_requests() {
        let mut table = SegmentTable::new();
        let now = Instant::now();
        table.record(0, RequestId(7), rto(), now);
        table.record(1, RequestId(8), rto(), now);
        let mut requests = table.drain();
        requests.sort();
        assert_eq!(requests, vec![RequestId(7), RequestId(8)]);
        assert!(table.is_empty());
    }
}
