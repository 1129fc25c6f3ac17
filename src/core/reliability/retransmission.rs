//! Retransmission queue and RTO scanning.
//!
//! The queue is decoupled from the segment table: a number can wait for a
//! resend while its bookkeeping still lives in the table, and a number whose
//! record disappeared in the meantime is dropped when popped.
//!
//! 重传队列与RTO扫描。
//!
//! 队列与分段表解耦：一个分段号可以在其记录仍在表中时等待重传，
//! 而在此期间记录已消失的分段号会在弹出时被丢弃。

use super::segment_table::{SegmentState, SegmentTable};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// FIFO of segment numbers awaiting a retransmitted request. Each number is
/// queued at most once at a time.
///
/// 等待重传请求的分段号先进先出队列。每个分段号同一时间最多排队一次。
#[derive(Debug, Default)]
pub struct RetxQueue {
    queue: VecDeque<u64>,
    queued: HashSet<u64>,
}

impl RetxQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `seg`. Returns `false` if it was already queued.
    /// 将 `seg` 入队。如果已在队列中则返回 `false`。
    pub fn push(&mut self, seg: u64) -> bool {
        if !self.queued.insert(seg) {
            return false;
        }
        self.queue.push_back(seg);
        true
    }

    pub fn pop(&mut self) -> Option<u64> {
        let seg = self.queue.pop_front()?;
        self.queued.remove(&seg);
        Some(seg)
    }

    /// Pops the next number that still needs a resend, dropping stale ones.
    ///
    /// 弹出下一个仍需重传的分段号，丢弃过期的分段号。
    pub fn pop_pending(&mut self, table: &SegmentTable) -> Option<u64> {
        while let Some(seg) = self.pop() {
            match table.get(seg) {
                Some(info) if info.state == SegmentState::InRetxQueue => return Some(seg),
                _ => trace!(seg, "Dropping stale retransmission entry"),
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }
}

/// Periodic scan of the segment table for expired retransmission timers.
///
/// 周期性扫描分段表中已过期的重传定时器。
#[derive(Debug, Clone)]
pub struct RetransmissionScheduler {
    interval: Duration,
}

impl RetransmissionScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Time between two scans.
    /// 两次扫描之间的时间。
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Moves every expired segment to the queue and returns how many timed out.
    ///
    /// 将每个过期分段移入队列，并返回超时的数量。
    pub fn scan(&self, table: &mut SegmentTable, queue: &mut RetxQueue, now: Instant) -> usize {
        let expired = table.collect_expired(now);
        for &seg in &expired {
            queue.push(seg);
        }
        expired.len()
    }

    /// Handles a single loss signal (congestion Nack or lifetime expiration)
    /// the same way as one RTO timeout. Returns `false` when the segment is
    /// unknown or already queued.
    ///
    /// 以与一次RTO超时相同的方式处理单个丢失信号（拥塞Nack或生存期到期）。
    /// 当分段未知或已在队列中时返回 `false`。
    pub fn queue_single(&self, table: &mut SegmentTable, queue: &mut RetxQueue, seg: u64) -> bool {
        match table.get(seg).map(|info| info.state) {
            Some(SegmentState::FirstTimeSent) | Some(SegmentState::Retransmitted) => {
                table.mark_for_retx(seg);
                queue.push(seg);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RequestId;

    #[test]
    fn test_queue_rejects_duplicates() {
        let mut queue = RetxQueue::new();
        assert!(queue.push(1));
        assert!(!queue.push(1));
        assert!(queue.push(2));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.len(), 1);
        assert!(queue.push(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_pending_skips_stale_entries() {
        let mut table = SegmentTable::new();
        let mut queue = RetxQueue::new();
        let now = Instant::now();
        table.record(1, RequestId(1), Duration::from_millis(10), now);
        table.record(2, RequestId(2), Duration::from_millis(10), now);
        table.mark_for_retx(2);
        queue.push(0); // no record
        queue.push(1); // not marked
        queue.push(2);

        assert_eq!(queue.pop_pending(&table), Some(2));
        assert!(queue.is_empty());
        assert_eq!(queue.pop_pending(&table), None);
    }

    #[test]
    fn test_scan_batches_timeouts() {
        let mut table = SegmentTable::new();
        let mut queue = RetxQueue::new();
        let scheduler = RetransmissionScheduler::new(Duration::from_millis(10));
        let start = Instant::now();
        for seg in 0..5 {
            table.record(seg, RequestId(seg), Duration::from_millis(100), start);
        }

        assert_eq!(scheduler.scan(&mut table, &mut queue, start), 0);
        let later = start + Duration::from_millis(101);
        assert_eq!(scheduler.scan(&mut table, &mut queue, later), 5);
        assert_eq!(queue.len(), 5);
        assert_eq!(scheduler.scan(&mut table, &mut queue, later), 0);
    }

    #[test]
    fn test_queue_single_ignores_queued_segment() {
        let mut table = SegmentTable::new();
        let mut queue = RetxQueue::new();
        let scheduler = RetransmissionScheduler::new(Duration::from_millis(10));
        table.record(4, RequestId(1), Duration::from_millis(100), Instant::now());

        assert!(scheduler.queue_single(&mut table, &mut queue, 4));
        assert!(!scheduler.queue_single(&mut table, &mut queue, 4));
        assert!(!scheduler.queue_single(&mut table, &mut queue, 5));
        assert_eq!(queue.len(), 1);
    }
}
