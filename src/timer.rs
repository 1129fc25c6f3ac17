//! 协作式定时器调度器
//! Cooperative timer scheduler
//!
//! 流水线不会阻塞等待。每个周期性任务都以带截止时间的条目登记在这里，
//! 由驱动者在截止时间到达时取出并执行，执行后再重新登记自己。
//! 取消会清空全部条目，之后不会再有旧的任务触发。
//!
//! The pipeline never blocks. Every recurring task is registered here as an
//! entry with a deadline; the driver pops it once the deadline is reached, runs
//! it, and the task re-registers itself. Cancelling clears every entry, so no
//! older task fires afterwards.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;


/// 按截止时间排序的定时器集合
/// Deadline-ordered set of timers
#[derive(Debug)]
pub struct Scheduler<K> {
    /// (截止时间, 条目ID) -> 任务类型
    /// (deadline, entry id) -> task kind
    entries: BTreeMap<(Instant, u64), K>,
    next_id: u64,
}

impl<K: Copy + Debug> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Debug> Scheduler<K> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// 在 `deadline` 登记一个定时器
    /// Register a timer at `deadline`
    pub fn schedule_at(&mut self, deadline: Instant, kind: K) {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert((deadline, id), kind);
        trace!(id, ?kind, "Timer scheduled");
    }

    /// 在 `now + delay` 登记一个定时器
    /// Register a timer at `now + delay`
    pub fn schedule_after(&mut self, now: Instant, delay: Duration, kind: K) {
        self.schedule_at(now + delay, kind);
    }

    /// 取消全部定时器
    /// Cancel every timer
    pub fn cancel_all(&mut self) {
        let cancelled = self.entries.len();
        self.entries.clear();
        trace!(cancelled, "All timers cancelled");
    }

    /// 最早的截止时间
    /// Earliest deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// 取出一个已到期的定时器（按截止时间顺序）
    /// Pop one expired timer, in deadline order
    pub fn pop_expired(&mut self, now: Instant) -> Option<K> {
        let (&(deadline, _), _) = self.entries.iter().next()?;
        if deadline > now {
            return None;
        }
        self.entries.pop_first().map(|(_, kind)| kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
