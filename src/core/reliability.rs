//! 可靠性层：分段表、重传调度以及 RTT 和速率估算。
//! The reliability layer: segment table, retransmission scheduling, RTT and rate estimation.
//!
//! 这些组件都不持有定时器或任务，由 [`crate::core::pipeline::Pipeline`] 按需驱动。
//! None of these components own a timer or a task; they are driven by
//! [`crate::core::pipeline::Pipeline`].

pub mod rate;
pub mod retransmission;
pub mod rtt;
pub mod segment_table;
