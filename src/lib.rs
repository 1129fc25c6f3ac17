#![deny(clippy::expect_used, clippy::unwrap_used)]

//! The root of the segment fetching pipeline library.
//! 分段获取流水线库的根。
//!
//! A [`Pipeline`] retrieves a named object split into numbered segments,
//! keeping as many requests outstanding as a pluggable congestion window
//! allows, retransmitting on timeout and reacting to loss. The [`Fetcher`]
//! drives it on a tokio task.
//!
//! [`Pipeline`] 获取一个被切分为编号分段的命名对象，在可插拔的拥塞窗口允许的范围内
//! 保持尽可能多的未完成请求，超时重传并对丢包做出反应。[`Fetcher`] 在 tokio 任务上驱动它。

pub mod config;
pub mod error;
pub mod fetcher;
pub mod packet;
pub mod timer;
pub mod transport;

pub mod congestion;
pub mod core;

pub use config::{CongestionAlgorithm, Config};
pub use core::consumer::Consumer;
pub use core::pipeline::{FetchState, FetchSummary, Goodput, Pipeline};
pub use core::stats::StatisticsCollector;
pub use error::{Error, Result};
pub use fetcher::{CancelHandle, Fetcher};
