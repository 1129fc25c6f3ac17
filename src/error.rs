//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use crate::packet::NackReason;
use thiserror::Error;

/// The primary error type for the segment fetching pipeline.
/// 分段获取流水线的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error occurred, e.g. while writing reassembled content.
    /// 发生了底层的I/O错误，例如写出重组内容时。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A segment was retransmitted more often than the configured ceiling allows.
    /// 某个分段的重传次数超过了配置的上限。
    #[error(
        "Reached the maximum number of retries ({max_retries}) while retrieving segment #{segment}"
    )]
    RetriesExhausted { segment: u64, max_retries: u32 },

    /// A negative acknowledgment with a reason the pipeline cannot recover from.
    /// 收到了流水线无法恢复的否定确认。
    #[error("Could not retrieve data for {name}, reason: {reason}")]
    Nack { name: String, reason: NackReason },

    /// All outstanding work was exhausted before a final segment number was seen.
    /// 在发现最终分段号之前，所有未完成的工作都已耗尽。
    #[error("Fetching terminated but no final segment number has been found")]
    NoFinalSegment,

    /// The fetch was cancelled before it completed.
    /// 获取在完成之前被取消。
    #[error("Fetch was cancelled")]
    Cancelled,

    /// An internal channel for communication between tasks was closed unexpectedly.
    /// 用于任务间通信的内部通道意外关闭。
    #[error("Internal channel is broken")]
    ChannelClosed,

    /// A configuration value is out of its valid range.
    /// 配置值超出其有效范围。
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A Data packet without a segment number reached the pipeline.
    /// 一个没有分段号的 Data 包到达了流水线。
    #[error("Data {name} carries no segment number")]
    MissingSegment { name: String },

    /// The operation is not valid in the pipeline's current state.
    /// 该操作在流水线当前状态下无效。
    #[error("Operation not valid in state {0}")]
    InvalidState(&'static str),
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::RetriesExhausted { .. } => ErrorKind::TimedOut.into(),
            Error::Nack { .. } => ErrorKind::NotFound.into(),
            Error::NoFinalSegment => ErrorKind::UnexpectedEof.into(),
            Error::Cancelled => ErrorKind::Interrupted.into(),
            Error::ChannelClosed => ErrorKind::BrokenPipe.into(),
            Error::InvalidConfig(_) => ErrorKind::InvalidInput.into(),
            Error::MissingSegment { .. } => ErrorKind::InvalidData.into(),
            Error::InvalidState(_) => ErrorKind::Other.into(),
        }
    }
}
