//! The request/response transport seen by the pipeline.
//!
//! A transport sends named requests and later reports exactly one outcome per
//! request: data, a negative acknowledgment, or lifetime expiration.
//!
//! 流水线所见的请求/响应传输层。每个请求之后只会报告一个结果：
//! 数据、否定确认或生存期到期。

pub mod channel;

use crate::packet::{Data, Interest, NackReason, Name};
use std::fmt;

pub use channel::{ChannelTransport, TransportCommand};

/// Identifies one outstanding request handed to a transport.
///
/// 标识交给传输层的一个未完成请求。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What happened to a request.
///
/// 请求的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Data(Data),
    Nack(NackReason),
    Expired,
}

/// An outcome reported by the transport for one request.
///
/// 传输层为某个请求报告的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub request: RequestId,
    /// Name of the request the outcome belongs to.
    /// 该结果所属请求的名称。
    pub name: Name,
    pub outcome: Outcome,
}

/// The sending half of a request/response transport.
///
/// 请求/响应传输层的发送端。
pub trait Transport: Send + 'static {
    /// Sends a request and returns a handle for it.
    ///
    /// 发送请求并返回其句柄。
    fn express_interest(&mut self, interest: Interest) -> RequestId;

    /// Withdraws an outstanding request. Calling it twice is harmless.
    ///
    /// 撤回一个未完成的请求。重复调用是无害的。
    fn remove_pending_interest(&mut self, request: RequestId);
}
