//! Negative acknowledgment reasons.
//! 否定确认的原因。

use std::fmt;

/// Why the network could not satisfy a request.
///
/// 网络无法满足请求的原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NackReason {
    /// The same request was already seen upstream.
    /// 上游已经见过相同的请求。
    Duplicate,
    /// A forwarder dropped the request because of congestion.
    /// 转发器因拥塞丢弃了请求。
    Congestion,
    /// No route towards a producer of the name.
    /// 没有通往该名称生产者的路由。
    NoRoute,
    /// Any other reason reported by the network.
    /// 网络报告的其他任何原因。
    Other(String),
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NackReason::Duplicate => f.write_str("Duplicate"),
            NackReason::Congestion => f.write_str("Congestion"),
            NackReason::NoRoute => f.write_str("NoRoute"),
            NackReason::Other(reason) => f.write_str(reason),
        }
    }
}
