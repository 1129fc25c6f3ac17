//! Requests (Interests) and their responses (Data).
//! 请求（Interest）及其响应（Data）。

use super::name::Name;
use bytes::Bytes;
use std::time::Duration;

/// A named request. Each outgoing Interest elicits at most one Data, a Nack,
/// or expires after its lifetime.
///
/// 一个命名请求。每个发出的 Interest 最多引出一个 Data、一个 Nack，
/// 或在其生存期后过期。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub lifetime: Duration,
    pub must_be_fresh: bool,
    /// Random value used by forwarders to detect looping requests.
    /// 转发器用于检测环路请求的随机值。
    pub nonce: u32,
}

impl Interest {
    /// Creates an Interest with a fresh random nonce.
    /// 创建一个带有新随机 nonce 的 Interest。
    pub fn new(name: Name, lifetime: Duration, must_be_fresh: bool) -> Self {
        Self {
            name,
            lifetime,
            must_be_fresh,
            nonce: rand::random(),
        }
    }
}

/// A named payload answering an Interest.
///
/// 应答 Interest 的命名负载。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub content: Bytes,
    /// The highest valid segment number of the whole content, when the producer knows it.
    /// 整个内容的最高有效分段号（如果生产者知道）。
    pub final_segment: Option<u64>,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content: content.into(),
            final_segment: None,
        }
    }

    /// Marks this Data as carrying the final segment number of the content.
    /// 标记该 Data 携带内容的最终分段号。
    pub fn with_final_segment(mut self, final_segment: u64) -> Self {
        self.final_segment = Some(final_segment);
        self
    }

    /// The segment number of this Data, if its name has one.
    /// 该 Data 的分段号（如果其名称包含分段号）。
    pub fn segment(&self) -> Option<u64> {
        self.name.segment()
    }
}
