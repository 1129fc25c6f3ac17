//! Content names: a hierarchical prefix with an optional segment number appended.
//! 内容名称：一个层级前缀，可以附加一个分段号。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const SEGMENT_MARKER: &str = "seg=";

/// A name identifying a content object or one numbered segment of it.
///
/// 标识一个内容对象或其某个编号分段的名称。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    prefix: Arc<str>,
    segment: Option<u64>,
}

impl Name {
    /// Creates a name from a prefix such as `/example/video`.
    ///
    /// Missing leading slashes are added and trailing slashes removed.
    ///
    /// 从诸如 `/example/video` 的前缀创建名称。
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        Self {
            prefix: Arc::from(format!("/{trimmed}")),
            segment: None,
        }
    }

    /// Returns a copy of this name with `segment` as its last component.
    /// 返回以 `segment` 作为最后一个组件的名称副本。
    pub fn append_segment(&self, segment: u64) -> Self {
        Self {
            prefix: Arc::clone(&self.prefix),
            segment: Some(segment),
        }
    }

    /// The segment number, if this name addresses a single segment.
    /// 分段号（如果该名称指向单个分段）。
    pub fn segment(&self) -> Option<u64> {
        self.segment
    }

    /// The name without its segment component.
    /// 不带分段组件的名称。
    pub fn prefix(&self) -> Self {
        Self {
            prefix: Arc::clone(&self.prefix),
            segment: None,
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segment {
            Some(seg) if self.prefix.as_ref() == "/" => write!(f, "/{SEGMENT_MARKER}{seg}"),
            Some(seg) => write!(f, "{}/{SEGMENT_MARKER}{seg}", self.prefix),
            None => f.write_str(&self.prefix),
        }
    }
}

impl FromStr for Name {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_end_matches('/');
        match trimmed.rsplit_once('/') {
            Some((head, last)) if last.starts_with(SEGMENT_MARKER) => {
                let seg = last[SEGMENT_MARKER.len()..].parse::<u64>()?;
                Ok(Name::new(head).append_segment(seg))
            }
            _ => Ok(Name::new(trimmed)),
        }
    }
}
