//! 按分段顺序写出内容的消费者
//! Consumer writing content out in segment order
//!
//! 流水线按到达顺序交付分段。消费者缓存乱序到达的分段，
//! 只有当下一个期望的分段号就绪时才写出。
//!
//! The pipeline delivers segments in arrival order. The consumer holds back
//! segments that arrive early and writes only once the next expected segment
//! number is present. Segments past the final segment number are never
//! written, even when they arrived before that number was known.

use crate::error::{Error, Result};
use crate::packet::Data;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::trace;

/// 重排序写出器
/// Reordering writer
#[derive(Debug)]
pub struct Consumer<W: Write> {
    output: W,
    buffered: BTreeMap<u64, Bytes>,
    next_to_write: u64,
    written_bytes: u64,
    final_segment: Option<u64>,
}

impl<W: Write> Consumer<W> {
    pub fn new(output: W) -> Self {
        Self {
            output,
            buffered: BTreeMap::new(),
            next_to_write: 0,
            written_bytes: 0,
            final_segment: None,
        }
    }

    /// 接收一个分段，并写出所有已连续的内容
    /// Accept one segment and write out everything that is now contiguous
    pub fn handle_data(&mut self, data: &Data) -> Result<()> {
        let Some(seg) = data.segment() else {
            return Err(Error::MissingSegment {
                name: data.name.to_string(),
            });
        };
        if self.final_segment.is_none() {
            if let Some(final_segment) = data.final_segment {
                self.final_segment = Some(final_segment);
                if let Some(first_beyond) = final_segment.checked_add(1) {
                    let dropped = self.buffered.split_off(&first_beyond);
                    if !dropped.is_empty() {
                        trace!(final_segment, dropped = dropped.len(), "Dropped segments past the final segment");
                    }
                }
            }
        }
        if self.final_segment.is_some_and(|last| seg > last) {
            trace!(seg, "Segment past the final segment, ignoring");
            return Ok(());
        }
        if seg < self.next_to_write {
            trace!(seg, "Segment already written, ignoring");
            return Ok(());
        }
        self.buffered.entry(seg).or_insert_with(|| data.content.clone());
        self.write_in_order()
    }

    fn write_in_order(&mut self) -> Result<()> {
        while let Some(content) = self.buffered.remove(&self.next_to_write) {
            self.output.write_all(&content)?;
            self.written_bytes += content.len() as u64;
            self.next_to_write += 1;
        }
        Ok(())
    }

    /// 刷新底层输出
    /// Flush the underlying output
    pub fn flush(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }

    /// 下一个要写出的分段号
    /// Next segment number to be written
    pub fn next_segment(&self) -> u64 {
        self.next_to_write
    }

    pub fn buffered_segments(&self) -> usize {
        self.buffered.len()
    }

    pub fn written_bytes(&self) -> u64 {
        self.written_bytes
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}
