//! 流水线核心。
//! The pipeline core.

pub mod consumer;
pub mod event;
pub mod pipeline;
pub mod reliability;
pub mod stats;

#[cfg(test)]
pub mod test_utils;
