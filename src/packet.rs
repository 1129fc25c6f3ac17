//! The packet module, containing names, requests, responses and negative acknowledgments.
//! packet 模块，包含名称、请求、响应和否定确认的定义。

pub mod interest;
pub mod nack;
pub mod name;

pub use interest::{Data, Interest};
pub use nack::NackReason;
pub use name::Name;
