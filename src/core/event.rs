//! Callback registries for the events a pipeline emits.
//!
//! Each event kind has its own [`Signal`]. Any number of independent handlers
//! can attach to it; the emitter does not know who is listening.
//!
//! 流水线所发出事件的回调注册表。每种事件都有各自的 [`Signal`]，
//! 任意数量的独立处理函数可以挂接，发出者并不知道谁在监听。

use crate::core::reliability::{rate::RateSample, rtt::RttSample};
use crate::packet::Data;
use std::fmt;
use std::time::Duration;

/// Handle returned by [`Signal::connect`], used to detach again.
///
/// [`Signal::connect`] 返回的句柄，用于再次分离。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection(u64);

type Handler<T> = Box<dyn FnMut(&T) + Send>;

/// A list of handlers for one event payload type.
///
/// 某一事件负载类型的处理函数列表。
pub struct Signal<T> {
    handlers: Vec<(Connection, Handler<T>)>,
    next_id: u64,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<T> Signal<T> {
    /// Attaches a handler.
    /// 挂接一个处理函数。
    pub fn connect<F>(&mut self, handler: F) -> Connection
    where
        F: FnMut(&T) + Send + 'static,
    {
        let connection = Connection(self.next_id);
        self.next_id += 1;
        self.handlers.push((connection, Box::new(handler)));
        connection
    }

    /// Detaches a handler. Returns `false` if it was not attached.
    /// 分离一个处理函数。如果未挂接则返回 `false`。
    pub fn disconnect(&mut self, connection: Connection) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(c, _)| *c != connection);
        self.handlers.len() != before
    }

    /// Calls every handler, in attach order.
    /// 按挂接顺序调用每个处理函数。
    pub fn emit(&mut self, event: &T) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// The congestion window changed.
///
/// 拥塞窗口发生了变化。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowChange {
    /// Time since the fetch started.
    /// 自获取开始以来的时间。
    pub elapsed: Duration,
    pub window: f64,
}

/// Every event a pipeline emits.
///
/// 流水线发出的所有事件。
#[derive(Debug, Default)]
pub struct PipelineEvents {
    pub window_changed: Signal<WindowChange>,
    pub rtt_sampled: Signal<RttSample>,
    pub rate_sampled: Signal<RateSample>,
    /// An accepted segment, handed to the caller.
    /// 已接受的分段，交给调用者。
    pub data_received: Signal<Data>,
}
