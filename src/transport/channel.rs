//! A transport that forwards requests to an async network task over a channel.
//!
//! 通过通道将请求转发给异步网络任务的传输层。

use super::{RequestId, Transport};
use crate::packet::Interest;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Commands for the network task.
///
/// 网络任务的命令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Send `interest`; its outcome must be reported under `request`.
    /// 发送 `interest`；其结果必须以 `request` 报告。
    Express {
        request: RequestId,
        interest: Interest,
    },
    /// Withdraw a previously sent request.
    /// 撤回先前发送的请求。
    Cancel(RequestId),
}

/// A [`Transport`] that hands every operation to whoever holds the receiver.
///
/// 将每个操作交给接收端持有者的 [`Transport`]。
#[derive(Debug)]
pub struct ChannelTransport {
    next_request: u64,
    command_tx: mpsc::UnboundedSender<TransportCommand>,
}

impl ChannelTransport {
    /// Creates the transport and the receiver the network task consumes.
    ///
    /// 创建传输层以及网络任务消费的接收端。
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (
            Self {
                next_request: 1,
                command_tx,
            },
            command_rx,
        )
    }
}

impl Transport for ChannelTransport {
    fn express_interest(&mut self, interest: Interest) -> RequestId {
        let request = RequestId(self.next_request);
        self.next_request += 1;
        trace!(%request, name = %interest.name, "Expressing interest");
        if self
            .command_tx
            .send(TransportCommand::Express { request, interest })
            .is_err()
        {
            warn!(%request, "Network task is gone, request dropped");
        }
        request
    }

    fn remove_pending_interest(&mut self, request: RequestId) {
        // The network task may already be gone during shutdown.
        let _ = self.command_tx.send(TransportCommand::Cancel(request));
    }
}
