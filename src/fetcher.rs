//! 驱动单个流水线的异步事件循环
//! The async event loop driving a single pipeline
//!
//! 循环在传输结果和流水线的下一个定时器截止时间之间进行 `select!`，
//! 每一步都以 `Instant::now()` 调用同步的流水线。
//!
//! The loop `select!`s between transport outcomes and the pipeline's next
//! timer deadline, calling into the synchronous pipeline with
//! `Instant::now()` at each step.

use crate::config::Config;
use crate::congestion::new_controller;
use crate::core::consumer::Consumer;
use crate::core::pipeline::{FetchSummary, Pipeline};
use crate::core::reliability::{rate::RateEstimator, rtt::RttEstimator};
use crate::error::{Error, Result};
use crate::packet::Data;
use crate::transport::{Transport, TransportEvent};
use std::io::{self, Write};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace, warn};

/// 从外部取消正在运行的获取
/// Cancels a running fetch from outside
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // The fetcher may already have finished.
        let _ = self.tx.send(true);
    }
}

/// 将一个 [`Pipeline`] 连接到传输结果通道上运行
/// Runs a [`Pipeline`] against a channel of transport outcomes
pub struct Fetcher<T: Transport> {
    pipeline: Pipeline<T>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    cancel_rx: watch::Receiver<bool>,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(
        pipeline: Pipeline<T>,
        events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> (Self, CancelHandle) {
        let (tx, cancel_rx) = watch::channel(false);
        (
            Self {
                pipeline,
                events_rx,
                cancel_rx,
            },
            CancelHandle { tx },
        )
    }

    /// 使用配置所选的窗口策略和默认估算器构建流水线
    /// Build the pipeline with the configured window policy and the default estimators
    pub fn from_config(
        config: Config,
        transport: T,
        events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<(Self, CancelHandle)> {
        let congestion_control = new_controller(&config.congestion_control);
        let rtt = Box::new(RttEstimator::new(config.rtt.clone()));
        let rate = RateEstimator::new(config.pipeline.rate_interval);
        let pipeline = Pipeline::new(config, transport, congestion_control, rtt, rate)?;
        Ok(Self::new(pipeline, events_rx))
    }

    pub fn pipeline(&self) -> &Pipeline<T> {
        &self.pipeline
    }

    /// 用于在运行前挂接事件处理函数
    /// Used to attach event handlers before running
    pub fn pipeline_mut(&mut self) -> &mut Pipeline<T> {
        &mut self.pipeline
    }

    /// 运行获取直到完成、失败或取消
    /// Run the fetch until it completes, fails or is cancelled
    pub async fn run(&mut self, first: Data) -> Result<FetchSummary> {
        self.drive::<io::Sink>(first, None).await
    }

    /// 运行获取，并将内容按顺序写入 `consumer`
    /// Run the fetch, writing the content in order into `consumer`
    pub async fn run_into<W: Write>(
        &mut self,
        first: Data,
        consumer: &mut Consumer<W>,
    ) -> Result<FetchSummary> {
        let summary = self.drive(first, Some(&mut *consumer)).await?;
        consumer.flush()?;
        Ok(summary)
    }

    async fn drive<W: Write>(
        &mut self,
        first: Data,
        mut consumer: Option<&mut Consumer<W>>,
    ) -> Result<FetchSummary> {
        let (data_tx, mut data_rx) = mpsc::unbounded_channel::<Data>();
        let connection = if consumer.is_some() {
            Some(self.pipeline.events_mut().data_received.connect(move |data| {
                // The receiver lives until the end of `drive`.
                let _ = data_tx.send(data.clone());
            }))
        } else {
            None
        };

        let result = self.event_loop(first, &mut data_rx, &mut consumer).await;

        if let Some(connection) = connection {
            self.pipeline.events_mut().data_received.disconnect(connection);
        }
        result
    }

    async fn event_loop<W: Write>(
        &mut self,
        first: Data,
        data_rx: &mut mpsc::UnboundedReceiver<Data>,
        consumer: &mut Option<&mut Consumer<W>>,
    ) -> Result<FetchSummary> {
        self.pipeline.start(first, Instant::now())?;
        let mut cancel_open = true;

        loop {
            self.deliver(data_rx, consumer)?;
            if let Some(result) = self.pipeline.take_result() {
                return result;
            }

            let deadline = self.pipeline.next_deadline();
            trace!(?deadline, in_flight = self.pipeline.in_flight(), "Fetcher waiting for events");
            tokio::select! {
                biased;

                // 1. 外部取消
                // External cancellation
                changed = self.cancel_rx.changed(), if cancel_open => {
                    match changed {
                        Ok(()) if *self.cancel_rx.borrow() => {
                            debug!("Cancellation requested");
                            self.pipeline.cancel();
                        }
                        Ok(()) => {}
                        Err(_) => cancel_open = false,
                    }
                }

                // 2. 传输结果，批量处理
                // Transport outcomes, handled in a batch
                event = self.events_rx.recv() => {
                    let Some(event) = event else {
                        warn!("Transport outcome channel closed, cancelling fetch");
                        self.pipeline.cancel();
                        let _ = self.pipeline.take_result();
                        return Err(Error::ChannelClosed);
                    };
                    let now = Instant::now();
                    self.pipeline.handle_event(event, now);
                    while let Ok(event) = self.events_rx.try_recv() {
                        self.pipeline.handle_event(event, now);
                    }
                }

                // 3. 定时器
                // Timers
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.pipeline.on_timer(Instant::now());
                }
            }
        }
    }

    fn deliver<W: Write>(
        &mut self,
        data_rx: &mut mpsc::UnboundedReceiver<Data>,
        consumer: &mut Option<&mut Consumer<W>>,
    ) -> Result<()> {
        let Some(consumer) = consumer.as_deref_mut() else {
            return Ok(());
        };
        while let Ok(data) = data_rx.try_recv() {
            if let Err(error) = consumer.handle_data(&data) {
                warn!(%error, "Consumer failed, cancelling fetch");
                self.pipeline.cancel();
                let _ = self.pipeline.take_result();
                return Err(error);
            }
        }
        Ok(())
    }
}
