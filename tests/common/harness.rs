//! tests/common/harness.rs
use bytes::Bytes;
use chunks_pipeline::packet::{Data, NackReason, Name};
use chunks_pipeline::transport::{
    ChannelTransport, Outcome, RequestId, TransportCommand, TransportEvent,
};
use chunks_pipeline::{CancelHandle, Config, Fetcher};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const PREFIX: &str = "/example/object/v=1";

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chunks_pipeline=debug".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Deterministic pseudo-random content.
pub fn make_content(len: usize) -> Bytes {
    (0..len)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 7)) as u8)
        .collect::<Vec<u8>>()
        .into()
}

/// How the simulated producer treats requests for one segment.
#[derive(Debug, Clone)]
pub enum Fault {
    /// The first `n` requests get no answer.
    Drop(u32),
    /// Every request gets no answer.
    DropAlways,
    /// The first request is answered with this Nack.
    NackOnce(NackReason),
    /// Every request is answered with this Nack.
    NackAlways(NackReason),
}

/// A producer that serves `content` in fixed-size segments after a fixed delay.
#[derive(Debug, Clone)]
pub struct Producer {
    pub content: Bytes,
    pub segment_size: usize,
    pub delay: Duration,
    pub faults: HashMap<u64, Fault>,
    /// Whether every Data carries the final segment number. Otherwise only the last one does.
    pub announce_final: bool,
}

/// What the producer saw.
#[derive(Debug, Default)]
pub struct ProducerLog {
    pub requests: HashMap<u64, u32>,
    pub cancelled: HashSet<RequestId>,
}

impl Producer {
    pub fn new(content: Bytes, segment_size: usize) -> Self {
        Self {
            content,
            segment_size,
            delay: Duration::from_millis(20),
            faults: HashMap::new(),
            announce_final: true,
        }
    }

    pub fn with_fault(mut self, seg: u64, fault: Fault) -> Self {
        self.faults.insert(seg, fault);
        self
    }

    pub fn final_segment(&self) -> u64 {
        (self.content.len().max(1) as u64 - 1) / self.segment_size as u64
    }

    pub fn segment(&self, seg: u64) -> Option<Data> {
        if seg > self.final_segment() {
            return None;
        }
        let start = seg as usize * self.segment_size;
        let end = (start + self.segment_size).min(self.content.len());
        let data = Data::new(
            Name::new(PREFIX).append_segment(seg),
            self.content.slice(start..end),
        );
        Some(if self.announce_final || seg == self.final_segment() {
            data.with_final_segment(self.final_segment())
        } else {
            data
        })
    }

    fn answer(&self, seg: u64, attempt: u32) -> Option<Outcome> {
        match self.faults.get(&seg) {
            Some(Fault::Drop(n)) if attempt <= *n => return None,
            Some(Fault::DropAlways) => return None,
            Some(Fault::NackOnce(reason)) if attempt == 1 => {
                return Some(Outcome::Nack(reason.clone()));
            }
            Some(Fault::NackAlways(reason)) => return Some(Outcome::Nack(reason.clone())),
            _ => {}
        }
        Some(match self.segment(seg) {
            Some(data) => Outcome::Data(data),
            None => Outcome::Nack(NackReason::NoRoute),
        })
    }

    /// Serves the commands of a `ChannelTransport` until it is dropped.
    pub fn spawn(
        self,
        mut commands: mpsc::UnboundedReceiver<TransportCommand>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> JoinHandle<ProducerLog> {
        tokio::spawn(async move {
            let log = Arc::new(Mutex::new(ProducerLog::default()));
            while let Some(command) = commands.recv().await {
                match command {
                    TransportCommand::Express { request, interest } => {
                        let Some(seg) = interest.name.segment() else {
                            continue;
                        };
                        let attempt = {
                            let mut log = log.lock().unwrap();
                            let count = log.requests.entry(seg).or_insert(0);
                            *count += 1;
                            *count
                        };
                        let Some(outcome) = self.answer(seg, attempt) else {
                            continue;
                        };
                        let events = events.clone();
                        let log = log.clone();
                        let delay = self.delay;
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            if log.lock().unwrap().cancelled.contains(&request) {
                                return;
                            }
                            let _ = events.send(TransportEvent {
                                request,
                                name: interest.name,
                                outcome,
                            });
                        });
                    }
                    TransportCommand::Cancel(request) => {
                        log.lock().unwrap().cancelled.insert(request);
                    }
                }
            }
            let log = log.lock().unwrap();
            ProducerLog {
                requests: log.requests.clone(),
                cancelled: log.cancelled.clone(),
            }
        })
    }
}

/// A fetcher wired to a spawned producer.
pub struct Setup {
    pub fetcher: Fetcher<ChannelTransport>,
    pub cancel: CancelHandle,
    pub producer: JoinHandle<ProducerLog>,
}

pub fn setup(config: Config, producer: Producer) -> Setup {
    init_tracing();
    let (transport, commands) = ChannelTransport::new();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (fetcher, cancel) = Fetcher::from_config(config, transport, events_rx).unwrap();
    let producer = producer.spawn(commands, events_tx);
    Setup {
        fetcher,
        cancel,
        producer,
    }
}

/// A `Write` whose contents stay readable after it was handed away.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}
