//! Writes the pipeline's window, RTT and rate samples as tab-separated tables.
//!
//! 将流水线的窗口、RTT 和速率样本写成制表符分隔的表格。

use crate::core::event::{Connection, PipelineEvents};
use std::io::{self, Write};
use tracing::warn;

/// Subscribes three sinks to a pipeline's events.
///
/// Write errors are logged and never interrupt the fetch.
///
/// 将三个输出订阅到流水线的事件上。写入错误只会被记录，不会中断获取。
pub struct StatisticsCollector<C, R, P> {
    cwnd: C,
    rtt: R,
    rate: P,
}

/// Handles for the three subscriptions, usable with [`crate::core::event::Signal::disconnect`].
///
/// 三个订阅的句柄。
#[derive(Debug, Clone, Copy)]
pub struct StatisticsConnections {
    pub cwnd: Connection,
    pub rtt: Connection,
    pub rate: Connection,
}

impl<C, R, P> StatisticsCollector<C, R, P>
where
    C: Write + Send + 'static,
    R: Write + Send + 'static,
    P: Write + Send + 'static,
{
    /// Writes the table headers.
    ///
    /// 写入表头。
    pub fn new(mut cwnd: C, mut rtt: R, mut rate: P) -> io::Result<Self> {
        writeln!(cwnd, "time\tcwndsize")?;
        writeln!(rtt, "segment\ttime\trtt\trttvar\tsrtt\trto")?;
        writeln!(rate, "time\tpps\tkbps")?;
        Ok(Self { cwnd, rtt, rate })
    }

    /// Moves the sinks into handlers attached to `events`.
    ///
    /// 将输出移入挂接到 `events` 上的处理函数。
    pub fn attach(self, events: &mut PipelineEvents) -> StatisticsConnections {
        let Self {
            mut cwnd,
            mut rtt,
            mut rate,
        } = self;

        let cwnd = events.window_changed.connect(move |change| {
            let line = writeln!(cwnd, "{}\t{}", change.elapsed.as_secs_f64(), change.window);
            log_write_error("cwnd", line);
        });
        let rtt = events.rtt_sampled.connect(move |sample| {
            let line = writeln!(
                rtt,
                "{}\t{}\t{}\t{}\t{}\t{}",
                sample.segment,
                sample.now,
                millis(sample.rtt),
                millis(sample.rtt_var),
                millis(sample.srtt),
                millis(sample.rto),
            );
            log_write_error("rtt", line);
        });
        let rate = events.rate_sampled.connect(move |sample| {
            let line = writeln!(
                rate,
                "{}\t{}\t{}",
                sample.now, sample.packets_per_second, sample.kilobits_per_second
            );
            log_write_error("rate", line);
        });

        StatisticsConnections { cwnd, rtt, rate }
    }
}

fn millis(duration: std::time::Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

fn log_write_error(table: &'static str, result: io::Result<()>) {
    if let Err(error) = result {
        warn!(table, %error, "Failed to write statistics");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::WindowChange;
    use crate::core::reliability::{rate::RateSample, rtt::RttSample};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// A `Write` whose contents stay readable after it was moved into a handler.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

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
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_headers_and_rows() {
        let (cwnd, rtt, rate) = (SharedBuf::default(), SharedBuf::default(), SharedBuf::default());
        let mut events = PipelineEvents::default();
        StatisticsCollector::new(cwnd.clone(), rtt.clone(), rate.clone())
            .unwrap()
            .attach(&mut events);

        events.window_changed.emit(&WindowChange {
            elapsed: Duration::from_millis(1500),
            window: 4.5,
        });
        events.rtt_sampled.emit(&RttSample {
            segment: 7,
            now: 1.25,
            rtt: Duration::from_millis(40),
            rtt_var: Duration::from_millis(10),
            srtt: Duration::from_millis(50),
            rto: Duration::from_millis(200),
        });
        events.rate_sampled.emit(&RateSample {
            now: 0.5,
            packets_per_second: 20.0,
            kilobits_per_second: 160.0,
        });

        assert_eq!(cwnd.text(), "time\tcwndsize\n1.5\t4.5\n");
        assert_eq!(rtt.text(), "segment\ttime\trtt\trttvar\tsrtt\trto\n7\t1.25\t40\t10\t50\t200\n");
        assert_eq!(rate.text(), "time\tpps\tkbps\n0.5\t20\t160\n");
    }

    #[test]
    fn test_header_failure_is_reported() {
        let result = StatisticsCollector::new(FailingWriter, SharedBuf::default(), SharedBuf::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_disconnect_stops_writing() {
        let rate = SharedBuf::default();
        let mut events = PipelineEvents::default();
        let connections = StatisticsCollector::new(SharedBuf::default(), SharedBuf::default(), rate.clone())
            .unwrap()
            .attach(&mut events);

        assert!(events.rate_sampled.disconnect(connections.rate));
        events.rate_sampled.emit(&RateSample {
            now: 1.0,
            packets_per_second: 1.0,
            kilobits_per_second: 1.0,
        });
        assert_eq!(rate.text(), "time\tpps\tkbps\n");
    }
}
