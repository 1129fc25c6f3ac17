//! Common testing infrastructure for pipeline tests.

use super::pipeline::Pipeline;
use crate::{
    config::Config,
    congestion::new_controller,
    core::reliability::{rate::RateEstimator, rtt::RttEstimator},
    packet::{Data, Interest, NackReason, Name},
    transport::{Outcome, RequestId, Transport, TransportEvent},
};
use bytes::Bytes;
use tokio::time::Instant;

pub const PREFIX: &str = "/test/content";

/// A transport that records every call instead of sending anything.
#[derive(Debug, Default)]
pub struct MockTransport {
    next_id: u64,
    pub expressed: Vec<(RequestId, Interest)>,
    pub removed: Vec<RequestId>,
}

impl Transport for MockTransport {
    fn express_interest(&mut self, interest: Interest) -> RequestId {
        self.next_id += 1;
        let request = RequestId(self.next_id);
        self.expressed.push((request, interest));
        request
    }

    fn remove_pending_interest(&mut self, request: RequestId) {
        self.removed.push(request);
    }
}

impl MockTransport {
    /// Segment numbers in the order they were requested.
    pub fn requested_segments(&self) -> Vec<u64> {
        self.expressed
            .iter()
            .filter_map(|(_, interest)| interest.name.segment())
            .collect()
    }

    /// How often `seg` was requested.
    pub fn request_count(&self, seg: u64) -> usize {
        self.requested_segments()
            .into_iter()
            .filter(|s| *s == seg)
            .count()
    }

    /// The most recent request for `seg`.
    pub fn last_request(&self, seg: u64) -> Option<RequestId> {
        self.expressed
            .iter()
            .rev()
            .find(|(_, interest)| interest.name.segment() == Some(seg))
            .map(|(request, _)| *request)
    }

    /// The first request ever made for `seg`.
    pub fn first_request(&self, seg: u64) -> Option<RequestId> {
        self.expressed
            .iter()
            .find(|(_, interest)| interest.name.segment() == Some(seg))
            .map(|(request, _)| *request)
    }
}

pub fn name(seg: u64) -> Name {
    Name::new(PREFIX).append_segment(seg)
}

/// A 100 byte segment, optionally carrying the final segment number.
pub fn segment(seg: u64, final_segment: Option<u64>) -> Data {
    let data = Data::new(name(seg), Bytes::from(vec![seg as u8; 100]));
    match final_segment {
        Some(last) => data.with_final_segment(last),
        None => data,
    }
}

pub fn new_pipeline(config: Config) -> Pipeline<MockTransport> {
    let congestion_control = new_controller(&config.congestion_control);
    let rtt = Box::new(RttEstimator::new(config.rtt.clone()));
    let rate = RateEstimator::new(config.pipeline.rate_interval);
    Pipeline::new(config, MockTransport::default(), congestion_control, rtt, rate).unwrap()
}

/// Creates a pipeline and starts it with segment `first` of unknown length.
pub fn started_pipeline(config: Config, first: u64, now: Instant) -> Pipeline<MockTransport> {
    let mut pipeline = new_pipeline(config);
    pipeline.start(segment(first, None), now).unwrap();
    pipeline
}

/// Answers the latest request for `seg` with data.
pub fn respond(
    pipeline: &mut Pipeline<MockTransport>,
    seg: u64,
    final_segment: Option<u64>,
    now: Instant,
) {
    let request = pipeline.transport().last_request(seg).unwrap();
    respond_to(pipeline, request, segment(seg, final_segment), now);
}

pub fn respond_to(pipeline: &mut Pipeline<MockTransport>, request: RequestId, data: Data, now: Instant) {
    let event = TransportEvent {
        request,
        name: data.name.clone(),
        outcome: Outcome::Data(data),
    };
    pipeline.handle_event(event, now);
}

/// Answers the latest request for `seg` with a Nack.
pub fn nack(pipeline: &mut Pipeline<MockTransport>, seg: u64, reason: NackReason, now: Instant) {
    let request = pipeline.transport().last_request(seg).unwrap();
    nack_request(pipeline, request, seg, reason, now);
}

pub fn nack_request(
    pipeline: &mut Pipeline<MockTransport>,
    request: RequestId,
    seg: u64,
    reason: NackReason,
    now: Instant,
) {
    let event = TransportEvent {
        request,
        name: name(seg),
        outcome: Outcome::Nack(reason),
    };
    pipeline.handle_event(event, now);
}

/// Reports the latest request for `seg` as expired.
pub fn expire(pipeline: &mut Pipeline<MockTransport>, seg: u64, now: Instant) {
    let request = pipeline.transport().last_request(seg).unwrap();
    let event = TransportEvent {
        request,
        name: name(seg),
        outcome: Outcome::Expired,
    };
    pipeline.handle_event(event, now);
}
