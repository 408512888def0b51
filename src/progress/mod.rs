//! Progress events and the channel that transports them
//!
//! The pipeline publishes through the [`ProgressSink`] trait; the
//! [`channel::ProgressChannel`] implements it by forwarding events to a
//! remote counterparty. The two sides are coupled only by job id.

pub mod channel;
pub mod event;

pub use channel::{ChannelConfig, ErrorObserver, ProgressChannel, Subscription};
pub use event::{AnalysisStatus, ProgressEvent, WireMessage};

/// Destination for pipeline progress events
///
/// Implementations must tolerate events arriving from concurrently running
/// jobs; the pipeline guarantees per-job publication order only.
pub trait ProgressSink: Send + Sync {
    /// Deliver one event. Must not block the publishing run.
    fn publish(&self, event: ProgressEvent);
}

/// Sink that discards every event, for runs nobody is watching
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn publish(&self, _event: ProgressEvent) {}
}
