//! Recording session lifecycle.
//!
//! One [`RecordingSession`] owns everything for a single capture target: the
//! event source, the correlator (pending requests and the epoch time base),
//! and the snapshot sink. Nothing is process-global.
//!
//! Events are handled synchronously, one at a time, between awaits on the
//! source; stopping at any await point therefore never leaves a half-applied
//! event behind.

use std::future::Future;

use tracing::{debug, info, warn};

use netwatch_types::{LifecycleEvent, NetwatchError, RawEntry};

use crate::correlator::Correlator;
use crate::sink::{PersistenceSink, SinkStats};
use crate::source::EventSource;

/// Why [`RecordingSession::run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The stop future completed.
    Stopped,
    /// The event source closed (e.g. the browser tab went away).
    SourceClosed,
}

/// Counters reported by [`RecordingSession::stop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub events: u64,
    pub records: u64,
    /// Events for request ids with no pending request.
    pub orphans: u64,
    pub navigations: u64,
    /// Requests still in flight when the session stopped; never persisted.
    pub in_flight: usize,
    pub sink: SinkStats,
}

/// A capture of one browser target.
pub struct RecordingSession<S: EventSource> {
    target_id: String,
    source: S,
    correlator: Correlator,
    sink: PersistenceSink,
    summary: SessionSummary,
}

impl<S: EventSource> RecordingSession<S> {
    /// Clear any previous log, then subscribe to the source.
    ///
    /// A failed clear is logged and capture proceeds; a failed subscribe is
    /// fatal and stops the sink before returning.
    pub async fn start(
        target_id: &str,
        source: S,
        sink: PersistenceSink,
    ) -> Result<Self, NetwatchError> {
        Self::start_with(target_id, source, sink, Correlator::new()).await
    }

    /// Like [`start`](Self::start) with a preconfigured correlator.
    pub async fn start_with(
        target_id: &str,
        mut source: S,
        sink: PersistenceSink,
        correlator: Correlator,
    ) -> Result<Self, NetwatchError> {
        if let Err(e) = sink.clear().await {
            warn!(error = %e, "could not clear previous log");
        }

        if let Err(e) = source.subscribe().await {
            if let Err(sink_err) = sink.shutdown().await {
                debug!(error = %sink_err, "sink shutdown after failed subscribe");
            }
            return Err(e);
        }

        info!(target_id, "recording session started");
        Ok(Self {
            target_id: target_id.to_string(),
            source,
            correlator,
            sink,
            summary: SessionSummary::default(),
        })
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Apply one event: update the correlator and tell the sink what changed.
    pub fn handle_event(&mut self, event: LifecycleEvent) {
        self.summary.events += 1;
        debug!(
            kind = event.kind(),
            request_id = event.request_id().unwrap_or("-"),
            "event"
        );

        match event {
            LifecycleEvent::NavigationOccurred { ref url } => {
                info!(url = %url, "page navigated, clearing log");
                self.summary.navigations += 1;
                self.correlator.on_event(event);
                self.sink.clear_now();
            }
            LifecycleEvent::RequestStarted(ref started) => {
                let request_id = started.request_id.clone();
                self.correlator.on_event(event);
                if let Some(pending) = self.correlator.pending(&request_id) {
                    self.sink.append_raw(RawEntry {
                        time: chrono::Utc::now().timestamp_millis(),
                        request_id,
                        method: pending.method.clone(),
                        url: pending.url.clone(),
                        resource_type: pending.resource_type.clone(),
                        relative_start: pending.relative_start,
                        status: None,
                        mime_type: None,
                    });
                }
            }
            LifecycleEvent::ResponseReceived(ref response) => {
                if self.correlator.pending(&response.request_id).is_some() {
                    self.sink.annotate_raw(
                        &response.request_id,
                        response.status,
                        response.mime_type.clone(),
                    );
                    self.correlator.on_event(event);
                } else {
                    self.summary.orphans += 1;
                }
            }
            LifecycleEvent::LoadFinished(_) | LifecycleEvent::LoadFailed(_) => {
                match self.correlator.on_event(event) {
                    Some(record) => {
                        self.summary.records += 1;
                        self.sink.push_record(record);
                    }
                    None => self.summary.orphans += 1,
                }
            }
        }
    }

    /// Process events until `stop` resolves or the source closes.
    pub async fn run_until<F>(&mut self, stop: F) -> RunEnd
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);
        loop {
            tokio::select! {
                biased;

                _ = &mut stop => {
                    info!(target_id = %self.target_id, "stop requested");
                    return RunEnd::Stopped;
                }
                next = self.source.next_event() => match next {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!(target_id = %self.target_id, "event source closed");
                        return RunEnd::SourceClosed;
                    }
                }
            }
        }
    }

    /// Unsubscribe, flush pending writes, and report what was captured.
    ///
    /// In-flight requests are not persisted; the last snapshot on disk
    /// reflects every event handled before this call.
    pub async fn stop(mut self) -> Result<SessionSummary, NetwatchError> {
        if let Err(e) = self.source.unsubscribe().await {
            warn!(error = %e, "unsubscribe failed");
        }
        let mut summary = self.summary;
        summary.in_flight = self.correlator.pending_count();
        summary.sink = self.sink.shutdown().await?;
        info!(
            target_id = %self.target_id,
            events = summary.events,
            records = summary.records,
            in_flight = summary.in_flight,
            "recording session stopped"
        );
        Ok(summary)
    }
}
