//! Single-flight audio stream toggle
//!
//! [`StreamToggle`] owns at most one outstanding request to the server's
//! stream endpoint. Enabling while a request is in flight does nothing;
//! disabling cancels it before returning.
//!
//! ```text
//!   Idle ──enable──▶ Streaming ──enable──▶ Streaming
//!    ▲                  │
//!    └─────disable──────┘        (request done) ──▶ Idle
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::MogClient;
use crate::decoder::AudioDecoder;
use crate::events::{EventBus, MogEvent};

/// Handle on the in-flight stream request
struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct StreamToggle {
    client: MogClient,
    decoder: Arc<dyn AudioDecoder>,
    events: Option<EventBus>,
    enabled: bool,
    active: Option<StreamHandle>,
    requests_issued: usize,
}

impl StreamToggle {
    /// A disabled toggle; nothing is requested until [`set_enabled`](Self::set_enabled)
    pub fn new(client: MogClient, decoder: Arc<dyn AudioDecoder>) -> Self {
        Self {
            client,
            decoder,
            events: None,
            enabled: false,
            active: None,
            requests_issued: 0,
        }
    }

    /// Report stream failures as [`MogEvent::Error`] on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Switch streaming on or off
    ///
    /// Returns immediately; the request itself runs on a spawned task, so
    /// this must be called from within a Tokio runtime. On return at most
    /// one request is outstanding and [`is_enabled`](Self::is_enabled)
    /// equals `desired`.
    pub fn set_enabled(&mut self, desired: bool) {
        self.enabled = desired;

        if !desired {
            if let Some(handle) = self.active.take() {
                if !handle.is_finished() {
                    tracing::debug!("Aborted in-flight stream request");
                }
                handle.cancel.cancel();
            }
            tracing::info!("Browser stream stopped");
            return;
        }

        if let Some(handle) = &self.active {
            if !handle.is_finished() {
                return;
            }
        }

        self.active = Some(self.start_request());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True while a stream request is in flight
    pub fn is_streaming(&self) -> bool {
        self.active.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Number of stream requests started over the toggle's lifetime
    pub fn requests_issued(&self) -> usize {
        self.requests_issued
    }

    /// Cancel any active request
    pub fn shutdown(&mut self) {
        if self.enabled || self.active.is_some() {
            self.set_enabled(false);
        }
    }

    fn start_request(&mut self) -> StreamHandle {
        self.requests_issued += 1;
        tracing::info!(request = self.requests_issued, "Starting browser stream");

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let client = self.client.clone();
        let decoder = self.decoder.clone();
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!("Stream request cancelled");
                    return;
                }
                result = client.fetch_stream() => result,
            };

            match result {
                Ok(payload) => {
                    tracing::debug!(bytes = payload.len(), "Stream payload received");
                    // the request is over once the payload is in; decoding
                    // runs on its own so it does not keep the handle busy
                    let decode = tokio::task::spawn_blocking(move || decoder.decode(payload));
                    tokio::spawn(async move {
                        if let Err(e) = decode.await {
                            tracing::error!("Audio decoder panicked: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!("Audio stream failed: {}", e);
                    if let Some(events) = events {
                        events.publish(MogEvent::Error(format!("audio stream: {}", e)));
                    }
                }
            }
        });

        StreamHandle { cancel, task }
    }
}

impl Drop for StreamToggle {
    fn drop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel.cancel();
        }
    }
}
