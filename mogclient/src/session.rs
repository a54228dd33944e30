//! Client session
//!
//! [`MogSession`] ties together everything a front-end needs: the HTTP
//! client, the event bus and its store, the stream toggle and, once started,
//! the status poller. It is built from a [`mogconfig::Config`] and torn down
//! with [`MogSession::shutdown`].

use std::sync::Arc;
use std::time::Duration;

use mogconfig::Config;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::MogClient;
use crate::config_ext::MogConfigExt;
use crate::decoder::AudioDecoder;
use crate::error::Result;
use crate::events::{EventBus, EventStore, MogEvent};
use crate::models::Command;
use crate::poller::StatusPoller;
use crate::stream::StreamToggle;

struct PollerHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

pub struct MogSession {
    config: Arc<Config>,
    client: MogClient,
    events: EventBus,
    stream: StreamToggle,
    poll_interval: Duration,
    poller: Option<PollerHandle>,
}

impl MogSession {
    /// Build a session from `config`
    ///
    /// Streaming is switched on right away only if
    /// `client.stream.enabled_at_start` is set, so this must run inside a
    /// Tokio runtime.
    pub fn init(config: Arc<Config>, decoder: Arc<dyn AudioDecoder>) -> Result<Self> {
        let server_url = config.get_server_url()?;
        let timeout = config.get_request_timeout()?;

        let client = MogClient::builder()
            .base_url(server_url)
            .timeout(timeout)
            .build()?;

        Self::with_client(config, client, decoder)
    }

    /// Like [`init`](Self::init), but talking through an already built client
    pub fn with_client(
        config: Arc<Config>,
        client: MogClient,
        decoder: Arc<dyn AudioDecoder>,
    ) -> Result<Self> {
        let poll_interval = config.get_poll_interval()?;
        let stream_at_start = config.get_stream_enabled_at_start()?;

        tracing::info!(server = %client.base_url(), "mog session ready");

        let events = EventBus::new();
        let mut stream = StreamToggle::new(client.clone(), decoder).with_events(events.clone());
        if stream_at_start {
            stream.set_enabled(true);
        }

        Ok(Self {
            config,
            client,
            events,
            stream,
            poll_interval,
            poller: None,
        })
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn client(&self) -> &MogClient {
        &self.client
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn store(&self) -> &EventStore {
        self.events.store()
    }

    /// Send a playback command
    ///
    /// A failure is published as [`MogEvent::Error`] before being returned.
    pub async fn send_command(&self, cmd: Command) -> Result<()> {
        match self.client.command(cmd).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(command = %cmd, "Command failed: {}", e);
                self.events.publish(MogEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn set_streaming(&mut self, enabled: bool) {
        self.stream.set_enabled(enabled);
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_streaming()
    }

    pub fn stream(&self) -> &StreamToggle {
        &self.stream
    }

    /// Start the status poller; does nothing if it is already running
    pub fn start_polling(&mut self) {
        if self.poller.as_ref().is_some_and(|p| !p.task.is_finished()) {
            return;
        }
        let stop = CancellationToken::new();
        let task = StatusPoller::new(self.client.clone(), self.events.clone(), self.poll_interval)
            .spawn(stop.clone());
        self.poller = Some(PollerHandle { stop, task });
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.task.is_finished())
    }

    /// Stop polling and any active stream
    pub fn shutdown(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop.cancel();
        }
        self.stream.shutdown();
        tracing::info!("mog session closed");
    }
}

impl Drop for MogSession {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop.cancel();
        }
    }
}
