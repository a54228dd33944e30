//! Status polling
//!
//! Keeps the event bus in sync with the server by polling `/api/status`.
//! The playlist is only re-fetched when the status reports a new playlist
//! revision, and an `Active` event is emitted whenever the current song
//! changes.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::MogClient;
use crate::error::Result;
use crate::events::{EventBus, MogEvent};
use crate::models::Status;

pub struct StatusPoller {
    client: MogClient,
    events: EventBus,
    interval: Duration,
    last: Option<Status>,
    failing: bool,
}

impl StatusPoller {
    pub fn new(client: MogClient, events: EventBus, interval: Duration) -> Self {
        Self {
            client,
            events,
            interval,
            last: None,
            failing: false,
        }
    }

    /// Run on a new task until `stop` is cancelled
    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(stop))
    }

    /// Poll until `stop` is cancelled
    ///
    /// Cancellation also interrupts a fetch that is still pending.
    pub async fn run(mut self, stop: CancellationToken) {
        tracing::debug!(interval = ?self.interval, "Status poller started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::select! {
            biased;
            _ = stop.cancelled() => {
                tracing::debug!("Status poller stopped before the initial state was out");
                return;
            }
            _ = async {
                self.publish_initial().await;
                // the first tick fires immediately and the initial state is already out
                ticker.tick().await;
            } => {}
        }

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = async {
                    ticker.tick().await;
                    self.poll_once().await;
                } => {}
            }
        }
        tracing::debug!("Status poller stopped");
    }

    /// Publish everything a fresh subscriber needs
    async fn publish_initial(&mut self) {
        match self.client.playlist().await {
            Ok(playlist) => self.events.publish(MogEvent::Playlist(playlist)),
            Err(e) => self.report(e),
        }
        match self.client.protocols().await {
            Ok(protocols) => self.events.publish(MogEvent::Protocols(protocols)),
            Err(e) => self.report(e),
        }
        match self.client.list().await {
            Ok(tracks) => self.events.publish(MogEvent::Tracks(tracks)),
            Err(e) => self.report(e),
        }
        match self.client.status().await {
            Ok(status) => self.accept_status(status, false).await,
            Err(e) => self.report(e),
        }
    }

    /// One polling round
    pub async fn poll_once(&mut self) {
        match self.client.status().await {
            Ok(status) => {
                if self.failing {
                    tracing::info!("Server reachable again");
                    self.failing = false;
                }
                self.accept_status(status, true).await;
            }
            Err(e) => self.report(e),
        }
    }

    async fn accept_status(&mut self, status: Status, refresh_playlist: bool) {
        let previous = self.last.replace(status.clone());

        let song_changed = previous.as_ref().map(|p| &p.song) != Some(&status.song);
        let playlist_changed =
            refresh_playlist && previous.as_ref().is_some_and(|p| p.playlist != status.playlist);

        self.events.publish(MogEvent::Status(status.clone()));

        if song_changed {
            tracing::debug!(song = %status.song, "Active song changed");
            self.events.publish(MogEvent::Active(status.song));
        }

        if playlist_changed {
            if let Err(e) = self.refresh_playlist().await {
                self.report(e);
            }
        }
    }

    async fn refresh_playlist(&self) -> Result<()> {
        let playlist = self.client.playlist().await?;
        self.events.publish(MogEvent::Playlist(playlist));
        Ok(())
    }

    /// Publish a failure once per outage; repeats only go to the log
    fn report(&mut self, error: crate::error::Error) {
        if self.failing {
            tracing::debug!("Status poll still failing: {}", error);
            return;
        }
        tracing::warn!("Status poll failed: {}", error);
        self.failing = true;
        self.events.publish(MogEvent::Error(error.to_string()));
    }
}
