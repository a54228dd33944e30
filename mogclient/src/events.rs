//! Typed event fan-out
//!
//! Every piece of server state the UI reacts to travels as a [`MogEvent`].
//! [`EventBus::publish`] records the value in the bus' [`EventStore`] and then
//! forwards it to every live subscriber.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::models::{Playlist, Protocols, SongId, Status};

#[derive(Clone, Debug, PartialEq)]
pub enum MogEvent {
    /// The song being played changed
    Active(SongId),
    /// Something failed; the text is meant for the user
    Error(String),
    Playlist(Playlist),
    Protocols(Protocols),
    Status(Status),
    /// All songs known to the server
    Tracks(Vec<SongId>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Active,
    Error,
    Playlist,
    Protocols,
    Status,
    Tracks,
}

impl MogEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MogEvent::Active(_) => EventKind::Active,
            MogEvent::Error(_) => EventKind::Error,
            MogEvent::Playlist(_) => EventKind::Playlist,
            MogEvent::Protocols(_) => EventKind::Protocols,
            MogEvent::Status(_) => EventKind::Status,
            MogEvent::Tracks(_) => EventKind::Tracks,
        }
    }
}

/// Last value seen for each event kind
#[derive(Clone, Debug, Default)]
pub struct StoreSnapshot {
    pub active: Option<SongId>,
    pub error: Option<String>,
    pub playlist: Option<Playlist>,
    pub protocols: Option<Protocols>,
    pub status: Option<Status>,
    pub tracks: Option<Vec<SongId>>,
}

#[derive(Clone, Default)]
pub struct EventStore {
    data: Arc<RwLock<StoreSnapshot>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, event: &MogEvent) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            MogEvent::Active(id) => data.active = Some(id.clone()),
            MogEvent::Error(msg) => data.error = Some(msg.clone()),
            MogEvent::Playlist(p) => data.playlist = Some(p.clone()),
            MogEvent::Protocols(p) => data.protocols = Some(p.clone()),
            MogEvent::Status(s) => data.status = Some(s.clone()),
            MogEvent::Tracks(t) => data.tracks = Some(t.clone()),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> Option<Status> {
        self.snapshot().status
    }

    pub fn active(&self) -> Option<SongId> {
        self.snapshot().active
    }

    pub fn last_error(&self) -> Option<String> {
        self.snapshot().error
    }

    pub fn playlist(&self) -> Option<Playlist> {
        self.snapshot().playlist
    }

    pub fn protocols(&self) -> Option<Protocols> {
        self.snapshot().protocols
    }

    pub fn tracks(&self) -> Option<Vec<SongId>> {
        self.snapshot().tracks
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<MogEvent>>>>,
    store: EventStore,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<MogEvent> {
        let (tx, rx) = unbounded::<MogEvent>();
        {
            let mut subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers.push(tx);
        }
        rx
    }

    pub fn publish(&self, event: MogEvent) {
        tracing::trace!(kind = ?event.kind(), "Publishing event");
        self.store.update(&event);
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(MogEvent::Active(SongId::new("file", "x")));

        assert_eq!(a.try_recv().unwrap().kind(), EventKind::Active);
        assert_eq!(b.try_recv().unwrap().kind(), EventKind::Active);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(MogEvent::Error("boom".to_string()));

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), MogEvent::Error("boom".to_string()));
    }

    #[test]
    fn test_store_keeps_last_value_per_kind() {
        let bus = EventBus::new();
        bus.publish(MogEvent::Error("first".to_string()));
        bus.publish(MogEvent::Error("second".to_string()));
        bus.publish(MogEvent::Tracks(vec![SongId::new("file", "a")]));

        let store = bus.store();
        assert_eq!(store.last_error().as_deref(), Some("second"));
        assert_eq!(store.tracks().unwrap().len(), 1);
        assert!(store.status().is_none());
        assert!(store.playlist().is_none());
    }

    #[test]
    fn test_store_is_shared_between_clones() {
        let bus = EventBus::new();
        let clone = bus.clone();
        clone.publish(MogEvent::Playlist(vec![SongId::new("file", "a")]));
        assert_eq!(bus.store().playlist().unwrap().len(), 1);
    }
}
