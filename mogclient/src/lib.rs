//! Client library for the mog music server
//!
//! This crate talks to a running mog server over its HTTP API: playback
//! commands, playlist and protocol management, server state, and the
//! browser audio stream.
//!
//! # Features
//!
//! - **Commands**: play, stop, next, prev, pause, random, repeat
//! - **Server state**: status, playlist, protocols and the track list
//! - **Single-flight streaming**: [`StreamToggle`] keeps at most one request
//!   to `/api/stream` outstanding and cancels it when switched off
//! - **Typed events**: [`EventBus`] fans [`MogEvent`]s out to any number of
//!   subscribers and remembers the last value of each kind
//! - **Polling**: [`StatusPoller`] keeps the bus in sync with the server
//! - **Configuration Extension**: [`MogConfigExt`] adds the client settings
//!   to `mogconfig::Config`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mogclient::{Command, MogSession, SymphoniaDecoder};
//! use mogconfig::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(Config::load_config("")?);
//!     let (decoder, _pcm) = SymphoniaDecoder::new();
//!
//!     let mut session = MogSession::init(config, Arc::new(decoder))?;
//!     let events = session.events().subscribe();
//!     session.start_polling();
//!
//!     session.send_command(Command::Play).await?;
//!     session.set_streaming(true);
//!
//!     if let Ok(event) = events.recv() {
//!         println!("{:?}", event);
//!     }
//!
//!     session.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Failures
//!
//! Requests are never retried. Command failures are returned to the caller
//! and also published as [`MogEvent::Error`] by [`MogSession`]; stream
//! failures only show up as events since nobody awaits the stream.

pub mod client;
pub mod config_ext;
pub mod decoder;
pub mod error;
pub mod events;
pub mod models;
pub mod poller;
pub mod session;
pub mod stream;

// Re-exports
pub use client::{ClientBuilder, MogClient};
pub use config_ext::MogConfigExt;
pub use decoder::{decode_payload, AudioDecoder, DecodedAudio, SymphoniaDecoder};
pub use error::{Error, Result};
pub use events::{EventBus, EventKind, EventStore, MogEvent, StoreSnapshot};
pub use models::{
    format_seconds, Command, PlaybackState, Playlist, PlaylistChange, Protocols, SongId, SongInfo,
    Status,
};
pub use poller::StatusPoller;
pub use session::MogSession;
pub use stream::StreamToggle;
