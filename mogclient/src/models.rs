//! Data models for the mog server API
//!
//! Field names follow the server's JSON encoding (PascalCase).

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Song identifiers
// ============================================================================

/// Identifies a song as a `(protocol, id)` pair
///
/// Serialized as `"protocol|id"`. The server also emits the two-element array
/// form `["protocol", "id"]`, which is accepted on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SongId {
    pub protocol: String,
    pub id: String,
}

impl SongId {
    pub fn new(protocol: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            id: id.into(),
        }
    }

    /// True for the zero id the server reports when nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.protocol.is_empty() && self.id.is_empty()
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.protocol, self.id)
    }
}

impl FromStr for SongId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('|') {
            Some((protocol, id)) => Ok(SongId::new(protocol, id)),
            None => Err(Error::InvalidSongId(s.to_string())),
        }
    }
}

impl Serialize for SongId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SongId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Joined(String),
            Pair([String; 2]),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Joined(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Pair([protocol, id]) => Ok(SongId { protocol, id }),
        }
    }
}

// ============================================================================
// Playback status
// ============================================================================

/// Playback state as reported by the server (integer on the wire)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlaybackState {
    Play,
    #[default]
    Stop,
    Pause,
}

impl TryFrom<u8> for PlaybackState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PlaybackState::Play),
            1 => Ok(PlaybackState::Stop),
            2 => Ok(PlaybackState::Pause),
            other => Err(format!("unknown playback state: {}", other)),
        }
    }
}

impl From<PlaybackState> for u8 {
    fn from(state: PlaybackState) -> Self {
        match state {
            PlaybackState::Play => 0,
            PlaybackState::Stop => 1,
            PlaybackState::Pause => 2,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackState::Play => "play",
            PlaybackState::Stop => "stop",
            PlaybackState::Pause => "pause",
        })
    }
}

/// Response of `GET /api/status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    /// Playlist revision; bumped on every playlist change
    pub playlist: i64,
    pub state: PlaybackState,
    /// Current song
    #[serde(default)]
    pub song: SongId,
    /// Elapsed time of the current song, in seconds
    pub elapsed: f64,
    /// Duration of the current song, in seconds
    pub time: f64,
}

impl Status {
    /// Elapsed/total as `m:ss / m:ss`
    pub fn progress(&self) -> String {
        format!(
            "{} / {}",
            format_seconds(self.elapsed),
            format_seconds(self.time)
        )
    }
}

/// Formats a duration in seconds as `m:ss`
pub fn format_seconds(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

// ============================================================================
// Song metadata
// ============================================================================

/// Entry of `GET /api/song/info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SongInfo {
    /// Song length in nanoseconds
    pub time: u64,
    pub artist: String,
    pub title: String,
    pub album: String,
    pub track: i64,
}

impl SongInfo {
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.time)
    }

    /// `Artist - Title`, or whichever of the two is known
    pub fn label(&self) -> String {
        match (self.artist.is_empty(), self.title.is_empty()) {
            (false, false) => format!("{} - {}", self.artist, self.title),
            (true, false) => self.title.clone(),
            (false, true) => self.artist.clone(),
            (true, true) => String::new(),
        }
    }
}

// ============================================================================
// Playlist & protocols
// ============================================================================

/// Ordered list of songs queued on the server
pub type Playlist = Vec<SongId>;

/// Configured protocol instances: protocol name -> parameters
pub type Protocols = BTreeMap<String, Vec<String>>;

/// Response of `/api/playlist/change`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistChange {
    #[serde(rename = "PlaylistId")]
    pub playlist_id: i64,
    #[serde(rename = "Errors", default, deserialize_with = "null_as_empty")]
    pub errors: Vec<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Commands
// ============================================================================

/// Playback commands accepted by `/api/cmd/<name>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Play,
    Stop,
    Next,
    Prev,
    Pause,
    Random,
    Repeat,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Play,
        Command::Stop,
        Command::Next,
        Command::Prev,
        Command::Pause,
        Command::Random,
        Command::Repeat,
    ];

    /// Path segment used by the command endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Play => "play",
            Command::Stop => "stop",
            Command::Next => "next",
            Command::Prev => "prev",
            Command::Pause => "pause",
            Command::Random => "random",
            Command::Repeat => "repeat",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Command::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}
