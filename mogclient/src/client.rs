//! HTTP client for the mog server API
//!
//! Commands and mutations are POSTed form-encoded; state is read back with
//! plain GETs returning JSON.
//!
//! # Example
//!
//! ```no_run
//! use mogclient::{Command, MogClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MogClient::builder()
//!         .base_url("http://localhost:6601")
//!         .build()?;
//!
//!     client.command(Command::Pause).await?;
//!     let status = client.status().await?;
//!     println!("{} {}", status.state, status.progress());
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::models::{Command, Playlist, PlaylistChange, Protocols, SongId, SongInfo, Status};
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Default mog server address
pub const DEFAULT_BASE_URL: &str = "http://localhost:6601";

/// Default timeout for API requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for the audio stream request
///
/// The stream endpoint only completes once the server has sent the whole
/// payload, so it gets a much longer budget than the API calls.
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 7200;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("mogclient/", env!("CARGO_PKG_VERSION"));

/// Path of the audio stream endpoint
pub const STREAM_PATH: &str = "/api/stream";

/// mog HTTP client
///
/// Stateless and cheap to clone (the underlying `reqwest::Client` shares its
/// connection pool).
#[derive(Debug, Clone)]
pub struct MogClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    stream_timeout: Duration,
}

impl MogClient {
    /// Create a client for `base_url` with default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path
        ))?)
    }

    /// Absolute URL of the audio stream endpoint
    pub fn stream_url(&self) -> Result<Url> {
        self.url(STREAM_PATH)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Send a playback command (`POST /api/cmd/<name>`)
    pub async fn command(&self, cmd: Command) -> Result<()> {
        tracing::debug!(command = %cmd, "Sending command");
        self.post(&format!("/api/cmd/{}", cmd), &[]).await?;
        Ok(())
    }

    /// POST form-encoded `params` to an API path
    ///
    /// Keys may repeat. A 2xx answer is success; any other status becomes
    /// [`Error::Status`] carrying the reason phrase. Nothing is retried.
    pub async fn post(&self, path: &str, params: &[(&str, &str)]) -> Result<Response> {
        let url = self.url(path)?;
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .form(params)
            .send()
            .await?;
        Self::check_status(response)
    }

    /// Replace or edit the server's playlist
    ///
    /// `clear` empties the playlist first; `remove` and `add` are applied in
    /// that order. Unknown ids are reported in [`PlaylistChange::errors`].
    ///
    /// ```no_run
    /// # use mogclient::{MogClient, SongId};
    /// # tokio_test::block_on(async {
    /// let client = MogClient::new("http://localhost:6601")?;
    /// let songs = vec![SongId::new("file", "a.flac"), SongId::new("file", "b.flac")];
    /// let change = client.playlist_change(true, &songs, &[]).await?;
    /// println!("playlist revision {}", change.playlist_id);
    /// # Ok::<(), mogclient::Error>(())
    /// # });
    /// ```
    pub async fn playlist_change(
        &self,
        clear: bool,
        add: &[SongId],
        remove: &[SongId],
    ) -> Result<PlaylistChange> {
        let add: Vec<String> = add.iter().map(SongId::to_string).collect();
        let remove: Vec<String> = remove.iter().map(SongId::to_string).collect();

        let mut params: Vec<(&str, &str)> = Vec::with_capacity(add.len() + remove.len() + 1);
        if clear {
            params.push(("clear", "1"));
        }
        params.extend(remove.iter().map(|id| ("remove", id.as_str())));
        params.extend(add.iter().map(|id| ("add", id.as_str())));

        let response = self.post("/api/playlist/change", &params).await?;
        Ok(response.json().await?)
    }

    /// (Re)load the song list of a protocol with the given parameters
    pub async fn protocol_update(&self, protocol: &str, params: &[String]) -> Result<()> {
        let mut form: Vec<(&str, &str)> = vec![("protocol", protocol)];
        form.extend(params.iter().map(|p| ("params", p.as_str())));
        self.post("/api/protocol/update", &form).await?;
        Ok(())
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Current playback status
    pub async fn status(&self) -> Result<Status> {
        self.get_json("/api/status").await
    }

    /// All songs known to the server
    pub async fn list(&self) -> Result<Vec<SongId>> {
        self.get_json("/api/list").await
    }

    /// Current playlist
    pub async fn playlist(&self) -> Result<Playlist> {
        // an empty playlist is encoded as null
        let playlist: Option<Playlist> = self.get_json("/api/playlist/get").await?;
        Ok(playlist.unwrap_or_default())
    }

    /// Configured protocols and their parameters
    pub async fn protocols(&self) -> Result<Protocols> {
        let protocols: Option<Protocols> = self.get_json("/api/protocol/list").await?;
        Ok(protocols.unwrap_or_default())
    }

    /// Metadata of the given songs, in the same order
    ///
    /// Fails if the server does not know one of them.
    pub async fn song_info(&self, songs: &[SongId]) -> Result<Vec<SongInfo>> {
        if songs.is_empty() {
            return Ok(Vec::new());
        }
        let mut url = self.url("/api/song/info")?;
        url.query_pairs_mut()
            .extend_pairs(songs.iter().map(|s| ("song", s.to_string())));
        let info: Option<Vec<SongInfo>> = self.get_url_json(url).await?;
        Ok(info.unwrap_or_default())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        self.get_url_json(url).await
    }

    async fn get_url_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::trace!("Fetching {}", url);
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let response = Self::check_status(response)?;
        Ok(response.json().await?)
    }

    // ========================================================================
    // Stream
    // ========================================================================

    /// Download the full audio stream payload
    ///
    /// Resolves once the server has finished sending; drop the future to
    /// abort the transfer.
    pub async fn fetch_stream(&self) -> Result<Bytes> {
        let url = self.stream_url()?;
        tracing::debug!("Requesting audio stream: {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.stream_timeout)
            .send()
            .await?;
        let response = Self::check_status(response)?;
        Ok(response.bytes().await?)
    }

    fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            tracing::debug!(%status, url = %response.url(), "Server rejected request");
            Err(Error::status(status))
        }
    }
}

/// Builder for configuring a MogClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    base_url: String,
    timeout: Duration,
    stream_timeout: Duration,
    user_agent: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            stream_timeout: Duration::from_secs(DEFAULT_STREAM_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the server base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the timeout for API requests
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout for the audio stream request
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<MogClient> {
        // reject garbage early rather than on the first request
        Url::parse(&self.base_url)?;

        let client = match self.client {
            Some(client) => client,
            None => Client::builder().user_agent(&self.user_agent).build()?,
        };

        Ok(MogClient {
            client,
            base_url: self.base_url,
            timeout: self.timeout,
            stream_timeout: self.stream_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::default();
        assert_eq!(builder.base_url, DEFAULT_BASE_URL);
        assert_eq!(
            builder.timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let result = MogClient::builder().base_url("not a url").build();
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_url_joining() {
        let client = MogClient::new("http://host:6601/").unwrap();
        assert_eq!(
            client.url("/api/status").unwrap().as_str(),
            "http://host:6601/api/status"
        );
        assert_eq!(
            client.stream_url().unwrap().as_str(),
            "http://host:6601/api/stream"
        );
    }

    #[tokio::test]
    async fn test_command_posts_to_cmd_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cmd/next"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = MogClient::new(server.uri()).unwrap();
        client.command(Command::Next).await.unwrap();
    }

    #[tokio::test]
    async fn test_command_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cmd/pause"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = MogClient::new(server.uri()).unwrap();
        let err = client.command(Command::Pause).await.unwrap_err();
        match err {
            Error::Status {
                status,
                status_text,
            } => {
                assert_eq!(status, 500);
                assert_eq!(status_text, "Internal Server Error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_form_encodes_repeated_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/playlist/change"))
            .and(header(
                "content-type",
                "application/x-www-form-urlencoded",
            ))
            .and(body_string("clear=1&remove=file%7Cb&add=file%7Ca&add=file%7Cc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"PlaylistId": 4, "Errors": ["unknown id: file|c"]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = MogClient::new(server.uri()).unwrap();
        let change = client
            .playlist_change(
                true,
                &[SongId::new("file", "a"), SongId::new("file", "c")],
                &[SongId::new("file", "b")],
            )
            .await
            .unwrap();

        assert_eq!(change.playlist_id, 4);
        assert_eq!(change.errors, vec!["unknown id: file|c".to_string()]);
    }

    #[tokio::test]
    async fn test_state_getters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Playlist": 1, "State": 0, "Song": "file|a", "Elapsed": 1.5, "Time": 10.0
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/playlist/get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/protocol/list"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"file": ["/music"]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["file|a", "file|b"])))
            .mount(&server)
            .await;

        let client = MogClient::new(server.uri()).unwrap();

        let status = client.status().await.unwrap();
        assert_eq!(status.song, SongId::new("file", "a"));

        assert!(client.playlist().await.unwrap().is_empty());

        let protocols = client.protocols().await.unwrap();
        assert_eq!(protocols["file"], vec!["/music".to_string()]);

        assert_eq!(client.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_song_info_sends_every_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/song/info"))
            .and(query_param("song", "file|a.flac"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Time": 61_000_000_000u64, "Artist": "A", "Title": "One", "Album": "X", "Track": 1},
                {"Time": 0, "Artist": "", "Title": "b.flac", "Album": "", "Track": 0}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = MogClient::new(server.uri()).unwrap();
        let info = client
            .song_info(&[SongId::new("file", "a.flac"), SongId::new("file", "b.flac")])
            .await
            .unwrap();

        assert_eq!(info.len(), 2);
        assert_eq!(info[0].label(), "A - One");
        assert_eq!(info[0].duration(), Duration::from_secs(61));
        assert_eq!(info[1].label(), "b.flac");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests[0].url.query(),
            Some("song=file%7Ca.flac&song=file%7Cb.flac")
        );
    }

    #[tokio::test]
    async fn test_song_info_unknown_song() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/song/info"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = MogClient::new(server.uri()).unwrap();
        let err = client
            .song_info(&[SongId::new("file", "gone")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Status { status: 500, .. }));

        // nothing to ask for, nothing sent
        assert!(client.song_info(&[]).await.unwrap().is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_stream_returns_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = MogClient::new(server.uri()).unwrap();
        let payload = client.fetch_stream().await.unwrap();
        assert_eq!(payload.as_ref(), &[1, 2, 3]);
    }
}
