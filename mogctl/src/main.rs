use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use mogclient::{
    format_seconds, Command, DecodedAudio, MogClient, MogConfigExt, MogEvent, MogSession, SongId,
    SongInfo, SymphoniaDecoder,
};
use mogconfig::Config;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mogctl", version, about = "Remote control for a mog music server")]
struct Cli {
    /// Configuration directory (default: $MOG_CONFIG, ./.mog or ~/.mog)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Server URL, overrides client.server_url for this run
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Send a playback command: play, stop, next, prev, pause, random, repeat
    Cmd { name: Command },
    /// Show the playback status
    Status,
    /// Show the current playlist
    Playlist,
    /// Edit the playlist
    Queue {
        /// Empty the playlist first
        #[arg(long)]
        clear: bool,
        /// Song to append, as protocol|id
        #[arg(long)]
        add: Vec<SongId>,
        /// Song to remove, as protocol|id
        #[arg(long)]
        remove: Vec<SongId>,
    },
    /// List configured protocols
    Protocols,
    /// Refresh the songs of a protocol
    Update {
        protocol: String,
        params: Vec<String>,
    },
    /// List every song known to the server
    Tracks,
    /// Fetch the browser stream once and report the decoded audio
    Stream {
        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// Print server events until Ctrl-C
    Watch,
}

fn init_logging(config: &Config) {
    if !config.get_log_enable_console().unwrap_or(true) {
        return;
    }

    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn build_client(config: &Config, server: Option<&str>) -> Result<MogClient> {
    let server_url = match server {
        Some(url) => url.to_string(),
        None => config.get_server_url()?,
    };
    let client = MogClient::builder()
        .base_url(server_url)
        .timeout(config.get_request_timeout()?)
        .build()?;
    Ok(client)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_config(cli.config.as_deref().unwrap_or(""))
        .context("Failed to load configuration")?;
    init_logging(&config);
    let config = Arc::new(config);

    let client = build_client(&config, cli.server.as_deref())?;
    info!("Using mog server at {}", client.base_url());

    match cli.action {
        Action::Cmd { name } => {
            client
                .command(name)
                .await
                .with_context(|| format!("Command '{}' failed", name))?;
        }
        Action::Status => {
            let status = client.status().await?;
            println!("state:    {}", status.state);
            if !status.song.is_empty() {
                let songs = std::slice::from_ref(&status.song);
                let info = describe_songs(&client, songs).await;
                println!("song:     {}", info[0]);
            }
            println!("progress: {}", status.progress());
            println!("playlist: revision {}", status.playlist);
        }
        Action::Playlist => {
            let status = client.status().await?;
            let playlist = client.playlist().await?;
            let labels = describe_songs(&client, &playlist).await;
            for (i, (song, label)) in playlist.iter().zip(labels).enumerate() {
                let marker = if *song == status.song { '>' } else { ' ' };
                println!("{} {:3}  {}", marker, i + 1, label);
            }
        }
        Action::Queue { clear, add, remove } => {
            let change = client.playlist_change(clear, &add, &remove).await?;
            println!("playlist: revision {}", change.playlist_id);
            for error in &change.errors {
                eprintln!("error: {}", error);
            }
        }
        Action::Protocols => {
            for (name, params) in client.protocols().await? {
                println!("{}\t{}", name, params.join(" "));
            }
        }
        Action::Update { protocol, params } => {
            client.protocol_update(&protocol, &params).await?;
        }
        Action::Tracks => {
            for song in client.list().await? {
                println!("{}", song);
            }
        }
        Action::Stream { seconds } => {
            stream(config, client, Duration::from_secs(seconds)).await?;
        }
        Action::Watch => watch(config, client).await?,
    }

    Ok(())
}

/// One display line per song; falls back to the raw ids when the server
/// cannot describe them
async fn describe_songs(client: &MogClient, songs: &[SongId]) -> Vec<String> {
    match client.song_info(songs).await {
        Ok(info) if info.len() == songs.len() => songs
            .iter()
            .zip(info)
            .map(|(song, info)| song_line(song, &info))
            .collect(),
        Ok(_) => songs.iter().map(SongId::to_string).collect(),
        Err(e) => {
            warn!("Could not fetch song info: {}", e);
            songs.iter().map(SongId::to_string).collect()
        }
    }
}

fn song_line(song: &SongId, info: &SongInfo) -> String {
    let label = info.label();
    let mut line = if label.is_empty() {
        song.to_string()
    } else {
        label
    };
    if !info.album.is_empty() {
        line.push_str(&format!(" [{}]", info.album));
    }
    if info.time > 0 {
        line.push_str(&format!(" ({})", format_seconds(info.duration().as_secs_f64())));
    }
    line
}

/// How a single stream request ended
enum StreamOutcome {
    Decoded(DecodedAudio),
    Failed(String),
    Stopped,
}

async fn stream(config: Arc<Config>, client: MogClient, max_wait: Duration) -> Result<()> {
    let (decoder, mut pcm) = SymphoniaDecoder::new();
    let mut session = MogSession::with_client(config, client, Arc::new(decoder))?;
    let events = session.events().subscribe();

    // a single request: nothing is fetched again once it ends
    session.set_streaming(true);

    let deadline = tokio::time::sleep(max_wait);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(Duration::from_millis(250));

    let outcome = loop {
        tokio::select! {
            _ = &mut deadline => break StreamOutcome::Stopped,
            _ = tokio::signal::ctrl_c() => break StreamOutcome::Stopped,
            audio = pcm.recv() => match audio {
                Some(audio) => break StreamOutcome::Decoded(audio),
                None => break StreamOutcome::Stopped,
            },
            _ = ticker.tick() => {
                let failure = events.try_iter().find_map(|event| match event {
                    MogEvent::Error(msg) => Some(msg),
                    _ => None,
                });
                if let Some(msg) = failure {
                    break StreamOutcome::Failed(msg);
                }
            }
        }
    };

    session.shutdown();

    match outcome {
        StreamOutcome::Decoded(audio) => {
            println!(
                "decoded {:.1}s, {} Hz, {} channel(s)",
                audio.duration_secs(),
                audio.sample_rate,
                audio.channels
            );
            Ok(())
        }
        StreamOutcome::Failed(msg) => anyhow::bail!(msg),
        StreamOutcome::Stopped => {
            println!("no audio decoded");
            Ok(())
        }
    }
}

async fn watch(config: Arc<Config>, client: MogClient) -> Result<()> {
    let (decoder, _pcm) = SymphoniaDecoder::new();
    let mut session = MogSession::with_client(config, client, Arc::new(decoder))?;

    let stop = CancellationToken::new();
    let printer = tokio::task::spawn_blocking({
        let events = session.events().subscribe();
        let stop = stop.clone();
        move || print_events(events, stop)
    });

    session.start_polling();
    info!("Watching server events, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    stop.cancel();
    session.shutdown();
    printer.await?;
    Ok(())
}

fn print_events(events: Receiver<MogEvent>, stop: CancellationToken) {
    while !stop.is_cancelled() {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(event) => println!("{}", describe(&event)),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn describe(event: &MogEvent) -> String {
    match event {
        MogEvent::Active(song) => format!("active    {}", song),
        MogEvent::Error(msg) => format!("error     {}", msg),
        MogEvent::Playlist(playlist) => format!("playlist  {} song(s)", playlist.len()),
        MogEvent::Protocols(protocols) => {
            let names: Vec<&str> = protocols.keys().map(String::as_str).collect();
            format!("protocols {}", names.join(", "))
        }
        MogEvent::Status(status) => format!(
            "status    {} {} {}",
            status.state,
            status.song,
            status.progress()
        ),
        MogEvent::Tracks(tracks) => format!("tracks    {} song(s)", tracks.len()),
    }
}
