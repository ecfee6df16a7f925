use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::{BackendClient, Channel, PlayRequest, StreamType};
use crate::app::{AsyncAction, PollOrigin};
use crate::errors::ClientError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_CONFIRM_DELAY: Duration = Duration::from_millis(1000);

static MOVIE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/movie/|/vod/|film|movie").unwrap());
static SERIES_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)/series/|dizi").unwrap());

/// Best-effort content type guess from URL path segments.
pub fn infer_stream_type(url: &str) -> Option<StreamType> {
    if MOVIE_URL.is_match(url) {
        Some(StreamType::Movie)
    } else if SERIES_URL.is_match(url) {
        Some(StreamType::Series)
    } else {
        None
    }
}

/// Explicit type first, then the URL heuristic, then live.
pub fn resolve_stream_type(channel: &Channel) -> StreamType {
    if let Some(kind) = channel.stream_type {
        return kind;
    }
    match infer_stream_type(&channel.url) {
        Some(kind) => {
            debug!(url = %channel.url, %kind, "inferred stream type from url");
            kind
        }
        None => StreamType::Live,
    }
}

pub fn play_request(channel: &Channel) -> Result<PlayRequest, ClientError> {
    if channel.url.trim().is_empty() {
        return Err(ClientError::MissingUrl);
    }
    Ok(PlayRequest {
        url: channel.url.clone(),
        name: channel.name.clone(),
        id: channel.id,
        stream_type: resolve_stream_type(channel),
    })
}

/// Handle to the background status poll. Dropping it cancels the task.
pub struct StatusPoller {
    handle: JoinHandle<()>,
}

impl StatusPoller {
    pub fn stop(self) {
        // Drop aborts
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Fetch status once, stamped with the generation current at dispatch.
pub async fn poll_once(
    client: &BackendClient,
    generation: &AtomicU64,
    origin: PollOrigin,
) -> AsyncAction {
    let stamp = generation.load(Ordering::SeqCst);
    let result = client.player_status().await;
    if let Err(e) = &result {
        warn!("player status poll failed: {}", e);
    }
    AsyncAction::StatusPolled {
        generation: stamp,
        origin,
        result,
    }
}

/// Poll `/api/player/status` every `interval`, starting immediately.
///
/// The task ends when the returned handle is dropped or the receiving side
/// of `tx` goes away.
pub fn spawn_status_poller(
    client: BackendClient,
    tx: mpsc::Sender<AsyncAction>,
    interval: Duration,
    generation: Arc<AtomicU64>,
) -> StatusPoller {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let action = poll_once(&client, &generation, PollOrigin::Timer).await;
            if tx.send(action).await.is_err() {
                debug!("status receiver closed, stopping poller");
                break;
            }
        }
    });
    StatusPoller { handle }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unclassified(url: &str) -> Channel {
        Channel {
            id: 5,
            name: "Thing".into(),
            url: url.into(),
            stream_type: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_movie_url_inferred() {
        let req = play_request(&unclassified("http://x/movie/5.mp4")).unwrap();
        assert_eq!(req.stream_type, StreamType::Movie);
        assert_eq!(req.id, 5);
    }

    #[test]
    fn test_series_url_inferred() {
        assert_eq!(
            infer_stream_type("http://x/series/u/p/77.mkv"),
            Some(StreamType::Series)
        );
        assert_eq!(infer_stream_type("http://x/VOD/1.mp4"), Some(StreamType::Movie));
    }

    #[test]
    fn test_unclassified_defaults_to_live() {
        let req = play_request(&unclassified("http://x/live/u/p/1.ts")).unwrap();
        assert_eq!(req.stream_type, StreamType::Live);
    }

    #[test]
    fn test_explicit_type_wins_over_url() {
        let ch = Channel {
            stream_type: Some(StreamType::Live),
            ..unclassified("http://x/movie/5.mp4")
        };
        assert_eq!(resolve_stream_type(&ch), StreamType::Live);
    }

    #[test]
    fn test_missing_url_rejected() {
        assert_eq!(
            play_request(&unclassified("  ")).unwrap_err(),
            ClientError::MissingUrl
        );
    }
}
