use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::errors::{ClientError, SETTINGS_REQUIRED_SENTINEL};
use crate::flex::{self, Rating};

/// Content type of a channel or category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    #[default]
    Live,
    Movie,
    Series,
}

impl StreamType {
    pub const ALL: [StreamType; 3] = [StreamType::Live, StreamType::Movie, StreamType::Series];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Live => "live",
            StreamType::Movie => "movie",
            StreamType::Series => "series",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StreamType::Live => "Live TV",
            StreamType::Movie => "Movies",
            StreamType::Series => "Series",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(StreamType::Live),
            "movie" => Ok(StreamType::Movie),
            "series" => Ok(StreamType::Series),
            other => Err(format!("unknown stream type '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Channel {
    #[serde(default, deserialize_with = "flex::deserialize_flex_i64")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,

    // None when the backend did not classify the item
    #[serde(
        default,
        deserialize_with = "flex::deserialize_stream_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub stream_type: Option<StreamType>,

    #[serde(default, deserialize_with = "flex::deserialize_flex_i64")]
    pub category_id: i64,

    #[serde(
        default,
        deserialize_with = "flex::deserialize_blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub stream_icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,

    #[serde(
        default,
        deserialize_with = "flex::deserialize_blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub added: Option<String>,
}

impl Channel {
    pub fn is_live(&self) -> bool {
        self.stream_type == Some(StreamType::Live)
    }
}

/// Category as returned by `/api/categories/{type}`; the type is implied by the path
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RawCategory {
    #[serde(deserialize_with = "flex::deserialize_flex_i64")]
    pub category_id: i64,
    pub category_name: String,
    #[serde(
        default,
        deserialize_with = "flex::deserialize_flex_option_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<i64>,
}

impl RawCategory {
    pub fn tagged(self, kind: StreamType) -> Category {
        Category {
            category_id: self.category_id,
            category_name: self.category_name,
            parent_id: self.parent_id,
            kind,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub category_id: i64,
    pub category_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: StreamType,
}

/// The three untyped category batches, one per content type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryBatches {
    pub live: Vec<RawCategory>,
    pub movie: Vec<RawCategory>,
    pub series: Vec<RawCategory>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct XtreamSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for XtreamSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XtreamSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl XtreamSettings {
    /// An all-empty settings object means nothing was ever configured.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() || !self.username.is_empty() || !self.password.is_empty()
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.url.trim().is_empty() {
            return Err(ClientError::IncompleteSettings("url"));
        }
        if self.username.trim().is_empty() {
            return Err(ClientError::IncompleteSettings("username"));
        }
        if self.password.is_empty() {
            return Err(ClientError::IncompleteSettings("password"));
        }
        Ok(())
    }
}

/// Authoritative player state reported by `/api/player/status`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    #[serde(default)]
    pub is_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_channel: Option<Channel>,
}

impl PlayerStatus {
    /// The playing channel; always `None` while the player is not running.
    pub fn effective_channel(&self) -> Option<&Channel> {
        if self.is_running {
            self.current_channel.as_ref()
        } else {
            None
        }
    }
}

/// Body of `POST /api/player/play`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayRequest {
    pub url: String,
    pub name: String,
    pub id: i64,
    pub stream_type: StreamType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// The backend had nothing to stop (404)
    AlreadyStopped,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct BackendClient {
    pub base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .user_agent(concat!("iptv-remote/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url,
            timeout,
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response, ClientError> {
        let resp = request
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, url, self.timeout))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
            if parsed.error.as_deref() == Some(SETTINGS_REQUIRED_SENTINEL) {
                return Err(ClientError::SettingsRequired);
            }
        }
        Err(ClientError::Status(status.as_u16(), body.trim().to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.endpoint(path);
        debug!(%url, "GET");
        let resp = self.send(self.client.get(&url), &url).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    // The backend encodes an empty list as `null`
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ClientError> {
        let list: Option<Vec<T>> = self.get_json(path).await?;
        Ok(list.unwrap_or_default())
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> Result<(), ClientError> {
        let url = self.endpoint(path);
        debug!(%url, "POST");
        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request, &url).await?;
        Ok(())
    }

    /// Stored credentials, or `None` on first run (404 or an empty object).
    pub async fn get_settings(&self) -> Result<Option<XtreamSettings>, ClientError> {
        match self.get_json::<Option<XtreamSettings>>("/api/xtream/settings").await {
            Ok(Some(settings)) if settings.is_configured() => Ok(Some(settings)),
            Ok(_) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn save_settings(&self, settings: &XtreamSettings) -> Result<(), ClientError> {
        self.post("/api/xtream/settings", Some(settings)).await
    }

    /// Ask the backend to re-ingest channels and categories from upstream.
    pub async fn trigger_update(&self) -> Result<(), ClientError> {
        self.post::<()>("/api/xtream/update", None).await
    }

    pub async fn get_categories(&self, kind: StreamType) -> Result<Vec<RawCategory>, ClientError> {
        self.get_list(&format!("/api/categories/{}", kind)).await
    }

    /// Fetch the live, movie and series batches concurrently.
    pub async fn get_all_categories(&self) -> Result<CategoryBatches, ClientError> {
        let (live, movie, series) = futures::try_join!(
            self.get_categories(StreamType::Live),
            self.get_categories(StreamType::Movie),
            self.get_categories(StreamType::Series),
        )?;
        Ok(CategoryBatches { live, movie, series })
    }

    pub async fn get_channels(&self) -> Result<Vec<Channel>, ClientError> {
        self.get_list("/api/channels").await
    }

    pub async fn get_channels_by_type(&self, kind: StreamType) -> Result<Vec<Channel>, ClientError> {
        self.get_list(&format!("/api/channels/{}", kind)).await
    }

    pub async fn get_channels_by_category(
        &self,
        kind: StreamType,
        category_id: i64,
    ) -> Result<Vec<Channel>, ClientError> {
        self.get_list(&format!("/api/channels/{}/{}", kind, category_id))
            .await
    }

    pub async fn get_favorites(&self) -> Result<Vec<Channel>, ClientError> {
        self.get_list("/api/favorites").await
    }

    /// Add a favorite; the full channel object is the request body.
    pub async fn add_favorite(&self, channel: &Channel) -> Result<(), ClientError> {
        self.post("/api/favorites", Some(channel)).await
    }

    pub async fn remove_favorite(&self, favorite_id: i64) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("/api/favorites/{}", favorite_id));
        debug!(%url, "DELETE");
        self.send(self.client.delete(&url), &url).await?;
        Ok(())
    }

    pub async fn player_status(&self) -> Result<PlayerStatus, ClientError> {
        self.get_json("/api/player/status").await
    }

    pub async fn play(&self, request: &PlayRequest) -> Result<(), ClientError> {
        self.post("/api/player/play", Some(request)).await
    }

    pub async fn stop(&self) -> Result<StopOutcome, ClientError> {
        match self.post::<()>("/api/player/stop", None).await {
            Ok(()) => Ok(StopOutcome::Stopped),
            Err(e) if e.is_not_found() => Ok(StopOutcome::AlreadyStopped),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_from_backend_json() {
        let json = r#"{
            "id": 42,
            "name": "News HD",
            "url": "http://host/live/u/p/42.ts",
            "stream_type": "live",
            "category_id": "7",
            "stream_icon": "",
            "rating": "6.5"
        }"#;
        let ch: Channel = serde_json::from_str(json).unwrap();
        assert_eq!(ch.id, 42);
        assert_eq!(ch.category_id, 7);
        assert_eq!(ch.stream_type, Some(StreamType::Live));
        assert_eq!(ch.stream_icon, None);
        assert_eq!(ch.added, None);
        assert_eq!(ch.rating.as_ref().map(|r| r.as_f64()), Some(6.5));
    }

    #[test]
    fn test_blank_stream_type_is_unclassified() {
        let ch: Channel =
            serde_json::from_str(r#"{"id": 1, "name": "x", "url": "u", "stream_type": ""}"#)
                .unwrap();
        assert_eq!(ch.stream_type, None);
    }

    #[test]
    fn test_status_invariant_hides_channel_when_stopped() {
        let status: PlayerStatus = serde_json::from_str(
            r#"{"isRunning": false, "currentChannel": {"id": 1, "name": "a", "url": "u"}}"#,
        )
        .unwrap();
        assert!(status.current_channel.is_some());
        assert!(status.effective_channel().is_none());
    }

    #[test]
    fn test_settings_debug_redacts_password() {
        let settings = XtreamSettings {
            url: "http://provider".into(),
            username: "me".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{:?}", settings);
        assert!(!printed.contains("hunter2"));
        assert!(settings.validate().is_ok());
        assert!(!XtreamSettings::default().is_configured());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = BackendClient::new("http://localhost:8080/", DEFAULT_TIMEOUT);
        assert_eq!(client.endpoint("/api/channels"), "http://localhost:8080/api/channels");
    }
}
