use std::time::Duration;
use thiserror::Error;

/// Sentinel the backend returns when no Xtream credentials are stored yet.
pub const SETTINGS_REQUIRED_SENTINEL: &str = "xtream_settings_required";

/// Error type for every call made against the backend
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// Request did not complete in time
    #[error("Connection timeout after {1}s to {0}")]
    Timeout(String, u64),

    /// Backend could not be reached at all
    #[error("Backend unreachable at {0}: {1}")]
    Unreachable(String, String),

    /// Transport failure that is neither a timeout nor a refused connection
    #[error("Request failed: {0}")]
    Request(String),

    /// Backend answered with a non-success status
    #[error("Backend returned {0}: {1}")]
    Status(u16, String),

    /// Response body did not match the expected shape
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Backend has no Xtream credentials; the settings form must be shown
    #[error("Xtream settings are required")]
    SettingsRequired,

    /// Play was requested for a channel without a playback URL
    #[error("Channel URL is missing")]
    MissingUrl,

    /// Settings form submitted with an empty field
    #[error("Xtream settings are incomplete: {0} is empty")]
    IncompleteSettings(&'static str),
}

impl ClientError {
    pub fn from_reqwest(err: reqwest::Error, url: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(url.to_string(), timeout.as_secs())
        } else if err.is_connect() {
            ClientError::Unreachable(url.to_string(), err.to_string())
        } else if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Request(err.to_string())
        }
    }

    /// HTTP status, when the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status(code, _) => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// User-facing operations whose failures surface as a transient message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    LoadSettings,
    SaveSettings,
    UpdateChannels,
    LoadCategories,
    LoadChannels,
    LoadFavorites,
    ToggleFavorite,
    Play,
    Stop,
}

impl Operation {
    /// Message shown to the user when this operation fails with `err`
    pub fn failure_message(&self, err: &ClientError) -> String {
        match (self, err) {
            (_, ClientError::MissingUrl) => err.to_string(),
            (_, ClientError::IncompleteSettings(_)) => err.to_string(),
            (Operation::Play, ClientError::Status(_, body)) if !body.is_empty() => {
                format!("API error: {}", body)
            }
            (Operation::Play, _) => "Failed to play the channel.".to_string(),
            (Operation::Stop, _) => "Failed to stop the channel.".to_string(),
            (Operation::LoadSettings, _) => "Failed to load Xtream settings.".to_string(),
            (Operation::SaveSettings, _) => "Failed to save Xtream settings.".to_string(),
            (Operation::UpdateChannels, _) => "Failed to update channels.".to_string(),
            (Operation::LoadCategories, _) => "Failed to load categories.".to_string(),
            (Operation::LoadChannels, _) => "Failed to load channels.".to_string(),
            (Operation::LoadFavorites, _) => "Failed to load favorites.".to_string(),
            (Operation::ToggleFavorite, _) => "Failed to update favorites.".to_string(),
        }
    }
}
