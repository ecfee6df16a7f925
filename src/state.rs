use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::api::{CategoryBatches, Category, Channel, PlayerStatus, StreamType, XtreamSettings};
use crate::catalog::{CategoryIndex, ChannelCache};
use crate::filter;

/// Sidebar selection: a typed category or the favorites pseudo-category.
/// Its string form is `"<type>-<id>"` or `"favorites"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectedCategory {
    Category { kind: StreamType, id: i64 },
    Favorites,
}

impl SelectedCategory {
    pub fn kind(&self) -> Option<StreamType> {
        match self {
            SelectedCategory::Category { kind, .. } => Some(*kind),
            SelectedCategory::Favorites => None,
        }
    }
}

impl fmt::Display for SelectedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectedCategory::Category { kind, id } => write!(f, "{}-{}", kind, id),
            SelectedCategory::Favorites => f.write_str("favorites"),
        }
    }
}

impl FromStr for SelectedCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "favorites" {
            return Ok(SelectedCategory::Favorites);
        }
        let (kind, id) = s
            .split_once('-')
            .ok_or_else(|| format!("expected '<type>-<id>' or 'favorites', got '{}'", s))?;
        let kind: StreamType = kind.parse()?;
        let id: i64 = id
            .parse()
            .map_err(|_| format!("invalid category id '{}'", id))?;
        Ok(SelectedCategory::Category { kind, id })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Rating,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::Rating => "rating",
        })
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "rating" => Ok(SortOrder::Rating),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Transient view state, owned by the UI layer and never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub selected: Option<SelectedCategory>,
    pub search_query: String,
    pub sort_order: SortOrder,
    pub expanded_groups: BTreeSet<StreamType>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            selected: None,
            search_query: String::new(),
            sort_order: SortOrder::Newest,
            expanded_groups: BTreeSet::from([StreamType::Live]),
        }
    }
}

/// Local belief about the remote player
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Playing { channel: Option<Channel> },
}

impl PlayerState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayerState::Playing { .. })
    }

    pub fn channel(&self) -> Option<&Channel> {
        match self {
            PlayerState::Playing { channel } => channel.as_ref(),
            PlayerState::Idle => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayerSlice {
    pub state: PlayerState,
    /// Bumped on every play/stop request. Poll results and play failures
    /// stamped with an older generation are stale and discarded.
    pub generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsSlice {
    pub settings: Option<XtreamSettings>,
    pub form_open: bool,
}

/// A user-visible message that disappears after a while
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub raised_at: Instant,
}

/// Every state mutation the controller can perform
#[derive(Debug, Clone)]
pub enum Action {
    AllChannelsFetched(Vec<Channel>),
    CategoriesFetched(CategoryBatches),
    CategorySelected(SelectedCategory),
    CategoryChannelsFetched(SelectedCategory, Vec<Channel>),
    FavoritesFetched(Vec<Channel>),
    SearchChanged(String),
    SortChanged(SortOrder),
    GroupToggled(StreamType),
    SettingsLoaded(Option<XtreamSettings>),
    SettingsSaved(XtreamSettings),
    SettingsFormOpened,
    SettingsFormClosed,
    PlayRequested(Channel),
    PlayFailed { generation: u64 },
    StopRequested,
    StatusPolled { generation: u64, status: Option<PlayerStatus> },
    LoadingChanged(bool),
    NoticeRaised(String),
    NoticeCleared,
}

/// Single owner of all controller state, mutated only through [`Store::apply`]
#[derive(Debug, Default)]
pub struct Store {
    pub channel_cache: ChannelCache,
    pub category_index: CategoryIndex,
    /// Channels of the selected category (or the favorites list)
    pub category_channels: Vec<Channel>,
    pub favorites: Vec<Channel>,
    pub view: ViewState,
    pub player: PlayerSlice,
    pub settings: SettingsSlice,
    pub loading: bool,
    pub notice: Option<Notice>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::AllChannelsFetched(channels) => {
                debug!(count = channels.len(), "channel cache replaced");
                self.channel_cache.replace(channels);
            }
            Action::CategoriesFetched(batches) => {
                self.category_index = CategoryIndex::from_batches(batches);
                debug!(count = self.category_index.len(), "category index replaced");
            }
            Action::CategorySelected(selection) => {
                if matches!(selection.kind(), Some(StreamType::Movie | StreamType::Series)) {
                    self.view.sort_order = SortOrder::Newest;
                }
                if selection == SelectedCategory::Favorites {
                    self.category_channels = self.favorites.clone();
                } else {
                    self.category_channels.clear();
                }
                self.view.selected = Some(selection);
            }
            Action::CategoryChannelsFetched(selection, channels) => {
                if self.view.selected.as_ref() == Some(&selection) {
                    self.category_channels = channels;
                } else {
                    debug!(%selection, "dropping channels for a stale selection");
                }
            }
            Action::FavoritesFetched(channels) => {
                if self.view.selected == Some(SelectedCategory::Favorites) {
                    self.category_channels = channels.clone();
                }
                self.favorites = channels;
            }
            Action::SearchChanged(query) => self.view.search_query = query,
            Action::SortChanged(order) => self.view.sort_order = order,
            Action::GroupToggled(kind) => {
                if !self.view.expanded_groups.remove(&kind) {
                    self.view.expanded_groups.insert(kind);
                }
            }
            Action::SettingsLoaded(settings) => {
                self.settings.form_open = settings.is_none();
                self.settings.settings = settings;
            }
            Action::SettingsSaved(settings) => {
                self.settings.settings = Some(settings);
                self.settings.form_open = false;
            }
            Action::SettingsFormOpened => self.settings.form_open = true,
            Action::SettingsFormClosed => self.settings.form_open = false,
            Action::PlayRequested(channel) => {
                self.player.generation += 1;
                info!(name = %channel.name, "playing (optimistic)");
                self.player.state = PlayerState::Playing {
                    channel: Some(channel),
                };
            }
            Action::PlayFailed { generation } => {
                if generation == self.player.generation {
                    self.player.state = PlayerState::Idle;
                }
            }
            Action::StopRequested => {
                self.player.generation += 1;
                info!("stopped (optimistic)");
                self.player.state = PlayerState::Idle;
            }
            Action::StatusPolled { generation, status } => {
                if generation < self.player.generation {
                    debug!(
                        generation,
                        current = self.player.generation,
                        "ignoring poll issued before the last play/stop"
                    );
                    return;
                }
                self.reconcile(status);
            }
            Action::LoadingChanged(loading) => self.loading = loading,
            Action::NoticeRaised(message) => {
                self.notice = Some(Notice {
                    message,
                    raised_at: Instant::now(),
                })
            }
            Action::NoticeCleared => self.notice = None,
        }
    }

    // The poll is authoritative; a failed poll (None) means not running.
    fn reconcile(&mut self, status: Option<PlayerStatus>) {
        let next = match status {
            Some(status) if status.is_running => {
                let channel = status
                    .effective_channel()
                    .cloned()
                    .or_else(|| self.player.state.channel().cloned());
                PlayerState::Playing { channel }
            }
            _ => PlayerState::Idle,
        };

        if next != self.player.state {
            match &next {
                PlayerState::Idle => info!("player stopped remotely"),
                PlayerState::Playing { channel } => info!(
                    name = channel.as_ref().map(|c| c.name.as_str()).unwrap_or("unknown"),
                    "player running"
                ),
            }
            self.player.state = next;
        }
    }

    /// Channels to display for the current view
    pub fn visible_channels(&self) -> Vec<&Channel> {
        filter::visible_channels(
            self.channel_cache.channels(),
            &self.category_channels,
            &self.view,
        )
    }

    pub fn categories(&self, kind: StreamType) -> Vec<&Category> {
        self.category_index.by_type(kind)
    }

    /// Favorite membership is keyed by playback URL
    pub fn is_favorite(&self, url: &str) -> bool {
        self.favorites.iter().any(|f| f.url == url)
    }

    pub fn favorite_for(&self, url: &str) -> Option<&Channel> {
        self.favorites.iter().find(|f| f.url == url)
    }

    pub fn now_playing(&self) -> Option<&Channel> {
        self.player.state.channel()
    }

    pub fn active_notice(&self, ttl: Duration) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| n.raised_at.elapsed() < ttl)
            .map(|n| n.message.as_str())
    }
}
