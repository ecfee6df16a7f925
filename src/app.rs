use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{
    BackendClient, CategoryBatches, Channel, StopOutcome, StreamType, XtreamSettings,
};
use crate::config::AppConfig;
use crate::errors::{ClientError, Operation};
use crate::player::{self, StatusPoller};
use crate::state::{Action, SelectedCategory, SortOrder, Store};

/// Where a status poll came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOrigin {
    /// The recurring background poll
    Timer,
    /// One-off check scheduled after a play request
    Confirm,
}

/// Completion of a background request, applied by
/// [`crate::handlers::async_actions::handle_async_action`]
#[derive(Debug, Clone)]
pub enum AsyncAction {
    SettingsLoaded(Result<Option<XtreamSettings>, ClientError>),
    SettingsSaved(XtreamSettings, Result<(), ClientError>),
    UpdateFinished(Result<(), ClientError>),
    CategoriesLoaded(Result<CategoryBatches, ClientError>),
    AllChannelsLoaded(Result<Vec<Channel>, ClientError>),
    CategoryChannelsLoaded(SelectedCategory, Result<Vec<Channel>, ClientError>),
    FavoritesLoaded(Result<Vec<Channel>, ClientError>),
    FavoriteToggled(Result<(), ClientError>),
    PlayFinished {
        generation: u64,
        result: Result<(), ClientError>,
    },
    StopFinished {
        generation: u64,
        result: Result<StopOutcome, ClientError>,
    },
    StatusPolled {
        generation: u64,
        origin: PollOrigin,
        result: Result<crate::api::PlayerStatus, ClientError>,
    },
}

impl AsyncAction {
    /// Whether this action answers a request counted in [`App::pending`].
    /// Only the recurring poll is untracked.
    pub fn is_tracked(&self) -> bool {
        !matches!(
            self,
            AsyncAction::StatusPolled {
                origin: PollOrigin::Timer,
                ..
            }
        )
    }
}

/// Controller: owns the store and issues backend requests whose results come
/// back through the action channel.
pub struct App {
    pub store: Store,
    pub config: AppConfig,
    client: BackendClient,
    tx: mpsc::Sender<AsyncAction>,
    generation: Arc<AtomicU64>,
    pending: usize,
    poller: Option<StatusPoller>,
}

impl App {
    pub fn new(config: AppConfig, tx: mpsc::Sender<AsyncAction>) -> Self {
        let client = BackendClient::new(config.backend_url.clone(), config.request_timeout());
        Self::with_client(client, config, tx)
    }

    pub fn with_client(
        client: BackendClient,
        config: AppConfig,
        tx: mpsc::Sender<AsyncAction>,
    ) -> Self {
        Self {
            store: Store::new(),
            config,
            client,
            tx,
            generation: Arc::new(AtomicU64::new(0)),
            pending: 0,
            poller: None,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Number of tracked requests still in flight
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }

    pub(crate) fn request_finished(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// Apply a state action; play/stop generations are mirrored for the poller.
    pub fn apply(&mut self, action: Action) {
        self.store.apply(action);
        self.generation
            .store(self.store.player.generation, Ordering::SeqCst);
    }

    pub(crate) fn report(&mut self, operation: Operation, err: &ClientError) {
        let message = operation.failure_message(err);
        warn!(?operation, error = %err, "request failed");
        self.apply(Action::NoticeRaised(message));
    }

    fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = AsyncAction> + Send + 'static,
    {
        self.pending += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let action = fut.await;
            let _ = tx.send(action).await;
        });
    }

    /// Initial load: settings, favorites, the full channel corpus, and the
    /// recurring player status poll.
    pub fn start(&mut self) {
        self.load_settings();
        self.load_favorites();
        self.load_all_channels();
        self.start_status_polling();
    }

    pub fn start_status_polling(&mut self) {
        if self.poller.as_ref().is_some_and(|p| !p.is_finished()) {
            return;
        }
        self.poller = Some(player::spawn_status_poller(
            self.client.clone(),
            self.tx.clone(),
            self.config.poll_interval(),
            self.generation.clone(),
        ));
    }

    /// Cancel the recurring poll; must be called when the view goes away.
    pub fn shutdown(&mut self) {
        if let Some(poller) = self.poller.take() {
            debug!("stopping status poller");
            poller.stop();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    pub fn load_settings(&mut self) {
        let client = self.client.clone();
        self.spawn(async move { AsyncAction::SettingsLoaded(client.get_settings().await) });
    }

    pub fn save_settings(&mut self, settings: XtreamSettings) {
        if let Err(e) = settings.validate() {
            self.report(Operation::SaveSettings, &e);
            return;
        }
        let client = self.client.clone();
        self.spawn(async move {
            let result = client.save_settings(&settings).await;
            AsyncAction::SettingsSaved(settings, result)
        });
    }

    pub fn open_settings_form(&mut self) {
        self.apply(Action::SettingsFormOpened);
    }

    pub fn close_settings_form(&mut self) {
        self.apply(Action::SettingsFormClosed);
    }

    pub fn load_categories(&mut self) {
        self.apply(Action::LoadingChanged(true));
        let client = self.client.clone();
        self.spawn(async move { AsyncAction::CategoriesLoaded(client.get_all_categories().await) });
    }

    pub fn load_all_channels(&mut self) {
        let client = self.client.clone();
        self.spawn(async move { AsyncAction::AllChannelsLoaded(client.get_channels().await) });
    }

    pub fn load_favorites(&mut self) {
        let client = self.client.clone();
        self.spawn(async move { AsyncAction::FavoritesLoaded(client.get_favorites().await) });
    }

    /// Select a category (or favorites) and fetch its channels.
    pub fn select_category(&mut self, selection: SelectedCategory) {
        self.apply(Action::NoticeCleared);
        self.apply(Action::CategorySelected(selection.clone()));
        match selection {
            SelectedCategory::Favorites => self.load_favorites(),
            SelectedCategory::Category { kind, id } => {
                self.apply(Action::LoadingChanged(true));
                let client = self.client.clone();
                self.spawn(async move {
                    let result = client.get_channels_by_category(kind, id).await;
                    AsyncAction::CategoryChannelsLoaded(selection, result)
                });
            }
        }
    }

    pub fn show_favorites(&mut self) {
        self.select_category(SelectedCategory::Favorites);
    }

    /// Channels of a whole content type, as an ad-hoc list outside any category
    pub async fn fetch_channels_by_type(&self, kind: StreamType) -> Result<Vec<Channel>, ClientError> {
        self.client.get_channels_by_type(kind).await
    }

    /// Add the channel to favorites, or remove it when its URL is already
    /// a favorite. The favorites list is refetched afterwards, never patched.
    pub fn toggle_favorite(&mut self, channel: &Channel) {
        let client = self.client.clone();
        let existing = self
            .store
            .favorite_for(&channel.url)
            .map(|f| f.id)
            .filter(|id| *id > 0);
        let channel = channel.clone();
        self.spawn(async move {
            let result = match existing {
                Some(favorite_id) => client.remove_favorite(favorite_id).await,
                None => client.add_favorite(&channel).await,
            };
            AsyncAction::FavoriteToggled(result)
        });
    }

    /// Ask the backend to re-ingest from upstream, then reload everything.
    pub fn update_channels(&mut self) {
        self.apply(Action::LoadingChanged(true));
        let client = self.client.clone();
        self.spawn(async move { AsyncAction::UpdateFinished(client.trigger_update().await) });
    }

    /// Reload categories, the corpus and whatever is currently selected.
    pub fn reload_all(&mut self) {
        self.load_categories();
        self.load_all_channels();
        match self.store.view.selected.clone() {
            Some(selection) => self.select_category(selection),
            None => self.load_favorites(),
        }
    }

    /// Start playback. Local state flips to playing before the backend answers.
    pub fn play(&mut self, channel: &Channel) {
        self.apply(Action::NoticeCleared);
        let request = match player::play_request(channel) {
            Ok(request) => request,
            Err(e) => {
                self.report(Operation::Play, &e);
                return;
            }
        };
        debug!(?request, "play");

        self.apply(Action::PlayRequested(channel.clone()));
        let generation = self.store.player.generation;
        let client = self.client.clone();
        self.spawn(async move {
            let result = client.play(&request).await;
            AsyncAction::PlayFinished { generation, result }
        });
    }

    /// Stop playback. Local state flips to idle immediately.
    pub fn stop(&mut self) {
        self.apply(Action::NoticeCleared);
        self.apply(Action::StopRequested);
        let generation = self.store.player.generation;
        let client = self.client.clone();
        self.spawn(async move {
            let result = client.stop().await;
            AsyncAction::StopFinished { generation, result }
        });
    }

    /// One status check after `delay`, outside the recurring schedule.
    pub fn poll_status_after(&mut self, delay: std::time::Duration) {
        let client = self.client.clone();
        let generation = self.generation.clone();
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            player::poll_once(&client, &generation, PollOrigin::Confirm).await
        });
    }

    pub fn poll_status_now(&mut self) {
        self.poll_status_after(std::time::Duration::ZERO);
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.apply(Action::SearchChanged(query.into()));
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.apply(Action::SortChanged(order));
    }

    pub fn toggle_group(&mut self, kind: StreamType) {
        self.apply(Action::GroupToggled(kind));
    }

    pub fn visible_channels(&self) -> Vec<&Channel> {
        self.store.visible_channels()
    }

    pub fn notice(&self) -> Option<&str> {
        self.store.active_notice(self.config.notice_ttl())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
