use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::StopOutcome;
use crate::app::{App, AsyncAction, PollOrigin};
use crate::errors::{ClientError, Operation};
use crate::state::Action;

// A missing-credentials answer opens the settings form instead of a notice.
fn fail(app: &mut App, operation: Operation, err: &ClientError) {
    if *err == ClientError::SettingsRequired {
        info!(?operation, "backend has no Xtream settings");
        app.apply(Action::SettingsFormOpened);
    } else {
        app.report(operation, err);
    }
}

pub async fn handle_async_action(app: &mut App, action: AsyncAction) {
    if action.is_tracked() {
        app.request_finished();
    }

    match action {
        AsyncAction::SettingsLoaded(result) => match result {
            Ok(Some(settings)) => {
                debug!(?settings, "settings loaded");
                app.apply(Action::SettingsLoaded(Some(settings)));
                app.load_categories();
            }
            Ok(None) => app.apply(Action::SettingsLoaded(None)),
            Err(e) => fail(app, Operation::LoadSettings, &e),
        },
        AsyncAction::SettingsSaved(settings, result) => match result {
            Ok(()) => {
                app.apply(Action::SettingsSaved(settings));
                app.update_channels();
            }
            Err(e) => fail(app, Operation::SaveSettings, &e),
        },
        AsyncAction::UpdateFinished(result) => match result {
            Ok(()) => {
                info!("channel update finished");
                app.reload_all();
                app.apply(Action::NoticeCleared);
            }
            Err(e) => {
                app.apply(Action::LoadingChanged(false));
                fail(app, Operation::UpdateChannels, &e);
            }
        },
        AsyncAction::CategoriesLoaded(result) => {
            app.apply(Action::LoadingChanged(false));
            match result {
                Ok(batches) => app.apply(Action::CategoriesFetched(batches)),
                Err(e) => fail(app, Operation::LoadCategories, &e),
            }
        }
        AsyncAction::AllChannelsLoaded(result) => match result {
            Ok(channels) => app.apply(Action::AllChannelsFetched(channels)),
            Err(e) => fail(app, Operation::LoadChannels, &e),
        },
        AsyncAction::CategoryChannelsLoaded(selection, result) => {
            app.apply(Action::LoadingChanged(false));
            match result {
                Ok(channels) => app.apply(Action::CategoryChannelsFetched(selection, channels)),
                Err(e) => fail(app, Operation::LoadChannels, &e),
            }
        }
        AsyncAction::FavoritesLoaded(result) => match result {
            Ok(channels) => app.apply(Action::FavoritesFetched(channels)),
            Err(e) => fail(app, Operation::LoadFavorites, &e),
        },
        AsyncAction::FavoriteToggled(result) => {
            if let Err(e) = &result {
                fail(app, Operation::ToggleFavorite, e);
            }
            app.load_favorites();
        }
        AsyncAction::PlayFinished { generation, result } => match result {
            Ok(()) => {
                let delay = app.config.confirm_delay();
                app.poll_status_after(delay);
            }
            Err(e) => {
                app.apply(Action::PlayFailed { generation });
                fail(app, Operation::Play, &e);
            }
        },
        AsyncAction::StopFinished { generation, result } => match result {
            Ok(StopOutcome::Stopped) => debug!(generation, "player stopped"),
            Ok(StopOutcome::AlreadyStopped) => debug!(generation, "player was not running"),
            Err(e) => fail(app, Operation::Stop, &e),
        },
        AsyncAction::StatusPolled {
            generation,
            origin,
            result,
        } => {
            if origin == PollOrigin::Confirm {
                debug!(generation, "confirmation poll");
            }
            app.apply(Action::StatusPolled {
                generation,
                status: result.ok(),
            });
        }
    }
}

/// Apply incoming actions until no tracked request is in flight, including
/// follow-up requests triggered along the way.
pub async fn run_until_settled(app: &mut App, rx: &mut mpsc::Receiver<AsyncAction>) {
    while !app.is_settled() {
        match rx.recv().await {
            Some(action) => handle_async_action(app, action).await,
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Channel, PlayerStatus, StreamType};
    use crate::config::AppConfig;
    use crate::state::PlayerState;

    fn offline_app() -> (App, mpsc::Receiver<AsyncAction>) {
        let (tx, rx) = mpsc::channel(16);
        let config = AppConfig {
            backend_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 1,
            ..AppConfig::default()
        };
        (App::new(config, tx), rx)
    }

    fn news() -> Channel {
        Channel {
            id: 1,
            name: "News".into(),
            url: "http://host/live/1.ts".into(),
            stream_type: Some(StreamType::Live),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_play_failure_reverts_and_reports_body() {
        let (mut app, _rx) = offline_app();
        app.play(&news());
        assert!(app.store.player.state.is_playing());
        assert_eq!(app.pending(), 1);

        let generation = app.store.player.generation;
        handle_async_action(
            &mut app,
            AsyncAction::PlayFinished {
                generation,
                result: Err(ClientError::Status(500, "Failed to create player".into())),
            },
        )
        .await;

        assert_eq!(app.store.player.state, PlayerState::Idle);
        assert_eq!(app.notice(), Some("API error: Failed to create player"));
        assert!(app.is_settled());
    }

    #[tokio::test]
    async fn test_settings_required_opens_form_without_notice() {
        let (mut app, _rx) = offline_app();
        app.update_channels();
        handle_async_action(
            &mut app,
            AsyncAction::UpdateFinished(Err(ClientError::SettingsRequired)),
        )
        .await;

        assert!(app.store.settings.form_open);
        assert!(app.notice().is_none());
        assert!(!app.store.loading);
    }

    #[tokio::test]
    async fn test_timer_poll_is_not_counted() {
        let (mut app, _rx) = offline_app();
        app.load_settings();
        handle_async_action(
            &mut app,
            AsyncAction::StatusPolled {
                generation: 0,
                origin: PollOrigin::Timer,
                result: Ok(PlayerStatus {
                    is_running: true,
                    current_channel: Some(news()),
                }),
            },
        )
        .await;

        assert_eq!(app.pending(), 1);
        assert_eq!(app.store.now_playing().map(|c| c.id), Some(1));
    }

    #[tokio::test]
    async fn test_stop_failure_keeps_optimistic_idle() {
        let (mut app, _rx) = offline_app();
        app.play(&news());
        app.stop();
        let generation = app.store.player.generation;
        handle_async_action(
            &mut app,
            AsyncAction::StopFinished {
                generation,
                result: Err(ClientError::Status(500, String::new())),
            },
        )
        .await;

        assert_eq!(app.store.player.state, PlayerState::Idle);
        assert_eq!(app.notice(), Some("Failed to stop the channel."));
    }
}
