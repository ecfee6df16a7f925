use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use iptv_remote_lib::api::{Channel, StreamType, XtreamSettings};
use iptv_remote_lib::app::{App, AsyncAction};
use iptv_remote_lib::config::AppConfig;
use iptv_remote_lib::handlers::async_actions::{handle_async_action, run_until_settled};
use iptv_remote_lib::logging;
use iptv_remote_lib::state::{SelectedCategory, SortOrder};
use iptv_remote_lib::theme::{self, LocalStorage, ThemeStore};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Backend base URL (overrides the config file for this run)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or change the Xtream provider credentials
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
    /// Re-ingest channels and categories from the provider
    Update,
    /// List categories
    Categories {
        #[arg(long)]
        kind: Option<StreamType>,
    },
    /// List channels of a category, or search the whole catalog
    Browse {
        /// `<type>-<id>` or `favorites`
        #[arg(long)]
        category: Option<SelectedCategory>,
        #[arg(long)]
        search: Option<String>,
        /// newest, oldest or rating
        #[arg(long)]
        sort: Option<SortOrder>,
    },
    /// List favorites
    Favorites,
    /// Add a channel to favorites, or remove it if already there
    Favorite { channel_id: i64 },
    /// Start playback on the backend player
    Play {
        #[arg(long, conflicts_with = "url", required_unless_present = "url")]
        id: Option<i64>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long, requires = "url")]
        name: Option<String>,
        #[arg(long = "type", requires = "url")]
        stream_type: Option<StreamType>,
    },
    /// Stop the backend player
    Stop,
    /// Show what the backend player is doing
    Status,
    /// Follow player state until Ctrl-C
    Watch,
    /// Show or change the dark/light preference
    Theme {
        #[command(subcommand)]
        action: Option<ThemeCommand>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        url: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum ThemeCommand {
    Show,
    Toggle,
    Dark,
    Light,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    logging::init(args.verbose);

    let mut config = AppConfig::load().context("failed to load config")?;
    if let Some(url) = args.backend {
        config.backend_url = url;
    }

    let (tx, mut rx) = mpsc::channel::<AsyncAction>(64);
    let mut app = App::new(config, tx);

    let res = run_command(&mut app, &mut rx, args.command).await;
    app.shutdown();
    res
}

async fn settle(app: &mut App, rx: &mut mpsc::Receiver<AsyncAction>) -> Result<(), anyhow::Error> {
    run_until_settled(app, rx).await;
    if let Some(notice) = app.notice() {
        bail!("{}", notice);
    }
    if app.store.settings.form_open {
        bail!("Xtream settings are not configured; run `iptv-remote settings set`");
    }
    Ok(())
}

async fn run_command(
    app: &mut App,
    rx: &mut mpsc::Receiver<AsyncAction>,
    command: Command,
) -> Result<(), anyhow::Error> {
    match command {
        Command::Settings { action } => match action {
            SettingsCommand::Show => {
                app.load_settings();
                run_until_settled(app, rx).await;
                match &app.store.settings.settings {
                    Some(s) => {
                        println!("url:      {}", s.url);
                        println!("username: {}", s.username);
                        println!("password: {}", "*".repeat(s.password.chars().count()));
                    }
                    None => println!("Xtream settings are not configured."),
                }
                if let Some(notice) = app.notice() {
                    bail!("{}", notice);
                }
            }
            SettingsCommand::Set {
                url,
                username,
                password,
            } => {
                app.save_settings(XtreamSettings {
                    url,
                    username,
                    password,
                });
                settle(app, rx).await?;
                println!(
                    "Settings saved. {} channels, {} categories.",
                    app.store.channel_cache.len(),
                    app.store.category_index.len()
                );
            }
        },
        Command::Update => {
            app.update_channels();
            settle(app, rx).await?;
            println!(
                "Update finished. {} channels, {} categories.",
                app.store.channel_cache.len(),
                app.store.category_index.len()
            );
        }
        Command::Categories { kind } => {
            app.load_categories();
            settle(app, rx).await?;
            let kinds: Vec<StreamType> = match kind {
                Some(kind) => vec![kind],
                None => StreamType::ALL.to_vec(),
            };
            for kind in kinds {
                println!("{}", kind.display_name());
                for category in app.store.categories(kind) {
                    println!(
                        "  {:<14} {}",
                        SelectedCategory::Category {
                            kind,
                            id: category.category_id
                        }
                        .to_string(),
                        category.category_name
                    );
                }
            }
        }
        Command::Browse {
            category,
            search,
            sort,
        } => {
            app.load_all_channels();
            app.load_favorites();
            if let Some(selection) = category {
                app.select_category(selection);
            }
            if let Some(order) = sort {
                app.set_sort_order(order);
            }
            if let Some(query) = search {
                app.set_search_query(query);
            }
            app.poll_status_now();
            settle(app, rx).await?;
            print_channels(app, &app.visible_channels());
        }
        Command::Favorites => {
            app.load_all_channels();
            app.show_favorites();
            app.poll_status_now();
            settle(app, rx).await?;
            print_channels(app, &app.visible_channels());
        }
        Command::Favorite { channel_id } => {
            app.load_all_channels();
            app.load_favorites();
            settle(app, rx).await?;
            let channel = find_channel(app, channel_id)?;
            app.toggle_favorite(&channel);
            settle(app, rx).await?;
            if app.store.is_favorite(&channel.url) {
                println!("Added {} to favorites.", channel.name);
            } else {
                println!("Removed {} from favorites.", channel.name);
            }
        }
        Command::Play {
            id,
            url,
            name,
            stream_type,
        } => {
            let channel = match (id, url) {
                (Some(id), _) => {
                    app.load_all_channels();
                    app.load_favorites();
                    settle(app, rx).await?;
                    find_channel(app, id)?
                }
                (None, Some(url)) => Channel {
                    name: name.unwrap_or_else(|| url.clone()),
                    url,
                    stream_type,
                    ..Default::default()
                },
                (None, None) => bail!("either --id or --url is required"),
            };
            app.play(&channel);
            settle(app, rx).await?;
            print_status(app);
        }
        Command::Stop => {
            app.stop();
            settle(app, rx).await?;
            print_status(app);
        }
        Command::Status => {
            app.poll_status_now();
            run_until_settled(app, rx).await;
            print_status(app);
        }
        Command::Watch => watch(app, rx).await?,
        Command::Theme { action } => run_theme(action.unwrap_or(ThemeCommand::Show))?,
    }
    Ok(())
}

fn find_channel(app: &App, id: i64) -> Result<Channel, anyhow::Error> {
    app.store
        .channel_cache
        .find_by_id(id)
        .or_else(|| app.store.favorites.iter().find(|f| f.id == id))
        .cloned()
        .ok_or_else(|| anyhow!("no channel with id {}", id))
}

fn print_channels(app: &App, channels: &[&Channel]) {
    if channels.is_empty() {
        println!("No channels.");
        return;
    }
    let playing_url = app.store.now_playing().map(|c| c.url.as_str());
    for ch in channels {
        let marker = if Some(ch.url.as_str()) == playing_url {
            '>'
        } else if app.store.is_favorite(&ch.url) {
            '*'
        } else {
            ' '
        };
        let kind = ch.stream_type.map(|k| k.as_str()).unwrap_or("-");
        let rating = ch.rating.as_ref().map(|r| r.to_string()).unwrap_or_default();
        println!("{} {:>7}  {:<7} {:>5}  {}", marker, ch.id, kind, rating, ch.name);
    }
}

fn print_status(app: &App) {
    match app.store.now_playing() {
        Some(ch) => println!("Playing: {}", ch.name),
        None if app.store.player.state.is_playing() => println!("Playing"),
        None => println!("Stopped"),
    }
}

async fn watch(app: &mut App, rx: &mut mpsc::Receiver<AsyncAction>) -> Result<(), anyhow::Error> {
    let store = open_theme()?;
    let mut theme_rx = store.subscribe();
    let sync = theme::spawn_storage_sync(Arc::new(Mutex::new(store)), Duration::from_secs(2));

    app.start();
    let mut last_playing: Option<Option<String>> = None;
    let mut last_notice: Option<String> = None;

    loop {
        tokio::select! {
            action = rx.recv() => {
                let Some(action) = action else { break };
                handle_async_action(app, action).await;

                let playing = app
                    .store
                    .player
                    .state
                    .is_playing()
                    .then(|| app.store.now_playing().map(|c| c.name.clone()).unwrap_or_default());
                if last_playing.as_ref() != Some(&playing) {
                    match &playing {
                        Some(name) if !name.is_empty() => println!("Playing: {}", name),
                        Some(_) => println!("Playing"),
                        None => println!("Stopped"),
                    }
                    last_playing = Some(playing);
                }

                let notice = app.notice().map(str::to_string);
                if notice.is_some() && notice != last_notice {
                    if let Some(message) = &notice {
                        eprintln!("{}", message);
                    }
                }
                last_notice = notice;
            }
            changed = theme_rx.changed() => {
                if changed.is_err() {
                    continue;
                }
                let dark = *theme_rx.borrow_and_update();
                println!("Theme: {}", if dark { "dark" } else { "light" });
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    sync.abort();
    Ok(())
}

fn open_theme() -> Result<ThemeStore, anyhow::Error> {
    let path = LocalStorage::default_path()
        .ok_or_else(|| anyhow!("Cannot determine config directory"))?;
    ThemeStore::open(LocalStorage::open(path)?)
}

fn run_theme(action: ThemeCommand) -> Result<(), anyhow::Error> {
    let mut theme = open_theme()?;
    let dark = match action {
        ThemeCommand::Show => theme.is_dark(),
        ThemeCommand::Toggle => theme.toggle()?,
        ThemeCommand::Dark => {
            theme.set_dark(true)?;
            true
        }
        ThemeCommand::Light => {
            theme.set_dark(false)?;
            false
        }
    };
    println!("{}", if dark { "dark" } else { "light" });
    Ok(())
}
