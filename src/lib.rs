pub mod api;
pub mod app;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod filter;
pub mod flex;
pub mod handlers;
pub mod logging;
pub mod player;
pub mod state;
pub mod theme;
