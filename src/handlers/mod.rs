pub mod async_actions;
