pub mod banner;
pub mod client;
pub mod commands;
pub mod config;
pub mod consts;
pub mod engine;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod monitor;
pub mod registry;
pub mod server;
pub mod session;
