//! Core Konyx library (session lifecycle, route guard, export stream, REST client, config).

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod export;
pub mod logging;
