pub mod api;
pub mod auth;
pub mod commands;
pub mod http;
pub mod session;
