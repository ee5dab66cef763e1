//! Request handlers, grouped by route prefix.

pub mod auth;
pub mod clients;
pub mod monitoring;
pub mod server;
