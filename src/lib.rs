//! NexusTodo: a to-do list backend with device self-registration.
//!
//! Devices register anonymously and are bound to a user; tasks are stored
//! in SQLite and served over a small JSON API under `/api`.

pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod server;
pub mod types;
