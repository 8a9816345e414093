//! fintrack: a personal finance tracker.
//!
//! Transactions and categories live in a local store. Reports are computed from them on demand,
//! and every change can be pushed to a remote spreadsheet on a best-effort basis.

pub mod api;
pub mod app;
pub mod args;
mod backup;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod report;
pub mod store;
mod utils;


pub use api::Mode;
pub use backup::Backup;
pub use config::{Config, SyncSettings};
pub use error::{Error, ErrorType, Result};
