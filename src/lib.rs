//! gator: a command-line RSS aggregator.
//!
//! Registered feeds are polled one at a time on a fixed interval. New items
//! are normalized and stored as posts in SQLite, deduplicated by link.

pub mod aggregator;
pub mod commands;
pub mod config;
pub mod feed;
pub mod shutdown;
pub mod storage;
