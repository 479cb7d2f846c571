//! yb-disk: Yandex Disk adapter for ya-backup
//!
//! This crate provides the implementation of the RemoteStore trait
//! using the Yandex Disk REST API. It is the only crate that talks HTTP.

pub mod api;
pub mod client;

pub use client::{API_URL, DiskClient};
