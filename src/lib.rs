//! # hitmanstat
//!
//! Status backend for the HITMAN game services.
//!
//! Pollers fetch the upstream status document and probe the forum. Every
//! unhealthy observation goes through a [`gate::DebounceGate`], which drops
//! isolated blips, writes confirmed incidents and then locks the key out for
//! a growing window so an ongoing outage is recorded once, not every poll.
//!
//! ## Modules
//!
//! - [`cache`]: transient key-value cache with per-entry TTL
//! - [`gate`]: debounce/backoff gate
//! - [`health`]: upstream document, service catalog and classification
//! - [`services`]: background pollers and the status board
//! - [`storage`]: event and report persistence
//! - [`reports`]: user outage reports and their chart
//! - [`config`]: TOML configuration

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod health;
pub mod reports;
pub mod services;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
