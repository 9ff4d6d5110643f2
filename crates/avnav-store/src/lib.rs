//! # avnav-store
//!
//! Navigational data store shared by all data sources of a vessel.
//!
//! This crate provides:
//! - Key registry with exact and wildcard key ownership
//! - Value store with priority arbitration and lazy expiry
//! - AIS store merging static and dynamic reports per MMSI
//! - Flat and nested query views over both stores
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! Every operation completes while holding a short-lived lock and never blocks on I/O.

pub mod clock;
pub mod config;
pub mod error;
pub mod key;
pub mod model;
pub mod store;

mod ais;
mod query;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, StoreConfig};
pub use error::{Result, StoreError};
pub use key::{wildcard_match, KeyRegistry};
pub use model::*;
pub use store::NavStore;
