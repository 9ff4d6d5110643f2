//! # avnav-providers
//!
//! Data source adapters for the navigational store.
//!
//! Adapters translate already received data into store writes. They never
//! perform I/O themselves: protocol clients fetch data first and then hand it
//! to an adapter, so no network call happens while a store lock is held.

pub mod signalk;

pub use signalk::{SignalKFeeder, SIGNALK_PATH};
