//! # subcast-bus
//!
//! Thin typed wrapper over the NATS client for the subcast relay.
//!
//! - One long-lived connection per process, established at startup
//! - `publish` / `subscribe` on plain string subjects
//! - [`BusSubscription`] exposes message payloads as a `futures::Stream`

#![deny(unsafe_code)]

pub mod client;
pub mod errors;

pub use client::{BusClient, BusSubscription};
pub use errors::BusError;
