//! # subcast-server
//!
//! Axum HTTP + `WebSocket` server for the subcast relay.
//!
//! - `POST /send`: accepts a message and hands it to the bus publisher
//! - `GET /ws`: upgrades to a `WebSocket` and registers the client for fan-out
//! - `GET /health`: liveness check with uptime and connection count
//! - One bus bridge task drains the shared subscription and broadcasts each
//!   payload to every connected client
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod health;
pub mod ingress;
pub mod server;
pub mod shutdown;
pub mod websocket;
