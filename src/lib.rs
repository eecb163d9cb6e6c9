//! Rust client library for the Home Assistant WebSocket API
//!
//! This library provides an async client for Home Assistant's persistent
//! JSON-over-WebSocket control protocol. It supports:
//!
//! - Authentication with a long-lived access token
//! - Automatic reconnect with exponential backoff, re-running the handshake
//! - Subscription to `state_changed` events
//! - Polling of current entity states
//! - Generic `call_service` commands, with helpers for media players and
//!   remotes
//! - A broadcast stream of normalized entity-state updates
//!
//! # Quick Start
//!
//! ```no_run
//! use hass_ws::{Config, HassClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("192.168.1.10", 8123, "long-lived-token");
//!     let client = HassClient::connect(config);
//!
//!     // Nudge the Roku and watch state flow back
//!     client.media_player("media_player.roku").set_volume(0.3).await;
//!
//!     let mut updates = client.subscribe_states();
//!     while let Ok(update) = updates.recv().await {
//!         println!("{}: {}", update.entity_id, update.state.state);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Client**: connection ownership and the public command API
//! - **Controller**: lifecycle state machine, auth handshake, command-id
//!   correlation, inbound dispatch
//! - **Transport**: low-level WebSocket handling and reconnection
//! - **Protocol**: JSON message envelopes
//! - **State**: projection of raw attribute bags into [`EntityState`]
//!
//! Delivery is best-effort: the client mirrors the remote protocol's
//! guarantees and adds none of its own.

mod client;
mod config;
mod controller;
mod error;
mod media;
mod protocol;
mod state;
mod subscription;
mod transport;

// Public exports
pub use client::HassClient;
pub use config::Config;
pub use controller::{AuthRetryPolicy, ControllerOptions, ResponseCallback};
pub use error::{HassError, Result};
pub use media::{MediaPlayer, Remote, RemoteButton};
pub use protocol::{
    Command, CommandError, CommandResponse, EventBody, EventData, EventMessage, ServerMessage,
};
pub use state::{project, Attributes, EntityState};
pub use subscription::{StateReceiver, StateUpdate};
pub use transport::ReconnectConfig;
