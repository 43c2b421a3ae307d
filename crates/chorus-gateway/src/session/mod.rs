//! One gateway connection for one credential.
//!
//! A session opens the websocket, waits for hello, identifies, and after a
//! settle delay announces its voice state. From then on a heartbeat task
//! and a reader task keep it alive until the caller disconnects or the
//! server drops the connection. There is no automatic reconnect.

mod client;
mod connection;
mod types;


pub use client::GatewaySession;
pub use types::{SessionConfig, SessionState, SettingsDelivery};
