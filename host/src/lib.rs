//! # Ludo Host
//!
//! The authoritative side of a session. The host owns the canonical
//! [`shared::GameState`], accepts every player connection, checks each roll
//! and move a player reports against its own board, and forwards what it
//! accepts to everyone else.
//!
//! ## Module Organization
//!
//! - [`connection_manager`]: connection ids, capacity and per-connection
//!   outgoing queues
//! - [`network`]: the [`network::HostServer`] event loop over a TCP listener
//!
//! ## Wire Format
//!
//! Newline-delimited JSON, one [`shared::Message`] per line. Undecodable
//! lines are logged and skipped; the connection stays open.
//!
//! ```rust,no_run
//! use host::network::HostServer;
//! use shared::Peer;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut peer = Peer::host("host");
//!     peer.add_slot(Some("Ada"))?;
//!     peer.add_slot(None)?;
//!
//!     let mut server = HostServer::bind("127.0.0.1:7878", peer, 8).await?;
//!     println!("{}", server.join_link());
//!
//!     let (_commands, command_rx) = mpsc::unbounded_channel();
//!     server.run(command_rx).await
//! }
//! ```

pub mod connection_manager;
pub mod network;

pub use network::{HostError, HostServer};
