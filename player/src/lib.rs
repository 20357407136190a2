//! # Ludo Player
//!
//! The follower side of a session. A player connects to the host named in a
//! join link, asks for the current game state, claims a slot, and then plays
//! its own turns: rolls and moves are computed locally with the shared engine
//! and reported to the host, which checks them and passes them on.
//!
//! Everything else a player sees comes from the host and replaces or updates
//! its local snapshot in the order it arrives.

pub mod network;

pub use network::{PlayerClient, PlayerError};
