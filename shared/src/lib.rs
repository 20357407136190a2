//! # Shared Game Core
//!
//! Everything both roles of a Ludo session must agree on bit for bit: the
//! replicated data model, the wire protocol, and the deterministic turn and
//! move rules. The `host` and `player` crates only add sockets and a console
//! on top of this crate.
//!
//! ## Module Organization
//!
//! - [`state`]: colors, player slots, tokens and the replicated [`GameState`]
//! - [`store`]: the per-peer [`StateStore`] every read and write goes through
//! - [`engine`]: pure move resolution, captures, win detection, turn rotation
//! - [`lobby`]: host-side slot management before the game starts
//! - [`protocol`] and [`codec`]: the message vocabulary, its JSON encoding and
//!   length-capped line framing
//! - [`peer`]: the role coordinator that turns messages and local input into
//!   state transitions, outbound messages and presentation events
//! - [`command`], [`render`], [`join`]: console input, text output and join links
//!
//! ## Determinism
//!
//! Engine functions take a borrowed snapshot and return a new one. Given the
//! same snapshot and the same request they produce the same result on every
//! peer, which is what lets the host re-run a player's move and compare.

pub mod codec;
pub mod command;
pub mod engine;
pub mod error;
pub mod join;
pub mod lobby;
pub mod peer;
pub mod protocol;
pub mod render;
pub mod state;
pub mod store;

pub use error::{ActionError, CodecError, LobbyError, MoveError};
pub use peer::{ConnectionId, Dispatch, Outbound, Peer, PeerEvent, Phase, Role};
pub use protocol::{Message, MoveDescriptor};
pub use state::{Color, GameState, PlayerSlot, Token};
pub use store::{StateStore, StateUpdate};

/// Cells on the shared loop every color travels
pub const LOOP_LENGTH: i8 = 52;
/// Token position meaning "still in the home yard"
pub const HOME_POSITION: i8 = -1;
/// Stretch-relative slot a token occupies once it has finished
pub const FINISH_POSITION: i8 = 6;
/// Distance from a color's start cell to its home-stretch entry
pub const HOME_STRETCH_OFFSET: i8 = 50;
pub const TOKENS_PER_PLAYER: usize = 4;
pub const MAX_PLAYERS: usize = 4;
pub const MIN_PLAYERS: usize = 2;
/// Start cells plus the four star cells; no capture happens on these
pub const SAFE_SPOTS: [i8; 8] = [0, 5, 13, 19, 26, 32, 39, 44];

pub fn is_safe_spot(position: i8) -> bool {
    SAFE_SPOTS.contains(&position)
}
