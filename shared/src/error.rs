//! Error types for the game core
//!
//! Every variant here is handled on the peer that produced it. Rejections are
//! shown to the local user and never travel over the network.

use crate::state::Color;
use thiserror::Error;

/// Illegal-move rejections produced by the engine
///
/// The `Display` text is the notice shown to the acting user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("The game has not started yet")]
    GameNotStarted,

    #[error("The game is already over")]
    GameOver,

    #[error("It is {0}'s turn")]
    NotYourTurn(Color),

    #[error("Roll the dice first")]
    NoDiceRoll,

    #[error("A 6 is needed to leave home")]
    NeedSix,

    #[error("Token {0} cannot move with this roll")]
    NotSelectable(u8),

    #[error("There is no {color} token {token}")]
    UnknownToken { color: Color, token: u8 },

    #[error("Token {0} is still at home")]
    TokenAtHome(u8),

    #[error("Token {0} has already finished")]
    TokenFinished(u8),

    #[error("Starting position blocked!")]
    StartBlocked,

    #[error("Blocked by your token!")]
    SelfBlocked,

    #[error("Exact roll needed!")]
    ExactRollNeeded,

    #[error("No players to take a turn")]
    NoPlayers,
}

/// Slot management refusals on the host before the game starts
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LobbyError {
    #[error("The game has already started")]
    AlreadyStarted,

    #[error("Maximum {0} players")]
    Full(usize),

    #[error("There is no player slot {0}")]
    UnknownSlot(usize),

    #[error("Cannot remove player who has already joined")]
    SlotJoined(usize),

    #[error("Color {0} is already taken")]
    ColorTaken(Color),

    #[error("Player slot {0} is already taken")]
    SlotTaken(usize),

    #[error("Endpoint {0} already holds a slot")]
    AlreadySeated(String),

    #[error("Need at least {needed} players, have {have}")]
    TooFewPlayers { needed: usize, have: usize },
}

/// Local command refusals at the role layer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Only the host can do that")]
    NotHost,

    #[error("Pick a player slot first")]
    NoSlot,

    #[error("Wait for your turn")]
    NotYourTurn,

    #[error("Finish the current roll first")]
    RollPending,

    #[error("Dice roll {0} is out of range")]
    InvalidRoll(u8),

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

/// Frame decoding failures on the wire
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame has no message type")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown color: {0}")]
pub struct ParseColorError(pub String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Missing argument for {0}")]
    MissingArgument(&'static str),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error(transparent)]
    Color(#[from] ParseColorError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinLinkError {
    #[error("Join link has no game parameter")]
    MissingGame,

    #[error("Join link carries an empty host endpoint")]
    EmptyEndpoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_error_notices_match_user_messages() {
        assert_eq!(MoveError::SelfBlocked.to_string(), "Blocked by your token!");
        assert_eq!(MoveError::ExactRollNeeded.to_string(), "Exact roll needed!");
        assert_eq!(
            MoveError::StartBlocked.to_string(),
            "Starting position blocked!"
        );
    }

    #[test]
    fn test_action_error_wraps_move_error_transparently() {
        let err: ActionError = MoveError::ExactRollNeeded.into();
        assert_eq!(err.to_string(), "Exact roll needed!");
        assert_eq!(err, ActionError::Move(MoveError::ExactRollNeeded));
    }

    #[test]
    fn test_lobby_error_formatting() {
        let err = LobbyError::TooFewPlayers { needed: 2, have: 1 };
        assert_eq!(err.to_string(), "Need at least 2 players, have 1");
        assert_eq!(LobbyError::Full(4).to_string(), "Maximum 4 players");
    }
}
