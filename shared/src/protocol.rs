//! Message vocabulary exchanged between host and players
//!
//! Every message is a JSON object whose `type` field names the kind and whose
//! remaining fields carry the payload in camelCase.

use crate::state::{Color, GameState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Sent by a player as soon as its connection opens
    RequestGameState {
        #[serde(rename = "playerId", default, skip_serializing_if = "Option::is_none")]
        player_id: Option<String>,
    },
    GameState {
        state: GameState,
    },
    PlayerSelected {
        #[serde(rename = "playerIndex")]
        player_index: usize,
        #[serde(rename = "playerId")]
        player_id: String,
    },
    GameStart {
        state: GameState,
    },
    DiceRolled {
        roll: u8,
        #[serde(rename = "selectableTokens")]
        selectable_tokens: BTreeSet<u8>,
    },
    /// Full snapshot after a move, optionally naming the move that produced it
    TokenMoved {
        state: GameState,
        #[serde(rename = "move", default, skip_serializing_if = "Option::is_none")]
        applied: Option<MoveDescriptor>,
    },
    RequestNextTurn,
    TurnChanged {
        turn: Color,
    },
    GameOver {
        winner: Color,
    },
}

/// Which token a `tokenMoved` snapshot was produced by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveDescriptor {
    pub color: Color,
    pub token_id: u8,
}

/// Every `type` value a peer understands
pub const KNOWN_TYPES: [&str; 9] = [
    "requestGameState",
    "gameState",
    "playerSelected",
    "gameStart",
    "diceRolled",
    "tokenMoved",
    "requestNextTurn",
    "turnChanged",
    "gameOver",
];

impl Message {
    /// Wire name of this message's `type`
    pub fn kind(&self) -> &'static str {
        match self {
            Message::RequestGameState { .. } => "requestGameState",
            Message::GameState { .. } => "gameState",
            Message::PlayerSelected { .. } => "playerSelected",
            Message::GameStart { .. } => "gameStart",
            Message::DiceRolled { .. } => "diceRolled",
            Message::TokenMoved { .. } => "tokenMoved",
            Message::RequestNextTurn => "requestNextTurn",
            Message::TurnChanged { .. } => "turnChanged",
            Message::GameOver { .. } => "gameOver",
        }
    }

    pub fn is_known_type(kind: &str) -> bool {
        KNOWN_TYPES.contains(&kind)
    }
}
