//! Replicated game state
//!
//! [`GameState`] is the snapshot every peer holds and the host broadcasts in
//! full. Field names serialize in camelCase so the wire format reads
//! `currentTurn`, `gameStarted`, `selectableTokens` and so on.

use crate::error::ParseColorError;
use crate::{
    FINISH_POSITION, HOME_POSITION, HOME_STRETCH_OFFSET, LOOP_LENGTH, TOKENS_PER_PLAYER,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// One of the four fixed token colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
}

impl Color {
    /// Palette order, used when a new slot needs a free color
    pub const ALL: [Color; 4] = [Color::Red, Color::Green, Color::Yellow, Color::Blue];

    /// Loop cell a token of this color lands on when it leaves home
    pub fn start_index(self) -> i8 {
        match self {
            Color::Red => 0,
            Color::Yellow => 13,
            Color::Green => 26,
            Color::Blue => 39,
        }
    }

    /// Loop index at which a token of this color turns into its home stretch
    pub fn home_stretch_entry(self) -> i8 {
        (self.start_index() + HOME_STRETCH_OFFSET) % LOOP_LENGTH
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Blue => "blue",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseColorError(s.to_string()))
    }
}

/// A reserved name/color pairing, later bound to a remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSlot {
    pub name: String,
    pub color: Color,
    /// Opaque avatar reference; never interpreted by the core
    #[serde(default)]
    pub avatar: Option<String>,
    /// Endpoint that claimed this slot; immutable once set
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub joined: bool,
}

impl PlayerSlot {
    pub fn new(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color,
            avatar: None,
            remote_id: None,
            joined: false,
        }
    }

    pub fn is_claimed_by(&self, remote_id: &str) -> bool {
        self.remote_id.as_deref() == Some(remote_id)
    }
}

/// A single token
///
/// `position` is read together with `in_home_stretch`: −1 is the home yard,
/// 0–51 a loop cell, and inside the stretch 0–5 a stretch cell with 6 meaning
/// finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: u8,
    pub position: i8,
    pub in_home_stretch: bool,
    pub finished: bool,
}

impl Token {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            position: HOME_POSITION,
            in_home_stretch: false,
            finished: false,
        }
    }

    pub fn is_home(&self) -> bool {
        !self.finished && !self.in_home_stretch && self.position == HOME_POSITION
    }

    pub fn is_on_loop(&self) -> bool {
        !self.finished && !self.in_home_stretch && self.position >= 0
    }

    /// Finished tokens never occupy a cell
    pub fn occupies(&self, position: i8, in_home_stretch: bool) -> bool {
        !self.finished && self.position == position && self.in_home_stretch == in_home_stretch
    }

    pub(crate) fn send_home(&mut self) {
        self.position = HOME_POSITION;
        self.in_home_stretch = false;
    }

    pub(crate) fn finish(&mut self) {
        self.position = FINISH_POSITION;
        self.in_home_stretch = true;
        self.finished = true;
    }
}

/// The replicated snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Slot order is turn order
    pub players: Vec<PlayerSlot>,
    pub current_turn: Option<Color>,
    pub game_started: bool,
    pub tokens: BTreeMap<Color, Vec<Token>>,
    pub dice_roll: Option<u8>,
    pub selectable_tokens: BTreeSet<u8>,
    pub winner: Option<Color>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot_by_color(&self, color: Color) -> Option<(usize, &PlayerSlot)> {
        self.players
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.color == color)
    }

    pub fn slot_index_by_remote_id(&self, remote_id: &str) -> Option<usize> {
        self.players
            .iter()
            .position(|slot| slot.is_claimed_by(remote_id))
    }

    pub fn tokens_of(&self, color: Color) -> Option<&[Token]> {
        self.tokens.get(&color).map(Vec::as_slice)
    }

    pub fn token(&self, color: Color, token_id: u8) -> Option<&Token> {
        self.tokens
            .get(&color)
            .and_then(|tokens| tokens.get(token_id as usize))
    }

    pub(crate) fn token_mut(&mut self, color: Color, token_id: u8) -> Option<&mut Token> {
        self.tokens
            .get_mut(&color)
            .and_then(|tokens| tokens.get_mut(token_id as usize))
    }

    /// Puts four fresh tokens in the home yard of every slot's color
    pub fn initialize_tokens(&mut self) {
        self.tokens = self
            .players
            .iter()
            .map(|slot| {
                let tokens = (0..TOKENS_PER_PLAYER as u8).map(Token::new).collect();
                (slot.color, tokens)
            })
            .collect();
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn is_turn_of(&self, color: Color) -> bool {
        self.game_started && self.current_turn == Some(color)
    }

    /// Checks the structural invariants every applied move must preserve
    ///
    /// Returns one human-readable line per violation; an empty list means the
    /// snapshot is sound.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (i, a) in self.players.iter().enumerate() {
            for b in self.players.iter().skip(i + 1) {
                if a.color == b.color {
                    violations.push(format!("color {} held by two slots", a.color));
                }
            }
        }

        if self.game_started {
            for slot in &self.players {
                match self.tokens_of(slot.color) {
                    Some(tokens) if tokens.len() == TOKENS_PER_PLAYER => {}
                    Some(tokens) => violations.push(format!(
                        "{} has {} tokens",
                        slot.color,
                        tokens.len()
                    )),
                    None => violations.push(format!("{} has no tokens", slot.color)),
                }
            }

            match self.current_turn {
                Some(turn) if self.players.iter().any(|s| s.color == turn && s.joined) => {}
                Some(turn) => violations.push(format!("turn held by unjoined color {}", turn)),
                None => violations.push("started game without a current turn".to_string()),
            }
        }

        for (color, tokens) in &self.tokens {
            for (i, a) in tokens.iter().enumerate() {
                if a.is_home() {
                    continue;
                }
                for b in tokens.iter().skip(i + 1) {
                    if b.occupies(a.position, a.in_home_stretch) && !a.finished {
                        violations.push(format!(
                            "{} tokens {} and {} share a cell",
                            color, a.id, b.id
                        ));
                    }
                }
            }
        }

        if self.selectable_tokens.iter().any(|&id| id as usize >= TOKENS_PER_PLAYER) {
            violations.push("selectable token index out of range".to_string());
        }

        violations
    }
}
