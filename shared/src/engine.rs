//! Turn and move engine
//!
//! Pure functions over a borrowed [`GameState`]. Each successful move returns
//! a brand new snapshot together with the [`GameEvent`]s it caused, so the
//! peer that initiated the move and the host that re-checks it end up with
//! identical results. A rejected move returns a [`MoveError`] and leaves the
//! caller's snapshot untouched.

use crate::error::MoveError;
use crate::state::{Color, GameState, Token};
use crate::{is_safe_spot, FINISH_POSITION, LOOP_LENGTH, TOKENS_PER_PLAYER};
use rand::Rng;
use std::collections::BTreeSet;

/// Something a move did, for the presentation layer to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    LeftHome { color: Color, token: u8 },
    Moved { color: Color, token: u8, position: i8 },
    EnteredHomeStretch { color: Color, token: u8, position: i8 },
    Captured { color: Color, token: u8, by: Color },
    Finished { color: Color, token: u8 },
    Winner(Color),
}

/// Result of a successful move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub state: GameState,
    pub events: Vec<GameEvent>,
}

impl MoveOutcome {
    fn new(state: GameState) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    pub fn winner(&self) -> Option<Color> {
        self.state.winner
    }

    pub fn captures(&self) -> impl Iterator<Item = (Color, u8)> + '_ {
        self.events.iter().filter_map(|event| match event {
            GameEvent::Captured { color, token, .. } => Some((*color, *token)),
            _ => None,
        })
    }
}

/// What the mover does once its move has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    RollAgain,
    AdvanceTurn,
    GameOver(Color),
}

pub fn roll_die<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(1..=6)
}

pub fn is_valid_roll(roll: u8) -> bool {
    (1..=6).contains(&roll)
}

/// Token indices of `color` that the rules allow to move with `roll`
///
/// Home tokens need a 6, stretch tokens must not overshoot the finish, loop
/// tokens can always move, finished tokens never can. Blocking is not
/// considered here; see [`legal_moves`].
pub fn compute_selectable_tokens(state: &GameState, color: Color, roll: u8) -> BTreeSet<u8> {
    let Some(tokens) = state.tokens_of(color) else {
        return BTreeSet::new();
    };

    tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| can_move_with(token, roll))
        .map(|(index, _)| index as u8)
        .collect()
}

fn can_move_with(token: &Token, roll: u8) -> bool {
    if token.finished {
        false
    } else if token.is_home() {
        roll == 6
    } else if token.in_home_stretch {
        token.position + roll as i8 <= FINISH_POSITION
    } else {
        true
    }
}

/// Selectable tokens whose move would actually be accepted
///
/// This is the set a roll publishes; an empty set means the roller has no
/// legal move and the turn passes.
pub fn legal_moves(state: &GameState, color: Color, roll: u8) -> BTreeSet<u8> {
    compute_selectable_tokens(state, color, roll)
        .into_iter()
        .filter(|&token_id| resolve(state, color, token_id, roll).is_ok())
        .collect()
}

fn resolve(
    state: &GameState,
    color: Color,
    token_id: u8,
    roll: u8,
) -> Result<MoveOutcome, MoveError> {
    let token = lookup(state, color, token_id)?;
    if token.is_home() {
        if roll != 6 {
            return Err(MoveError::NeedSix);
        }
        enter_from_home(state, color, token_id)
    } else {
        move_on_board(state, color, token_id, roll)
    }
}

fn lookup(state: &GameState, color: Color, token_id: u8) -> Result<Token, MoveError> {
    state
        .token(color, token_id)
        .copied()
        .ok_or(MoveError::UnknownToken {
            color,
            token: token_id,
        })
}

/// Moves a home token onto its color's start cell
///
/// Needs a pending roll of 6 with `token_id` among the selectable tokens.
pub fn move_from_home(
    state: &GameState,
    color: Color,
    token_id: u8,
) -> Result<MoveOutcome, MoveError> {
    if state.dice_roll != Some(6) {
        return Err(MoveError::NeedSix);
    }
    if !state.selectable_tokens.contains(&token_id) {
        return Err(MoveError::NotSelectable(token_id));
    }
    enter_from_home(state, color, token_id)
}

fn enter_from_home(
    state: &GameState,
    color: Color,
    token_id: u8,
) -> Result<MoveOutcome, MoveError> {
    let token = lookup(state, color, token_id)?;
    if token.finished {
        return Err(MoveError::TokenFinished(token_id));
    }
    if !token.is_home() {
        return Err(MoveError::NotSelectable(token_id));
    }

    let start = color.start_index();
    ensure_free(state, color, token_id, start, false).map_err(|_| MoveError::StartBlocked)?;

    let mut outcome = MoveOutcome::new(state.clone());
    if !is_safe_spot(start) {
        capture_at(&mut outcome, color, start);
    }
    if let Some(token) = outcome.state.token_mut(color, token_id) {
        token.position = start;
        token.in_home_stretch = false;
    }
    outcome.events.push(GameEvent::LeftHome {
        color,
        token: token_id,
    });

    Ok(outcome)
}

/// Moves a token that is already on the loop or in its home stretch
pub fn move_on_board(
    state: &GameState,
    color: Color,
    token_id: u8,
    roll: u8,
) -> Result<MoveOutcome, MoveError> {
    let token = lookup(state, color, token_id)?;
    if token.finished {
        return Err(MoveError::TokenFinished(token_id));
    }
    if token.is_home() {
        return Err(MoveError::TokenAtHome(token_id));
    }

    let step = roll as i8;
    let mut outcome = MoveOutcome::new(state.clone());

    if token.in_home_stretch {
        let target = token.position + step;
        if target > FINISH_POSITION {
            return Err(MoveError::ExactRollNeeded);
        }

        if target == FINISH_POSITION {
            if let Some(token) = outcome.state.token_mut(color, token_id) {
                token.finish();
            }
            outcome.events.push(GameEvent::Finished {
                color,
                token: token_id,
            });
            if check_for_winner(&outcome.state, color) {
                outcome.state.winner = Some(color);
                outcome.events.push(GameEvent::Winner(color));
            }
        } else {
            ensure_free(state, color, token_id, target, true)?;
            if let Some(token) = outcome.state.token_mut(color, token_id) {
                token.position = target;
            }
            outcome.events.push(GameEvent::Moved {
                color,
                token: token_id,
                position: target,
            });
        }
        return Ok(outcome);
    }

    let entry = color.home_stretch_entry();
    let target = token.position + step;

    // The whole turn into the stretch happens within this one roll.
    if token.position < entry && target >= entry {
        let stretch_position = target - entry;
        ensure_free(state, color, token_id, stretch_position, true)?;
        if let Some(token) = outcome.state.token_mut(color, token_id) {
            token.position = stretch_position;
            token.in_home_stretch = true;
        }
        outcome.events.push(GameEvent::EnteredHomeStretch {
            color,
            token: token_id,
            position: stretch_position,
        });
    } else {
        let target = target % LOOP_LENGTH;
        ensure_free(state, color, token_id, target, false)?;
        if let Some(token) = outcome.state.token_mut(color, token_id) {
            token.position = target;
        }
        outcome.events.push(GameEvent::Moved {
            color,
            token: token_id,
            position: target,
        });
        if !is_safe_spot(target) {
            capture_at(&mut outcome, color, target);
        }
    }

    Ok(outcome)
}

fn ensure_free(
    state: &GameState,
    color: Color,
    token_id: u8,
    position: i8,
    in_home_stretch: bool,
) -> Result<(), MoveError> {
    let blocked = state.tokens_of(color).is_some_and(|tokens| {
        tokens
            .iter()
            .enumerate()
            .any(|(index, t)| index != token_id as usize && t.occupies(position, in_home_stretch))
    });

    if blocked {
        Err(MoveError::SelfBlocked)
    } else {
        Ok(())
    }
}

/// Sends every opposing token on loop cell `position` back home
fn capture_at(outcome: &mut MoveOutcome, mover: Color, position: i8) {
    for (&color, tokens) in outcome.state.tokens.iter_mut() {
        if color == mover {
            continue;
        }
        for (index, token) in tokens.iter_mut().enumerate() {
            if token.occupies(position, false) {
                token.send_home();
                outcome.events.push(GameEvent::Captured {
                    color,
                    token: index as u8,
                    by: mover,
                });
            }
        }
    }
}

/// True when every token of `color` has finished
pub fn check_for_winner(state: &GameState, color: Color) -> bool {
    state
        .tokens_of(color)
        .is_some_and(|tokens| tokens.len() == TOKENS_PER_PLAYER && tokens.iter().all(|t| t.finished))
}

/// Next color in slot order after the current turn
///
/// Every slot stays in the rotation, connected or not.
pub fn advance_turn(state: &GameState) -> Result<Color, MoveError> {
    if !state.game_started {
        return Err(MoveError::GameNotStarted);
    }
    if state.is_over() {
        return Err(MoveError::GameOver);
    }
    if state.players.is_empty() {
        return Err(MoveError::NoPlayers);
    }

    let next = state
        .current_turn
        .and_then(|turn| state.players.iter().position(|slot| slot.color == turn))
        .map_or(0, |index| (index + 1) % state.players.len());

    Ok(state.players[next].color)
}

/// Validates and applies the current roller's choice of token
///
/// Checks the game phase, the turn, the pending roll and the selectable set,
/// then resolves the move. The selectable set is cleared in the result so the
/// same roll cannot be spent twice.
pub fn apply_move(state: &GameState, color: Color, token_id: u8) -> Result<MoveOutcome, MoveError> {
    if !state.game_started {
        return Err(MoveError::GameNotStarted);
    }
    if state.is_over() {
        return Err(MoveError::GameOver);
    }
    match state.current_turn {
        Some(turn) if turn == color => {}
        Some(turn) => return Err(MoveError::NotYourTurn(turn)),
        None => return Err(MoveError::GameNotStarted),
    }

    let roll = state.dice_roll.ok_or(MoveError::NoDiceRoll)?;
    if !state.selectable_tokens.contains(&token_id) {
        return Err(MoveError::NotSelectable(token_id));
    }

    let token = lookup(state, color, token_id)?;
    let mut outcome = if token.is_home() {
        move_from_home(state, color, token_id)?
    } else {
        move_on_board(state, color, token_id, roll)?
    };
    outcome.state.selectable_tokens.clear();

    Ok(outcome)
}

pub fn follow_up(state: &GameState, roll: u8) -> FollowUp {
    match state.winner {
        Some(winner) => FollowUp::GameOver(winner),
        None if roll == 6 => FollowUp::RollAgain,
        None => FollowUp::AdvanceTurn,
    }
}
