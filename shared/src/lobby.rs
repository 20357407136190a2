//! Host-side slot management before the game starts
//!
//! Every operation takes the current snapshot and returns the next one; the
//! caller stores it and broadcasts it. Nothing here mutates in place.

use crate::error::LobbyError;
use crate::state::{Color, GameState, PlayerSlot};
use crate::{MAX_PLAYERS, MIN_PLAYERS};
use log::info;

/// Slot bookkeeping that lives only on the host
#[derive(Debug, Default, Clone)]
pub struct Lobby {
    slots_created: usize,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a slot with the first free palette color
    ///
    /// Without a name the slot is called `Player N`, where N counts every
    /// slot created so far, removed ones included.
    pub fn add_slot(&mut self, state: &GameState, name: Option<&str>) -> Result<GameState, LobbyError> {
        ensure_lobby(state)?;
        if state.players.len() >= MAX_PLAYERS {
            return Err(LobbyError::Full(MAX_PLAYERS));
        }

        let color = Color::ALL
            .into_iter()
            .find(|color| state.slot_by_color(*color).is_none())
            .ok_or(LobbyError::Full(MAX_PLAYERS))?;

        self.slots_created += 1;
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Player {}", self.slots_created),
        };

        info!("Adding slot '{}' as {}", name, color);
        let mut next = state.clone();
        next.players.push(PlayerSlot::new(name, color));
        Ok(next)
    }

    /// Drops a slot nobody has claimed yet
    ///
    /// Later slots shift down by one, so indices held by the console or by
    /// players' pending claims refer to the next slot afterwards.
    pub fn remove_slot(&self, state: &GameState, index: usize) -> Result<GameState, LobbyError> {
        ensure_lobby(state)?;
        let slot = slot_at(state, index)?;
        if slot.joined {
            return Err(LobbyError::SlotJoined(index));
        }

        let mut next = state.clone();
        let removed = next.players.remove(index);
        info!("Removed slot '{}' ({})", removed.name, removed.color);
        Ok(next)
    }

    /// Sets a slot's display name, trimmed
    ///
    /// Works on claimed slots too; the name is cosmetic and not part of
    /// any identity check.
    pub fn rename_slot(&self, state: &GameState, index: usize, name: &str) -> Result<GameState, LobbyError> {
        ensure_lobby(state)?;
        slot_at(state, index)?;

        let mut next = state.clone();
        next.players[index].name = name.trim().to_string();
        Ok(next)
    }

    /// Sets or clears a slot's avatar reference
    pub fn set_avatar(
        &self,
        state: &GameState,
        index: usize,
        avatar: Option<String>,
    ) -> Result<GameState, LobbyError> {
        ensure_lobby(state)?;
        slot_at(state, index)?;

        let mut next = state.clone();
        next.players[index].avatar = avatar;
        Ok(next)
    }

    /// Changes a slot's color unless another slot already holds it
    pub fn recolor_slot(&self, state: &GameState, index: usize, color: Color) -> Result<GameState, LobbyError> {
        ensure_lobby(state)?;
        slot_at(state, index)?;

        match state.slot_by_color(color) {
            Some((holder, _)) if holder == index => return Ok(state.clone()),
            Some(_) => return Err(LobbyError::ColorTaken(color)),
            None => {}
        }

        let mut next = state.clone();
        next.players[index].color = color;
        Ok(next)
    }

    /// Binds a slot to a remote endpoint; the first claim wins
    ///
    /// Claiming the slot an endpoint already holds succeeds without change.
    pub fn claim_slot(&self, state: &GameState, index: usize, remote_id: &str) -> Result<GameState, LobbyError> {
        ensure_lobby(state)?;
        let slot = slot_at(state, index)?;

        if slot.is_claimed_by(remote_id) {
            return Ok(state.clone());
        }
        if slot.remote_id.is_some() || slot.joined {
            return Err(LobbyError::SlotTaken(index));
        }
        if state.slot_index_by_remote_id(remote_id).is_some() {
            return Err(LobbyError::AlreadySeated(remote_id.to_string()));
        }

        let mut next = state.clone();
        let slot = &mut next.players[index];
        slot.remote_id = Some(remote_id.to_string());
        slot.joined = true;
        info!("Slot {} ('{}') claimed by {}", index, slot.name, remote_id);
        Ok(next)
    }

    /// Starts the game with the joined slots
    ///
    /// The host takes the first unclaimed slot unless it already holds one.
    /// Slots still unclaimed after that are dropped, and the remaining slots
    /// must number at least two. Turn order is slot order.
    pub fn start_game(&self, state: &GameState, host_id: &str) -> Result<GameState, LobbyError> {
        ensure_lobby(state)?;

        let mut next = state.clone();
        if next.slot_index_by_remote_id(host_id).is_none() {
            if let Some(slot) = next.players.iter_mut().find(|slot| slot.remote_id.is_none()) {
                slot.remote_id = Some(host_id.to_string());
                slot.joined = true;
                info!("Host plays as '{}' ({})", slot.name, slot.color);
            }
        }

        next.players.retain(|slot| slot.joined);
        if next.players.len() < MIN_PLAYERS {
            return Err(LobbyError::TooFewPlayers {
                needed: MIN_PLAYERS,
                have: next.players.len(),
            });
        }

        next.initialize_tokens();
        next.game_started = true;
        next.current_turn = next.players.first().map(|slot| slot.color);
        next.dice_roll = None;
        next.selectable_tokens.clear();
        next.winner = None;

        info!("Game started with {} players", next.players.len());
        Ok(next)
    }
}

fn ensure_lobby(state: &GameState) -> Result<(), LobbyError> {
    if state.game_started {
        Err(LobbyError::AlreadyStarted)
    } else {
        Ok(())
    }
}

fn slot_at(state: &GameState, index: usize) -> Result<&PlayerSlot, LobbyError> {
    state.players.get(index).ok_or(LobbyError::UnknownSlot(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby_with(n: usize) -> (Lobby, GameState) {
        let mut lobby = Lobby::new();
        let mut state = GameState::new();
        for _ in 0..n {
            state = lobby.add_slot(&state, None).unwrap();
        }
        (lobby, state)
    }

    #[test]
    fn test_add_slot_uses_palette_order_and_counter() {
        let (mut lobby, state) = lobby_with(2);
        assert_eq!(state.players[0].name, "Player 1");
        assert_eq!(state.players[0].color, Color::Red);
        assert_eq!(state.players[1].color, Color::Green);

        let state = lobby.remove_slot(&state, 0).unwrap();
        let state = lobby.add_slot(&state, None).unwrap();
        assert_eq!(state.players[1].name, "Player 3");
        assert_eq!(state.players[1].color, Color::Red);

        let state = lobby.add_slot(&state, Some("  Ada ")).unwrap();
        assert_eq!(state.players[2].name, "Ada");
        assert_eq!(state.players[2].color, Color::Yellow);
    }

    #[test]
    fn test_add_slot_refuses_fifth_player() {
        let (mut lobby, state) = lobby_with(4);
        assert_eq!(lobby.add_slot(&state, None), Err(LobbyError::Full(4)));
    }

    #[test]
    fn test_remove_joined_slot_refused() {
        let (lobby, state) = lobby_with(2);
        let state = lobby.claim_slot(&state, 1, "peer-a").unwrap();
        assert_eq!(lobby.remove_slot(&state, 1), Err(LobbyError::SlotJoined(1)));
        assert_eq!(lobby.remove_slot(&state, 9), Err(LobbyError::UnknownSlot(9)));
    }

    #[test]
    fn test_recolor_refuses_taken_color() {
        let (lobby, state) = lobby_with(2);
        assert_eq!(
            lobby.recolor_slot(&state, 0, Color::Green),
            Err(LobbyError::ColorTaken(Color::Green))
        );

        let state = lobby.recolor_slot(&state, 0, Color::Blue).unwrap();
        assert_eq!(state.players[0].color, Color::Blue);
        assert_eq!(lobby.recolor_slot(&state, 0, Color::Blue).unwrap(), state);
    }

    #[test]
    fn test_rename_and_avatar() {
        let (lobby, state) = lobby_with(1);
        let state = lobby.rename_slot(&state, 0, "Grace").unwrap();
        let state = lobby
            .set_avatar(&state, 0, Some("avatars/owl.png".to_string()))
            .unwrap();
        assert_eq!(state.players[0].name, "Grace");
        assert_eq!(state.players[0].avatar.as_deref(), Some("avatars/owl.png"));
    }

    #[test]
    fn test_first_claim_wins() {
        let (lobby, state) = lobby_with(2);
        let state = lobby.claim_slot(&state, 0, "peer-a").unwrap();
        assert_eq!(
            lobby.claim_slot(&state, 0, "peer-b"),
            Err(LobbyError::SlotTaken(0))
        );
        assert_eq!(lobby.claim_slot(&state, 0, "peer-a").unwrap(), state);
        assert_eq!(
            lobby.claim_slot(&state, 1, "peer-a"),
            Err(LobbyError::AlreadySeated("peer-a".to_string()))
        );
    }

    #[test]
    fn test_start_game_seats_host_and_drops_empty_slots() {
        let (lobby, state) = lobby_with(3);
        let state = lobby.claim_slot(&state, 0, "peer-a").unwrap();

        let started = lobby.start_game(&state, "host").unwrap();
        assert!(started.game_started);
        assert_eq!(started.players.len(), 2);
        assert_eq!(started.players[1].remote_id.as_deref(), Some("host"));
        assert_eq!(started.current_turn, Some(Color::Red));
        assert_eq!(started.tokens.len(), 2);
        assert!(started.invariant_violations().is_empty());
    }

    #[test]
    fn test_start_game_needs_two_players() {
        let (lobby, state) = lobby_with(1);
        assert_eq!(
            lobby.start_game(&state, "host"),
            Err(LobbyError::TooFewPlayers { needed: 2, have: 1 })
        );
    }

    #[test]
    fn test_lobby_frozen_after_start() {
        let (mut lobby, state) = lobby_with(2);
        let state = lobby.claim_slot(&state, 0, "peer-a").unwrap();
        let state = lobby.start_game(&state, "host").unwrap();

        assert_eq!(lobby.add_slot(&state, None), Err(LobbyError::AlreadyStarted));
        assert_eq!(
            lobby.claim_slot(&state, 1, "peer-b"),
            Err(LobbyError::AlreadyStarted)
        );
        assert_eq!(
            lobby.start_game(&state, "host"),
            Err(LobbyError::AlreadyStarted)
        );
    }
}
