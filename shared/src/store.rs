//! Per-peer holder of the replicated snapshot

use crate::state::{Color, GameState};
use log::{debug, warn};
use std::collections::BTreeSet;

/// An authoritative change to apply to the local snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateUpdate {
    /// Full replacement; discards any local speculative changes
    Replace(GameState),
    DiceRolled { roll: u8, selectable: BTreeSet<u8> },
    /// Sets the turn and clears the roll and the selectable set
    TurnChanged(Color),
    Winner(Color),
}

/// The only owner of a peer's [`GameState`]
#[derive(Debug, Default)]
pub struct StateStore {
    state: GameState,
    applied: u64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: GameState) -> Self {
        Self { state, applied: 0 }
    }

    /// Current snapshot
    pub fn get(&self) -> &GameState {
        &self.state
    }

    /// Applies an update and reports whether the snapshot observably changed
    pub fn apply(&mut self, update: StateUpdate) -> bool {
        let changed = match update {
            StateUpdate::Replace(next) => {
                if self.state == next {
                    false
                } else {
                    self.state = next;
                    true
                }
            }
            StateUpdate::DiceRolled { roll, selectable } => {
                let changed =
                    self.state.dice_roll != Some(roll) || self.state.selectable_tokens != selectable;
                self.state.dice_roll = Some(roll);
                self.state.selectable_tokens = selectable;
                changed
            }
            StateUpdate::TurnChanged(color) => {
                let changed = self.state.current_turn != Some(color)
                    || self.state.dice_roll.is_some()
                    || !self.state.selectable_tokens.is_empty();
                self.state.current_turn = Some(color);
                self.state.dice_roll = None;
                self.state.selectable_tokens.clear();
                changed
            }
            StateUpdate::Winner(color) => {
                let changed = self.state.winner != Some(color);
                self.state.winner = Some(color);
                changed
            }
        };

        self.applied += 1;
        if changed {
            debug!("State update #{} applied", self.applied);
            let violations = self.state.invariant_violations();
            if !violations.is_empty() {
                warn!("Snapshot breaks invariants: {}", violations.join("; "));
            }
        }
        changed
    }

    /// Number of updates applied so far, changed or not
    pub fn applied_updates(&self) -> u64 {
        self.applied
    }
}
