//! Plain-text rendering for the console binaries

use crate::engine::GameEvent;
use crate::peer::PeerEvent;
use crate::state::{GameState, Token};
use crate::FINISH_POSITION;
use std::fmt::Write;

/// Multi-line summary of the lobby or the board
pub fn describe_state(state: &GameState) -> String {
    let mut out = String::new();

    if !state.game_started {
        let _ = writeln!(out, "Lobby ({} slots):", state.players.len());
        for (index, slot) in state.players.iter().enumerate() {
            let status = match (&slot.remote_id, slot.joined) {
                (Some(id), true) => format!("joined by {}", id),
                _ => "open".to_string(),
            };
            let _ = write!(out, "  [{}] {:<12} {:<7} {}", index, slot.name, slot.color, status);
            if let Some(avatar) = &slot.avatar {
                let _ = write!(out, " ({})", avatar);
            }
            out.push('\n');
        }
        return out;
    }

    for slot in &state.players {
        let marker = if state.current_turn == Some(slot.color) { '>' } else { ' ' };
        let _ = write!(out, "{} {:<12} {:<7}", marker, slot.name, slot.color);
        if let Some(tokens) = state.tokens_of(slot.color) {
            for token in tokens {
                let _ = write!(out, " {}:{}", token.id, describe_token(token));
            }
        }
        out.push('\n');
    }

    if let Some(roll) = state.dice_roll {
        let _ = writeln!(out, "Dice: {}  movable: {:?}", roll, state.selectable_tokens);
    }
    if let Some(winner) = state.winner {
        let _ = writeln!(out, "Winner: {}", winner);
    }
    out
}

pub fn describe_token(token: &Token) -> String {
    if token.finished {
        "done".to_string()
    } else if token.is_home() {
        "home".to_string()
    } else if token.in_home_stretch {
        format!("H{}/{}", token.position, FINISH_POSITION)
    } else {
        token.position.to_string()
    }
}

pub fn describe_game_event(event: &GameEvent) -> String {
    match event {
        GameEvent::LeftHome { color, token } => format!("{} token {} leaves home", color, token),
        GameEvent::Moved {
            color,
            token,
            position,
        } => format!("{} token {} moves to {}", color, token, position),
        GameEvent::EnteredHomeStretch {
            color,
            token,
            position,
        } => format!("{} token {} enters the home stretch at {}", color, token, position),
        GameEvent::Captured { color, token, by } => {
            format!("{} captures {} token {}", by, color, token)
        }
        GameEvent::Finished { color, token } => format!("{} token {} is home", color, token),
        GameEvent::Winner(color) => format!("{} has all tokens home", color),
    }
}

/// One line per peer event; `None` for events that carry nothing to print
pub fn describe_event(event: &PeerEvent) -> Option<String> {
    let line = match event {
        PeerEvent::LobbyChanged => return None,
        PeerEvent::ShowSlotSelection => "Pick a slot with `select <slot>`".to_string(),
        PeerEvent::SlotChosen { index } => {
            format!("You hold slot {}. Waiting for the host to start", index)
        }
        PeerEvent::AlreadyStarted => "The game has already started".to_string(),
        PeerEvent::GameStarted { my_color: Some(color) } => {
            format!("Game started, you play {}", color)
        }
        PeerEvent::GameStarted { my_color: None } => "Game started, you are watching".to_string(),
        PeerEvent::Resumed { color } => format!("Rejoined as {}", color),
        PeerEvent::DiceRolled {
            color,
            roll,
            selectable,
        } => {
            if selectable.is_empty() {
                format!("{} rolled {}", color, roll)
            } else {
                format!("{} rolled {}, can move {:?}", color, roll, selectable)
            }
        }
        PeerEvent::ChooseToken { tokens } => format!("Choose a token with `move <n>`: {:?}", tokens),
        PeerEvent::BoardChanged(events) if events.is_empty() => return None,
        PeerEvent::BoardChanged(events) => events
            .iter()
            .map(describe_game_event)
            .collect::<Vec<_>>()
            .join("\n"),
        PeerEvent::RollAgain => "Rolled a 6, roll again".to_string(),
        PeerEvent::YourTurn => "Your turn, type `roll`".to_string(),
        PeerEvent::TurnChanged { turn } => format!("{}'s turn", turn),
        PeerEvent::GameOver { winner, mine: true } => format!("You win as {}!", winner),
        PeerEvent::GameOver { winner, mine: false } => format!("{} wins", winner),
        PeerEvent::Notice(text) => text.clone(),
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Color, PlayerSlot};

    #[test]
    fn test_lobby_lists_slots() {
        let mut state = GameState::new();
        state.players.push(PlayerSlot::new("Ada", Color::Red));
        let text = describe_state(&state);
        assert!(text.contains("[0] Ada"));
        assert!(text.contains("open"));
    }

    #[test]
    fn test_board_marks_current_turn() {
        let mut state = GameState::new();
        state.players.push(PlayerSlot::new("Ada", Color::Red));
        state.players.push(PlayerSlot::new("Bo", Color::Blue));
        state.initialize_tokens();
        state.game_started = true;
        state.current_turn = Some(Color::Blue);

        let text = describe_state(&state);
        let blue_line = text.lines().find(|l| l.contains("Bo")).unwrap();
        assert!(blue_line.starts_with('>'));
        assert!(blue_line.contains("0:home"));
    }

    #[test]
    fn test_token_labels() {
        let mut token = Token::new(1);
        assert_eq!(describe_token(&token), "home");
        token.position = 4;
        token.in_home_stretch = true;
        assert_eq!(describe_token(&token), "H4/6");
        token.finish();
        assert_eq!(describe_token(&token), "done");
    }

    #[test]
    fn test_quiet_events() {
        assert_eq!(describe_event(&PeerEvent::LobbyChanged), None);
        assert_eq!(describe_event(&PeerEvent::BoardChanged(Vec::new())), None);
        assert_eq!(
            describe_event(&PeerEvent::GameOver {
                winner: Color::Red,
                mine: true
            }),
            Some("You win as red!".to_string())
        );
    }
}
