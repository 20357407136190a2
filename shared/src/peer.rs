//! Role coordinator
//!
//! A [`Peer`] owns one side's [`StateStore`] and decides what every incoming
//! message and local command does to it. It never touches a socket: each call
//! returns a [`Dispatch`] listing the messages to send, in order, and the
//! events to show the local user.
//!
//! The host is authoritative. It accepts every connection, re-checks whatever
//! a player claims to have rolled or moved against its own snapshot, and
//! forwards accepted changes to the other players. A player computes its own
//! rolls and moves locally, reports them to the host, and otherwise follows.

use crate::command::LocalCommand;
use crate::engine::{self, FollowUp, GameEvent};
use crate::error::{ActionError, LobbyError, MoveError};
use crate::lobby::Lobby;
use crate::protocol::{Message, MoveDescriptor};
use crate::state::{Color, GameState};
use crate::store::{StateStore, StateUpdate};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};

/// Transport-assigned handle for one connection
pub type ConnectionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Player,
}

/// Where a peer is in the session, derived from its snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Lobby editing on the host, slot selection on a player
    Setup,
    /// Slot claimed, game not started yet
    WaitingForStart,
    ActiveTurn(Color),
    WaitingTurn(Color),
    GameOver(Color),
}

/// A message the network layer must deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send {
        to: ConnectionId,
        message: Message,
    },
    Broadcast {
        message: Message,
        exclude: Option<ConnectionId>,
    },
    ToHost(Message),
}

/// Something the local user should be shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    LobbyChanged,
    ShowSlotSelection,
    SlotChosen { index: usize },
    AlreadyStarted,
    GameStarted { my_color: Option<Color> },
    Resumed { color: Color },
    DiceRolled {
        color: Color,
        roll: u8,
        selectable: BTreeSet<u8>,
    },
    ChooseToken { tokens: BTreeSet<u8> },
    BoardChanged(Vec<GameEvent>),
    RollAgain,
    YourTurn,
    TurnChanged { turn: Color },
    GameOver { winner: Color, mine: bool },
    Notice(String),
}

/// Everything one step of a peer produced
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub outbound: Vec<Outbound>,
    pub events: Vec<PeerEvent>,
}

impl Dispatch {
    fn send(&mut self, to: ConnectionId, message: Message) {
        self.outbound.push(Outbound::Send { to, message });
    }

    fn broadcast(&mut self, message: Message, exclude: Option<ConnectionId>) {
        self.outbound.push(Outbound::Broadcast { message, exclude });
    }

    fn send_to_host(&mut self, message: Message) {
        self.outbound.push(Outbound::ToHost(message));
    }

    fn event(&mut self, event: PeerEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty() && self.events.is_empty()
    }
}

pub struct Peer {
    role: Role,
    local_id: String,
    store: StateStore,
    lobby: Lobby,
    /// Host only: endpoint ids announced on each connection
    remote_ids: HashMap<ConnectionId, String>,
    /// Player only: slot requested but not yet confirmed
    pending_slot: Option<usize>,
    /// Player only: `requestNextTurn` sent, `turnChanged` not yet seen
    awaiting_turn: bool,
    rng: Option<StdRng>,
}

impl Peer {
    /// Creates the authoritative peer
    ///
    /// `local_id` is the endpoint id the host seats itself under when the
    /// game starts.
    pub fn host(local_id: impl Into<String>) -> Self {
        Self::new(Role::Host, local_id.into())
    }

    /// Creates a following peer
    ///
    /// `local_id` is announced to the host on connect and binds the slot this
    /// player claims. Reusing it on a later connection resumes that slot.
    pub fn player(local_id: impl Into<String>) -> Self {
        Self::new(Role::Player, local_id.into())
    }

    fn new(role: Role, local_id: String) -> Self {
        Self {
            role,
            local_id,
            store: StateStore::new(),
            lobby: Lobby::new(),
            remote_ids: HashMap::new(),
            pending_slot: None,
            awaiting_turn: false,
            rng: None,
        }
    }

    /// Rolls from a seeded generator instead of the thread-local one
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn state(&self) -> &GameState {
        self.store.get()
    }

    pub fn pending_slot(&self) -> Option<usize> {
        self.pending_slot
    }

    pub fn is_awaiting_turn(&self) -> bool {
        self.awaiting_turn
    }

    pub fn my_slot(&self) -> Option<usize> {
        self.state().slot_index_by_remote_id(&self.local_id)
    }

    pub fn my_color(&self) -> Option<Color> {
        self.my_slot().map(|index| self.state().players[index].color)
    }

    pub fn phase(&self) -> Phase {
        let state = self.state();
        if let Some(winner) = state.winner {
            return Phase::GameOver(winner);
        }
        if !state.game_started {
            return match (self.role, self.my_slot()) {
                (Role::Player, Some(_)) => Phase::WaitingForStart,
                _ => Phase::Setup,
            };
        }
        match state.current_turn {
            Some(turn) if self.my_color() == Some(turn) && !self.awaiting_turn => {
                Phase::ActiveTurn(turn)
            }
            Some(turn) => Phase::WaitingTurn(turn),
            None => Phase::WaitingForStart,
        }
    }

    /// Whether a roll from the local user would be accepted right now
    ///
    /// True only during this peer's own turn, with no roll waiting for a
    /// token choice and no pending `requestNextTurn`.
    pub fn can_roll(&self) -> bool {
        self.ensure_turn().is_ok() && self.state().selectable_tokens.is_empty()
    }

    /// Endpoint ids currently connected to the host
    pub fn connected_ids(&self) -> impl Iterator<Item = &str> {
        self.remote_ids.values().map(String::as_str)
    }

    /// Player only: the first message once the connection to the host opens
    pub fn on_connected(&mut self) -> Dispatch {
        let mut dispatch = Dispatch::default();
        if self.role == Role::Player {
            dispatch.send_to_host(Message::RequestGameState {
                player_id: Some(self.local_id.clone()),
            });
        }
        dispatch
    }

    /// Reacts to a dropped connection
    ///
    /// The host forgets which endpoint the connection carried but keeps its
    /// slot in the turn order. A player only reports the loss.
    pub fn connection_closed(&mut self, id: ConnectionId) -> Dispatch {
        let mut dispatch = Dispatch::default();
        match self.role {
            Role::Host => {
                let Some(remote_id) = self.remote_ids.remove(&id) else {
                    debug!("Connection {} closed before identifying itself", id);
                    return dispatch;
                };
                match self.state().slot_index_by_remote_id(&remote_id) {
                    Some(index) => {
                        let name = self.state().players[index].name.clone();
                        warn!(
                            "{} ({}) disconnected; their slot stays in the turn order",
                            name, remote_id
                        );
                        dispatch.event(PeerEvent::Notice(format!("{} disconnected", name)));
                    }
                    None => info!("Spectator {} disconnected", remote_id),
                }
            }
            Role::Player => {
                warn!("Connection to host closed");
                dispatch.event(PeerEvent::Notice("Lost connection to the host".to_string()));
            }
        }
        dispatch
    }

    /// Handles one decoded message from connection `from`
    ///
    /// Rejections are logged and, on the host, answered with the
    /// authoritative snapshot. They never produce an error.
    pub fn handle_message(&mut self, from: ConnectionId, message: Message) -> Dispatch {
        if self.state().is_over() {
            let still_handled = matches!(
                (self.role, &message),
                (Role::Host, Message::RequestGameState { .. }) | (Role::Host, Message::GameOver { .. })
            );
            if !still_handled {
                debug!("Game is over, ignoring {}", message.kind());
                return Dispatch::default();
            }
        }

        debug!("Handling {} from connection {}", message.kind(), from);
        match self.role {
            Role::Host => self.handle_as_host(from, message),
            Role::Player => self.handle_as_player(message),
        }
    }

    fn handle_as_host(&mut self, from: ConnectionId, message: Message) -> Dispatch {
        let mut dispatch = Dispatch::default();

        match message {
            Message::RequestGameState { player_id } => {
                if let Some(player_id) = player_id {
                    info!("Connection {} identified as {}", from, player_id);
                    self.remote_ids.insert(from, player_id);
                }
                dispatch.send(from, self.snapshot_message());
            }
            Message::PlayerSelected {
                player_index,
                player_id,
            } => {
                self.remote_ids.entry(from).or_insert_with(|| player_id.clone());
                match self.lobby.claim_slot(self.store.get(), player_index, &player_id) {
                    Ok(next) => {
                        self.store.apply(StateUpdate::Replace(next));
                        dispatch.broadcast(self.snapshot_message(), None);
                        dispatch.event(PeerEvent::LobbyChanged);
                    }
                    Err(err) => {
                        warn!("Slot claim from {} refused: {}", player_id, err);
                        dispatch.send(from, self.snapshot_message());
                    }
                }
            }
            Message::DiceRolled {
                roll,
                selectable_tokens,
            } => self.host_dice_rolled(from, roll, selectable_tokens, &mut dispatch),
            Message::TokenMoved { state, applied } => {
                self.host_token_moved(from, state, applied, &mut dispatch)
            }
            Message::RequestNextTurn => {
                let owns_turn = self
                    .sender_color(from)
                    .is_some_and(|color| self.state().is_turn_of(color));
                if !owns_turn {
                    warn!("Ignoring requestNextTurn from connection {}: not their turn", from);
                    return dispatch;
                }
                if let Err(err) = self.pass_turn(&mut dispatch) {
                    warn!("Cannot advance turn: {}", err);
                }
            }
            Message::GameOver { winner } => {
                let state = self.state();
                let confirmed = state.winner == Some(winner)
                    || (state.winner.is_none() && engine::check_for_winner(state, winner));
                if !confirmed {
                    warn!("Ignoring gameOver for {} that the board does not show", winner);
                    dispatch.send(from, self.snapshot_message());
                    return dispatch;
                }
                if self.store.apply(StateUpdate::Winner(winner)) {
                    dispatch.event(self.game_over_event(winner));
                }
                dispatch.broadcast(Message::GameOver { winner }, Some(from));
            }
            Message::GameState { .. }
            | Message::GameStart { .. }
            | Message::TurnChanged { .. } => {
                warn!(
                    "Ignoring host-only message {} from connection {}",
                    message.kind(),
                    from
                );
            }
        }

        dispatch
    }

    fn host_dice_rolled(
        &mut self,
        from: ConnectionId,
        roll: u8,
        claimed: BTreeSet<u8>,
        dispatch: &mut Dispatch,
    ) {
        let color = match self.sender_color(from) {
            Some(color) if self.state().is_turn_of(color) => color,
            _ => {
                warn!("Ignoring diceRolled from connection {}: not their turn", from);
                dispatch.send(from, self.snapshot_message());
                return;
            }
        };
        if !engine::is_valid_roll(roll) || !self.state().selectable_tokens.is_empty() {
            warn!("Rejecting roll {} from {}", roll, color);
            dispatch.send(from, self.snapshot_message());
            return;
        }

        let selectable = engine::legal_moves(self.state(), color, roll);
        self.store.apply(StateUpdate::DiceRolled {
            roll,
            selectable: selectable.clone(),
        });

        let exclude = if selectable == claimed {
            Some(from)
        } else {
            warn!(
                "{} claimed tokens {:?} for roll {}, board allows {:?}",
                color, claimed, roll, selectable
            );
            None
        };
        dispatch.broadcast(
            Message::DiceRolled {
                roll,
                selectable_tokens: selectable.clone(),
            },
            exclude,
        );
        dispatch.event(PeerEvent::DiceRolled {
            color,
            roll,
            selectable,
        });
    }

    fn host_token_moved(
        &mut self,
        from: ConnectionId,
        claimed: GameState,
        applied: Option<MoveDescriptor>,
        dispatch: &mut Dispatch,
    ) {
        let Some(descriptor) = applied else {
            let owns_turn = self
                .sender_color(from)
                .is_some_and(|color| self.state().is_turn_of(color));
            if !owns_turn {
                warn!("Ignoring tokenMoved from connection {}: not their turn", from);
                dispatch.send(from, self.snapshot_message());
                return;
            }
            debug!("Applying undescribed move from connection {} as is", from);
            self.replace_state(claimed.clone(), dispatch);
            dispatch.broadcast(
                Message::TokenMoved {
                    state: claimed,
                    applied: None,
                },
                Some(from),
            );
            dispatch.event(PeerEvent::BoardChanged(Vec::new()));
            return;
        };

        if self.sender_color(from) != Some(descriptor.color) {
            warn!(
                "Connection {} moved a {} token it does not own",
                from, descriptor.color
            );
            dispatch.send(from, self.snapshot_message());
            return;
        }

        let outcome = match engine::apply_move(self.state(), descriptor.color, descriptor.token_id) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    "Rejecting {} token {} move: {}",
                    descriptor.color, descriptor.token_id, err
                );
                dispatch.send(from, self.snapshot_message());
                return;
            }
        };

        let exclude = if outcome.state == claimed {
            Some(from)
        } else {
            warn!(
                "Snapshot from {} disagrees with the board, sending the host's result",
                descriptor.color
            );
            None
        };

        self.replace_state(outcome.state.clone(), dispatch);
        dispatch.broadcast(
            Message::TokenMoved {
                state: outcome.state,
                applied: Some(descriptor),
            },
            exclude,
        );
        dispatch.event(PeerEvent::BoardChanged(outcome.events));
    }

    fn handle_as_player(&mut self, message: Message) -> Dispatch {
        let mut dispatch = Dispatch::default();

        match message {
            Message::GameState { state } => {
                self.awaiting_turn = false;
                self.store.apply(StateUpdate::Replace(state));
                self.after_snapshot(&mut dispatch);
            }
            Message::GameStart { state } => {
                self.awaiting_turn = false;
                self.pending_slot = None;
                self.store.apply(StateUpdate::Replace(state));
                let my_color = self.my_color();
                info!("Game started, playing as {:?}", my_color);
                dispatch.event(PeerEvent::GameStarted { my_color });
                self.announce_turn(&mut dispatch);
            }
            Message::DiceRolled {
                roll,
                selectable_tokens,
            } => {
                let Some(color) = self.state().current_turn else {
                    warn!("diceRolled before any turn, ignoring");
                    return dispatch;
                };
                self.store.apply(StateUpdate::DiceRolled {
                    roll,
                    selectable: selectable_tokens.clone(),
                });
                dispatch.event(PeerEvent::DiceRolled {
                    color,
                    roll,
                    selectable: selectable_tokens.clone(),
                });
                if self.my_color() == Some(color) && !selectable_tokens.is_empty() {
                    dispatch.event(PeerEvent::ChooseToken {
                        tokens: selectable_tokens,
                    });
                }
            }
            Message::TokenMoved { state, applied } => {
                let events = applied
                    .and_then(|d| engine::apply_move(self.state(), d.color, d.token_id).ok())
                    .filter(|outcome| outcome.state == state)
                    .map(|outcome| outcome.events)
                    .unwrap_or_default();
                self.replace_state(state, &mut dispatch);
                dispatch.event(PeerEvent::BoardChanged(events));
            }
            Message::TurnChanged { turn } => {
                self.awaiting_turn = false;
                self.store.apply(StateUpdate::TurnChanged(turn));
                dispatch.event(PeerEvent::TurnChanged { turn });
                if self.my_color() == Some(turn) {
                    dispatch.event(PeerEvent::YourTurn);
                }
            }
            Message::GameOver { winner } => {
                if self.store.apply(StateUpdate::Winner(winner)) {
                    dispatch.event(self.game_over_event(winner));
                }
            }
            Message::RequestGameState { .. }
            | Message::PlayerSelected { .. }
            | Message::RequestNextTurn => {
                warn!("Ignoring {} sent to a player", message.kind());
            }
        }

        dispatch
    }

    /// Presentation after a full `gameState` on a player
    fn after_snapshot(&mut self, dispatch: &mut Dispatch) {
        let state = self.state();

        if let Some(winner) = state.winner {
            dispatch.event(self.game_over_event(winner));
            return;
        }

        if !state.game_started {
            match self.my_slot() {
                Some(index) => {
                    self.pending_slot = None;
                    dispatch.event(PeerEvent::SlotChosen { index });
                }
                None => match self.pending_slot {
                    Some(index) if is_open(state, index) => {
                        debug!("Slot {} still open, waiting for our claim", index);
                        dispatch.event(PeerEvent::LobbyChanged);
                    }
                    Some(index) => {
                        self.pending_slot = None;
                        dispatch.event(PeerEvent::Notice(format!(
                            "Slot {} was taken by someone else",
                            index
                        )));
                        dispatch.event(PeerEvent::ShowSlotSelection);
                    }
                    None => dispatch.event(PeerEvent::ShowSlotSelection),
                },
            }
            return;
        }

        match self.my_color() {
            Some(color) => {
                dispatch.event(PeerEvent::Resumed { color });
                self.announce_turn(dispatch);
            }
            None => dispatch.event(PeerEvent::AlreadyStarted),
        }
    }

    fn announce_turn(&self, dispatch: &mut Dispatch) {
        if let Some(turn) = self.state().current_turn {
            if self.my_color() == Some(turn) {
                dispatch.event(PeerEvent::YourTurn);
            }
        }
    }

    /// Rolls the die for the local user's turn
    ///
    /// Uses the seeded generator from [`Peer::with_seed`] when there is one.
    /// See [`Peer::apply_roll`] for what the roll then does.
    pub fn roll_dice(&mut self) -> Result<Dispatch, ActionError> {
        let roll = match self.rng.as_mut() {
            Some(rng) => engine::roll_die(rng),
            None => engine::roll_die(&mut rand::thread_rng()),
        };
        self.apply_roll(roll)
    }

    /// Publishes `roll` as the local user's roll
    ///
    /// Records the roll with its legal moves and sends `diceRolled`: the host
    /// broadcasts it, a player sends it to the host. With no legal move the
    /// turn passes at once. Fails outside the local user's turn, while an
    /// earlier roll still waits for a token, or for a value outside 1..=6.
    pub fn apply_roll(&mut self, roll: u8) -> Result<Dispatch, ActionError> {
        if !engine::is_valid_roll(roll) {
            return Err(ActionError::InvalidRoll(roll));
        }
        let color = self.ensure_turn()?;
        if !self.state().selectable_tokens.is_empty() {
            return Err(ActionError::RollPending);
        }

        let selectable = engine::legal_moves(self.state(), color, roll);
        self.store.apply(StateUpdate::DiceRolled {
            roll,
            selectable: selectable.clone(),
        });
        info!("{} rolled {}, movable tokens {:?}", color, roll, selectable);

        let mut dispatch = Dispatch::default();
        self.publish(
            Message::DiceRolled {
                roll,
                selectable_tokens: selectable.clone(),
            },
            &mut dispatch,
        );
        dispatch.event(PeerEvent::DiceRolled {
            color,
            roll,
            selectable: selectable.clone(),
        });

        if selectable.is_empty() {
            dispatch.event(PeerEvent::Notice(format!("No legal moves with a {}", roll)));
            self.pass_turn(&mut dispatch)?;
        } else {
            dispatch.event(PeerEvent::ChooseToken { tokens: selectable });
        }

        Ok(dispatch)
    }

    /// Moves one of the local user's selectable tokens
    ///
    /// Applies the move locally and publishes `tokenMoved` with the move
    /// descriptor. A finished game publishes `gameOver`, a 6 keeps the turn,
    /// anything else passes it.
    pub fn select_token(&mut self, token_id: u8) -> Result<Dispatch, ActionError> {
        let color = self.ensure_turn()?;
        let roll = self.state().dice_roll.ok_or(MoveError::NoDiceRoll)?;
        let outcome = engine::apply_move(self.state(), color, token_id)?;

        self.store.apply(StateUpdate::Replace(outcome.state.clone()));

        let mut dispatch = Dispatch::default();
        dispatch.event(PeerEvent::BoardChanged(outcome.events));
        self.publish(
            Message::TokenMoved {
                state: outcome.state,
                applied: Some(MoveDescriptor { color, token_id }),
            },
            &mut dispatch,
        );

        match engine::follow_up(self.state(), roll) {
            FollowUp::GameOver(winner) => {
                info!("{} wins", winner);
                self.publish(Message::GameOver { winner }, &mut dispatch);
                dispatch.event(self.game_over_event(winner));
            }
            FollowUp::RollAgain => dispatch.event(PeerEvent::RollAgain),
            FollowUp::AdvanceTurn => self.pass_turn(&mut dispatch)?,
        }

        Ok(dispatch)
    }

    /// Claims a lobby slot; a player asks the host, the host claims directly
    ///
    /// A player's claim stays pending until a snapshot shows the slot bound
    /// to this peer, or bound to someone else, in which case the user is told
    /// and shown the lobby again.
    pub fn select_slot(&mut self, index: usize) -> Result<Dispatch, ActionError> {
        let mut dispatch = Dispatch::default();

        match self.role {
            Role::Host => {
                let next = self.lobby.claim_slot(self.state(), index, &self.local_id)?;
                self.commit_lobby(next, &mut dispatch);
            }
            Role::Player => {
                let state = self.state();
                if state.game_started {
                    return Err(LobbyError::AlreadyStarted.into());
                }
                let slot = state
                    .players
                    .get(index)
                    .ok_or(LobbyError::UnknownSlot(index))?;
                if slot.remote_id.is_some() && !slot.is_claimed_by(&self.local_id) {
                    return Err(LobbyError::SlotTaken(index).into());
                }

                self.pending_slot = Some(index);
                dispatch.send_to_host(Message::PlayerSelected {
                    player_index: index,
                    player_id: self.local_id.clone(),
                });
                dispatch.event(PeerEvent::Notice(format!(
                    "Asked the host for slot {}",
                    index
                )));
            }
        }

        Ok(dispatch)
    }

    /// Host only: appends a lobby slot and re-broadcasts the lobby
    pub fn add_slot(&mut self, name: Option<&str>) -> Result<Dispatch, ActionError> {
        self.ensure_host()?;
        let next = self.lobby.add_slot(self.store.get(), name)?;
        Ok(self.lobby_dispatch(next))
    }

    /// Host only: drops an unclaimed slot
    pub fn remove_slot(&mut self, index: usize) -> Result<Dispatch, ActionError> {
        self.ensure_host()?;
        let next = self.lobby.remove_slot(self.store.get(), index)?;
        Ok(self.lobby_dispatch(next))
    }

    pub fn rename_slot(&mut self, index: usize, name: &str) -> Result<Dispatch, ActionError> {
        self.ensure_host()?;
        let next = self.lobby.rename_slot(self.store.get(), index, name)?;
        Ok(self.lobby_dispatch(next))
    }

    pub fn recolor_slot(&mut self, index: usize, color: Color) -> Result<Dispatch, ActionError> {
        self.ensure_host()?;
        let next = self.lobby.recolor_slot(self.store.get(), index, color)?;
        Ok(self.lobby_dispatch(next))
    }

    pub fn set_avatar(&mut self, index: usize, avatar: Option<String>) -> Result<Dispatch, ActionError> {
        self.ensure_host()?;
        let next = self.lobby.set_avatar(self.store.get(), index, avatar)?;
        Ok(self.lobby_dispatch(next))
    }

    /// Host only: seats the host, freezes the roster and broadcasts `gameStart`
    ///
    /// The first remaining slot takes the first turn.
    pub fn start_game(&mut self) -> Result<Dispatch, ActionError> {
        self.ensure_host()?;
        let next = self.lobby.start_game(self.store.get(), &self.local_id)?;
        self.store.apply(StateUpdate::Replace(next.clone()));

        let mut dispatch = Dispatch::default();
        dispatch.broadcast(Message::GameStart { state: next }, None);
        dispatch.event(PeerEvent::GameStarted {
            my_color: self.my_color(),
        });
        self.announce_turn(&mut dispatch);
        Ok(dispatch)
    }

    /// Runs a console command; display-only commands produce nothing
    pub fn perform(&mut self, command: LocalCommand) -> Result<Dispatch, ActionError> {
        match command {
            LocalCommand::Roll => self.roll_dice(),
            LocalCommand::Move(token) => self.select_token(token),
            LocalCommand::Select(index) => self.select_slot(index),
            LocalCommand::AddSlot(name) => self.add_slot(name.as_deref()),
            LocalCommand::RemoveSlot(index) => self.remove_slot(index),
            LocalCommand::RenameSlot(index, name) => self.rename_slot(index, &name),
            LocalCommand::RecolorSlot(index, color) => self.recolor_slot(index, color),
            LocalCommand::SetAvatar(index, avatar) => self.set_avatar(index, avatar),
            LocalCommand::Start => self.start_game(),
            LocalCommand::Show | LocalCommand::Help | LocalCommand::Quit => Ok(Dispatch::default()),
        }
    }

    fn ensure_host(&self) -> Result<(), ActionError> {
        match self.role {
            Role::Host => Ok(()),
            Role::Player => Err(ActionError::NotHost),
        }
    }

    fn ensure_turn(&self) -> Result<Color, ActionError> {
        let state = self.state();
        if !state.game_started {
            return Err(MoveError::GameNotStarted.into());
        }
        if state.is_over() {
            return Err(MoveError::GameOver.into());
        }
        let color = self.my_color().ok_or(ActionError::NoSlot)?;
        if state.current_turn != Some(color) || self.awaiting_turn {
            return Err(ActionError::NotYourTurn);
        }
        Ok(color)
    }

    /// Ends the current turn: the host advances it, a player asks the host
    fn pass_turn(&mut self, dispatch: &mut Dispatch) -> Result<(), MoveError> {
        match self.role {
            Role::Host => {
                let next = engine::advance_turn(self.state())?;
                self.store.apply(StateUpdate::TurnChanged(next));
                info!("Turn passes to {}", next);
                dispatch.broadcast(Message::TurnChanged { turn: next }, None);
                dispatch.event(PeerEvent::TurnChanged { turn: next });
                if self.my_color() == Some(next) {
                    dispatch.event(PeerEvent::YourTurn);
                }
            }
            Role::Player => {
                self.awaiting_turn = true;
                dispatch.send_to_host(Message::RequestNextTurn);
            }
        }
        Ok(())
    }

    /// Sends a locally originated change where this role sends it
    fn publish(&self, message: Message, dispatch: &mut Dispatch) {
        match self.role {
            Role::Host => dispatch.broadcast(message, None),
            Role::Player => dispatch.send_to_host(message),
        }
    }

    fn lobby_dispatch(&mut self, next: GameState) -> Dispatch {
        let mut dispatch = Dispatch::default();
        self.commit_lobby(next, &mut dispatch);
        dispatch
    }

    fn commit_lobby(&mut self, next: GameState, dispatch: &mut Dispatch) {
        if self.store.apply(StateUpdate::Replace(next)) {
            dispatch.broadcast(self.snapshot_message(), None);
        }
        dispatch.event(PeerEvent::LobbyChanged);
    }

    /// Replaces the snapshot and reports a winner it introduces
    fn replace_state(&mut self, next: GameState, dispatch: &mut Dispatch) {
        let was_over = self.state().is_over();
        self.store.apply(StateUpdate::Replace(next));
        if let (false, Some(winner)) = (was_over, self.state().winner) {
            dispatch.event(self.game_over_event(winner));
        }
    }

    fn snapshot_message(&self) -> Message {
        Message::GameState {
            state: self.state().clone(),
        }
    }

    fn sender_color(&self, from: ConnectionId) -> Option<Color> {
        let remote_id = self.remote_ids.get(&from)?;
        let index = self.state().slot_index_by_remote_id(remote_id)?;
        Some(self.state().players[index].color)
    }

    fn game_over_event(&self, winner: Color) -> PeerEvent {
        PeerEvent::GameOver {
            winner,
            mine: self.my_color() == Some(winner),
        }
    }
}

fn is_open(state: &GameState, index: usize) -> bool {
    state
        .players
        .get(index)
        .is_some_and(|slot| slot.remote_id.is_none())
}
