//! Player network layer: one TCP connection to the host and the event loop

use log::{debug, error, info, warn};
use shared::codec;
use shared::command::{LocalCommand, HELP};
use shared::join::JoinLink;
use shared::render;
use shared::{ConnectionId, Dispatch, Message, Outbound, Peer, PeerEvent, Phase};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::interval;

pub type PlayerError = Box<dyn std::error::Error + Send + Sync>;

/// The only connection a player has
pub const HOST_CONNECTION: ConnectionId = 0;

/// How often to complain while no game state has arrived
pub const STALL_WARNING_INTERVAL: Duration = Duration::from_secs(5);

/// Messages sent from the reader task to the event loop
#[derive(Debug)]
pub enum ClientMessage {
    MessageReceived(Message),
    HostClosed,
}

pub struct PlayerClient {
    peer: Peer,
    host: String,
    preferred_slot: Option<String>,
    subscribers: Vec<mpsc::UnboundedSender<PeerEvent>>,

    frame_tx: mpsc::UnboundedSender<String>,
    client_rx: mpsc::UnboundedReceiver<ClientMessage>,
}

impl PlayerClient {
    /// Opens the connection named by `link` and spawns its reader and writer
    pub async fn connect(link: &JoinLink, peer: Peer) -> Result<Self, PlayerError> {
        let stream = TcpStream::connect(&link.host).await?;
        info!("Connected to host at {}", link.host);

        let (read_half, mut write_half) = stream.into_split();
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                match codec::read_frame(&mut reader, codec::MAX_FRAME_LEN).await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match codec::decode(&line) {
                            Ok(message) => {
                                if client_tx.send(ClientMessage::MessageReceived(message)).is_err() {
                                    return;
                                }
                            }
                            Err(e) => warn!("Dropping frame from host: {}", e),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading from host: {}", e);
                        break;
                    }
                }
            }

            if let Err(e) = client_tx.send(ClientMessage::HostClosed) {
                debug!("Event loop gone before host close: {}", e);
            }
        });

        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Err(e) = write_half.write_all(frame.as_bytes()).await {
                    error!("Failed to write to host: {}", e);
                    break;
                }
            }
        });

        Ok(PlayerClient {
            peer,
            host: link.host.clone(),
            preferred_slot: None,
            subscribers: Vec::new(),
            frame_tx,
            client_rx,
        })
    }

    /// Claims the lobby slot with this name as soon as the lobby shows up
    pub fn with_preferred_slot(mut self, name: impl Into<String>) -> Self {
        self.preferred_slot = Some(name.into());
        self
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PeerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn execute(&mut self, dispatch: Dispatch) {
        for outbound in dispatch.outbound {
            match outbound {
                Outbound::ToHost(message) => match codec::encode(&message) {
                    Ok(mut frame) => {
                        frame.push('\n');
                        if self.frame_tx.send(frame).is_err() {
                            warn!("Writer gone, {} not sent", message.kind());
                        }
                    }
                    Err(e) => error!("Failed to encode {}: {}", message.kind(), e),
                },
                Outbound::Send { message, .. } | Outbound::Broadcast { message, .. } => {
                    warn!("Player cannot address other connections, dropping {}", message.kind());
                }
            }
        }

        let show_lobby = dispatch.events.contains(&PeerEvent::ShowSlotSelection);
        for event in dispatch.events {
            self.publish(event);
        }
        if show_lobby {
            self.claim_preferred_slot();
        }
    }

    fn claim_preferred_slot(&mut self) {
        let Some(name) = self.preferred_slot.as_deref() else {
            return;
        };
        let Some(index) = self
            .peer
            .state()
            .players
            .iter()
            .position(|slot| slot.name == name && slot.remote_id.is_none())
        else {
            warn!("No open slot named '{}'", name);
            return;
        };

        info!("Claiming slot {} ('{}')", index, name);
        self.preferred_slot = None;
        self.perform(LocalCommand::Select(index));
    }

    fn publish(&mut self, event: PeerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn perform(&mut self, command: LocalCommand) {
        match command {
            LocalCommand::Show => {
                let board = render::describe_state(self.peer.state());
                self.publish(PeerEvent::Notice(board));
            }
            LocalCommand::Help => self.publish(PeerEvent::Notice(HELP.to_string())),
            command => match self.peer.perform(command) {
                Ok(dispatch) => self.execute(dispatch),
                Err(e) => {
                    warn!("Command refused: {}", e);
                    self.publish(PeerEvent::Notice(e.to_string()));
                }
            },
        }
    }

    /// Main event loop
    ///
    /// Returns once `quit` arrives. Losing the host before the game is over
    /// is an error.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<LocalCommand>,
    ) -> Result<(), PlayerError> {
        let dispatch = self.peer.on_connected();
        self.execute(dispatch);

        let mut stall = interval(STALL_WARNING_INTERVAL);
        stall.tick().await;
        let mut has_state = false;
        let mut commands_open = true;

        loop {
            tokio::select! {
                message = self.client_rx.recv() => {
                    match message {
                        Some(ClientMessage::MessageReceived(message)) => {
                            has_state |= matches!(
                                message,
                                Message::GameState { .. } | Message::GameStart { .. }
                            );
                            let dispatch = self.peer.handle_message(HOST_CONNECTION, message);
                            self.execute(dispatch);
                        }
                        Some(ClientMessage::HostClosed) | None => {
                            let dispatch = self.peer.connection_closed(HOST_CONNECTION);
                            self.execute(dispatch);
                            if let Phase::GameOver(winner) = self.peer.phase() {
                                info!("Host left after {} won", winner);
                                return Ok(());
                            }
                            return Err(format!("Lost connection to host at {}", self.host).into());
                        }
                    }
                },

                command = commands.recv(), if commands_open => {
                    match command {
                        Some(LocalCommand::Quit) => {
                            info!("Leaving the game");
                            return Ok(());
                        }
                        Some(command) => self.perform(command),
                        None => {
                            debug!("Command channel closed");
                            commands_open = false;
                        }
                    }
                },

                _ = stall.tick(), if !has_state => {
                    warn!("Still waiting for the host at {} to send the game state", self.host);
                },
            }
        }
    }
}
