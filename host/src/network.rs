//! Host network layer: TCP accept loop, per-connection tasks and the event loop

use crate::connection_manager::ConnectionManager;
use log::{debug, error, info, warn};
use shared::codec;
use shared::command::{LocalCommand, HELP};
use shared::join::JoinLink;
use shared::render;
use shared::{ConnectionId, Dispatch, Message, Outbound, Peer, PeerEvent};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub type HostError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from network tasks to the event loop
#[derive(Debug)]
pub enum ServerMessage {
    ConnectionOpened {
        stream: TcpStream,
        addr: SocketAddr,
    },
    MessageReceived {
        connection: ConnectionId,
        message: Message,
    },
    ConnectionClosed {
        connection: ConnectionId,
    },
}

/// The authoritative peer behind a TCP listener
pub struct HostServer {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    peer: Peer,
    connections: ConnectionManager,
    subscribers: Vec<mpsc::UnboundedSender<PeerEvent>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl HostServer {
    /// Binds the listener and wraps `peer`, which must be a host peer
    ///
    /// Nothing is accepted until [`HostServer::run`] starts. At most
    /// `max_connections` players are served at once; later ones are dropped
    /// on accept.
    pub async fn bind(addr: &str, peer: Peer, max_connections: usize) -> Result<Self, HostError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Host listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(HostServer {
            listener: Some(listener),
            local_addr,
            peer,
            connections: ConnectionManager::new(max_connections),
            subscribers: Vec::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn join_link(&self) -> JoinLink {
        JoinLink::for_endpoint(self.local_addr.to_string())
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// Direct access for setup before [`HostServer::run`]
    pub fn peer_mut(&mut self) -> &mut Peer {
        &mut self.peer
    }

    /// Receives every [`PeerEvent`] the host produces from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PeerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Spawns the task that accepts incoming connections
    fn spawn_acceptor(&self, listener: TcpListener) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = server_tx.send(ServerMessage::ConnectionOpened { stream, addr }) {
                            error!("Failed to hand connection to event loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Registers a connection and spawns its reader and writer tasks
    fn accept_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();
        let Some(connection) = self.connections.add(addr, frame_tx) else {
            warn!("Refusing connection from {}: host full", addr);
            return;
        };
        debug!("{} connections open", self.connections.len());

        let (read_half, mut write_half) = stream.into_split();
        let server_tx = self.server_tx.clone();

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
                                if server_tx
                                    .send(ServerMessage::MessageReceived { connection, message })
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping frame from connection {}: {}", connection, e),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Error reading from connection {}: {}", connection, e);
                        break;
                    }
                }
            }

            if let Err(e) = server_tx.send(ServerMessage::ConnectionClosed { connection }) {
                debug!("Event loop gone before close of {}: {}", connection, e);
            }
        });

        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Err(e) = write_half.write_all(frame.as_bytes()).await {
                    error!("Failed to write to connection {}: {}", connection, e);
                    break;
                }
            }
        });
    }

    /// Delivers the outbound messages in order, then publishes the events
    fn execute(&mut self, dispatch: Dispatch) {
        for outbound in dispatch.outbound {
            match outbound {
                Outbound::Send { to, message } => {
                    if let Some(frame) = Self::frame(&message) {
                        if !self.connections.send_to(to, &frame) {
                            warn!("Could not deliver {} to connection {}", message.kind(), to);
                        }
                    }
                }
                Outbound::Broadcast { message, exclude } => {
                    if let Some(frame) = Self::frame(&message) {
                        let delivered = self.connections.broadcast(&frame, exclude);
                        debug!("Broadcast {} to {} connections", message.kind(), delivered);
                    }
                }
                Outbound::ToHost(message) => {
                    warn!("Host cannot forward {} to a host", message.kind());
                }
            }
        }

        for event in dispatch.events {
            self.publish(event);
        }
    }

    fn frame(message: &Message) -> Option<String> {
        match codec::encode(message) {
            Ok(mut frame) => {
                frame.push('\n');
                Some(frame)
            }
            Err(e) => {
                error!("Failed to encode {}: {}", message.kind(), e);
                None
            }
        }
    }

    fn publish(&mut self, event: PeerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn handle_command(&mut self, command: LocalCommand) {
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
    /// Handles network events and local commands one at a time until a
    /// `quit` command arrives. A closed command channel leaves the host
    /// serving its connections.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<LocalCommand>,
    ) -> Result<(), HostError> {
        let listener = self
            .listener
            .take()
            .ok_or("Host server is already running")?;
        self.spawn_acceptor(listener);

        let mut commands_open = true;
        info!("Host started, join with {}", self.join_link());

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::ConnectionOpened { stream, addr }) => {
                            self.accept_connection(stream, addr);
                        }
                        Some(ServerMessage::MessageReceived { connection, message }) => {
                            let dispatch = self.peer.handle_message(connection, message);
                            self.execute(dispatch);
                        }
                        Some(ServerMessage::ConnectionClosed { connection }) => {
                            self.connections.remove(&connection);
                            if self.connections.is_empty() {
                                info!("No players connected");
                            }
                            let dispatch = self.peer.connection_closed(connection);
                            self.execute(dispatch);
                        }
                        None => {
                            info!("Network tasks gone, host shutting down");
                            break;
                        }
                    }
                },

                command = commands.recv(), if commands_open => {
                    match command {
                        Some(LocalCommand::Quit) => {
                            info!("Host shutting down");
                            break;
                        }
                        Some(command) => self.handle_command(command),
                        None => {
                            debug!("Command channel closed");
                            commands_open = false;
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
