//! Per-socket session actor (C8): the reference engine's `ClientController`,
//! generalised from a single-match protocol to the lobby/room protocol of
//! §6. Owns the write half of the websocket; the directory actor pushes
//! outbound snapshots here rather than writing to the socket itself.

use crate::directory_actor::DirectoryActorProxy;
use anyhow::{anyhow, bail, Context, Result};
use futures::{
    prelude::*,
    stream::{SplitSink, SplitStream},
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thespian::Actor;
use tracing::*;
use warp::{filters::ws::Message as WsMessage, ws::WebSocket};
use xqmj::messages::{ClientMessage, ServerMessage};

/// Exchanged once per connection before any lobby/game traffic, the way the
/// reference engine's `HandshakeRequest`/`HandshakeResponse` gate on a
/// matching `client_version`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub client_version: semver::Version,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub server_version: semver::Version,
    pub compatible: bool,
}

#[derive(Debug, Actor)]
pub struct ClientSession {
    id: SessionId,
    sink: SplitSink<WebSocket, WsMessage>,
    directory: DirectoryActorProxy,
    current_room: Option<String>,
}

impl ClientSession {
    #[tracing::instrument(skip(id, socket, directory))]
    pub async fn perform_handshake(
        id: SessionId,
        socket: WebSocket,
        mut directory: DirectoryActorProxy,
    ) -> Result<(<ClientSession as Actor>::Proxy, SplitStream<WebSocket>)> {
        info!("Starting client handshake");

        let (mut sink, mut stream) = socket.split();

        let request = stream
            .next()
            .await
            .ok_or_else(|| anyhow!("client disconnected during handshake"))?
            .context("waiting for handshake request")?;

        let request = request
            .to_str()
            .map_err(|_| anyhow!("handshake message was not text"))?;
        let request: HandshakeRequest = serde_json::from_str(request)?;

        let server_version = semver::Version::parse(env!("CARGO_PKG_VERSION"))
            .expect("server crate version is valid semver");
        let compatible = server_version.major == request.client_version.major;

        let response = HandshakeResponse {
            server_version: server_version.clone(),
            compatible,
        };
        sink.send(WsMessage::text(serde_json::to_string(&response)?))
            .await
            .context("sending handshake response")?;

        if !compatible {
            bail!(
                "client protocol version {} is incompatible with server {}",
                request.client_version,
                server_version
            );
        }

        let stage = ClientSession {
            id,
            sink,
            directory: directory.clone(),
            current_room: None,
        }
        .into_stage();
        let proxy = stage.proxy();
        tokio::spawn(stage.run());

        directory.register(id.0, proxy.clone()).await?;

        Ok((proxy, stream))
    }

    async fn send(&mut self, message: ServerMessage) -> Result<()> {
        let text = serde_json::to_string(&message)?;
        self.sink.send(WsMessage::text(text)).await.context("writing to socket")
    }
}

#[thespian::actor]
impl ClientSession {
    pub async fn push(&mut self, message: ServerMessage) -> Result<()> {
        self.send(message).await
    }

    pub async fn handle_message(&mut self, message: WsMessage) -> Result<()> {
        let text = match message.to_str() {
            Ok(text) => text,
            Err(_) => bail!("received a non-text frame"),
        };

        let request: ClientMessage = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(err) => {
                self.send(ServerMessage::LobbyError { text: format!("malformed message: {err}") }).await?;
                return Ok(());
            }
        };

        trace!(?request, "handling inbound message");

        match request {
            ClientMessage::SetName { name } => {
                self.directory.set_name(self.id.0, name).await?;
            }

            ClientMessage::ListRooms => {
                let rooms = self.directory.list_rooms().await?;
                self.send(ServerMessage::LobbyRoomList { rooms }).await?;
            }

            ClientMessage::CreateRoom { room_name, target_humans, fill_with_ai, password, rounds } => {
                let (room_id, client_player_id, game_state) = self
                    .directory
                    .create_room(self.id.0, room_name, target_humans, fill_with_ai, password, rounds)
                    .await?;
                self.current_room = Some(room_id.clone());
                self.send(ServerMessage::JoinedRoom { game_state, room_id, client_player_id }).await?;
            }

            ClientMessage::JoinRoom { room_id, password, player_name } => {
                match self.directory.join_room(self.id.0, room_id.clone(), password, player_name).await? {
                    Ok((room_id, client_player_id, game_state)) => {
                        self.current_room = Some(room_id.clone());
                        self.send(ServerMessage::JoinedRoom { game_state, room_id, client_player_id }).await?;
                    }
                    Err(err) => {
                        self.send(ServerMessage::LobbyError { text: err.to_string() }).await?;
                    }
                }
            }

            ClientMessage::LobbyChat { text } => {
                self.send(ServerMessage::LobbyChatMessage {
                    message: xqmj::messages::ChatMessage {
                        id: 0,
                        sender_name: String::new(),
                        text,
                        timestamp: 0,
                        kind: "lobby".into(),
                    },
                })
                .await?;
            }

            ClientMessage::LobbyLeave => {
                if self.current_room.take().is_some() {
                    self.directory.game_quit_room(self.id.0).await?;
                }
            }

            ClientMessage::GameAction { room_id, action } => {
                if let Err(err) = self.directory.game_action(self.id.0, room_id, action).await? {
                    self.send(ServerMessage::GameError { text: err.to_string() }).await?;
                }
            }

            ClientMessage::GameChat { room_id, text } => {
                if let Err(err) = self.directory.game_chat(self.id.0, room_id, text).await? {
                    self.send(ServerMessage::GameError { text: err.to_string() }).await?;
                }
            }

            ClientMessage::GameRequestStart { room_id } => {
                if let Err(err) = self.directory.game_request_start(self.id.0, room_id).await? {
                    self.send(ServerMessage::GameError { text: err.to_string() }).await?;
                }
            }

            ClientMessage::GameQuitRoom { .. } => {
                self.current_room = None;
                self.directory.game_quit_room(self.id.0).await?;
            }
        }

        Ok(())
    }
}

/// Identifier for a connected session. Reused from the socket's slot number
/// assigned at accept time; unique only while the session is active.
#[derive(Debug, derive_more::Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display(fmt = "{}", _0)]
pub struct SessionId(pub u64);

pub struct SessionIdGenerator(AtomicU64);

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> SessionId {
        SessionId(self.0.fetch_add(1, Ordering::SeqCst))
    }
}
