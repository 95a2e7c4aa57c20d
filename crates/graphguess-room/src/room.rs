//! Room actor: one Tokio task per room.
//!
//! Every command and every timer fire for a room is one step of its actor,
//! so the round controller never sees concurrent mutation. The actor never
//! awaits the registry; it reports room-list changes on an unbounded notice
//! channel instead.

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use graphguess_protocol::{
    ConnectionId, GameOptions, GraphDescriptor, Recipient, RoomId, RoomState, RoomSummary,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::round::{Alarm, Outbound, RoomSnapshot, RoundController};
use crate::{Gateway, RoomError, RoomOptions, RoundConfig, WordSource};

/// Capacity of the alarm channel. Each room has at most two timers.
const ALARM_CHANNEL_SIZE: usize = 4;

/// Commands sent to a room actor.
pub(crate) enum RoomCommand {
    /// Add a connection to the room's broadcast group without joining.
    Subscribe { conn: ConnectionId },

    Join {
        conn: ConnectionId,
        name: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    AddGraph {
        conn: ConnectionId,
        graph: GraphDescriptor,
    },

    ClearCanvas { conn: ConnectionId },

    Guess { conn: ConnectionId, text: String },

    StartGame {
        conn: ConnectionId,
        options: GameOptions,
    },

    /// Drop a connection from the roster and the broadcast group.
    Leave {
        conn: ConnectionId,
        reply: oneshot::Sender<LeaveOutcome>,
    },

    GetInfo { reply: oneshot::Sender<RoomInfo> },

    GetSnapshot { reply: oneshot::Sender<RoomSnapshot> },

    Shutdown,
}

/// Messages from room actors to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegistryNotice {
    /// Something shown in the public room list changed.
    RoomListChanged(RoomId),
}

/// Result of a `Leave` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The departure left the room without players; the actor has stopped.
    pub emptied: bool,
}

/// Room metadata (not the game itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub state: RoomState,
    pub is_private: bool,
    pub summary: RoomSummary,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// `true` if both handles talk to the same actor.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    pub async fn subscribe(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.send(RoomCommand::Subscribe { conn }).await
    }

    pub async fn join(&self, conn: ConnectionId, name: String) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join { conn, name, reply }).await?;
        rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn add_graph(
        &self,
        conn: ConnectionId,
        graph: GraphDescriptor,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::AddGraph { conn, graph }).await
    }

    pub async fn clear_canvas(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.send(RoomCommand::ClearCanvas { conn }).await
    }

    pub async fn guess(&self, conn: ConnectionId, text: String) -> Result<(), RoomError> {
        self.send(RoomCommand::Guess { conn, text }).await
    }

    pub async fn start_game(
        &self,
        conn: ConnectionId,
        options: GameOptions,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::StartGame { conn, options }).await
    }

    pub async fn leave(&self, conn: ConnectionId) -> Result<LeaveOutcome, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Leave { conn, reply }).await?;
        rx.await.map_err(|_| self.unavailable())
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply }).await?;
        rx.await.map_err(|_| self.unavailable())
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::GetSnapshot { reply }).await?;
        rx.await.map_err(|_| self.unavailable())
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }
}

/// Everything a new room actor needs besides its id.
pub(crate) struct RoomContext {
    pub options: RoomOptions,
    pub config: RoundConfig,
    pub words: Arc<dyn WordSource>,
    pub gateway: Gateway,
    pub notices: mpsc::UnboundedSender<RegistryNotice>,
}

struct RoomActor {
    room_id: RoomId,
    controller: RoundController,
    /// The room's broadcast group: the creator and every joined player.
    subscribers: BTreeSet<ConnectionId>,
    gateway: Gateway,
    notices: mpsc::UnboundedSender<RegistryNotice>,
    commands: mpsc::Receiver<RoomCommand>,
    alarms: mpsc::Receiver<Alarm>,
}

impl RoomActor {
    async fn run(mut self) {
        info!(room_id = %self.room_id, "room actor started");

        loop {
            let before = self.controller.summary();
            let flow = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => ControlFlow::Break(()),
                },
                Some(alarm) = self.alarms.recv() => {
                    let out = self.controller.on_alarm(alarm);
                    self.dispatch(out);
                    ControlFlow::Continue(())
                }
            };
            if flow.is_break() {
                break;
            }
            if !self.controller.is_private() && self.controller.summary() != before {
                let _ = self
                    .notices
                    .send(RegistryNotice::RoomListChanged(self.room_id.clone()));
            }
        }

        self.controller.stop_timers();
        info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Subscribe { conn } => {
                self.subscribers.insert(conn);
                debug!(room_id = %self.room_id, %conn, "subscribed");
            }
            RoomCommand::Join { conn, name, reply } => match self.controller.join(conn, name) {
                Ok(out) => {
                    self.subscribers.insert(conn);
                    self.dispatch(out);
                    let _ = reply.send(Ok(()));
                }
                Err(err) => {
                    debug!(room_id = %self.room_id, %conn, %err, "join rejected");
                    let _ = reply.send(Err(err));
                }
            },
            RoomCommand::AddGraph { conn, graph } => {
                let out = self.controller.add_graph(conn, graph);
                self.dispatch(out);
            }
            RoomCommand::ClearCanvas { conn } => {
                let out = self.controller.clear_canvas(conn);
                self.dispatch(out);
            }
            RoomCommand::Guess { conn, text } => {
                let out = self.controller.guess(conn, &text);
                self.dispatch(out);
            }
            RoomCommand::StartGame { conn, options } => {
                let out = self.controller.start_game(conn, &options);
                self.dispatch(out);
            }
            RoomCommand::Leave { conn, reply } => {
                let subscribed = self.subscribers.remove(&conn);
                let present = subscribed || self.controller.is_member(conn);
                let out = self.controller.leave(conn);
                self.dispatch(out);

                let emptied = present && self.controller.is_empty();
                let _ = reply.send(LeaveOutcome { emptied });
                if emptied {
                    info!(room_id = %self.room_id, "last player left, closing room");
                    return ControlFlow::Break(());
                }
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(RoomInfo {
                    room_id: self.room_id.clone(),
                    state: self.controller.state(),
                    is_private: self.controller.is_private(),
                    summary: self.controller.summary(),
                });
            }
            RoomCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            RoomCommand::Shutdown => {
                info!(room_id = %self.room_id, "room shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn dispatch(&self, out: Vec<Outbound>) {
        for (recipient, event) in out {
            match recipient {
                Recipient::Room => {
                    for conn in &self.subscribers {
                        self.gateway.send_to(*conn, event.clone());
                    }
                }
                Recipient::Connection(conn) => {
                    self.gateway.send_to(conn, event);
                }
                Recipient::Everyone => self.gateway.broadcast(&event),
            }
        }
    }
}

/// Spawns a room actor and returns its handle.
pub(crate) fn spawn_room(room_id: RoomId, ctx: RoomContext, channel_size: usize) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let (alarm_tx, alarm_rx) = mpsc::channel(ALARM_CHANNEL_SIZE);

    let controller = RoundController::new(
        room_id.clone(),
        ctx.options,
        ctx.config,
        ctx.words,
        alarm_tx,
    );
    let actor = RoomActor {
        room_id: room_id.clone(),
        controller,
        subscribers: BTreeSet::new(),
        gateway: ctx.gateway,
        notices: ctx.notices,
        commands: rx,
        alarms: alarm_rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
