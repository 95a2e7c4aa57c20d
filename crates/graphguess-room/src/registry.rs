//! Room registry: creates, tracks and routes connections to rooms.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use graphguess_protocol::{ClientEvent, ConnectionId, RoomId, RoomSummary, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::room::{RegistryNotice, RoomContext, spawn_room};
use crate::{
    Gateway, RegistryConfig, RoomError, RoomHandle, RoomOptions, RoomSnapshot, WordSource,
};

#[derive(Default)]
struct Directory {
    rooms: HashMap<RoomId, RoomHandle>,
    /// Rooms each connection has created or joined, for disconnect.
    memberships: HashMap<ConnectionId, BTreeSet<RoomId>>,
}

struct Inner {
    /// Never held across an `.await`.
    directory: Mutex<Directory>,
    gateway: Gateway,
    config: RegistryConfig,
    words: Arc<dyn WordSource>,
    notices: mpsc::UnboundedSender<RegistryNotice>,
}

/// Owns every room of the server and is the entry point for client actions.
///
/// Clones share the same rooms. The registry must be created inside a Tokio
/// runtime: it spawns a background task that turns room notices into
/// room-list broadcasts. The task stops once the last clone is dropped and
/// every room actor has exited.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<Inner>,
}

impl RoomRegistry {
    pub fn new(gateway: Gateway, config: RegistryConfig, words: Arc<dyn WordSource>) -> Self {
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            directory: Mutex::new(Directory::default()),
            gateway,
            config,
            words,
            notices,
        });
        spawn_notice_task(Arc::downgrade(&inner), notice_rx);
        Self { inner }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    // -----------------------------------------------------------------------
    // Room lookup
    // -----------------------------------------------------------------------

    /// Returns the live room with this id, spawning it if needed. The flag
    /// is `true` when the room was created by this call.
    ///
    /// Options only apply to a new room.
    pub fn ensure_room(&self, room_id: &RoomId, options: RoomOptions) -> (RoomHandle, bool) {
        let mut dir = self.directory();
        if let Some(handle) = dir.rooms.get(room_id) {
            if !handle.is_closed() {
                return (handle.clone(), false);
            }
            debug!(%room_id, "replacing closed room");
        }

        let ctx = RoomContext {
            options: options.validated(),
            config: self.inner.config.round.clone(),
            words: Arc::clone(&self.inner.words),
            gateway: self.inner.gateway.clone(),
            notices: self.inner.notices.clone(),
        };
        let handle = spawn_room(room_id.clone(), ctx, self.inner.config.channel_size);
        dir.rooms.insert(room_id.clone(), handle.clone());
        info!(
            %room_id,
            is_private = options.is_private,
            max_users = options.max_users,
            rooms = dir.rooms.len(),
            "room created"
        );
        (handle, true)
    }

    /// # Errors
    /// Returns [`RoomError::NotFound`] for unknown or closed rooms.
    pub fn find(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        self.directory()
            .rooms
            .get(room_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// Removes a room and shuts its actor down.
    pub async fn remove(&self, room_id: &RoomId) -> Result<(), RoomError> {
        let handle = {
            let mut dir = self.directory();
            let handle = dir
                .rooms
                .remove(room_id)
                .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
            for rooms in dir.memberships.values_mut() {
                rooms.remove(room_id);
            }
            handle
        };
        // The actor may already have stopped on its own.
        let _ = handle.shutdown().await;
        info!(%room_id, "room destroyed");
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.directory().rooms.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.directory().rooms.keys().cloned().collect()
    }

    pub async fn snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot, RoomError> {
        self.find(room_id)?.snapshot().await
    }

    // -----------------------------------------------------------------------
    // Room list
    // -----------------------------------------------------------------------

    /// Summaries of every public room, queried fresh from the actors and
    /// sorted by name. Rooms that fail to answer are skipped.
    pub async fn list_public_summaries(&self) -> Vec<RoomSummary> {
        let handles: Vec<RoomHandle> = self.directory().rooms.values().cloned().collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = handle.info().await {
                if !info.is_private {
                    summaries.push(info.summary);
                }
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Sends `roomList` to every connection.
    pub async fn broadcast_room_list(&self) {
        let summaries = self.list_public_summaries().await;
        debug!(rooms = summaries.len(), "broadcasting room list");
        self.inner
            .gateway
            .broadcast(&ServerEvent::RoomList(summaries));
    }

    // -----------------------------------------------------------------------
    // Client actions
    // -----------------------------------------------------------------------

    /// Routes one decoded client event.
    ///
    /// # Errors
    /// Room errors are returned to the caller, which reports them to the
    /// client. Unauthorized actions are not errors; the room ignores them.
    pub async fn route(&self, conn: ConnectionId, event: ClientEvent) -> Result<(), RoomError> {
        match event {
            ClientEvent::Create {
                room,
                is_private,
                max_users,
            } => self.create(conn, &room, is_private, max_users).await,
            ClientEvent::Join { room, user } => self.join(conn, &room, user.name).await,
            ClientEvent::AddGraph { room, graph } => {
                self.find(&room)?.add_graph(conn, graph).await
            }
            ClientEvent::ClearCanvas { room } => self.find(&room)?.clear_canvas(conn).await,
            ClientEvent::Guess { room, guess } => self.find(&room)?.guess(conn, guess).await,
            ClientEvent::GameStart { room, options } => {
                self.find(&room)?.start_game(conn, options).await
            }
            ClientEvent::GetRooms => {
                self.broadcast_room_list().await;
                Ok(())
            }
        }
    }

    /// Ensures the room exists and puts `conn` in its broadcast group.
    pub async fn create(
        &self,
        conn: ConnectionId,
        room_id: &RoomId,
        is_private: bool,
        max_users: Option<usize>,
    ) -> Result<(), RoomError> {
        let options = RoomOptions {
            is_private,
            max_users: max_users.unwrap_or(self.inner.config.default_max_users),
        };
        let (handle, created) = self.ensure_room(room_id, options);
        handle.subscribe(conn).await?;
        self.track(conn, room_id);
        if created {
            self.broadcast_room_list().await;
        }
        Ok(())
    }

    /// Adds `conn` as a player of an existing room.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] for unknown rooms (including one that closed
    /// while the request was in flight) and [`RoomError::RoomFull`].
    pub async fn join(
        &self,
        conn: ConnectionId,
        room_id: &RoomId,
        name: String,
    ) -> Result<(), RoomError> {
        let handle = self.find(room_id)?;
        handle.join(conn, name).await.map_err(|err| match err {
            RoomError::Unavailable(id) => RoomError::NotFound(id),
            other => other,
        })?;
        self.track(conn, room_id);
        Ok(())
    }

    /// Removes `conn` from every room it created or joined, deleting rooms
    /// left without players.
    pub async fn disconnect(&self, conn: ConnectionId) {
        self.inner.gateway.unregister(conn);
        let rooms = self
            .directory()
            .memberships
            .remove(&conn)
            .unwrap_or_default();

        let mut removed_any = false;
        for room_id in rooms {
            let Ok(handle) = self.find(&room_id) else {
                continue;
            };
            match handle.leave(conn).await {
                Ok(outcome) if outcome.emptied => {
                    if self.forget(&handle) {
                        info!(%room_id, "room empty, destroyed");
                        removed_any = true;
                    }
                }
                Ok(_) => {}
                Err(err) => debug!(%room_id, %conn, %err, "leave failed"),
            }
        }
        if removed_any {
            self.broadcast_room_list().await;
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn directory(&self) -> MutexGuard<'_, Directory> {
        self.inner
            .directory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn track(&self, conn: ConnectionId, room_id: &RoomId) {
        self.directory()
            .memberships
            .entry(conn)
            .or_default()
            .insert(room_id.clone());
    }

    /// Drops a stopped room from the directory unless a newer room has
    /// already taken its id.
    fn forget(&self, handle: &RoomHandle) -> bool {
        let mut dir = self.directory();
        let room_id = handle.room_id();
        let same = dir
            .rooms
            .get(room_id)
            .is_some_and(|current| current.same_room(handle));
        if same {
            dir.rooms.remove(room_id);
            for rooms in dir.memberships.values_mut() {
                rooms.remove(room_id);
            }
        }
        same
    }
}

fn spawn_notice_task(inner: Weak<Inner>, mut notices: mpsc::UnboundedReceiver<RegistryNotice>) {
    tokio::spawn(async move {
        while let Some(RegistryNotice::RoomListChanged(room_id)) = notices.recv().await {
            // Coalesce a burst of changes into one broadcast.
            let mut changed = 1;
            while notices.try_recv().is_ok() {
                changed += 1;
            }
            let Some(inner) = inner.upgrade() else {
                break;
            };
            debug!(%room_id, changed, "room list changed");
            RoomRegistry { inner }.broadcast_room_list().await;
        }
    });
}
