//! The round state machine of a single room.
//!
//! [`RoundController`] is synchronous: every operation mutates the room and
//! returns the events to deliver, and the room actor dispatches them. Timer
//! fires come back in as [`Alarm`]s through the actor's alarm channel.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use graphguess_protocol::{
    ConnectionId, GameOptions, GameStateView, GraphDescriptor, GuessResult, PlayerInfo,
    Recipient, Role, RoomId, RoomState, RoomSummary, RoundEndReason, RoundTiming, Scoreboard,
    ServerEvent,
};
use graphguess_timer::{Timer, TimerToken};
use rand::seq::IndexedRandom;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{RoomError, RoomOptions, RoundConfig, ScoreLedger, WordSource};

/// An addressed outbound event.
pub type Outbound = (Recipient, ServerEvent);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    RoundTimeout,
    IntermissionOver,
}

/// A timer fire delivered to the room actor.
#[derive(Debug, Clone, Copy)]
pub struct Alarm {
    pub kind: AlarmKind,
    pub token: TimerToken,
}

/// Point-in-time copy of a room's game, for inspection and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub state: RoomState,
    pub players: Vec<PlayerInfo>,
    pub scores: Scoreboard,
    pub painter: Option<ConnectionId>,
    pub painters_done: BTreeSet<ConnectionId>,
    pub round_number: u32,
    pub round_started_at: Option<u64>,
    pub graphs: Vec<GraphDescriptor>,
    pub round_timer_armed: bool,
    pub intermission_timer_armed: bool,
}

pub struct RoundController {
    room_id: RoomId,
    options: RoomOptions,
    config: RoundConfig,
    words: Arc<dyn WordSource>,
    /// Join order.
    players: Vec<PlayerInfo>,
    ledger: ScoreLedger,
    painters_done: BTreeSet<ConnectionId>,
    current_painter: Option<ConnectionId>,
    word: String,
    graphs: Vec<GraphDescriptor>,
    state: RoomState,
    round_number: u32,
    /// Unix epoch milliseconds.
    round_started_at: Option<u64>,
    round_timer: Timer,
    intermission_timer: Timer,
    alarm_tx: mpsc::Sender<Alarm>,
}

impl RoundController {
    pub fn new(
        room_id: RoomId,
        options: RoomOptions,
        config: RoundConfig,
        words: Arc<dyn WordSource>,
        alarm_tx: mpsc::Sender<Alarm>,
    ) -> Self {
        Self {
            room_id,
            options: options.validated(),
            config: config.validated(),
            words,
            players: Vec::new(),
            ledger: ScoreLedger::new(),
            painters_done: BTreeSet::new(),
            current_painter: None,
            word: String::new(),
            graphs: Vec::new(),
            state: RoomState::Lobby,
            round_number: 0,
            round_started_at: None,
            round_timer: Timer::new("round"),
            intermission_timer: Timer::new("intermission"),
            alarm_tx,
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Adds a player, or re-briefs one that is already in the room.
    ///
    /// # Errors
    /// Returns [`RoomError::RoomFull`] if a new player would exceed
    /// `max_users`.
    pub fn join(&mut self, conn: ConnectionId, name: String) -> Result<Vec<Outbound>, RoomError> {
        if self.is_member(conn) {
            debug!(room_id = %self.room_id, %conn, "player rejoined, re-briefing");
            let mut out = vec![(Recipient::Connection(conn), ServerEvent::Users(self.players.clone()))];
            out.extend(self.brief(conn));
            return Ok(out);
        }
        if self.players.len() >= self.options.max_users {
            return Err(RoomError::RoomFull(self.room_id.clone()));
        }

        self.players.push(PlayerInfo {
            id: conn,
            name,
            role: Role::Viewer,
        });
        self.ledger.insert(conn);
        info!(
            room_id = %self.room_id,
            %conn,
            players = self.players.len(),
            "player joined"
        );

        let mut out = vec![(Recipient::Room, ServerEvent::Users(self.players.clone()))];
        if self.state.is_in_game() {
            out.extend(self.brief(conn));
        } else {
            out.extend(self.start_game_if_ready());
        }
        Ok(out)
    }

    /// Removes a player. Unknown connections are ignored.
    pub fn leave(&mut self, conn: ConnectionId) -> Vec<Outbound> {
        let Some(index) = self.players.iter().position(|p| p.id == conn) else {
            return Vec::new();
        };
        self.players.remove(index);
        self.ledger.remove(conn);
        self.painters_done.remove(&conn);
        let was_painter = self.current_painter == Some(conn);
        info!(
            room_id = %self.room_id,
            %conn,
            players = self.players.len(),
            was_painter,
            "player left"
        );

        if self.players.is_empty() {
            self.stop_timers();
            self.current_painter = None;
            self.round_started_at = None;
            return Vec::new();
        }

        let mut out = vec![(Recipient::Room, ServerEvent::Users(self.players.clone()))];
        if was_painter && self.state == RoomState::Round {
            out.extend(self.end_round(RoundEndReason::Timeout));
        }
        if self.players.len() < self.config.min_players {
            out.extend(self.game_over());
        } else if self.state.is_in_game() {
            out.push((Recipient::Room, ServerEvent::GameState(self.view())));
        }
        out
    }

    // -----------------------------------------------------------------------
    // Game flow
    // -----------------------------------------------------------------------

    /// Manual `game:start`. Ignored while a game is running, from
    /// non-members, or without enough players.
    pub fn start_game(&mut self, conn: ConnectionId, options: &GameOptions) -> Vec<Outbound> {
        if !self.is_member(conn) {
            debug!(room_id = %self.room_id, %conn, "game:start from non-member, ignoring");
            return Vec::new();
        }
        if self.state.is_in_game() {
            debug!(room_id = %self.room_id, state = %self.state, "game already running, ignoring game:start");
            return Vec::new();
        }
        if self.players.len() < self.config.min_players {
            debug!(
                room_id = %self.room_id,
                players = self.players.len(),
                "not enough players for game:start"
            );
            return Vec::new();
        }
        self.config = self.config.clone().with_options(options);
        self.start_game_if_ready()
    }

    fn start_game_if_ready(&mut self) -> Vec<Outbound> {
        if self.state.is_in_game() || self.players.len() < self.config.min_players {
            return Vec::new();
        }
        self.painters_done.clear();
        self.round_number = 0;
        info!(room_id = %self.room_id, players = self.players.len(), "game starting");
        self.begin_round()
    }

    /// Picks the next painter and starts a round, or ends the game when the
    /// set is exhausted.
    fn begin_round(&mut self) -> Vec<Outbound> {
        if self.players.len() < self.config.min_players {
            return self.game_over();
        }

        let mut candidates = self.candidates();
        if candidates.is_empty() {
            if !self.config.loop_sets {
                return self.game_over();
            }
            debug!(room_id = %self.room_id, "every player has painted, starting a new set");
            self.painters_done.clear();
            candidates = self.candidates();
        }
        let Some(&painter) = candidates.choose(&mut rand::rng()) else {
            return self.game_over();
        };

        self.painters_done.insert(painter);
        self.current_painter = Some(painter);
        for player in &mut self.players {
            player.role = if player.id == painter {
                Role::Painter
            } else {
                Role::Viewer
            };
        }
        self.word = self.words.next_word();
        self.graphs.clear();
        self.round_number += 1;
        self.round_started_at = Some(epoch_millis());

        self.intermission_timer.cancel();
        self.round_timer
            .arm(self.config.round_duration, &self.alarm_tx, |token| Alarm {
                kind: AlarmKind::RoundTimeout,
                token,
            });
        self.transition(RoomState::Round);
        info!(
            room_id = %self.room_id,
            round = self.round_number,
            %painter,
            "round started"
        );

        let mut out = Vec::with_capacity(2);
        if let Some(round) = self.round_timing() {
            out.push((
                Recipient::Room,
                ServerEvent::NewGame {
                    room: self.room_id.clone(),
                    roles: self.players.clone(),
                    painter,
                    round,
                },
            ));
        }
        out.push((
            Recipient::Connection(painter),
            ServerEvent::WordForPainter(self.word.clone()),
        ));
        out
    }

    /// Ends the running round. A no-op outside `Round`.
    fn end_round(&mut self, reason: RoundEndReason) -> Vec<Outbound> {
        if self.state != RoomState::Round {
            debug!(room_id = %self.room_id, %reason, state = %self.state, "no round to end");
            return Vec::new();
        }
        self.round_timer.cancel();
        self.current_painter = None;
        self.round_started_at = None;
        self.transition(RoomState::Intermission);
        self.intermission_timer
            .arm(self.config.intermission, &self.alarm_tx, |token| Alarm {
                kind: AlarmKind::IntermissionOver,
                token,
            });
        info!(room_id = %self.room_id, round = self.round_number, %reason, "round ended");

        vec![(
            Recipient::Room,
            ServerEvent::RoundEnd {
                reason,
                word: self.word.clone(),
                scores: self.ledger.snapshot(),
            },
        )]
    }

    fn game_over(&mut self) -> Vec<Outbound> {
        self.stop_timers();
        self.painters_done.clear();
        self.current_painter = None;
        self.round_started_at = None;
        for player in &mut self.players {
            player.role = Role::Viewer;
        }
        if self.state == RoomState::GameOver {
            return Vec::new();
        }
        self.transition(RoomState::GameOver);
        info!(room_id = %self.room_id, rounds = self.round_number, "game over");
        vec![(
            Recipient::Room,
            ServerEvent::GameOver {
                scores: self.ledger.snapshot(),
            },
        )]
    }

    /// Handles a timer fire. Stale fires are dropped.
    pub fn on_alarm(&mut self, alarm: Alarm) -> Vec<Outbound> {
        match alarm.kind {
            AlarmKind::RoundTimeout => {
                if !self.round_timer.accept(alarm.token) {
                    return Vec::new();
                }
                if self.state != RoomState::Round {
                    debug!(room_id = %self.room_id, state = %self.state, "round timeout outside a round");
                    return Vec::new();
                }
                self.end_round(RoundEndReason::Timeout)
            }
            AlarmKind::IntermissionOver => {
                if !self.intermission_timer.accept(alarm.token) {
                    return Vec::new();
                }
                if self.state != RoomState::Intermission {
                    debug!(room_id = %self.room_id, state = %self.state, "intermission ended outside intermission");
                    return Vec::new();
                }
                self.begin_round()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Player actions
    // -----------------------------------------------------------------------

    pub fn guess(&mut self, conn: ConnectionId, text: &str) -> Vec<Outbound> {
        if self.state != RoomState::Round {
            debug!(room_id = %self.room_id, %conn, "guess outside a round, ignoring");
            return Vec::new();
        }
        let Some(guesser) = self.player(conn).map(|p| p.name.clone()) else {
            debug!(room_id = %self.room_id, %conn, "guess from non-member, ignoring");
            return Vec::new();
        };
        if self.current_painter == Some(conn) {
            debug!(room_id = %self.room_id, %conn, "painter cannot guess, ignoring");
            return Vec::new();
        }

        if text.to_lowercase() != self.word.to_lowercase() {
            return vec![(
                Recipient::Connection(conn),
                ServerEvent::GuessResult(GuessResult::incorrect()),
            )];
        }

        let score = self.ledger.credit(conn, self.config.guess_reward);
        info!(room_id = %self.room_id, %conn, ?score, "correct guess");
        let mut out = vec![(
            Recipient::Room,
            ServerEvent::GuessResult(GuessResult {
                correct: true,
                word: Some(self.word.clone()),
                scores: Some(self.ledger.snapshot()),
                guesser: Some(guesser),
            }),
        )];
        out.extend(self.end_round(RoundEndReason::Guessed));
        out
    }

    pub fn add_graph(&mut self, conn: ConnectionId, graph: GraphDescriptor) -> Vec<Outbound> {
        if !self.is_active_painter(conn) {
            debug!(room_id = %self.room_id, %conn, "addGraph from non-painter, ignoring");
            return Vec::new();
        }
        self.graphs.push(graph);
        vec![(Recipient::Room, ServerEvent::Graphs(self.graphs.clone()))]
    }

    pub fn clear_canvas(&mut self, conn: ConnectionId) -> Vec<Outbound> {
        if !self.is_active_painter(conn) {
            debug!(room_id = %self.room_id, %conn, "clearCanvas from non-painter, ignoring");
            return Vec::new();
        }
        self.graphs.clear();
        vec![(Recipient::Room, ServerEvent::ClearCanvas)]
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn summary(&self) -> RoomSummary {
        let in_game = self.state.is_in_game();
        RoomSummary {
            name: self.room_id.clone(),
            in_game,
            user_count: self.players.len(),
            has_painter: self.current_painter.is_some(),
            is_waiting: !in_game && self.players.len() < self.config.min_players,
            is_full: self.players.len() >= self.options.max_users,
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            state: self.state,
            players: self.players.clone(),
            scores: self.ledger.snapshot(),
            painter: self.current_painter,
            painters_done: self.painters_done.clone(),
            round_number: self.round_number,
            round_started_at: self.round_started_at,
            graphs: self.graphs.clone(),
            round_timer_armed: self.round_timer.is_armed(),
            intermission_timer_armed: self.intermission_timer.is_armed(),
        }
    }

    /// What a (re)joining connection sees. Never includes the word.
    pub fn view(&self) -> GameStateView {
        let remaining = match self.state {
            RoomState::Round => self.round_timer.remaining(),
            RoomState::Intermission => self.intermission_timer.remaining(),
            _ => None,
        };
        GameStateView {
            room: self.room_id.clone(),
            state: self.state,
            painter: self.current_painter,
            round: self.round_timing(),
            remaining_ms: remaining.map(|d| d.as_millis() as u64),
            intermission_sec: self.config.intermission.as_secs(),
            scores: self.ledger.snapshot(),
        }
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn is_private(&self) -> bool {
        self.options.is_private
    }

    pub fn is_member(&self, conn: ConnectionId) -> bool {
        self.player(conn).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Cancels both timers. Called when the room shuts down.
    pub fn stop_timers(&mut self) {
        self.round_timer.cancel();
        self.intermission_timer.cancel();
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn player(&self, conn: ConnectionId) -> Option<&PlayerInfo> {
        self.players.iter().find(|p| p.id == conn)
    }

    fn candidates(&self) -> Vec<ConnectionId> {
        self.players
            .iter()
            .map(|p| p.id)
            .filter(|id| !self.painters_done.contains(id))
            .collect()
    }

    fn is_active_painter(&self, conn: ConnectionId) -> bool {
        self.state == RoomState::Round && self.current_painter == Some(conn)
    }

    /// Private catch-up for a connection joining a running game.
    fn brief(&self, conn: ConnectionId) -> Vec<Outbound> {
        let to = Recipient::Connection(conn);
        let mut out = vec![(to, ServerEvent::Graphs(self.graphs.clone()))];
        if self.state != RoomState::Lobby {
            out.push((to, ServerEvent::GameState(self.view())));
        }
        if self.is_active_painter(conn) {
            out.push((to, ServerEvent::WordForPainter(self.word.clone())));
        }
        out
    }

    fn round_timing(&self) -> Option<RoundTiming> {
        self.round_started_at.map(|started| RoundTiming {
            round_number: self.round_number,
            round_started_at: started,
            round_duration_sec: self.config.round_duration.as_secs(),
        })
    }

    fn transition(&mut self, target: RoomState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "illegal room transition {} -> {}",
            self.state,
            target
        );
        debug!(room_id = %self.room_id, from = %self.state, to = %target, "room state changed");
        self.state = target;
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
