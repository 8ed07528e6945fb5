use super::board::{Board, Outcome, PlaceError, Position, Seat};
use super::broadcaster::SeatBroadcaster;
use crate::config::OccupiedCellPolicy;
use crate::messages::{Admission, ClientToServer, Outbound, ServerToClient};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Fewer than two seats taken; moves are answered with WAIT.
    Waiting,
    InProgress,
}

/// Result of a move request, mostly for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    WaitingForOpponent,
    NotYourTurn,
    Occupied,
    Placed,
    Won(Seat),
    Draw,
    /// The sender no longer holds the seat.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub board: Board,
    pub phase: Phase,
    pub active_count: usize,
    pub rounds_completed: u64,
}

/// The single shared game: board, turn order and the seated connections.
#[derive(Debug)]
pub struct Session {
    board: Board,
    broadcaster: SeatBroadcaster,
    occupied_policy: OccupiedCellPolicy,
    rounds_completed: u64,
}

impl Session {
    pub fn new(occupied_policy: OccupiedCellPolicy) -> Self {
        Self {
            board: Board::new(),
            broadcaster: SeatBroadcaster::new(),
            occupied_policy,
            rounds_completed: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn phase(&self) -> Phase {
        if self.broadcaster.is_full() {
            Phase::InProgress
        } else {
            Phase::Waiting
        }
    }

    pub fn active_count(&self) -> usize {
        self.broadcaster.active_count()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            board: self.board.clone(),
            phase: self.phase(),
            active_count: self.active_count(),
            rounds_completed: self.rounds_completed,
        }
    }

    /// Seats the connection in the lowest free seat and queues its ID line.
    pub fn admit(&mut self, conn_id: Uuid, outbound: Outbound) -> Admission {
        let Some(seat) = self.broadcaster.free_seat() else {
            info!("Connection {} rejected, both seats taken", conn_id);
            return Admission::Busy;
        };
        self.broadcaster.add_player(seat, conn_id, outbound);
        info!("Connection {} seated as player {}", conn_id, seat);
        let stalled = self.broadcaster.send_to(seat, ServerToClient::Id(seat));
        self.evict_stalled(stalled.into_iter().collect());
        Admission::Seated(seat)
    }

    /// Returns the move result, or `None` for QUIT.
    pub fn handle_command(
        &mut self,
        seat: Seat,
        conn_id: Uuid,
        command: ClientToServer,
    ) -> Option<MoveResult> {
        match command {
            ClientToServer::Move(pos) => {
                let result = self.handle_move(seat, conn_id, pos);
                debug!(
                    "Player {} move {} {}: {:?}",
                    seat,
                    pos.row(),
                    pos.col(),
                    result
                );
                Some(result)
            }
            ClientToServer::Quit => {
                self.handle_quit(seat, conn_id);
                None
            }
        }
    }

    pub fn handle_move(&mut self, seat: Seat, conn_id: Uuid, pos: Position) -> MoveResult {
        if !self.broadcaster.holds(seat, conn_id) {
            return MoveResult::Stale;
        }
        if self.phase() == Phase::Waiting {
            self.reply(seat, ServerToClient::Wait);
            return MoveResult::WaitingForOpponent;
        }

        match self.board.place(seat, pos) {
            Err(PlaceError::NotYourTurn { turn_owner }) => {
                warn!("Player {} is not allowed to move now (turn: {})", seat, turn_owner);
                self.reply(seat, ServerToClient::Wait);
                MoveResult::NotYourTurn
            }
            Err(PlaceError::Occupied { by }) => {
                debug!(
                    "Player {} tried cell {} {} held by player {}",
                    seat,
                    pos.row(),
                    pos.col(),
                    by
                );
                if self.occupied_policy == OccupiedCellPolicy::Reject {
                    self.reply(seat, ServerToClient::Occupied(pos));
                }
                MoveResult::Occupied
            }
            Ok(()) => {
                let mut stalled = self.broadcaster.broadcast(ServerToClient::Move { seat, pos });
                let result = match self.board.outcome() {
                    Some(Outcome::Win(winner)) => {
                        info!("Player {} wins round {}", winner, self.rounds_completed + 1);
                        stalled.extend(self.broadcaster.broadcast(ServerToClient::Win(winner)));
                        self.finish_round();
                        MoveResult::Won(winner)
                    }
                    Some(Outcome::Draw) => {
                        info!("Round {} is a draw", self.rounds_completed + 1);
                        stalled.extend(self.broadcaster.broadcast(ServerToClient::Draw));
                        self.finish_round();
                        MoveResult::Draw
                    }
                    None => {
                        self.board.advance_turn();
                        MoveResult::Placed
                    }
                };
                self.evict_stalled(stalled);
                result
            }
        }
    }

    /// Explicit QUIT: everyone, the quitter included, hears about it.
    pub fn handle_quit(&mut self, seat: Seat, conn_id: Uuid) -> bool {
        if !self.broadcaster.holds(seat, conn_id) {
            return false;
        }
        info!("Player {} ({}) quit", seat, conn_id);
        let stalled = self.broadcaster.broadcast(ServerToClient::Quit(seat));
        self.release(seat, conn_id);
        self.evict_stalled(stalled);
        true
    }

    /// Stream ended without QUIT. Ignored when the seat has already been
    /// released or taken over by another connection.
    pub fn handle_disconnect(&mut self, seat: Seat, conn_id: Uuid) -> bool {
        if !self.broadcaster.holds(seat, conn_id) {
            return false;
        }
        info!("Player {} ({}) disconnected", seat, conn_id);
        self.release(seat, conn_id);
        let stalled = self.broadcaster.broadcast(ServerToClient::Quit(seat));
        self.evict_stalled(stalled);
        true
    }

    pub fn handle_violation(&mut self, seat: Seat, conn_id: Uuid, reason: &str) -> bool {
        if !self.broadcaster.holds(seat, conn_id) {
            return false;
        }
        warn!("Player {} ({}) protocol violation: {}", seat, conn_id, reason);
        // The seat is released right below, full buffer or not.
        let _ = self.broadcaster.send_to(seat, ServerToClient::error(reason));
        self.handle_quit(seat, conn_id)
    }

    fn reply(&mut self, seat: Seat, response: ServerToClient) {
        let stalled = self.broadcaster.send_to(seat, response);
        self.evict_stalled(stalled.into_iter().collect());
    }

    fn finish_round(&mut self) {
        debug!("Final board:\n{}", self.board);
        self.rounds_completed += 1;
        self.board.reset();
    }

    fn release(&mut self, seat: Seat, conn_id: Uuid) {
        self.broadcaster.remove_player(seat, conn_id);
        self.board.reset();
    }

    /// Drops seats whose buffers overflowed and tells the rest. Telling the
    /// rest may overflow another buffer, so keep going until nothing stalls.
    fn evict_stalled(&mut self, mut stalled: Vec<Seat>) {
        while let Some(seat) = stalled.pop() {
            let Some(conn_id) = self.broadcaster.conn_id(seat) else {
                continue;
            };
            warn!("Evicting stalled player {} ({})", seat, conn_id);
            self.release(seat, conn_id);
            stalled.extend(self.broadcaster.broadcast(ServerToClient::Quit(seat)));
        }
    }
}
