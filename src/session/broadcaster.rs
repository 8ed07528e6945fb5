use crate::messages::{Outbound, ServerToClient};
use crate::session::Seat;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug)]
struct Occupant {
    conn_id: Uuid,
    sender: Outbound,
}

/// Output channels of the seated connections, at most one per seat.
#[derive(Debug, Default)]
pub struct SeatBroadcaster {
    seats: [Option<Occupant>; 2],
}

impl SeatBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat 1 if it is free, otherwise seat 2 if that is free.
    pub fn free_seat(&self) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|seat| self.seats[seat.index()].is_none())
    }

    pub fn active_count(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.active_count() == self.seats.len()
    }

    pub fn add_player(&mut self, seat: Seat, conn_id: Uuid, sender: Outbound) {
        self.seats[seat.index()] = Some(Occupant { conn_id, sender });
    }

    /// True when `conn_id` is the connection currently holding `seat`.
    pub fn holds(&self, seat: Seat, conn_id: Uuid) -> bool {
        self.seats[seat.index()]
            .as_ref()
            .is_some_and(|o| o.conn_id == conn_id)
    }

    /// Removes the occupant of `seat` only if it is still `conn_id`.
    /// Dropping the sender lets that connection's writer finish.
    pub fn remove_player(&mut self, seat: Seat, conn_id: Uuid) -> bool {
        if self.holds(seat, conn_id) {
            self.seats[seat.index()] = None;
            true
        } else {
            false
        }
    }

    pub fn conn_id(&self, seat: Seat) -> Option<Uuid> {
        self.seats[seat.index()].as_ref().map(|o| o.conn_id)
    }

    /// Queues `line` for `seat`. Returns false when the seat's buffer is
    /// full; a closed channel is ignored since its handler is already
    /// on the way out.
    fn deliver(&self, seat: Seat, line: &Arc<ServerToClient>) -> bool {
        let Some(occupant) = &self.seats[seat.index()] else {
            return true;
        };
        match occupant.sender.try_send(Arc::clone(line)) {
            Ok(()) | Err(TrySendError::Closed(_)) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Seat {} ({}) outbound buffer full, dropping '{}'",
                    seat, occupant.conn_id, line
                );
                false
            }
        }
    }

    /// Returns the seat if it turned out to be stalled.
    pub fn send_to(&self, seat: Seat, response: ServerToClient) -> Option<Seat> {
        let line = Arc::new(response);
        (!self.deliver(seat, &line)).then_some(seat)
    }

    /// Sends to every seated connection, returning the stalled seats.
    pub fn broadcast(&self, response: ServerToClient) -> Vec<Seat> {
        let line = Arc::new(response);
        Seat::ALL
            .into_iter()
            .filter(|&seat| !self.deliver(seat, &line))
            .collect()
    }
}
