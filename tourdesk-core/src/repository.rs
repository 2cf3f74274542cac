use async_trait::async_trait;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::CoreResult;

/// Outcome of an all-or-nothing seat write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    Committed,
    /// Nothing was written; these seats belong to other bookings.
    Contested(BTreeSet<u32>),
}

/// Storage for seat holdings, keyed by tour and booking.
///
/// Implementations must make each write atomic per tour: a concurrent reader
/// sees either the state before or the state after, never a mix. Seats the
/// same booking already holds never count as contested. Range checks against
/// capacity are the allocator's job, not the ledger's.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    async fn occupied(&self, tour_id: Uuid) -> CoreResult<BTreeSet<u32>>;

    async fn held_by(&self, tour_id: Uuid, booking_id: Uuid) -> CoreResult<BTreeSet<u32>>;

    async fn try_reserve(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<Reservation>;

    /// Replaces the booking's whole holding with `seats` in one step.
    async fn try_replace(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<Reservation>;

    /// Frees the given seats if the booking holds them; returns what was freed.
    async fn release_seats(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<BTreeSet<u32>>;

    /// Frees everything the booking holds; returns what was freed.
    async fn release_all(&self, tour_id: Uuid, booking_id: Uuid) -> CoreResult<BTreeSet<u32>>;
}
