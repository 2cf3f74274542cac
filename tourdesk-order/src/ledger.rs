use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tourdesk_core::{CoreResult, Reservation, SeatLedger};
use uuid::Uuid;

#[derive(Debug, Default)]
struct TourSeats {
    holder: BTreeMap<u32, Uuid>,
    by_booking: HashMap<Uuid, BTreeSet<u32>>,
}

impl TourSeats {
    fn contested(&self, booking_id: Uuid, seats: &BTreeSet<u32>) -> BTreeSet<u32> {
        seats
            .iter()
            .filter(|seat| matches!(self.holder.get(seat), Some(owner) if *owner != booking_id))
            .copied()
            .collect()
    }

    fn hold(&mut self, booking_id: Uuid, seats: &BTreeSet<u32>) {
        for seat in seats {
            self.holder.insert(*seat, booking_id);
        }
        self.by_booking.entry(booking_id).or_default().extend(seats.iter().copied());
    }

    fn free(&mut self, booking_id: Uuid, seats: &BTreeSet<u32>) -> BTreeSet<u32> {
        let mut freed = BTreeSet::new();
        if let Some(held) = self.by_booking.get_mut(&booking_id) {
            for seat in seats {
                if held.remove(seat) {
                    self.holder.remove(seat);
                    freed.insert(*seat);
                }
            }
            if held.is_empty() {
                self.by_booking.remove(&booking_id);
            }
        }
        freed
    }
}

/// Process-local seat ledger.
///
/// Each tour has its own lock, so writes on one tour never wait on another.
/// The outer map lock is only taken to find or create a tour's slot.
#[derive(Default)]
pub struct InMemorySeatLedger {
    tours: RwLock<HashMap<Uuid, Arc<RwLock<TourSeats>>>>,
}

impl InMemorySeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn existing(&self, tour_id: Uuid) -> Option<Arc<RwLock<TourSeats>>> {
        self.tours.read().await.get(&tour_id).cloned()
    }

    async fn slot(&self, tour_id: Uuid) -> Arc<RwLock<TourSeats>> {
        if let Some(slot) = self.existing(tour_id).await {
            return slot;
        }
        self.tours.write().await.entry(tour_id).or_default().clone()
    }
}

#[async_trait]
impl SeatLedger for InMemorySeatLedger {
    async fn occupied(&self, tour_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        Ok(match self.existing(tour_id).await {
            Some(slot) => slot.read().await.holder.keys().copied().collect(),
            None => BTreeSet::new(),
        })
    }

    async fn held_by(&self, tour_id: Uuid, booking_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        Ok(match self.existing(tour_id).await {
            Some(slot) => slot.read().await.by_booking.get(&booking_id).cloned().unwrap_or_default(),
            None => BTreeSet::new(),
        })
    }

    async fn try_reserve(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<Reservation> {
        let slot = self.slot(tour_id).await;
        let mut tour = slot.write().await;

        let contested = tour.contested(booking_id, seats);
        if !contested.is_empty() {
            return Ok(Reservation::Contested(contested));
        }
        tour.hold(booking_id, seats);
        Ok(Reservation::Committed)
    }

    async fn try_replace(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<Reservation> {
        let slot = self.slot(tour_id).await;
        let mut tour = slot.write().await;

        let contested = tour.contested(booking_id, seats);
        if !contested.is_empty() {
            return Ok(Reservation::Contested(contested));
        }
        let previous = tour.by_booking.get(&booking_id).cloned().unwrap_or_default();
        let dropped: BTreeSet<u32> = previous.difference(seats).copied().collect();
        tour.free(booking_id, &dropped);
        tour.hold(booking_id, seats);
        Ok(Reservation::Committed)
    }

    async fn release_seats(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<BTreeSet<u32>> {
        let Some(slot) = self.existing(tour_id).await else {
            return Ok(BTreeSet::new());
        };
        let mut tour = slot.write().await;
        Ok(tour.free(booking_id, seats))
    }

    async fn release_all(&self, tour_id: Uuid, booking_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        let Some(slot) = self.existing(tour_id).await else {
            return Ok(BTreeSet::new());
        };
        let mut tour = slot.write().await;
        let held = tour.by_booking.get(&booking_id).cloned().unwrap_or_default();
        Ok(tour.free(booking_id, &held))
    }
}
