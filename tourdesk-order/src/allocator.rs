use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tourdesk_catalog::{Layout, SeatLayoutGenerator};
use tourdesk_core::{CoreError, CoreResult, Reservation, RequestContext, SeatLedger};
use tourdesk_shared::OccupancyChanged;
use uuid::Uuid;

use crate::registry::{ScheduledTour, ScheduledTourRegistry};

/// Point-in-time occupancy of one tour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OccupancySnapshot {
    pub tour_id: Uuid,
    pub capacity: u32,
    pub occupied: BTreeSet<u32>,
    pub free_count: u32,
    pub utilization: f64,
}

/// Single source of truth for which booking holds which seat.
///
/// Seat lists computed by a client are advisory; only a successful
/// `reserve` or `reassign` holds a seat.
pub struct SeatAllocator {
    registry: Arc<ScheduledTourRegistry>,
    ledger: Arc<dyn SeatLedger>,
    layouts: SeatLayoutGenerator,
    changes: broadcast::Sender<OccupancyChanged>,
}

impl SeatAllocator {
    pub fn new(registry: Arc<ScheduledTourRegistry>, ledger: Arc<dyn SeatLedger>, channel_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            registry,
            ledger,
            layouts: SeatLayoutGenerator::new(),
            changes,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OccupancyChanged> {
        self.changes.subscribe()
    }

    pub async fn capacity_of(&self, tour_id: Uuid) -> CoreResult<u32> {
        self.registry.capacity_of(tour_id).await
    }

    pub async fn occupied_seats(&self, tour_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        self.registry.capacity_of(tour_id).await?;
        self.ledger.occupied(tour_id).await
    }

    pub async fn held_by(&self, tour_id: Uuid, booking_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        self.registry.capacity_of(tour_id).await?;
        self.ledger.held_by(tour_id, booking_id).await
    }

    pub async fn free_seats(&self, tour_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        let capacity = self.registry.capacity_of(tour_id).await?;
        let occupied = self.ledger.occupied(tour_id).await?;
        Ok((1..=capacity).filter(|s| !occupied.contains(s)).collect())
    }

    pub async fn snapshot(&self, tour_id: Uuid) -> CoreResult<OccupancySnapshot> {
        let capacity = self.registry.capacity_of(tour_id).await?;
        let occupied = self.ledger.occupied(tour_id).await?;
        let taken = occupied.len() as u32;
        Ok(OccupancySnapshot {
            tour_id,
            capacity,
            free_count: capacity.saturating_sub(taken),
            utilization: f64::from(taken) / f64::from(capacity),
            occupied,
        })
    }

    pub async fn layout(&self, tour_id: Uuid) -> CoreResult<Layout> {
        let capacity = self.registry.capacity_of(tour_id).await?;
        self.layouts.layout(capacity)
    }

    /// Holds `seats` for the booking, or nothing at all. The tour's capacity
    /// is fixed before the ledger is touched.
    pub async fn reserve(&self, tour_id: Uuid, booking_id: Uuid, seats: &BTreeSet<u32>) -> CoreResult<()> {
        if seats.is_empty() {
            return Err(CoreError::validation("no seats requested"));
        }
        let capacity = self.registry.attach_booking(tour_id).await?;
        check_range(seats, capacity)?;

        match self.ledger.try_reserve(tour_id, booking_id, seats).await? {
            Reservation::Committed => {
                tracing::info!(%tour_id, %booking_id, ?seats, "Seats reserved");
                self.publish(tour_id, capacity).await;
                Ok(())
            }
            Reservation::Contested(contested) => Err(conflict(tour_id, booking_id, contested)),
        }
    }

    /// Frees everything the booking holds. Safe to repeat.
    pub async fn release(&self, tour_id: Uuid, booking_id: Uuid) -> CoreResult<BTreeSet<u32>> {
        let capacity = self.registry.capacity_of(tour_id).await?;
        let freed = self.ledger.release_all(tour_id, booking_id).await?;
        if !freed.is_empty() {
            tracing::info!(%tour_id, %booking_id, ?freed, "Seats released");
            self.publish(tour_id, capacity).await;
        }
        Ok(freed)
    }

    pub async fn release_seats(
        &self,
        tour_id: Uuid,
        booking_id: Uuid,
        seats: &BTreeSet<u32>,
    ) -> CoreResult<BTreeSet<u32>> {
        let capacity = self.registry.capacity_of(tour_id).await?;
        let freed = self.ledger.release_seats(tour_id, booking_id, seats).await?;
        if !freed.is_empty() {
            tracing::info!(%tour_id, %booking_id, ?freed, "Seats released");
            self.publish(tour_id, capacity).await;
        }
        Ok(freed)
    }

    /// Release + reserve as one step: readers never see the booking without
    /// its old or its new seats.
    pub async fn reassign(&self, tour_id: Uuid, booking_id: Uuid, seats: &BTreeSet<u32>) -> CoreResult<()> {
        let capacity = self.registry.attach_booking(tour_id).await?;
        check_range(seats, capacity)?;

        match self.ledger.try_replace(tour_id, booking_id, seats).await? {
            Reservation::Committed => {
                tracing::info!(%tour_id, %booking_id, ?seats, "Seats reassigned");
                self.publish(tour_id, capacity).await;
                Ok(())
            }
            Reservation::Contested(contested) => Err(conflict(tour_id, booking_id, contested)),
        }
    }

    /// Swaps the tour's vehicle. Refused while any seat is held, whoever
    /// holds it.
    pub async fn change_vehicle(
        &self,
        ctx: &RequestContext,
        tour_id: Uuid,
        vehicle_type_id: &str,
    ) -> CoreResult<ScheduledTour> {
        self.registry.get(ctx, tour_id).await?;
        let occupied = self.ledger.occupied(tour_id).await?;
        if !occupied.is_empty() {
            tracing::warn!(%tour_id, vehicle_type_id, held = occupied.len(), "Vehicle change refused");
            return Err(CoreError::validation(format!(
                "{} seats are held on the tour; the vehicle cannot change",
                occupied.len()
            )));
        }

        let tour = self.registry.change_vehicle(ctx, tour_id, vehicle_type_id).await?;
        self.publish(tour_id, tour.capacity).await;
        Ok(tour)
    }

    async fn publish(&self, tour_id: Uuid, capacity: u32) {
        if self.changes.receiver_count() == 0 {
            return;
        }
        match self.ledger.occupied(tour_id).await {
            Ok(occupied) => {
                // No subscribers left is not an error.
                let _ = self.changes.send(OccupancyChanged {
                    tour_id,
                    capacity,
                    occupied: occupied.into_iter().collect(),
                    timestamp: Utc::now().timestamp(),
                });
            }
            Err(e) => tracing::warn!(%tour_id, "Could not read occupancy for change feed: {}", e),
        }
    }
}

fn check_range(seats: &BTreeSet<u32>, capacity: u32) -> CoreResult<()> {
    if seats.contains(&0) {
        return Err(CoreError::validation("seat numbers start at 1"));
    }
    if let Some(&highest) = seats.iter().next_back() {
        if highest > capacity {
            return Err(CoreError::CapacityExceeded {
                requested: highest,
                capacity,
            });
        }
    }
    Ok(())
}

fn conflict(tour_id: Uuid, booking_id: Uuid, contested: BTreeSet<u32>) -> CoreError {
    tracing::warn!(%tour_id, %booking_id, ?contested, "Seat reservation rejected");
    CoreError::SeatConflict {
        contested_seats: contested.into_iter().collect(),
    }
}
