use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tourdesk_catalog::PricingEngine;
use tourdesk_core::hooks::VoucherIssuer;
use tourdesk_core::{CoreError, CoreResult, RequestContext};
use tourdesk_shared::{BookingEvent, BookingStatus, Money, PaymentStatus};
use uuid::Uuid;

use crate::allocator::SeatAllocator;
use crate::changes::RosterChanges;
use crate::models::{BookingDraft, DraftTarget, PassengerDetail, TourBooking, TourTarget};
use crate::registry::ScheduledTourRegistry;

type BookingSlot = Arc<Mutex<TourBooking>>;

/// Drives bookings through PENDING → CONFIRMED → COMPLETED / CANCELLED and
/// keeps their seats in step with the allocator.
///
/// Each booking has its own lock. Events are broadcast only after a change
/// has been committed; collaborators react to them out of band.
pub struct BookingLifecycle {
    registry: Arc<ScheduledTourRegistry>,
    allocator: Arc<SeatAllocator>,
    pricing: PricingEngine,
    vouchers: Arc<dyn VoucherIssuer>,
    bookings: RwLock<HashMap<Uuid, BookingSlot>>,
    events: broadcast::Sender<BookingEvent>,
}

impl BookingLifecycle {
    pub fn new(
        registry: Arc<ScheduledTourRegistry>,
        allocator: Arc<SeatAllocator>,
        vouchers: Arc<dyn VoucherIssuer>,
        channel_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            registry,
            allocator,
            pricing: PricingEngine::new(),
            vouchers,
            bookings: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.events.subscribe()
    }

    pub fn allocator(&self) -> &Arc<SeatAllocator> {
        &self.allocator
    }

    pub fn registry(&self) -> &Arc<ScheduledTourRegistry> {
        &self.registry
    }

    /// Validates, resolves the tour, prices, reserves any pre-selected seats
    /// and stores the booking as PENDING. Nothing is stored on failure.
    pub async fn create(&self, ctx: &RequestContext, draft: BookingDraft) -> CoreResult<TourBooking> {
        draft.validate()?;

        let booking_id = Uuid::new_v4();
        let manual_price = draft.price.map(|amount| Money::new(amount, draft.currency));

        let (target, route_id, price, capacity) = match &draft.target {
            DraftTarget::Route { route_id, vehicle_type_id } => {
                let route = self.registry.routes().get(route_id)?.clone();
                if manual_price.is_none() && route.base_price.currency != draft.currency {
                    return Err(CoreError::validation(format!(
                        "route {} is priced in {}, booking asked for {}",
                        route.id, route.base_price.currency, draft.currency
                    )));
                }
                let tour = self
                    .registry
                    .resolve(ctx, route_id, draft.tour_date, draft.tour_time, vehicle_type_id)
                    .await?;
                let price = self.pricing.price(&route, draft.group_size, manual_price)?;
                // Fixed before the group is checked against it or any seat is held.
                let capacity = self.registry.attach_booking(tour.id).await?;
                (
                    TourTarget::Scheduled { tour_id: tour.id },
                    Some(route.id),
                    price,
                    Some(capacity),
                )
            }
            DraftTarget::Custom { name } => {
                let price = manual_price.ok_or_else(|| CoreError::validation("custom tours need a manual price"))?;
                (
                    TourTarget::AdHoc {
                        description: name.trim().to_string(),
                    },
                    None,
                    price,
                    None,
                )
            }
        };

        if let Some(capacity) = capacity {
            if draft.group_size > capacity {
                return Err(CoreError::CapacityExceeded {
                    requested: draft.group_size,
                    capacity,
                });
            }
        }

        let mut passenger_details = BTreeMap::new();
        if let (Some(tour_id), false) = (target.tour_id(), draft.seat_numbers.is_empty()) {
            let seats: BTreeSet<u32> = draft.seat_numbers.iter().copied().collect();
            self.allocator.reserve(tour_id, booking_id, &seats).await?;

            for (index, seat) in draft.seat_numbers.iter().enumerate() {
                passenger_details.insert(
                    *seat,
                    PassengerDetail {
                        passenger_index: index,
                        name: draft.passenger_names[index].clone(),
                        phone: None,
                        payment_status: PaymentStatus::Pending,
                    },
                );
            }
        }

        let now = Utc::now();
        let booking = TourBooking {
            id: booking_id,
            tenant_id: ctx.tenant_id.clone(),
            voucher: self.vouchers.issue(ctx, booking_id),
            target,
            route_id,
            tour_date: draft.tour_date,
            tour_time: draft.tour_time,
            customer_id: draft.customer_id,
            group_size: draft.group_size,
            passenger_names: draft.passenger_names,
            passenger_details,
            orphaned: BTreeSet::new(),
            price,
            pickup_location: draft.pickup_location,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            driver_id: None,
            driver_fee: None,
            created_by: ctx.agent_id.clone(),
            created_at: now,
            updated_at: now,
        };

        self.bookings
            .write()
            .await
            .insert(booking.id, Arc::new(Mutex::new(booking.clone())));

        tracing::info!(
            booking_id = %booking.id,
            voucher = %booking.voucher,
            agent = %ctx.agent_id,
            group_size = booking.group_size,
            "Tour booking created"
        );
        self.emit(BookingEvent::Created { notice: booking.notice() });
        Ok(booking)
    }

    pub async fn get(&self, ctx: &RequestContext, booking_id: Uuid) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let booking = slot.lock().await;
        Ok(booking.clone())
    }

    /// Every booking on a scheduled tour, oldest first.
    pub async fn list_for_tour(&self, ctx: &RequestContext, tour_id: Uuid) -> CoreResult<Vec<TourBooking>> {
        self.registry.get(ctx, tour_id).await?;

        let slots: Vec<BookingSlot> = self.bookings.read().await.values().cloned().collect();
        let mut manifest = Vec::new();
        for slot in slots {
            let booking = slot.lock().await;
            if booking.tour_id() == Some(tour_id) && ctx.owns(&booking.tenant_id) {
                manifest.push(booking.clone());
            }
        }
        manifest.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(manifest)
    }

    /// PENDING → CONFIRMED.
    pub async fn confirm(&self, ctx: &RequestContext, booking_id: Uuid) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        Self::transition(&mut booking, BookingStatus::Confirmed)?;
        tracing::info!(booking_id = %booking_id, agent = %ctx.agent_id, "Tour booking confirmed");
        self.emit_confirmed(&booking);
        Ok(booking.clone())
    }

    /// CONFIRMED → COMPLETED. Seats stay held for the record.
    pub async fn complete(&self, ctx: &RequestContext, booking_id: Uuid) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        Self::transition(&mut booking, BookingStatus::Completed)?;
        tracing::info!(booking_id = %booking_id, "Tour booking completed");
        self.emit(BookingEvent::Completed { notice: booking.notice() });
        Ok(booking.clone())
    }

    /// Frees every seat the booking holds and marks it CANCELLED. Repeating
    /// the call on a cancelled booking is a no-op.
    pub async fn cancel(&self, ctx: &RequestContext, booking_id: Uuid) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        let already_cancelled = booking.status == BookingStatus::Cancelled;
        if !already_cancelled && !booking.status.can_transition_to(BookingStatus::Cancelled) {
            return Err(CoreError::invalid_transition(booking.status, BookingStatus::Cancelled));
        }

        // Released before the status flips; a ledger failure leaves the
        // booking untouched and the caller can simply retry.
        if let Some(tour_id) = booking.tour_id() {
            self.allocator.release(tour_id, booking_id).await?;
        }

        if !already_cancelled {
            booking.update_status(BookingStatus::Cancelled);
            tracing::info!(booking_id = %booking_id, agent = %ctx.agent_id, "Tour booking cancelled");
            self.emit(BookingEvent::Cancelled { notice: booking.notice() });
        }
        Ok(booking.clone())
    }

    /// Truncates or pads the roster. Seats held by passengers beyond the new
    /// size stay held until released explicitly.
    pub async fn resize_group(&self, ctx: &RequestContext, booking_id: Uuid, new_size: u32) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        if let Some(tour_id) = booking.tour_id() {
            let capacity = self.allocator.capacity_of(tour_id).await?;
            if new_size > capacity {
                return Err(CoreError::CapacityExceeded {
                    requested: new_size,
                    capacity,
                });
            }
        }

        let previous = booking.group_size;
        RosterChanges::resize(&mut booking, new_size)?;

        let orphaned = booking.orphaned_seats();
        if !orphaned.is_empty() {
            tracing::warn!(
                booking_id = %booking_id,
                ?orphaned,
                "Group shrunk; seats beyond the new size are still held"
            );
        }
        tracing::info!(booking_id = %booking_id, previous, new_size, "Group resized");
        Ok(booking.clone())
    }

    /// Puts one passenger on one seat. A passenger who already sits somewhere
    /// is moved atomically.
    pub async fn assign_seat(
        &self,
        ctx: &RequestContext,
        booking_id: Uuid,
        passenger_index: usize,
        seat: u32,
    ) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        RosterChanges::ensure_modifiable(&booking, "SEAT_ASSIGNMENT")?;
        RosterChanges::ensure_slot(&booking, passenger_index)?;
        let tour_id = Self::scheduled_tour(&booking)?;

        if let Some(detail) = booking.passenger_details.get(&seat) {
            if detail.passenger_index == passenger_index {
                return Ok(booking.clone());
            }
            return Err(CoreError::validation(format!(
                "seat {} is already assigned to passenger {} of this booking",
                seat, detail.passenger_index
            )));
        }

        // An orphaned seat is already held by this booking and can be reused.
        let reclaimed = booking.orphaned.contains(&seat);
        let previous = booking.seat_of(passenger_index);
        match previous {
            Some(old_seat) => {
                let mut target = booking.held_seats();
                target.remove(&old_seat);
                target.insert(seat);
                self.allocator.reassign(tour_id, booking_id, &target).await?;
            }
            None if reclaimed => {}
            None => {
                self.allocator.reserve(tour_id, booking_id, &BTreeSet::from([seat])).await?;
            }
        }
        booking.orphaned.remove(&seat);

        let carried = previous.and_then(|s| booking.passenger_details.remove(&s));
        let name = booking.passenger_names[passenger_index].clone();
        let payment_status = carried
            .as_ref()
            .map(|d| d.payment_status)
            .unwrap_or(booking.payment_status);
        booking.passenger_details.insert(
            seat,
            PassengerDetail {
                passenger_index,
                name,
                phone: carried.and_then(|d| d.phone),
                payment_status,
            },
        );
        booking.touch();

        tracing::info!(booking_id = %booking_id, passenger_index, seat, ?previous, "Seat assigned");
        Ok(booking.clone())
    }

    pub async fn release_seat(&self, ctx: &RequestContext, booking_id: Uuid, seat: u32) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        RosterChanges::ensure_modifiable(&booking, "SEAT_RELEASE")?;
        let tour_id = Self::scheduled_tour(&booking)?;
        if !booking.held_seats().contains(&seat) {
            return Err(CoreError::not_found("seat", seat));
        }

        self.allocator
            .release_seats(tour_id, booking_id, &BTreeSet::from([seat]))
            .await?;
        booking.passenger_details.remove(&seat);
        booking.orphaned.remove(&seat);
        booking.touch();
        Ok(booking.clone())
    }

    /// Releases seats left behind by a group shrink.
    pub async fn release_orphaned_seats(&self, ctx: &RequestContext, booking_id: Uuid) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        RosterChanges::ensure_modifiable(&booking, "SEAT_RELEASE")?;
        let orphaned = booking.orphaned_seats();
        if orphaned.is_empty() {
            return Ok(booking.clone());
        }
        let tour_id = Self::scheduled_tour(&booking)?;

        self.allocator.release_seats(tour_id, booking_id, &orphaned).await?;
        booking.orphaned.clear();
        booking.touch();

        tracing::info!(booking_id = %booking_id, ?orphaned, "Orphaned seats released");
        Ok(booking.clone())
    }

    /// Payment never gates seats. Full payment on a PENDING booking confirms it.
    pub async fn record_payment(
        &self,
        ctx: &RequestContext,
        booking_id: Uuid,
        payment_status: PaymentStatus,
    ) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::invalid_transition(booking.status, "PAYMENT_UPDATE"));
        }

        booking.payment_status = payment_status;
        for detail in booking.passenger_details.values_mut() {
            detail.payment_status = payment_status;
        }
        booking.touch();
        tracing::info!(booking_id = %booking_id, %payment_status, "Payment status updated");

        if payment_status == PaymentStatus::Paid && booking.status == BookingStatus::Pending {
            Self::transition(&mut booking, BookingStatus::Confirmed)?;
            tracing::info!(booking_id = %booking_id, "Tour booking confirmed by payment");
            self.emit_confirmed(&booking);
        } else {
            self.emit(BookingEvent::PaymentUpdated { notice: booking.notice() });
        }
        Ok(booking.clone())
    }

    /// Stores what the driver module decided. Driver data is not validated.
    pub async fn attach_driver(
        &self,
        ctx: &RequestContext,
        booking_id: Uuid,
        driver_id: String,
        driver_fee: Option<Money>,
    ) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::invalid_transition(booking.status, "DRIVER_ASSIGNMENT"));
        }
        booking.driver_id = Some(driver_id);
        booking.driver_fee = driver_fee;
        booking.touch();
        Ok(booking.clone())
    }

    pub async fn rename_passenger(
        &self,
        ctx: &RequestContext,
        booking_id: Uuid,
        passenger_index: usize,
        name: &str,
    ) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;
        RosterChanges::rename(&mut booking, passenger_index, name)?;
        Ok(booking.clone())
    }

    pub async fn set_passenger_contact(
        &self,
        ctx: &RequestContext,
        booking_id: Uuid,
        passenger_index: usize,
        phone: Option<String>,
    ) -> CoreResult<TourBooking> {
        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;
        RosterChanges::set_contact(&mut booking, passenger_index, phone)?;
        Ok(booking.clone())
    }

    /// Name and contact in one step: either both apply or neither does.
    pub async fn update_passenger(
        &self,
        ctx: &RequestContext,
        booking_id: Uuid,
        passenger_index: usize,
        name: Option<String>,
        phone: Option<String>,
    ) -> CoreResult<TourBooking> {
        if name.is_none() && phone.is_none() {
            return Err(CoreError::validation("nothing to update"));
        }

        let slot = self.slot(ctx, booking_id).await?;
        let mut booking = slot.lock().await;

        let mut updated = booking.clone();
        if let Some(name) = name {
            RosterChanges::rename(&mut updated, passenger_index, &name)?;
        }
        if phone.is_some() {
            RosterChanges::set_contact(&mut updated, passenger_index, phone)?;
        }
        *booking = updated;

        tracing::info!(booking_id = %booking_id, passenger_index, "Passenger updated");
        Ok(booking.clone())
    }

    async fn slot(&self, ctx: &RequestContext, booking_id: Uuid) -> CoreResult<BookingSlot> {
        let slot = self
            .bookings
            .read()
            .await
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("booking", booking_id))?;

        // Other tenants' bookings do not exist as far as the caller knows.
        let owned = ctx.owns(&slot.lock().await.tenant_id);
        if !owned {
            return Err(CoreError::not_found("booking", booking_id));
        }
        Ok(slot)
    }

    fn scheduled_tour(booking: &TourBooking) -> CoreResult<Uuid> {
        booking
            .tour_id()
            .ok_or_else(|| CoreError::validation("custom tours do not take part in seat allocation"))
    }

    fn transition(booking: &mut TourBooking, next: BookingStatus) -> CoreResult<()> {
        if !booking.status.can_transition_to(next) {
            return Err(CoreError::invalid_transition(booking.status, next));
        }
        booking.update_status(next);
        Ok(())
    }

    fn emit_confirmed(&self, booking: &TourBooking) {
        self.emit(BookingEvent::Confirmed {
            notice: booking.notice(),
            driver_request: booking.driver_request(),
        });
    }

    fn emit(&self, event: BookingEvent) {
        // Having no subscriber is fine: side effects are best effort.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::VoucherBook;
    use crate::ledger::InMemorySeatLedger;
    use crate::registry::tests::{ctx, registry};
    use chrono::{NaiveDate, NaiveTime};
    use tourdesk_shared::Currency;

    struct Fixture {
        lifecycle: BookingLifecycle,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(registry());
        let allocator = Arc::new(SeatAllocator::new(
            registry.clone(),
            Arc::new(InMemorySeatLedger::new()),
            16,
        ));
        Fixture {
            lifecycle: BookingLifecycle::new(registry, allocator, Arc::new(VoucherBook::default()), 16),
        }
    }

    fn draft(vehicle: &str, names: &[&str], seats: &[u32]) -> BookingDraft {
        BookingDraft {
            target: DraftTarget::Route {
                route_id: "red-tour".to_string(),
                vehicle_type_id: vehicle.to_string(),
            },
            tour_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            tour_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            customer_id: Some("cust-1".to_string()),
            group_size: names.len() as u32,
            passenger_names: names.iter().map(|n| n.to_string()).collect(),
            pickup_location: "Hotel Lykia".to_string(),
            price: None,
            currency: Currency::Eur,
            seat_numbers: seats.to_vec(),
        }
    }

    fn set(list: &[u32]) -> BTreeSet<u32> {
        list.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_create_reserves_preselected_seats() {
        let f = fixture();
        let booking = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["A", "B"], &[1, 2])).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.price, Money::new(12_000, Currency::Eur));
        assert!(booking.voucher.starts_with("TD-"));
        assert_eq!(booking.seat_of(1), Some(2));

        let tour_id = booking.tour_id().unwrap();
        assert_eq!(f.lifecycle.allocator().occupied_seats(tour_id).await.unwrap(), set(&[1, 2]));
    }

    #[tokio::test]
    async fn test_bookings_on_same_departure_share_occupancy() {
        let f = fixture();
        let b1 = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["A", "B"], &[1, 2])).await.unwrap();
        let err = f
            .lifecycle
            .create(&ctx("acme"), draft("sprinter", &["C"], &[2]))
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::SeatConflict { contested_seats: vec![2] });

        // Failed create persisted nothing.
        let manifest = f.lifecycle.list_for_tour(&ctx("acme"), b1.tour_id().unwrap()).await.unwrap();
        assert_eq!(manifest.len(), 1);
    }

    #[tokio::test]
    async fn test_group_larger_than_vehicle() {
        let f = fixture();
        let names = ["A", "B", "C", "D", "E", "F", "G"];
        let err = f.lifecycle.create(&ctx("acme"), draft("vito", &names, &[])).await.unwrap_err();
        assert_eq!(err, CoreError::CapacityExceeded { requested: 7, capacity: 6 });
    }

    #[tokio::test]
    async fn test_seat_beyond_vito_capacity() {
        let f = fixture();
        let booking = f.lifecycle.create(&ctx("acme"), draft("vito", &["A"], &[])).await.unwrap();
        let err = f.lifecycle.assign_seat(&ctx("acme"), booking.id, 0, 7).await.unwrap_err();
        assert_eq!(err, CoreError::CapacityExceeded { requested: 7, capacity: 6 });
    }

    #[tokio::test]
    async fn test_cancel_frees_seats_for_others() {
        let f = fixture();
        let b1 = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["A", "B"], &[3, 4])).await.unwrap();
        let tour_id = b1.tour_id().unwrap();

        f.lifecycle.cancel(&ctx("acme"), b1.id).await.unwrap();
        assert!(f.lifecycle.allocator().occupied_seats(tour_id).await.unwrap().is_empty());

        let b2 = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["C", "D"], &[3, 4])).await.unwrap();
        assert_eq!(b2.tour_id(), Some(tour_id));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_but_completed_is_terminal() {
        let f = fixture();
        let b1 = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["A"], &[5])).await.unwrap();
        f.lifecycle.cancel(&ctx("acme"), b1.id).await.unwrap();
        let again = f.lifecycle.cancel(&ctx("acme"), b1.id).await.unwrap();
        assert_eq!(again.status, BookingStatus::Cancelled);

        let b2 = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["B"], &[6])).await.unwrap();
        f.lifecycle.confirm(&ctx("acme"), b2.id).await.unwrap();
        f.lifecycle.complete(&ctx("acme"), b2.id).await.unwrap();
        let err = f.lifecycle.cancel(&ctx("acme"), b2.id).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        // Completed bookings keep their seats on record.
        let occupied = f.lifecycle.allocator().occupied_seats(b2.tour_id().unwrap()).await.unwrap();
        assert_eq!(occupied, set(&[6]));
    }

    #[tokio::test]
    async fn test_invalid_transitions_leave_state_unchanged() {
        let f = fixture();
        let b = f.lifecycle.create(&ctx("acme"), draft("vito", &["A"], &[])).await.unwrap();

        assert!(f.lifecycle.complete(&ctx("acme"), b.id).await.is_err());
        assert_eq!(f.lifecycle.get(&ctx("acme"), b.id).await.unwrap().status, BookingStatus::Pending);

        f.lifecycle.confirm(&ctx("acme"), b.id).await.unwrap();
        assert!(f.lifecycle.confirm(&ctx("acme"), b.id).await.is_err());
    }

    #[tokio::test]
    async fn test_resize_keeps_seats_until_released() {
        let f = fixture();
        let b = f
            .lifecycle
            .create(&ctx("acme"), draft("sprinter", &["A", "B", "C", "D"], &[1, 2, 3, 4]))
            .await
            .unwrap();
        let tour_id = b.tour_id().unwrap();

        let resized = f.lifecycle.resize_group(&ctx("acme"), b.id, 2).await.unwrap();
        assert_eq!(resized.passenger_names, vec!["A", "B"]);
        assert_eq!(
            f.lifecycle.allocator().occupied_seats(tour_id).await.unwrap(),
            set(&[1, 2, 3, 4])
        );
        assert_eq!(resized.orphaned_seats(), set(&[3, 4]));

        let released = f.lifecycle.release_orphaned_seats(&ctx("acme"), b.id).await.unwrap();
        assert!(released.orphaned_seats().is_empty());
        assert_eq!(f.lifecycle.allocator().occupied_seats(tour_id).await.unwrap(), set(&[1, 2]));
    }

    #[tokio::test]
    async fn test_resize_beyond_capacity_rejected() {
        let f = fixture();
        let b = f.lifecycle.create(&ctx("acme"), draft("vito", &["A"], &[])).await.unwrap();
        let err = f.lifecycle.resize_group(&ctx("acme"), b.id, 7).await.unwrap_err();
        assert_eq!(err, CoreError::CapacityExceeded { requested: 7, capacity: 6 });
    }

    #[tokio::test]
    async fn test_assign_seat_rules() {
        let f = fixture();
        let b = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["A", "B"], &[])).await.unwrap();

        let err = f.lifecycle.assign_seat(&ctx("acme"), b.id, 2, 5).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        f.lifecycle.assign_seat(&ctx("acme"), b.id, 0, 5).await.unwrap();
        let err = f.lifecycle.assign_seat(&ctx("acme"), b.id, 1, 5).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)), "seat belongs to passenger 0");

        // Moving passenger 0 swaps the seat in one step.
        let moved = f.lifecycle.assign_seat(&ctx("acme"), b.id, 0, 8).await.unwrap();
        assert_eq!(moved.seat_of(0), Some(8));
        assert_eq!(moved.held_seats(), set(&[8]));
        let tour_id = b.tour_id().unwrap();
        assert_eq!(f.lifecycle.allocator().occupied_seats(tour_id).await.unwrap(), set(&[8]));
    }

    #[tokio::test]
    async fn test_orphaned_seat_can_be_reused_by_remaining_passenger() {
        let f = fixture();
        let b = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["A", "B", "C"], &[1, 2, 3])).await.unwrap();
        f.lifecycle.resize_group(&ctx("acme"), b.id, 2).await.unwrap();

        let moved = f.lifecycle.assign_seat(&ctx("acme"), b.id, 1, 3).await.unwrap();
        assert_eq!(moved.seat_of(1), Some(3));
        assert!(moved.orphaned_seats().is_empty());
        let occupied = f.lifecycle.allocator().occupied_seats(b.tour_id().unwrap()).await.unwrap();
        assert_eq!(occupied, set(&[1, 3]));
    }

    #[tokio::test]
    async fn test_regrown_slot_can_take_back_orphaned_seat() {
        let f = fixture();
        let b = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["A", "B", "C"], &[1, 2, 3])).await.unwrap();
        f.lifecycle
            .set_passenger_contact(&ctx("acme"), b.id, 2, Some("+90 555 0003".to_string()))
            .await
            .unwrap();
        f.lifecycle.resize_group(&ctx("acme"), b.id, 2).await.unwrap();

        let regrown = f.lifecycle.resize_group(&ctx("acme"), b.id, 3).await.unwrap();
        assert_eq!(regrown.seat_of(2), None);
        assert_eq!(regrown.orphaned_seats(), set(&[3]));

        let seated = f.lifecycle.assign_seat(&ctx("acme"), b.id, 2, 3).await.unwrap();
        assert_eq!(seated.seat_of(2), Some(3));
        assert!(seated.orphaned_seats().is_empty());
        assert_eq!(seated.passenger_details[&3].phone, None);
        let occupied = f.lifecycle.allocator().occupied_seats(b.tour_id().unwrap()).await.unwrap();
        assert_eq!(occupied, set(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn test_passenger_update_is_all_or_nothing() {
        let f = fixture();
        let b = f.lifecycle.create(&ctx("acme"), draft("sprinter", &["A", "B"], &[4])).await.unwrap();

        let err = f
            .lifecycle
            .update_passenger(&ctx("acme"), b.id, 1, Some("Zeynep".to_string()), Some("+90 555".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(f.lifecycle.get(&ctx("acme"), b.id).await.unwrap().passenger_names[1], "B");

        let updated = f
            .lifecycle
            .update_passenger(&ctx("acme"), b.id, 0, Some("Ayse".to_string()), Some("+90 555".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.passenger_names[0], "Ayse");
        assert_eq!(updated.passenger_details[&4].name, "Ayse");
        assert_eq!(updated.passenger_details[&4].phone.as_ref().unwrap().expose(), "+90 555");

        assert!(f.lifecycle.update_passenger(&ctx("acme"), b.id, 0, None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_custom_tour_has_no_seats() {
        let f = fixture();
        let mut d = draft("vito", &["A"], &[]);
        d.target = DraftTarget::Custom {
            name: "Private yacht".to_string(),
        };
        d.price = Some(90_000);
        let b = f.lifecycle.create(&ctx("acme"), d).await.unwrap();

        assert_eq!(b.tour_id(), None);
        let err = f.lifecycle.assign_seat(&ctx("acme"), b.id, 0, 1).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        // Cancel still works without a tour.
        f.lifecycle.cancel(&ctx("acme"), b.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_currency_mismatch_without_manual_price() {
        let f = fixture();
        let mut d = draft("vito", &["A"], &[]);
        d.currency = Currency::Try;
        assert!(matches!(
            f.lifecycle.create(&ctx("acme"), d.clone()).await,
            Err(CoreError::ValidationError(_))
        ));

        d.price = Some(400_000);
        let b = f.lifecycle.create(&ctx("acme"), d).await.unwrap();
        assert_eq!(b.price, Money::new(400_000, Currency::Try));
    }

    #[tokio::test]
    async fn test_payment_confirms_and_emits_driver_request() {
        let f = fixture();
        let mut events = f.lifecycle.subscribe();
        let b = f.lifecycle.create(&ctx("acme"), draft("vito", &["A"], &[2])).await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), BookingEvent::Created { .. }));

        let partial = f.lifecycle.record_payment(&ctx("acme"), b.id, PaymentStatus::Partial).await.unwrap();
        assert_eq!(partial.status, BookingStatus::Pending);
        assert!(matches!(events.recv().await.unwrap(), BookingEvent::PaymentUpdated { .. }));

        let paid = f.lifecycle.record_payment(&ctx("acme"), b.id, PaymentStatus::Paid).await.unwrap();
        assert_eq!(paid.status, BookingStatus::Confirmed);
        assert_eq!(paid.passenger_details[&2].payment_status, PaymentStatus::Paid);

        match events.recv().await.unwrap() {
            BookingEvent::Confirmed { driver_request, .. } => {
                assert_eq!(driver_request.booking_id, b.id);
                assert_eq!(driver_request.group_size, 1);
                assert_eq!(driver_request.pickup_location, "Hotel Lykia");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_driver_attached_without_validation() {
        let f = fixture();
        let b = f.lifecycle.create(&ctx("acme"), draft("vito", &["A"], &[])).await.unwrap();
        f.lifecycle.confirm(&ctx("acme"), b.id).await.unwrap();

        let fee = Money::new(-1, Currency::Eur);
        let with_driver = f
            .lifecycle
            .attach_driver(&ctx("acme"), b.id, "drv-42".to_string(), Some(fee))
            .await
            .unwrap();
        assert_eq!(with_driver.driver_id.as_deref(), Some("drv-42"));
        assert_eq!(with_driver.driver_fee, Some(fee));
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_see_booking() {
        let f = fixture();
        let b = f.lifecycle.create(&ctx("acme"), draft("vito", &["A"], &[1])).await.unwrap();
        let err = f.lifecycle.cancel(&ctx("globex"), b.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { kind: "booking", .. }));

        let occupied = f.lifecycle.allocator().occupied_seats(b.tour_id().unwrap()).await.unwrap();
        assert_eq!(occupied, set(&[1]));
    }

    #[tokio::test]
    async fn test_concurrent_bookings_never_share_a_seat() {
        let f = Arc::new(fixture());
        let mut handles = Vec::new();
        for i in 0..20u32 {
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                let seat = i % 5 + 1;
                f.lifecycle.create(&ctx("acme"), draft("vito", &["P"], &[seat])).await.ok()
            }));
        }

        let mut created = Vec::new();
        for handle in handles {
            if let Some(b) = handle.await.unwrap() {
                created.push(b);
            }
        }
        assert_eq!(created.len(), 5);
        let seats: BTreeSet<u32> = created.iter().flat_map(|b| b.held_seats()).collect();
        assert_eq!(seats, set(&[1, 2, 3, 4, 5]));
    }
}
