use crate::models::TourBooking;
use tourdesk_core::{CoreError, CoreResult};
use tourdesk_shared::Masked;

/// Passenger roster edits that touch only the booking record, never the
/// seat ledger.
pub struct RosterChanges;

impl RosterChanges {
    /// Truncates or pads `passenger_names` to `new_size`. Seats held by cut-off
    /// passengers stay held until released explicitly, but lose their
    /// passenger data: growing the group again starts the new slots unseated.
    pub fn resize(booking: &mut TourBooking, new_size: u32) -> CoreResult<()> {
        Self::ensure_modifiable(booking, "RESIZE")?;
        if new_size < 1 {
            return Err(CoreError::validation("group size must be at least 1"));
        }

        let cut_off: Vec<u32> = booking
            .passenger_details
            .iter()
            .filter(|(_, d)| d.passenger_index >= new_size as usize)
            .map(|(seat, _)| *seat)
            .collect();
        for seat in cut_off {
            booking.passenger_details.remove(&seat);
            booking.orphaned.insert(seat);
        }

        booking.passenger_names.resize(new_size as usize, String::new());
        booking.group_size = new_size;
        booking.touch();
        Ok(())
    }

    pub fn rename(booking: &mut TourBooking, passenger_index: usize, name: &str) -> CoreResult<()> {
        Self::ensure_modifiable(booking, "RENAME")?;
        Self::ensure_slot(booking, passenger_index)?;

        booking.passenger_names[passenger_index] = name.trim().to_string();
        if let Some(seat) = booking.seat_of(passenger_index) {
            if let Some(detail) = booking.passenger_details.get_mut(&seat) {
                detail.name = booking.passenger_names[passenger_index].clone();
            }
        }
        booking.touch();
        Ok(())
    }

    /// Contact numbers live on the seat record, so the passenger needs a seat.
    pub fn set_contact(booking: &mut TourBooking, passenger_index: usize, phone: Option<String>) -> CoreResult<()> {
        Self::ensure_modifiable(booking, "SET_CONTACT")?;
        Self::ensure_slot(booking, passenger_index)?;

        let seat = booking.seat_of(passenger_index).ok_or_else(|| {
            CoreError::validation(format!("passenger {} has no seat yet", passenger_index))
        })?;
        if let Some(detail) = booking.passenger_details.get_mut(&seat) {
            detail.phone = phone.filter(|p| !p.trim().is_empty()).map(Masked::new);
        }
        booking.touch();
        Ok(())
    }

    pub fn ensure_slot(booking: &TourBooking, passenger_index: usize) -> CoreResult<()> {
        if passenger_index >= booking.group_size as usize {
            return Err(CoreError::validation(format!(
                "passenger index {} is outside a group of {}",
                passenger_index, booking.group_size
            )));
        }
        Ok(())
    }

    pub fn ensure_modifiable(booking: &TourBooking, action: &str) -> CoreResult<()> {
        if booking.status.is_terminal() {
            return Err(CoreError::invalid_transition(booking.status, action));
        }
        Ok(())
    }
}
