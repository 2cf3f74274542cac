use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::money::Money;
use crate::models::status::{BookingStatus, PaymentStatus};
use crate::pii::Masked;

/// What the driver module needs to attach a driver and a fee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverAssignmentRequest {
    pub booking_id: Uuid,
    pub tour_date: NaiveDate,
    #[serde(with = "crate::time::hhmm")]
    pub tour_time: NaiveTime,
    pub pickup_location: String,
    pub group_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassengerNotice {
    pub name: String,
    pub phone: Option<Masked<String>>,
    pub seat_number: Option<u32>,
}

/// Booking snapshot handed to voucher and messaging collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingNotice {
    pub booking_id: Uuid,
    pub tenant_id: String,
    pub voucher: String,
    pub scheduled_tour_id: Option<Uuid>,
    pub tour_label: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub price: Money,
    pub pickup_location: String,
    pub passengers: Vec<PassengerNotice>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEvent {
    Created {
        notice: BookingNotice,
    },
    Confirmed {
        notice: BookingNotice,
        driver_request: DriverAssignmentRequest,
    },
    Cancelled {
        notice: BookingNotice,
    },
    Completed {
        notice: BookingNotice,
    },
    PaymentUpdated {
        notice: BookingNotice,
    },
}

impl BookingEvent {
    pub fn notice(&self) -> &BookingNotice {
        match self {
            BookingEvent::Created { notice }
            | BookingEvent::Confirmed { notice, .. }
            | BookingEvent::Cancelled { notice }
            | BookingEvent::Completed { notice }
            | BookingEvent::PaymentUpdated { notice } => notice,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BookingEvent::Created { .. } => "created",
            BookingEvent::Confirmed { .. } => "confirmed",
            BookingEvent::Cancelled { .. } => "cancelled",
            BookingEvent::Completed { .. } => "completed",
            BookingEvent::PaymentUpdated { .. } => "payment_updated",
        }
    }
}

/// Published after every committed reserve/release/reassign on a tour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OccupancyChanged {
    pub tour_id: Uuid,
    pub capacity: u32,
    pub occupied: Vec<u32>,
    pub timestamp: i64,
}
