use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tourdesk_core::{CoreError, CoreResult};
use tourdesk_shared::{
    BookingNotice, BookingStatus, Currency, DriverAssignmentRequest, Masked, Money, PassengerNotice,
    PaymentStatus,
};
use uuid::Uuid;

/// What a booking is attached to. Only scheduled tours take part in seat
/// allocation; ad-hoc tours have no registry entry and no seat map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TourTarget {
    Scheduled { tour_id: Uuid },
    AdHoc { description: String },
}

impl TourTarget {
    pub fn tour_id(&self) -> Option<Uuid> {
        match self {
            TourTarget::Scheduled { tour_id } => Some(*tour_id),
            TourTarget::AdHoc { .. } => None,
        }
    }
}

/// Per-seat passenger record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassengerDetail {
    pub passenger_index: usize,
    pub name: String,
    pub phone: Option<Masked<String>>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourBooking {
    pub id: Uuid,
    pub tenant_id: String,
    pub voucher: String,
    pub target: TourTarget,
    pub route_id: Option<String>,
    pub tour_date: NaiveDate,
    #[serde(with = "tourdesk_shared::time::hhmm")]
    pub tour_time: NaiveTime,
    pub customer_id: Option<String>,
    pub group_size: u32,
    pub passenger_names: Vec<String>,
    /// Seat number → passenger. Holds the last known assignment, also after
    /// cancellation; live occupancy always comes from the allocator.
    pub passenger_details: BTreeMap<u32, PassengerDetail>,
    /// Seats still held after a resize cut their passengers off. They carry
    /// no passenger data and are never handed to a slot a later grow adds.
    #[serde(default)]
    pub orphaned: BTreeSet<u32>,
    pub price: Money,
    pub pickup_location: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub driver_id: Option<String>,
    pub driver_fee: Option<Money>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TourBooking {
    pub fn tour_id(&self) -> Option<Uuid> {
        self.target.tour_id()
    }

    pub fn held_seats(&self) -> BTreeSet<u32> {
        self.passenger_details
            .keys()
            .chain(self.orphaned.iter())
            .copied()
            .collect()
    }

    pub fn seat_of(&self, passenger_index: usize) -> Option<u32> {
        self.passenger_details
            .iter()
            .find(|(_, d)| d.passenger_index == passenger_index)
            .map(|(seat, _)| *seat)
    }

    /// Seats still held for passenger slots a resize has cut off.
    pub fn orphaned_seats(&self) -> BTreeSet<u32> {
        self.orphaned.clone()
    }

    pub fn update_status(&mut self, new_status: BookingStatus) {
        self.status = new_status;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn tour_label(&self) -> String {
        let name = match &self.target {
            TourTarget::AdHoc { description } => description.clone(),
            TourTarget::Scheduled { .. } => self.route_id.clone().unwrap_or_default(),
        };
        format!("{} {} {}", name, self.tour_date, self.tour_time.format("%H:%M"))
    }

    pub fn notice(&self) -> BookingNotice {
        let passengers = self
            .passenger_names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let seat = self.seat_of(index);
                PassengerNotice {
                    name: name.clone(),
                    phone: seat
                        .and_then(|s| self.passenger_details.get(&s))
                        .and_then(|d| d.phone.clone()),
                    seat_number: seat,
                }
            })
            .collect();

        BookingNotice {
            booking_id: self.id,
            tenant_id: self.tenant_id.clone(),
            voucher: self.voucher.clone(),
            scheduled_tour_id: self.tour_id(),
            tour_label: self.tour_label(),
            status: self.status,
            payment_status: self.payment_status,
            price: self.price,
            pickup_location: self.pickup_location.clone(),
            passengers,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn driver_request(&self) -> DriverAssignmentRequest {
        DriverAssignmentRequest {
            booking_id: self.id,
            tour_date: self.tour_date,
            tour_time: self.tour_time,
            pickup_location: self.pickup_location.clone(),
            group_size: self.group_size,
        }
    }
}

/// Which tour a new booking asks for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DraftTarget {
    Route {
        route_id: String,
        vehicle_type_id: String,
    },
    Custom {
        name: String,
    },
}

/// Inbound booking request, before any tour is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDraft {
    pub target: DraftTarget,
    pub tour_date: NaiveDate,
    #[serde(with = "tourdesk_shared::time::hhmm")]
    pub tour_time: NaiveTime,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub group_size: u32,
    pub passenger_names: Vec<String>,
    pub pickup_location: String,
    /// Manual price in minor units; wins over the route price.
    #[serde(default)]
    pub price: Option<i64>,
    pub currency: Currency,
    /// Pre-selected seats, assigned to passengers in order.
    #[serde(default)]
    pub seat_numbers: Vec<u32>,
}

impl BookingDraft {
    /// Shape checks that need no catalog or occupancy lookup.
    pub fn validate(&self) -> CoreResult<()> {
        if self.group_size < 1 {
            return Err(CoreError::validation("group size must be at least 1"));
        }
        if self.passenger_names.len() != self.group_size as usize {
            return Err(CoreError::validation(format!(
                "expected {} passenger names, got {}",
                self.group_size,
                self.passenger_names.len()
            )));
        }
        if let Some(price) = self.price {
            if price < 0 {
                return Err(CoreError::validation("price must not be negative"));
            }
        }
        if self.seat_numbers.len() > self.group_size as usize {
            return Err(CoreError::validation(format!(
                "{} seats requested for a group of {}",
                self.seat_numbers.len(),
                self.group_size
            )));
        }
        let unique: BTreeSet<u32> = self.seat_numbers.iter().copied().collect();
        if unique.len() != self.seat_numbers.len() {
            return Err(CoreError::validation("seat numbers must not repeat"));
        }

        match &self.target {
            DraftTarget::Custom { name } => {
                if name.trim().is_empty() {
                    return Err(CoreError::validation("custom tour name must not be empty"));
                }
                if !self.seat_numbers.is_empty() {
                    return Err(CoreError::validation(
                        "custom tours do not take part in seat allocation",
                    ));
                }
                if self.price.is_none() {
                    return Err(CoreError::validation("custom tours need a manual price"));
                }
            }
            DraftTarget::Route { route_id, vehicle_type_id } => {
                if route_id.trim().is_empty() || vehicle_type_id.trim().is_empty() {
                    return Err(CoreError::validation("route and vehicle type are required"));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> BookingDraft {
        BookingDraft {
            target: DraftTarget::Route {
                route_id: "red-tour".to_string(),
                vehicle_type_id: "sprinter".to_string(),
            },
            tour_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            tour_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            customer_id: None,
            group_size: 2,
            passenger_names: vec!["Ayse".to_string(), "Mehmet".to_string()],
            pickup_location: "Hotel Lykia".to_string(),
            price: None,
            currency: Currency::Eur,
            seat_numbers: vec![1, 2],
        }
    }

    #[test]
    fn test_valid_draft() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn test_passenger_mismatch_rejected() {
        let mut d = draft();
        d.passenger_names.pop();
        assert!(matches!(d.validate(), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_empty_group_and_negative_price_rejected() {
        let mut d = draft();
        d.group_size = 0;
        d.passenger_names.clear();
        d.seat_numbers.clear();
        assert!(d.validate().is_err());

        let mut d = draft();
        d.price = Some(-100);
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_seat_list_checks() {
        let mut d = draft();
        d.seat_numbers = vec![3, 3];
        assert!(d.validate().is_err());

        let mut d = draft();
        d.seat_numbers = vec![1, 2, 3];
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_custom_tour_rules() {
        let mut d = draft();
        d.target = DraftTarget::Custom { name: "Private boat".to_string() };
        assert!(d.validate().is_err(), "seats on a custom tour");

        d.seat_numbers.clear();
        assert!(d.validate().is_err(), "custom tour without price");

        d.price = Some(50_000);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_draft_wire_format() {
        let json = r#"{
            "target": { "kind": "route", "route_id": "red-tour", "vehicle_type_id": "vito" },
            "tour_date": "2024-06-01",
            "tour_time": "09:00",
            "group_size": 1,
            "passenger_names": ["Ayse"],
            "pickup_location": "Hotel Lykia",
            "currency": "EUR"
        }"#;
        let d: BookingDraft = serde_json::from_str(json).unwrap();
        assert_eq!(d.tour_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert!(d.seat_numbers.is_empty());
        assert!(d.validate().is_ok());
    }
}
