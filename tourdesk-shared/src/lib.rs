pub mod models;
pub mod pii;
pub mod time;

pub use models::events::{BookingEvent, BookingNotice, DriverAssignmentRequest, OccupancyChanged, PassengerNotice};
pub use models::status::{BookingStatus, PaymentStatus};
pub use models::money::{Currency, Money};
pub use pii::Masked;
