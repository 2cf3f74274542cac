pub mod allocator;
pub mod changes;
pub mod fulfillment;
pub mod ledger;
pub mod manager;
pub mod models;
pub mod registry;

pub use allocator::{OccupancySnapshot, SeatAllocator};
pub use changes::RosterChanges;
pub use fulfillment::VoucherBook;
pub use ledger::InMemorySeatLedger;
pub use manager::BookingLifecycle;
pub use models::{BookingDraft, DraftTarget, PassengerDetail, TourBooking, TourTarget};
pub use registry::{ScheduledTour, ScheduledTourRegistry};
