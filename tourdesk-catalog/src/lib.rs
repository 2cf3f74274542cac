pub mod layout;
pub mod pricing;
pub mod route;
pub mod vehicle;

pub use layout::{AisleIndex, Layout, LayoutCell, SeatLayoutGenerator, SeatPosition};
pub use pricing::PricingEngine;
pub use route::{PriceBasis, Route, RouteCatalog};
pub use vehicle::{VehicleCatalog, VehicleType};
