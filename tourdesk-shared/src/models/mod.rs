pub mod events;
pub mod money;
pub mod status;
