pub mod availability;
pub mod slots;

pub use availability::AvailabilityService;
pub use slots::{generate_slots, is_bookable, reconcile_slots, SlotIter};
