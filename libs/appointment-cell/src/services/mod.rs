pub mod lifecycle;
pub mod memory;
pub mod notifier;
pub mod store;
pub mod sweeper;

pub use lifecycle::AppointmentLifecycleService;
pub use memory::InMemoryAppointmentStore;
pub use notifier::{AppointmentNotifier, Notice};
pub use store::{AppointmentStore, SupabaseAppointmentStore};
pub use sweeper::LifecycleSweeper;
