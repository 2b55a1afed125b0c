pub mod error;
pub mod time;

pub use time::{SweepWindow, TimeWindow};
