pub mod analysis;
pub mod sweeper;
pub mod uploads;
