pub mod calendar_store;
pub mod config;

pub use calendar_store::CalendarStore;
pub use config::Config;
