pub mod access;
pub mod calendar;
pub mod permissions;
pub mod provider;
pub mod storage;

pub use access::{AccessSettings, CalendarAccess, CalendarError, CalendarResult, Sentinel};
pub use calendar::{EventDetails, EventId, EventUpdate, HostZone, NewEvent};
pub use permissions::{Capability, GrantTable, PermissionBroker, RequestCode};
pub use provider::{CalendarProvider, ContentUri, ProviderError};
pub use storage::{CalendarStore, Config};
