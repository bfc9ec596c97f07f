//! The host calendar store contract.
//!
//! Every call is synchronous and runs to completion. Serialising access
//! across callers is the store's business.

pub mod content_uri;

use thiserror::Error;

use crate::calendar::{
    Calendar, CalendarFilter, EventDetails, EventUpdate, EventValues, NewCalendar, NewReminder,
};

pub use content_uri::{CALENDAR_AUTHORITY, ContentUri, Table};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Unsupported URI: {0}")]
    UnsupportedUri(String),
    #[error("Malformed URI: {0}")]
    MalformedUri(String),
    #[error("URI has no row id: {0}")]
    MissingId(String),
}

#[cfg_attr(test, mockall::automock)]
pub trait CalendarProvider {
    fn query_calendars(&self, filter: CalendarFilter) -> Result<Vec<Calendar>, ProviderError>;

    fn insert_calendar(&self, calendar: &NewCalendar) -> Result<ContentUri, ProviderError>;

    fn insert_event(&self, values: &EventValues) -> Result<ContentUri, ProviderError>;

    fn insert_reminder(&self, reminder: &NewReminder) -> Result<ContentUri, ProviderError>;

    /// Returns the number of rows changed.
    fn update_event(&self, uri: &ContentUri, update: &EventUpdate) -> Result<usize, ProviderError>;

    /// Returns the number of rows removed.
    fn delete(&self, uri: &ContentUri) -> Result<usize, ProviderError>;

    fn query_event(&self, uri: &ContentUri) -> Result<Option<EventDetails>, ProviderError>;
}

impl<P: CalendarProvider + ?Sized> CalendarProvider for &P {
    fn query_calendars(&self, filter: CalendarFilter) -> Result<Vec<Calendar>, ProviderError> {
        (**self).query_calendars(filter)
    }

    fn insert_calendar(&self, calendar: &NewCalendar) -> Result<ContentUri, ProviderError> {
        (**self).insert_calendar(calendar)
    }

    fn insert_event(&self, values: &EventValues) -> Result<ContentUri, ProviderError> {
        (**self).insert_event(values)
    }

    fn insert_reminder(&self, reminder: &NewReminder) -> Result<ContentUri, ProviderError> {
        (**self).insert_reminder(reminder)
    }

    fn update_event(&self, uri: &ContentUri, update: &EventUpdate) -> Result<usize, ProviderError> {
        (**self).update_event(uri, update)
    }

    fn delete(&self, uri: &ContentUri) -> Result<usize, ProviderError> {
        (**self).delete(uri)
    }

    fn query_event(&self, uri: &ContentUri) -> Result<Option<EventDetails>, ProviderError> {
        (**self).query_event(uri)
    }
}
