//! Calendar access facade: permission checks, account resolution,
//! event and reminder CRUD on top of a [`CalendarProvider`].
//!
//! Each call is independent. Failures are logged where they happen and
//! returned as [`CalendarError`]; [`Sentinel`] maps them back to the
//! `-1` / `false` / absent conventions for callers that want those.

use thiserror::Error;

use crate::calendar::{
    CalendarFilter, CalendarId, DEFAULT_EVENT_COLOR, EventDetails, EventId, EventUpdate,
    EventValues, NewCalendar, NewEvent, NewReminder, ReminderId,
};
use crate::permissions::{
    CALENDAR_CAPABILITIES, Capability, GrantDialog, PermissionBroker, PermissionError,
    PermissionGate, PermissionRequest, RequestCode,
};
use crate::provider::{CalendarProvider, ContentUri, ProviderError, Table};

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Permission denied: {0} is not granted")]
    PermissionDenied(Capability),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Calendar store error: {0}")]
    Store(#[from] ProviderError),
}

pub type CalendarResult<T> = Result<T, CalendarError>;

/// Legacy failure values: `-1` for ids, `false` for actions, `None` for lookups.
pub trait Sentinel {
    type Legacy;

    fn into_sentinel(self) -> Self::Legacy;
}

impl Sentinel for CalendarResult<CalendarId> {
    type Legacy = i64;

    fn into_sentinel(self) -> i64 {
        self.map(|id| id.0).unwrap_or(-1)
    }
}

impl Sentinel for CalendarResult<EventId> {
    type Legacy = i64;

    fn into_sentinel(self) -> i64 {
        self.map(|id| id.0).unwrap_or(-1)
    }
}

impl Sentinel for CalendarResult<ReminderId> {
    type Legacy = i64;

    fn into_sentinel(self) -> i64 {
        self.map(|id| id.0).unwrap_or(-1)
    }
}

impl Sentinel for CalendarResult<()> {
    type Legacy = bool;

    fn into_sentinel(self) -> bool {
        self.is_ok()
    }
}

impl Sentinel for CalendarResult<EventDetails> {
    type Legacy = Option<EventDetails>;

    fn into_sentinel(self) -> Option<EventDetails> {
        self.ok()
    }
}

/// Fixed values written by the facade.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessSettings {
    pub default_time_zone: String,
    pub local_calendar: NewCalendar,
    pub event_color: u32,
}

impl AccessSettings {
    pub fn for_zone(time_zone: impl Into<String>) -> Self {
        let time_zone = time_zone.into();
        Self {
            local_calendar: NewCalendar::local(time_zone.clone()),
            default_time_zone: time_zone,
            event_color: DEFAULT_EVENT_COLOR,
        }
    }
}

pub struct CalendarAccess<P, G> {
    provider: P,
    gate: G,
    settings: AccessSettings,
}

impl<P: CalendarProvider, G: PermissionGate> CalendarAccess<P, G> {
    pub fn new(provider: P, gate: G, settings: AccessSettings) -> Self {
        Self {
            provider,
            gate,
            settings,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Both read and write capabilities are granted.
    pub fn has_calendar_permissions(&self) -> bool {
        self.gate.all_granted(&CALENDAR_CAPABILITIES)
    }

    /// Starts the host grant flow unless both capabilities are already granted.
    /// `None` means there was nothing to ask for.
    pub fn request_calendar_permissions<D: GrantDialog>(
        &self,
        broker: &PermissionBroker<D>,
        code: RequestCode,
    ) -> Result<Option<PermissionRequest>, PermissionError> {
        if self.has_calendar_permissions() {
            return Ok(None);
        }
        broker.request(code, &CALENDAR_CAPABILITIES).map(Some)
    }

    /// Visible primary calendar, else any visible calendar, else a new local one.
    pub fn get_or_create_calendar_account(&self) -> CalendarResult<CalendarId> {
        self.require(Capability::ReadCalendar)?;

        for filter in [CalendarFilter::VisiblePrimary, CalendarFilter::Visible] {
            let calendars = self
                .provider
                .query_calendars(filter)
                .map_err(|e| store_failure("query calendars", e))?;

            if let Some(calendar) = calendars.first() {
                tracing::debug!("Using calendar {} ({:?})", calendar.id, filter);
                return Ok(calendar.id);
            }
        }

        self.create_local_calendar()
    }

    fn create_local_calendar(&self) -> CalendarResult<CalendarId> {
        self.require(Capability::WriteCalendar)?;

        let id = self
            .provider
            .insert_calendar(&self.settings.local_calendar)
            .and_then(|uri| uri.id())
            .map_err(|e| store_failure("create local calendar", e))?;

        tracing::info!("Created local calendar {}", id);
        Ok(CalendarId(id))
    }

    pub fn insert_event(&self, calendar_id: CalendarId, event: NewEvent) -> CalendarResult<EventId> {
        self.require(Capability::WriteCalendar)?;

        let values = EventValues {
            calendar_id,
            event,
            color: self.settings.event_color,
            has_alarm: true,
        };

        let id = self
            .provider
            .insert_event(&values)
            .and_then(|uri| uri.id())
            .map_err(|e| store_failure("insert event", e))?;

        tracing::info!("Inserted event {} '{}' into calendar {}", id, values.event.title, calendar_id);
        Ok(EventId(id))
    }

    pub fn add_reminder(&self, event_id: EventId, minutes_before: u32) -> CalendarResult<ReminderId> {
        self.require(Capability::WriteCalendar)?;

        let id = self
            .provider
            .insert_reminder(&NewReminder::alert(event_id, minutes_before))
            .and_then(|uri| uri.id())
            .map_err(|e| store_failure("add reminder", e))?;

        tracing::debug!("Added reminder {} ({} min) to event {}", id, minutes_before, event_id);
        Ok(ReminderId(id))
    }

    /// Adds one alert per offset, in order, stopping at the first failure.
    pub fn add_reminders(&self, event_id: EventId, offsets: &[u32]) -> CalendarResult<Vec<ReminderId>> {
        offsets
            .iter()
            .map(|minutes| self.add_reminder(event_id, *minutes))
            .collect()
    }

    /// Creates an event in the host's default zone with one reminder.
    pub fn add_event_with_reminder(
        &self,
        title: &str,
        description: &str,
        start_millis: i64,
        end_millis: i64,
        reminder_minutes_before: u32,
    ) -> CalendarResult<EventId> {
        let time_zone = self.settings.default_time_zone.clone();
        self.add_event_with_reminder_in_zone(
            title,
            description,
            start_millis,
            end_millis,
            reminder_minutes_before,
            &time_zone,
        )
    }

    /// Permission check, account resolution, event insert, reminder insert.
    /// A failed reminder does not fail the call: the event id is still returned.
    pub fn add_event_with_reminder_in_zone(
        &self,
        title: &str,
        description: &str,
        start_millis: i64,
        end_millis: i64,
        reminder_minutes_before: u32,
        time_zone: &str,
    ) -> CalendarResult<EventId> {
        if let Some(missing) = CALENDAR_CAPABILITIES
            .into_iter()
            .find(|c| !self.gate.is_granted(*c))
        {
            tracing::warn!("Cannot create event '{}': {} not granted", title, missing);
            return Err(CalendarError::PermissionDenied(missing));
        }

        let calendar_id = self.get_or_create_calendar_account()?;
        let event = NewEvent::new(title, description, start_millis, end_millis, time_zone);
        let event_id = self.insert_event(calendar_id, event)?;

        if let Err(e) = self.add_reminder(event_id, reminder_minutes_before) {
            tracing::warn!("Event {} created without its reminder: {}", event_id, e);
        }

        Ok(event_id)
    }

    /// Succeeds whenever the store accepts the delete, even if no row matched.
    pub fn delete_event(&self, event_id: EventId) -> CalendarResult<()> {
        self.require(Capability::WriteCalendar)?;

        let uri = event_uri(event_id);
        let rows = self
            .provider
            .delete(&uri)
            .map_err(|e| store_failure("delete event", e))?;

        if rows == 0 {
            tracing::debug!("Delete of {} matched no rows", uri);
        } else {
            tracing::info!("Deleted event {}", event_id);
        }
        Ok(())
    }

    /// Replaces title, description, start and end.
    pub fn update_event(&self, event_id: EventId, update: &EventUpdate) -> CalendarResult<()> {
        self.require(Capability::WriteCalendar)?;

        let rows = self
            .provider
            .update_event(&event_uri(event_id), update)
            .map_err(|e| store_failure("update event", e))?;

        if rows == 0 {
            tracing::warn!("Update matched no event with id {}", event_id);
            return Err(CalendarError::NotFound(format!("event {}", event_id)));
        }

        tracing::info!("Updated event {} to '{}'", event_id, update.title);
        Ok(())
    }

    pub fn get_event_details(&self, event_id: EventId) -> CalendarResult<EventDetails> {
        self.require(Capability::ReadCalendar)?;

        self.provider
            .query_event(&event_uri(event_id))
            .map_err(|e| store_failure("query event", e))?
            .ok_or_else(|| CalendarError::NotFound(format!("event {}", event_id)))
    }

    fn require(&self, capability: Capability) -> CalendarResult<()> {
        if self.gate.is_granted(capability) {
            Ok(())
        } else {
            tracing::warn!("Calendar operation refused: {} not granted", capability);
            Err(CalendarError::PermissionDenied(capability))
        }
    }
}

fn event_uri(event_id: EventId) -> ContentUri {
    ContentUri::for_row(Table::Events, event_id.0)
}

fn store_failure(operation: &str, error: ProviderError) -> CalendarError {
    tracing::error!("Failed to {}: {}", operation, error);
    CalendarError::Store(error)
}
