use serde::{Deserialize, Serialize};
use std::fmt;

use super::calendar_type::CalendarId;

/// ARGB colour used for events inserted through the facade.
pub const DEFAULT_EVENT_COLOR: u32 = 0xFF00_00FF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied fields of a new event. Times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub start_millis: i64,
    pub end_millis: i64,
    pub time_zone: String,
}

impl NewEvent {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        start_millis: i64,
        end_millis: i64,
        time_zone: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            start_millis,
            end_millis,
            time_zone: time_zone.into(),
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_millis - self.start_millis) / 60_000
    }
}

/// The full row handed to the store on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct EventValues {
    pub calendar_id: CalendarId,
    pub event: NewEvent,
    pub color: u32,
    pub has_alarm: bool,
}

/// Fields replaced by an update. Time zone and everything else stay untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct EventUpdate {
    pub title: String,
    pub description: String,
    pub start_millis: i64,
    pub end_millis: i64,
}

impl EventUpdate {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        start_millis: i64,
        end_millis: i64,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            start_millis,
            end_millis,
        }
    }
}

/// Projection returned by a detail lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: String,
    pub description: String,
    #[serde(rename = "dtstart")]
    pub start_millis: i64,
    #[serde(rename = "dtend")]
    pub end_millis: i64,
    #[serde(rename = "eventTimezone")]
    pub time_zone: String,
}

impl EventDetails {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_millis - self.start_millis) / 60_000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderMethod {
    Default,
    Alert,
    Email,
    Sms,
}

impl ReminderMethod {
    /// Integer code stored in the reminders table.
    pub fn code(self) -> i64 {
        match self {
            ReminderMethod::Default => 0,
            ReminderMethod::Alert => 1,
            ReminderMethod::Email => 2,
            ReminderMethod::Sms => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ReminderMethod::Default),
            1 => Some(ReminderMethod::Alert),
            2 => Some(ReminderMethod::Email),
            3 => Some(ReminderMethod::Sms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReminder {
    pub event_id: EventId,
    pub minutes_before: u32,
    pub method: ReminderMethod,
}

impl NewReminder {
    pub fn alert(event_id: EventId, minutes_before: u32) -> Self {
        Self {
            event_id,
            minutes_before,
            method: ReminderMethod::Alert,
        }
    }
}
