use serde::{Deserialize, Serialize};
use std::fmt;

/// Account type of calendars that exist only on this device.
pub const ACCOUNT_TYPE_LOCAL: &str = "LOCAL";
pub const LOCAL_ACCOUNT_NAME: &str = "local_calendar";
pub const LOCAL_DISPLAY_NAME: &str = "Local Calendar";
pub const LOCAL_CALENDAR_COLOR: u32 = 0xFF00_00FF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarId(pub i64);

impl fmt::Display for CalendarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Projection returned by calendar queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: CalendarId,
    pub account_name: String,
    pub visible: bool,
    pub is_primary: bool,
}

/// Row filters the store understands for the calendars table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarFilter {
    VisiblePrimary,
    Visible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCalendar {
    pub account_name: String,
    pub account_type: String,
    pub name: String,
    pub display_name: String,
    pub color: u32,
    pub time_zone: String,
    pub visible: bool,
    pub is_primary: bool,
    pub sync_events: bool,
}

impl NewCalendar {
    /// The synthetic on-device calendar created when no visible one exists.
    pub fn local(time_zone: impl Into<String>) -> Self {
        Self {
            account_name: LOCAL_ACCOUNT_NAME.to_string(),
            account_type: ACCOUNT_TYPE_LOCAL.to_string(),
            name: LOCAL_DISPLAY_NAME.to_string(),
            display_name: LOCAL_DISPLAY_NAME.to_string(),
            color: LOCAL_CALENDAR_COLOR,
            time_zone: time_zone.into(),
            visible: true,
            is_primary: true,
            sync_events: true,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        self.name = display_name.clone();
        self.display_name = display_name;
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_calendar_is_visible_primary_and_syncing() {
        let calendar = NewCalendar::local("Europe/Berlin");

        assert!(calendar.visible);
        assert!(calendar.is_primary);
        assert!(calendar.sync_events);
        assert_eq!(calendar.account_type, ACCOUNT_TYPE_LOCAL);
        assert_eq!(calendar.time_zone, "Europe/Berlin");
    }

    #[test]
    fn display_name_override_renames_both_names() {
        let calendar = NewCalendar::local("UTC").with_display_name("Pantry");

        assert_eq!(calendar.name, "Pantry");
        assert_eq!(calendar.display_name, "Pantry");
        assert_eq!(calendar.account_name, LOCAL_ACCOUNT_NAME);
    }
}
