pub mod event;
pub mod calendar_type;
pub mod date_time;

pub use event::{
    DEFAULT_EVENT_COLOR, EventDetails, EventId, EventUpdate, EventValues, NewEvent, NewReminder,
    ReminderId, ReminderMethod,
};
pub use calendar_type::{Calendar, CalendarFilter, CalendarId, NewCalendar};
pub use date_time::{DateTimeError, HostZone};
