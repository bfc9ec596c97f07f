use rusqlite::{Connection, Result as SqliteResult, params};
use std::path::Path;

use crate::calendar::{
    Calendar, CalendarFilter, CalendarId, EventDetails, EventId, EventUpdate, EventValues,
    NewCalendar, NewReminder, ReminderId, ReminderMethod,
};
use crate::provider::{CalendarProvider, ContentUri, ProviderError, Table};

/// A reminder row as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReminder {
    pub id: ReminderId,
    pub event_id: EventId,
    pub minutes: u32,
    pub method: Option<ReminderMethod>,
}

/// SQLite-backed calendar store laid out like the platform calendar provider.
pub struct CalendarStore {
    conn: Connection,
}

impl CalendarStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens (creating if needed) the database at `path` and its schema.
    pub fn open(path: &Path) -> Result<Self, ProviderError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let store = Self::new(Connection::open(path)?);
        store.initialize()?;
        tracing::debug!("Opened calendar store at {}", path.display());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, ProviderError> {
        let store = Self::new(Connection::open_in_memory()?);
        store.initialize()?;
        Ok(store)
    }

    pub fn initialize(&self) -> Result<(), ProviderError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS calendars (
                _id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_name TEXT NOT NULL,
                account_type TEXT NOT NULL,
                name TEXT,
                calendar_displayName TEXT,
                calendar_color INTEGER,
                calendar_timezone TEXT,
                visible INTEGER NOT NULL DEFAULT 1,
                isPrimary INTEGER NOT NULL DEFAULT 0,
                sync_events INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                _id INTEGER PRIMARY KEY AUTOINCREMENT,
                calendar_id INTEGER NOT NULL,
                title TEXT,
                description TEXT,
                dtstart INTEGER NOT NULL,
                dtend INTEGER,
                eventTimezone TEXT NOT NULL,
                eventColor INTEGER,
                hasAlarm INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        // No foreign key: the platform store accepts reminders for any event id.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS reminders (
                _id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL,
                minutes INTEGER NOT NULL,
                method INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        );
        result.unwrap_or(0) > 0
    }

    pub fn row_count(&self, table: Table) -> Result<usize, ProviderError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.path());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn reminders_for_event(&self, event_id: EventId) -> Result<Vec<StoredReminder>, ProviderError> {
        let mut stmt = self.conn.prepare(
            "SELECT _id, event_id, minutes, method FROM reminders WHERE event_id = ?1 ORDER BY _id",
        )?;
        let rows = stmt.query_map([event_id.0], |row| {
            Ok(StoredReminder {
                id: ReminderId(row.get(0)?),
                event_id: EventId(row.get(1)?),
                minutes: row.get(2)?,
                method: ReminderMethod::from_code(row.get(3)?),
            })
        })?;

        let mut reminders = Vec::new();
        for reminder in rows {
            reminders.push(reminder?);
        }
        Ok(reminders)
    }

    fn event_row_id(uri: &ContentUri) -> Result<i64, ProviderError> {
        match uri.table() {
            Some(Table::Events) if uri.path_segments().len() == 2 => uri.id(),
            _ => Err(ProviderError::UnsupportedUri(uri.to_string())),
        }
    }
}

impl CalendarProvider for CalendarStore {
    fn query_calendars(&self, filter: CalendarFilter) -> Result<Vec<Calendar>, ProviderError> {
        let selection = match filter {
            CalendarFilter::VisiblePrimary => "visible = 1 AND isPrimary = 1",
            CalendarFilter::Visible => "visible = 1",
        };
        let sql = format!(
            "SELECT _id, account_name, visible, isPrimary FROM calendars WHERE {} ORDER BY _id",
            selection
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(Calendar {
                id: CalendarId(row.get(0)?),
                account_name: row.get(1)?,
                visible: row.get(2)?,
                is_primary: row.get(3)?,
            })
        })?;

        let mut calendars = Vec::new();
        for calendar in rows {
            calendars.push(calendar?);
        }
        Ok(calendars)
    }

    fn insert_calendar(&self, calendar: &NewCalendar) -> Result<ContentUri, ProviderError> {
        self.conn.execute(
            "INSERT INTO calendars (account_name, account_type, name, calendar_displayName,
                calendar_color, calendar_timezone, visible, isPrimary, sync_events)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &calendar.account_name,
                &calendar.account_type,
                &calendar.name,
                &calendar.display_name,
                calendar.color,
                &calendar.time_zone,
                calendar.visible,
                calendar.is_primary,
                calendar.sync_events,
            ],
        )?;
        Ok(ContentUri::for_row(Table::Calendars, self.conn.last_insert_rowid()))
    }

    fn insert_event(&self, values: &EventValues) -> Result<ContentUri, ProviderError> {
        self.conn.execute(
            "INSERT INTO events (calendar_id, title, description, dtstart, dtend,
                eventTimezone, eventColor, hasAlarm)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                values.calendar_id.0,
                &values.event.title,
                &values.event.description,
                values.event.start_millis,
                values.event.end_millis,
                &values.event.time_zone,
                values.color,
                values.has_alarm,
            ],
        )?;
        Ok(ContentUri::for_row(Table::Events, self.conn.last_insert_rowid()))
    }

    fn insert_reminder(&self, reminder: &NewReminder) -> Result<ContentUri, ProviderError> {
        self.conn.execute(
            "INSERT INTO reminders (event_id, minutes, method) VALUES (?1, ?2, ?3)",
            params![reminder.event_id.0, reminder.minutes_before, reminder.method.code()],
        )?;
        Ok(ContentUri::for_row(Table::Reminders, self.conn.last_insert_rowid()))
    }

    fn update_event(&self, uri: &ContentUri, update: &EventUpdate) -> Result<usize, ProviderError> {
        let id = Self::event_row_id(uri)?;
        let rows = self.conn.execute(
            "UPDATE events SET title = ?1, description = ?2, dtstart = ?3, dtend = ?4 WHERE _id = ?5",
            params![
                &update.title,
                &update.description,
                update.start_millis,
                update.end_millis,
                id,
            ],
        )?;
        Ok(rows)
    }

    fn delete(&self, uri: &ContentUri) -> Result<usize, ProviderError> {
        match uri.table() {
            Some(Table::Events) => {
                let id = Self::event_row_id(uri)?;
                let tx = self.conn.unchecked_transaction()?;
                tx.execute("DELETE FROM reminders WHERE event_id = ?1", [id])?;
                let rows = tx.execute("DELETE FROM events WHERE _id = ?1", [id])?;
                tx.commit()?;
                Ok(rows)
            }
            Some(Table::Reminders) => {
                let id = uri.id()?;
                Ok(self.conn.execute("DELETE FROM reminders WHERE _id = ?1", [id])?)
            }
            _ => Err(ProviderError::UnsupportedUri(uri.to_string())),
        }
    }

    fn query_event(&self, uri: &ContentUri) -> Result<Option<EventDetails>, ProviderError> {
        let id = Self::event_row_id(uri)?;
        let mut stmt = self.conn.prepare(
            "SELECT title, description, dtstart, dtend, eventTimezone FROM events WHERE _id = ?1",
        )?;
        let mut rows = stmt.query([id])?;

        if let Some(row) = rows.next()? {
            let title: Option<String> = row.get(0)?;
            let description: Option<String> = row.get(1)?;
            let end: Option<i64> = row.get(3)?;
            Ok(Some(EventDetails {
                title: title.unwrap_or_default(),
                description: description.unwrap_or_default(),
                start_millis: row.get(2)?,
                end_millis: end.unwrap_or_default(),
                time_zone: row.get(4)?,
            }))
        } else {
            Ok(None)
        }
    }
}
