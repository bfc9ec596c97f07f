use std::fmt;
use std::str::FromStr;

use super::ProviderError;

pub const SCHEME_CONTENT: &str = "content";
pub const CALENDAR_AUTHORITY: &str = "com.android.calendar";

/// Tables exposed by the calendar store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Calendars,
    Events,
    Reminders,
}

impl Table {
    pub fn path(self) -> &'static str {
        match self {
            Table::Calendars => "calendars",
            Table::Events => "events",
            Table::Reminders => "reminders",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "calendars" => Some(Table::Calendars),
            "events" => Some(Table::Events),
            "reminders" => Some(Table::Reminders),
            _ => None,
        }
    }
}

/// Address of a table or row: `content://<authority>/<segment>/...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentUri {
    authority: String,
    segments: Vec<String>,
}

impl ContentUri {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            segments: Vec::new(),
        }
    }

    /// `content://com.android.calendar/<table>`
    pub fn for_table(table: Table) -> Self {
        Self::new(CALENDAR_AUTHORITY).with_appended_path(table.path())
    }

    /// `content://com.android.calendar/<table>/<id>`
    pub fn for_row(table: Table, id: i64) -> Self {
        Self::for_table(table).with_appended_id(id)
    }

    pub fn with_appended_path(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn with_appended_id(self, id: i64) -> Self {
        self.with_appended_path(id.to_string())
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path_segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last_path_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn table(&self) -> Option<Table> {
        self.segments.first().and_then(|s| Table::from_path(s))
    }

    /// Row id parsed from the last path segment.
    pub fn id(&self) -> Result<i64, ProviderError> {
        self.last_path_segment()
            .and_then(|segment| segment.parse::<i64>().ok())
            .ok_or_else(|| ProviderError::MissingId(self.to_string()))
    }
}

impl fmt::Display for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", SCHEME_CONTENT, self.authority)?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for ContentUri {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(SCHEME_CONTENT)
            .and_then(|rest| rest.strip_prefix("://"))
            .ok_or_else(|| ProviderError::MalformedUri(s.to_string()))?;

        let mut parts = rest.split('/');
        let authority = parts
            .next()
            .filter(|authority| !authority.is_empty())
            .ok_or_else(|| ProviderError::MalformedUri(s.to_string()))?;

        Ok(Self {
            authority: authority.to_string(),
            segments: parts.filter(|p| !p.is_empty()).map(String::from).collect(),
        })
    }
}
