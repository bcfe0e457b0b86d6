//! Typed rows of the calendar schema.

use chrono::{NaiveDateTime, NaiveTime, SubsecRound};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, Result};

/// Storage format for every timestamp column. Lexical order is chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Id of the virtual room created together with the schema.
pub const ONLINE_ROOM_ID: i64 = 1;
pub const ONLINE_ROOM_NAME: &str = "Online Meeting";
pub const ONLINE_ROOM_CAPACITY: u32 = 999;

/// Drop sub-second precision, which the storage format cannot hold.
pub fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.trunc_subsecs(0)
}

/// Format a timestamp the way it is stored.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp. Accepts the storage format, a space separator,
/// fractional seconds, or a bare date (midnight).
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim().trim_end_matches('Z');
    let parsed = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| d.and_time(NaiveTime::MIN))
        });
    parsed.map_err(|source| CalendarError::InvalidTimestamp {
        value: value.to_string(),
        source,
    })
}

/// Read a text timestamp column, surfacing bad values as a conversion failure.
pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl User {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRoom {
    pub id: i64,
    pub name: String,
    pub capacity: u32,
    pub is_virtual: bool,
}

impl MeetingRoom {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            capacity: row.get(2)?,
            is_virtual: row.get(3)?,
        })
    }
}

/// A user attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_organizer: bool,
}

impl Attendee {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            is_organizer: row.get(3)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub meeting_room_id: Option<i64>,
}

/// An event joined with its room name and attendee list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    #[serde(flatten)]
    pub event: Event,
    pub meeting_room_name: Option<String>,
    pub attendees: Vec<Attendee>,
}

impl EventDetails {
    pub fn organizer(&self) -> Option<&Attendee> {
        self.attendees.iter().find(|a| a.is_organizer)
    }
}

/// Input for [`crate::store::CalendarStore::create_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub organizer_id: i64,
    pub attendee_ids: Vec<i64>,
    pub meeting_room_id: Option<i64>,
}

/// Partial update for [`crate::store::CalendarStore::update_event`]. `None` keeps
/// the stored value; the nested options clear a nullable column with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub meeting_room_id: Option<Option<i64>>,
    /// Replaces every non-organizer attendee.
    pub attendees: Option<Vec<i64>>,
}

/// A free interval returned by the slot finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

impl TimeSlot {
    /// Half-open overlap test.
    pub fn overlaps(&self, start: &NaiveDateTime, end: &NaiveDateTime) -> bool {
        self.start_time < *end && *start < self.end_time
    }
}
