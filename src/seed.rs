//! Fixed sample data and the transactional loader that writes it.
//!
//! Rows are linked through `last_insert_rowid()`: users and rooms are inserted
//! first and their ids remembered by email / room name, then each event is
//! inserted followed by its organizer and attendee rows. The whole load is one
//! transaction; any failure leaves the database untouched.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CalendarError, Result};
use crate::models::{format_timestamp, truncate_to_seconds, ONLINE_ROOM_ID, ONLINE_ROOM_NAME};
use crate::schema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRoom {
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// A name from `rooms`, or the online room.
    pub room: String,
    pub organizer: String,
    #[serde(default)]
    pub attendees: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedData {
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub rooms: Vec<SeedRoom>,
    #[serde(default)]
    pub events: Vec<SeedEvent>,
}

/// Row counts written by [`seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users: usize,
    pub rooms: usize,
    pub events: usize,
    pub user_events: usize,
}

fn user(name: &str, email: &str) -> SeedUser {
    SeedUser {
        name: name.to_string(),
        email: email.to_string(),
    }
}

fn room(name: &str, capacity: u32) -> SeedRoom {
    SeedRoom {
        name: name.to_string(),
        capacity,
        is_virtual: false,
    }
}

fn event(
    title: &str,
    description: &str,
    start: &str,
    end: &str,
    room: &str,
    organizer: &str,
    attendees: &[&str],
) -> SeedEvent {
    SeedEvent {
        title: title.to_string(),
        description: Some(description.to_string()),
        start_time: fixed(start),
        end_time: fixed(end),
        room: room.to_string(),
        organizer: organizer.to_string(),
        attendees: attendees.iter().map(|a| a.to_string()).collect(),
    }
}

fn fixed(value: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").unwrap_or_default()
}

impl SeedData {
    /// The built-in sample calendar.
    pub fn builtin() -> Self {
        Self {
            users: vec![
                user("John Doe", "john@example.com"),
                user("Jane Smith", "jane@example.com"),
                user("Bob Johnson", "bob@example.com"),
                user("Alice Williams", "alice@example.com"),
                user("Carlos Garcia", "carlos@example.com"),
            ],
            rooms: vec![
                room("Conference Room A", 10),
                room("Conference Room B", 6),
                room("Small Meeting Room", 4),
            ],
            events: vec![
                event(
                    "Project Kickoff",
                    "Initial meeting to discuss project goals",
                    "2025-06-02T10:00:00",
                    "2025-06-02T11:00:00",
                    "Conference Room A",
                    "john@example.com",
                    &["jane@example.com", "bob@example.com"],
                ),
                event(
                    "Design Review",
                    "Walk through the first UI mockups",
                    "2025-06-02T14:00:00",
                    "2025-06-02T15:30:00",
                    "Conference Room B",
                    "jane@example.com",
                    &["alice@example.com", "john@example.com"],
                ),
                event(
                    "Weekly Standup",
                    "Status updates from every team member",
                    "2025-06-03T09:00:00",
                    "2025-06-03T09:30:00",
                    ONLINE_ROOM_NAME,
                    "bob@example.com",
                    &[
                        "john@example.com",
                        "jane@example.com",
                        "alice@example.com",
                        "carlos@example.com",
                    ],
                ),
                event(
                    "One-on-One",
                    "Quarterly check-in",
                    "2025-06-03T13:00:00",
                    "2025-06-03T13:45:00",
                    "Small Meeting Room",
                    "alice@example.com",
                    &["carlos@example.com"],
                ),
                event(
                    "Budget Planning",
                    "Plan the budget for the next quarter",
                    "2025-06-04T11:00:00",
                    "2025-06-04T12:30:00",
                    "Conference Room A",
                    "carlos@example.com",
                    &["john@example.com", "bob@example.com"],
                ),
                event(
                    "Focus Time",
                    "Blocked time for deep work",
                    "2025-06-05T15:00:00",
                    "2025-06-05T17:00:00",
                    "Small Meeting Room",
                    "john@example.com",
                    &[],
                ),
            ],
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Check the data-model invariants without touching a database.
    pub fn validate(&self) -> Result<()> {
        let mut emails = HashSet::new();
        for u in &self.users {
            if !emails.insert(u.email.as_str()) {
                return Err(CalendarError::Seed(format!("duplicate user email {}", u.email)));
            }
        }

        let mut rooms = HashSet::from([ONLINE_ROOM_NAME]);
        for r in &self.rooms {
            if !rooms.insert(r.name.as_str()) {
                return Err(CalendarError::Seed(format!("duplicate room name {}", r.name)));
            }
        }

        for ev in &self.events {
            if truncate_to_seconds(ev.start_time) >= truncate_to_seconds(ev.end_time) {
                return Err(CalendarError::Seed(format!(
                    "event {:?} starts at {} but ends at {}",
                    ev.title, ev.start_time, ev.end_time
                )));
            }
            if !rooms.contains(ev.room.as_str()) {
                return Err(CalendarError::Seed(format!(
                    "event {:?} references unknown room {:?}",
                    ev.title, ev.room
                )));
            }
            for email in std::iter::once(&ev.organizer).chain(&ev.attendees) {
                if !emails.contains(email.as_str()) {
                    return Err(CalendarError::Seed(format!(
                        "event {:?} references unknown user {}",
                        ev.title, email
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Validate and insert `data` in a single transaction.
///
/// Missing tables and the online room are created inside the same
/// transaction. Seeding twice fails on the unique email constraint and leaves
/// the first load as it was.
pub fn seed(conn: &mut Connection, data: &SeedData) -> Result<SeedReport> {
    data.validate()?;

    let tx = conn.transaction()?;
    schema::initialize(&tx)?;
    let mut report = SeedReport::default();

    let mut user_ids: HashMap<&str, i64> = HashMap::new();
    for u in &data.users {
        tx.execute(
            "INSERT INTO users (name, email) VALUES (?1, ?2)",
            params![u.name, u.email],
        )?;
        user_ids.insert(u.email.as_str(), tx.last_insert_rowid());
        report.users += 1;
    }

    let mut room_ids: HashMap<&str, i64> = HashMap::from([(ONLINE_ROOM_NAME, ONLINE_ROOM_ID)]);
    for r in &data.rooms {
        tx.execute(
            "INSERT INTO meeting_rooms (name, capacity, is_virtual) VALUES (?1, ?2, ?3)",
            params![r.name, r.capacity, r.is_virtual],
        )?;
        room_ids.insert(r.name.as_str(), tx.last_insert_rowid());
        report.rooms += 1;
    }

    for ev in &data.events {
        let room_id = lookup(&room_ids, &ev.room)?;
        tx.execute(
            "INSERT INTO events (title, description, start_time, end_time, meeting_room_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ev.title,
                ev.description,
                format_timestamp(&ev.start_time),
                format_timestamp(&ev.end_time),
                room_id,
            ],
        )?;
        let event_id = tx.last_insert_rowid();
        report.events += 1;

        let organizer_id = lookup(&user_ids, &ev.organizer)?;
        tx.execute(
            "INSERT INTO user_events (user_id, event_id, is_organizer) VALUES (?1, ?2, 1)",
            params![organizer_id, event_id],
        )?;
        report.user_events += 1;

        let mut linked = HashSet::from([organizer_id]);
        for email in &ev.attendees {
            let user_id = lookup(&user_ids, email)?;
            if !linked.insert(user_id) {
                continue;
            }
            tx.execute(
                "INSERT INTO user_events (user_id, event_id, is_organizer) VALUES (?1, ?2, 0)",
                params![user_id, event_id],
            )?;
            report.user_events += 1;
        }
        debug!(event_id, title = %ev.title, "seeded event");
    }

    tx.commit()?;
    info!(
        users = report.users,
        rooms = report.rooms,
        events = report.events,
        user_events = report.user_events,
        "seed data committed"
    );
    Ok(report)
}

fn lookup(ids: &HashMap<&str, i64>, key: &str) -> Result<i64> {
    ids.get(key)
        .copied()
        .ok_or_else(|| CalendarError::Seed(format!("unresolved reference {:?}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_data_is_valid() {
        let data = SeedData::builtin();
        data.validate().unwrap();
        assert_eq!(data.users.len(), 5);
        assert_eq!(data.rooms.len(), 3);
        assert!(data.events.iter().any(|e| e.room == ONLINE_ROOM_NAME));
        assert!(data.events.iter().all(|e| e.start_time < e.end_time));
    }

    #[test]
    fn builtin_timestamps_parse() {
        for ev in SeedData::builtin().events {
            assert_ne!(ev.start_time, NaiveDateTime::default(), "{}", ev.title);
            assert!(format_timestamp(&ev.start_time).starts_with("2025-06-0"));
            assert!(format_timestamp(&ev.end_time).starts_with("2025-06-0"));
        }
    }

    #[test]
    fn rejects_range_that_collapses_at_second_precision() {
        let mut data = SeedData::builtin();
        let start = data.events[0].start_time;
        data.events[0].start_time = start + chrono::Duration::milliseconds(100);
        data.events[0].end_time = start + chrono::Duration::milliseconds(900);
        assert!(matches!(data.validate(), Err(CalendarError::Seed(_))));
    }

    #[test]
    fn rejects_unknown_attendee() {
        let mut data = SeedData::builtin();
        data.events[0].attendees.push("nobody@example.com".to_string());
        let err = data.validate().unwrap_err();
        assert!(err.to_string().contains("nobody@example.com"));
    }

    #[test]
    fn rejects_zero_length_event() {
        let mut data = SeedData::builtin();
        data.events[1].end_time = data.events[1].start_time;
        assert!(matches!(data.validate(), Err(CalendarError::Seed(_))));
    }

    #[test]
    fn rejects_unknown_room() {
        let mut data = SeedData::builtin();
        data.events[2].room = "Broom Closet".to_string();
        assert!(matches!(data.validate(), Err(CalendarError::Seed(_))));
    }

    #[test]
    fn parses_json_shape() {
        let json = r#"{
            "users": [{"name": "Ann", "email": "ann@example.com"}],
            "events": [{
                "title": "Sync",
                "start_time": "2025-01-01T09:00:00",
                "end_time": "2025-01-01T09:15:00",
                "room": "Online Meeting",
                "organizer": "ann@example.com"
            }]
        }"#;
        let data: SeedData = serde_json::from_str(json).unwrap();
        data.validate().unwrap();
        assert!(data.rooms.is_empty());
        assert_eq!(data.events[0].description, None);
        assert!(data.events[0].attendees.is_empty());
    }
}
