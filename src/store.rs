//! Calendar operations over a single SQLite connection.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use crate::error::{CalendarError, Result};
use crate::models::{
    format_timestamp, timestamp_column, truncate_to_seconds, Attendee, Event, EventDetails,
    EventUpdate, MeetingRoom, NewEvent, TimeSlot, User,
};
use crate::schema;

const EVENT_COLUMNS: &str = "e.id, e.title, e.description, e.start_time, e.end_time, \
     e.meeting_room_id, m.name AS meeting_room_name";

pub struct CalendarStore {
    conn: Connection,
}

impl CalendarStore {
    /// Open (or create) a database file and initialize the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening calendar database");
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    // users

    /// Insert a user. When the email is already taken the existing id is returned.
    pub fn add_user(&self, name: &str, email: &str) -> Result<i64> {
        match self
            .conn
            .execute("INSERT INTO users (name, email) VALUES (?1, ?2)", params![name, email])
        {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                debug!(email, "user already exists");
                let id = self
                    .conn
                    .query_row("SELECT id FROM users WHERE email = ?1", [email], |row| row.get(0))?;
                Ok(id)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, email FROM users WHERE email = ?1",
                [email],
                User::from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Users whose name contains `fragment` (case-insensitive for ASCII).
    pub fn users_by_name(&self, fragment: &str) -> Result<Vec<User>> {
        let pattern = format!("%{}%", fragment);
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, email FROM users WHERE name LIKE ?1 ORDER BY id")?;
        let users = stmt
            .query_map([pattern], User::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn all_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare("SELECT id, name, email FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], User::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    // meeting rooms

    pub fn add_meeting_room(&self, name: &str, capacity: u32, is_virtual: bool) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO meeting_rooms (name, capacity, is_virtual) VALUES (?1, ?2, ?3)",
            params![name, capacity, is_virtual],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn all_meeting_rooms(&self) -> Result<Vec<MeetingRoom>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, capacity, is_virtual FROM meeting_rooms ORDER BY id")?;
        let rooms = stmt
            .query_map([], MeetingRoom::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rooms)
    }

    /// Rooms with at least `min_capacity` seats that are virtual or not booked
    /// during `[start, end)`.
    pub fn available_meeting_rooms(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        min_capacity: u32,
    ) -> Result<Vec<MeetingRoom>> {
        let (start, end) = stored_range(start, end)?;
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.name, m.capacity, m.is_virtual
             FROM meeting_rooms m
             WHERE m.capacity >= ?1
               AND (m.is_virtual = 1 OR m.id NOT IN (
                   SELECT meeting_room_id FROM events
                   WHERE meeting_room_id IS NOT NULL
                     AND start_time < ?3 AND end_time > ?2))
             ORDER BY m.id",
        )?;
        let rooms = stmt
            .query_map(
                params![min_capacity, format_timestamp(&start), format_timestamp(&end)],
                MeetingRoom::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rooms)
    }

    // events

    /// Insert an event with its organizer and attendees in one transaction.
    /// Attendees repeating the organizer or each other are stored once.
    pub fn create_event(&mut self, event: &NewEvent) -> Result<i64> {
        let (start, end) = stored_range(event.start_time, event.end_time)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO events (title, description, start_time, end_time, meeting_room_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.title,
                event.description,
                format_timestamp(&start),
                format_timestamp(&end),
                event.meeting_room_id,
            ],
        )?;
        let event_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO user_events (user_id, event_id, is_organizer) VALUES (?1, ?2, 1)",
            params![event.organizer_id, event_id],
        )?;
        let mut seen = BTreeSet::from([event.organizer_id]);
        for &user_id in &event.attendee_ids {
            if !seen.insert(user_id) {
                continue;
            }
            tx.execute(
                "INSERT INTO user_events (user_id, event_id, is_organizer) VALUES (?1, ?2, 0)",
                params![user_id, event_id],
            )?;
        }
        tx.commit()?;

        info!(event_id, title = %event.title, attendees = seen.len(), "event created");
        Ok(event_id)
    }

    /// Attach `user_id` to an event as a regular attendee. Returns false when the
    /// user was already linked, organizer included.
    pub fn add_attendee(&self, event_id: i64, user_id: i64) -> Result<bool> {
        if !self.exists("SELECT 1 FROM events WHERE id = ?1", event_id)? {
            return Err(CalendarError::EventNotFound(event_id));
        }
        if !self.exists("SELECT 1 FROM users WHERE id = ?1", user_id)? {
            return Err(CalendarError::UserNotFound(user_id));
        }
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO user_events (user_id, event_id, is_organizer) VALUES (?1, ?2, 0)",
            params![user_id, event_id],
        )?;
        debug!(event_id, user_id, inserted = inserted == 1, "attendee added");
        Ok(inserted == 1)
    }

    /// Patch an event in one transaction. Returns false when no such event exists.
    ///
    /// The merged start/end pair is validated again. When `attendees` is set,
    /// every non-organizer link is replaced by that list; the organizer stays.
    pub fn update_event(&mut self, event_id: i64, update: &EventUpdate) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let current = tx
            .query_row(
                "SELECT id, title, description, start_time, end_time, meeting_room_id, NULL
                 FROM events WHERE id = ?1",
                [event_id],
                event_row,
            )
            .optional()?;
        let Some((current, _)) = current else {
            return Ok(false);
        };

        let (start, end) = stored_range(
            update.start_time.unwrap_or(current.start_time),
            update.end_time.unwrap_or(current.end_time),
        )?;
        let title = update.title.as_ref().unwrap_or(&current.title);
        let description = match &update.description {
            Some(d) => d.as_ref(),
            None => current.description.as_ref(),
        };
        let room = update.meeting_room_id.unwrap_or(current.meeting_room_id);

        tx.execute(
            "UPDATE events SET title = ?2, description = ?3, start_time = ?4, end_time = ?5,
                 meeting_room_id = ?6
             WHERE id = ?1",
            params![
                event_id,
                title,
                description,
                format_timestamp(&start),
                format_timestamp(&end),
                room,
            ],
        )?;

        if let Some(attendees) = &update.attendees {
            let organizer: Option<i64> = tx
                .query_row(
                    "SELECT user_id FROM user_events WHERE event_id = ?1 AND is_organizer = 1",
                    [event_id],
                    |row| row.get(0),
                )
                .optional()?;
            tx.execute(
                "DELETE FROM user_events WHERE event_id = ?1 AND is_organizer = 0",
                [event_id],
            )?;
            for &user_id in attendees {
                if Some(user_id) == organizer {
                    continue;
                }
                tx.execute(
                    "INSERT OR IGNORE INTO user_events (user_id, event_id, is_organizer) VALUES (?1, ?2, 0)",
                    params![user_id, event_id],
                )?;
            }
        }
        tx.commit()?;

        info!(event_id, "event updated");
        Ok(true)
    }

    fn exists(&self, sql: &str, id: i64) -> Result<bool> {
        let found = self.conn.query_row(sql, [id], |_| Ok(())).optional()?;
        Ok(found.is_some())
    }

    pub fn event(&self, event_id: i64) -> Result<Option<EventDetails>> {
        let sql = format!(
            "SELECT {} FROM events e LEFT JOIN meeting_rooms m ON e.meeting_room_id = m.id WHERE e.id = ?1",
            EVENT_COLUMNS
        );
        let row = self.conn.query_row(&sql, [event_id], event_row).optional()?;
        match row {
            Some((event, meeting_room_name)) => {
                let attendees = self.attendees(event.id)?;
                Ok(Some(EventDetails {
                    event,
                    meeting_room_name,
                    attendees,
                }))
            }
            None => Ok(None),
        }
    }

    /// Events `user_id` takes part in, ordered by start. Bounds apply to the start time.
    pub fn user_events(
        &self,
        user_id: i64,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> Result<Vec<EventDetails>> {
        let sql = format!(
            "SELECT {} FROM events e
             LEFT JOIN meeting_rooms m ON e.meeting_room_id = m.id
             JOIN user_events ue ON e.id = ue.event_id
             WHERE ue.user_id = ?1
               AND (?2 IS NULL OR e.start_time >= ?2)
               AND (?3 IS NULL OR e.start_time <= ?3)
             ORDER BY e.start_time, e.id",
            EVENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    user_id,
                    from.as_ref().map(format_timestamp),
                    to.as_ref().map(format_timestamp)
                ],
                event_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(event, meeting_room_name)| {
                let attendees = self.attendees(event.id)?;
                Ok(EventDetails {
                    event,
                    meeting_room_name,
                    attendees,
                })
            })
            .collect()
    }

    pub fn attendees(&self, event_id: i64) -> Result<Vec<Attendee>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.name, u.email, ue.is_organizer
             FROM users u JOIN user_events ue ON u.id = ue.user_id
             WHERE ue.event_id = ?1
             ORDER BY ue.is_organizer DESC, u.id",
        )?;
        let attendees = stmt
            .query_map([event_id], Attendee::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attendees)
    }

    /// True when the user has no event overlapping `[start, end)`.
    pub fn is_user_available(&self, user_id: i64, start: NaiveDateTime, end: NaiveDateTime) -> Result<bool> {
        let (start, end) = stored_range(start, end)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM events e
             JOIN user_events ue ON e.id = ue.event_id
             WHERE ue.user_id = ?1 AND e.start_time < ?3 AND e.end_time > ?2",
            params![user_id, format_timestamp(&start), format_timestamp(&end)],
            |row| row.get(0),
        )?;
        Ok(count == 0)
    }

    /// Hourly candidate slots of `duration_minutes` between `start_hour` and
    /// `end_hour` on each day of the window where every user is free.
    pub fn common_free_slots(
        &self,
        user_ids: &[i64],
        duration_minutes: i64,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        start_hour: u32,
        end_hour: u32,
    ) -> Result<Vec<TimeSlot>> {
        let (window_start, window_end) = stored_range(window_start, window_end)?;
        let duration = Duration::try_minutes(duration_minutes)
            .filter(|d| *d > Duration::zero())
            .ok_or(CalendarError::InvalidDuration(duration_minutes))?;

        let mut busy: HashMap<i64, Vec<(NaiveDateTime, NaiveDateTime)>> = HashMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT e.start_time, e.end_time FROM events e
             JOIN user_events ue ON e.id = ue.event_id
             WHERE ue.user_id = ?1 AND e.start_time < ?3 AND e.end_time > ?2
             ORDER BY e.start_time",
        )?;
        for &user_id in user_ids {
            let intervals = stmt
                .query_map(
                    params![user_id, format_timestamp(&window_start), format_timestamp(&window_end)],
                    |row| Ok((timestamp_column(row, 0)?, timestamp_column(row, 1)?)),
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            busy.insert(user_id, intervals);
        }

        let mut slots = Vec::new();
        let mut day = window_start.date();
        while day <= window_end.date() {
            for hour in start_hour..end_hour.min(24) {
                let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) else {
                    continue;
                };
                let slot_start = day.and_time(time);
                let Some(slot_end) = slot_start.checked_add_signed(duration) else {
                    return Err(CalendarError::InvalidDuration(duration_minutes));
                };
                let slot = TimeSlot {
                    start_time: slot_start,
                    end_time: slot_end,
                };
                if slot.start_time < window_start || slot.end_time > window_end {
                    continue;
                }
                let all_free = busy
                    .values()
                    .all(|events| events.iter().all(|(s, e)| !slot.overlaps(s, e)));
                if all_free {
                    slots.push(slot);
                }
            }
            let Some(next) = day.succ_opt() else { break };
            day = next;
        }

        debug!(users = user_ids.len(), slots = slots.len(), "computed common free slots");
        Ok(slots)
    }

    /// Delete an event; its attendee rows cascade. Returns whether anything was removed.
    pub fn cancel_event(&self, event_id: i64) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM events WHERE id = ?1", [event_id])?;
        if removed > 0 {
            info!(event_id, "event cancelled");
        }
        Ok(removed > 0)
    }
}

/// Cut both bounds to the stored precision, then require `start < end`.
fn stored_range(start: NaiveDateTime, end: NaiveDateTime) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let (start, end) = (truncate_to_seconds(start), truncate_to_seconds(end));
    if start < end {
        Ok((start, end))
    } else {
        Err(CalendarError::InvalidTimeRange { start, end })
    }
}

fn event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Event, Option<String>)> {
    Ok((
        Event {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            start_time: timestamp_column(row, 3)?,
            end_time: timestamp_column(row, 4)?,
            meeting_room_id: row.get(5)?,
        },
        row.get(6)?,
    ))
}
