use calendar_sqlite::models::ONLINE_ROOM_ID;
use calendar_sqlite::schema::calendar_schema;
use calendar_sqlite::{seed, CalendarError, CalendarStore, Result, SeedData};
use rusqlite::Connection;
use tempfile::NamedTempFile;

// Helper function to create a temporary file-based database
fn create_temp_store() -> Result<(CalendarStore, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let store = CalendarStore::open(temp_file.path())?;
    Ok((store, temp_file))
}

fn count(conn: &Connection, table: &str) -> Result<i64> {
    let n = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(n)
}

#[tokio::test]
async fn test_builtin_seed() {
    test_builtin_seed_impl().unwrap();
}

fn test_builtin_seed_impl() -> Result<()> {
    let mut store = CalendarStore::open_in_memory()?;
    let report = seed(store.connection_mut(), &SeedData::builtin())?;

    assert_eq!(report.users, 5);
    assert_eq!(report.rooms, 3);
    assert_eq!(report.events, 6);
    assert_eq!(report.user_events, 17);

    let conn = store.connection();
    assert_eq!(count(conn, "users")?, 5);
    // three seeded rooms plus the online room
    assert_eq!(count(conn, "meeting_rooms")?, 4);
    assert_eq!(count(conn, "events")?, 6);
    assert_eq!(count(conn, "user_events")?, 17);
    Ok(())
}

#[tokio::test]
async fn test_every_event_has_exactly_one_organizer() {
    test_every_event_has_exactly_one_organizer_impl().unwrap();
}

fn test_every_event_has_exactly_one_organizer_impl() -> Result<()> {
    let mut store = CalendarStore::open_in_memory()?;
    seed(store.connection_mut(), &SeedData::builtin())?;

    let mut stmt = store.connection().prepare(
        "SELECT e.id, COUNT(ue.user_id), COALESCE(SUM(ue.is_organizer), 0), e.start_time < e.end_time
         FROM events e LEFT JOIN user_events ue ON ue.event_id = e.id
         GROUP BY e.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    assert_eq!(rows.len(), 6);
    for (event_id, users, organizers, ordered) in rows {
        assert!(users >= 1, "event {} has no users", event_id);
        assert_eq!(organizers, 1, "event {} organizer count", event_id);
        assert!(ordered, "event {} ends before it starts", event_id);
    }
    Ok(())
}

#[tokio::test]
async fn test_seed_links_rows_by_generated_ids() {
    test_seed_links_rows_by_generated_ids_impl().unwrap();
}

fn test_seed_links_rows_by_generated_ids_impl() -> Result<()> {
    let mut store = CalendarStore::open_in_memory()?;
    seed(store.connection_mut(), &SeedData::builtin())?;

    let (room_name, room_id): (String, i64) = store.connection().query_row(
        "SELECT m.name, m.id FROM events e JOIN meeting_rooms m ON m.id = e.meeting_room_id
         WHERE e.title = 'Weekly Standup'",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    assert_eq!(room_name, "Online Meeting");
    assert_eq!(room_id, ONLINE_ROOM_ID);

    let bob = store.user_by_email("bob@example.com")?.unwrap();
    let kickoff = store
        .user_events(bob.id, None, None)?
        .into_iter()
        .find(|e| e.event.title == "Project Kickoff")
        .unwrap();
    assert_eq!(kickoff.meeting_room_name.as_deref(), Some("Conference Room A"));
    assert_eq!(kickoff.organizer().unwrap().email, "john@example.com");
    assert_eq!(kickoff.attendees.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_second_seed_rolls_back_entirely() {
    test_second_seed_rolls_back_entirely_impl().unwrap();
}

fn test_second_seed_rolls_back_entirely_impl() -> Result<()> {
    let (mut store, _file) = create_temp_store()?;
    seed(store.connection_mut(), &SeedData::builtin())?;

    let err = seed(store.connection_mut(), &SeedData::builtin()).unwrap_err();
    assert!(matches!(err, CalendarError::Sqlite(_)));

    let conn = store.connection();
    assert_eq!(count(conn, "users")?, 5);
    assert_eq!(count(conn, "meeting_rooms")?, 4);
    assert_eq!(count(conn, "events")?, 6);
    assert_eq!(count(conn, "user_events")?, 17);
    Ok(())
}

#[tokio::test]
async fn test_failure_mid_load_leaves_database_empty() {
    test_failure_mid_load_leaves_database_empty_impl().unwrap();
}

fn test_failure_mid_load_leaves_database_empty_impl() -> Result<()> {
    let (mut store, _file) = create_temp_store()?;
    // collides with the last seeded user, after four inserts succeeded
    store.add_user("Someone Else", "carlos@example.com")?;

    let err = seed(store.connection_mut(), &SeedData::builtin()).unwrap_err();
    assert!(matches!(err, CalendarError::Sqlite(_)));

    let conn = store.connection();
    assert_eq!(count(conn, "users")?, 1);
    assert_eq!(count(conn, "meeting_rooms")?, 1);
    assert_eq!(count(conn, "events")?, 0);
    assert_eq!(count(conn, "user_events")?, 0);
    Ok(())
}

#[tokio::test]
async fn test_invalid_seed_is_rejected_before_writing() {
    test_invalid_seed_is_rejected_before_writing_impl().unwrap();
}

fn test_invalid_seed_is_rejected_before_writing_impl() -> Result<()> {
    let mut store = CalendarStore::open_in_memory()?;
    let mut data = SeedData::builtin();
    data.events[0].organizer = "ghost@example.com".to_string();

    let err = seed(store.connection_mut(), &data).unwrap_err();
    assert!(matches!(err, CalendarError::Seed(_)));
    assert_eq!(count(store.connection(), "users")?, 0);
    Ok(())
}

#[tokio::test]
async fn test_seed_from_json_file() {
    test_seed_from_json_file_impl().unwrap();
}

fn test_seed_from_json_file_impl() -> Result<()> {
    let file = NamedTempFile::new()?;
    std::fs::write(file.path(), serde_json::to_string(&SeedData::builtin())?)?;

    let loaded = SeedData::from_json_file(file.path())?;
    assert_eq!(loaded, SeedData::builtin());

    let mut store = CalendarStore::open_in_memory()?;
    let report = seed(store.connection_mut(), &loaded)?;
    assert_eq!(report.events, 6);
    Ok(())
}

#[tokio::test]
async fn test_seed_on_bare_tables_creates_online_room() {
    test_seed_on_bare_tables_creates_online_room_impl().unwrap();
}

fn test_seed_on_bare_tables_creates_online_room_impl() -> Result<()> {
    // tables only: no online room, foreign keys left at their default
    let mut conn = Connection::open_in_memory()?;
    conn.execute_batch(&calendar_schema().to_sql())?;
    assert_eq!(count(&conn, "meeting_rooms")?, 0);

    seed(&mut conn, &SeedData::builtin())?;

    let dangling: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events e LEFT JOIN meeting_rooms m ON m.id = e.meeting_room_id
         WHERE m.id IS NULL",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(dangling, 0);

    let online: (String, bool) = conn.query_row(
        "SELECT name, is_virtual FROM meeting_rooms WHERE id = ?1",
        [ONLINE_ROOM_ID],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    assert_eq!(online, ("Online Meeting".to_string(), true));
    Ok(())
}

#[tokio::test]
async fn test_seed_rejects_range_lost_to_storage_precision() {
    test_seed_rejects_range_lost_to_storage_precision_impl().unwrap();
}

fn test_seed_rejects_range_lost_to_storage_precision_impl() -> Result<()> {
    let mut store = CalendarStore::open_in_memory()?;
    let json = r#"{
        "users": [{"name": "Ann", "email": "ann@example.com"}],
        "events": [{
            "title": "Blink",
            "start_time": "2025-06-02T10:00:00.100",
            "end_time": "2025-06-02T10:00:00.900",
            "room": "Online Meeting",
            "organizer": "ann@example.com"
        }]
    }"#;
    let data: SeedData = serde_json::from_str(json)?;

    let err = seed(store.connection_mut(), &data).unwrap_err();
    assert!(matches!(err, CalendarError::Seed(_)));
    assert_eq!(count(store.connection(), "users")?, 0);
    assert_eq!(count(store.connection(), "events")?, 0);
    Ok(())
}
