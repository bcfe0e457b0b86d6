//! Declarative table definitions for the calendar database and their DDL rendering.

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::models::{ONLINE_ROOM_CAPACITY, ONLINE_ROOM_ID, ONLINE_ROOM_NAME};

/// Schema definition for the SQLite database
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }
    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// Render every table and index as idempotent DDL, in declaration order.
    pub fn to_sql(&self) -> String {
        let mut statements = Vec::new();
        for table in &self.tables {
            statements.push(table.create_statement());
            for index in &table.indexes {
                statements.push(index.create_statement(&table.name));
            }
        }
        statements.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }
    /// Composite primary key. Single-column keys use [`ColumnConstraint::PrimaryKey`].
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }
    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn create_statement(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        for fk in &self.foreign_keys {
            parts.push(fk.to_sql());
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.name,
            parts.join(",\n    ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
    pub default_value: Option<DefaultValue>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }
    pub fn constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.as_sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.as_sql());
        }
        if let Some(default) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    PrimaryKey,
    /// Primary key backed by a monotonically increasing rowid.
    AutoIncrement,
    NotNull,
    Unique,
}

impl ColumnConstraint {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY",
            ColumnConstraint::AutoIncrement => "PRIMARY KEY AUTOINCREMENT",
            ColumnConstraint::NotNull => "NOT NULL",
            ColumnConstraint::Unique => "UNIQUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Integer(i64),
    Text(String),
    Real(f64),
    Null,
    CurrentTimestamp,
}

impl DefaultValue {
    pub fn to_sql(&self) -> String {
        match self {
            DefaultValue::Integer(v) => v.to_string(),
            DefaultValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
            DefaultValue::Real(v) => v.to_string(),
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    pub fn new(column: &str, foreign_table: &str, foreign_column: &str) -> Self {
        Self {
            column: column.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_column: foreign_column.to_string(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.column, self.foreign_table, self.foreign_column
        );
        if self.on_delete != ForeignKeyAction::NoAction {
            sql.push_str(" ON DELETE ");
            sql.push_str(self.on_delete.as_sql());
        }
        if self.on_update != ForeignKeyAction::NoAction {
            sql.push_str(" ON UPDATE ");
            sql.push_str(self.on_update.as_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyAction {
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
}

impl ForeignKeyAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Restrict => "RESTRICT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn create_statement(&self, table: &str) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({});",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            table,
            self.columns.join(", ")
        )
    }
}

/// The four calendar tables: users, meeting rooms, events and the user/event join.
pub fn calendar_schema() -> Schema {
    use ColumnConstraint::*;

    Schema::new()
        .add_table(
            TableDefinition::new("users")
                .column(ColumnDefinition::new("id", DataType::Integer).constraint(AutoIncrement))
                .column(ColumnDefinition::new("name", DataType::Text).constraint(NotNull))
                .column(
                    ColumnDefinition::new("email", DataType::Text)
                        .constraint(NotNull)
                        .constraint(Unique),
                ),
        )
        .add_table(
            TableDefinition::new("meeting_rooms")
                .column(ColumnDefinition::new("id", DataType::Integer).constraint(AutoIncrement))
                .column(ColumnDefinition::new("name", DataType::Text).constraint(NotNull))
                .column(ColumnDefinition::new("capacity", DataType::Integer).constraint(NotNull))
                .column(
                    ColumnDefinition::new("is_virtual", DataType::Integer)
                        .constraint(NotNull)
                        .default_value(DefaultValue::Integer(0)),
                ),
        )
        .add_table(
            TableDefinition::new("events")
                .column(ColumnDefinition::new("id", DataType::Integer).constraint(AutoIncrement))
                .column(ColumnDefinition::new("title", DataType::Text).constraint(NotNull))
                .column(ColumnDefinition::new("description", DataType::Text))
                .column(ColumnDefinition::new("start_time", DataType::Text).constraint(NotNull))
                .column(ColumnDefinition::new("end_time", DataType::Text).constraint(NotNull))
                .column(ColumnDefinition::new("meeting_room_id", DataType::Integer))
                .foreign_key(ForeignKey::new("meeting_room_id", "meeting_rooms", "id"))
                .index(IndexDefinition::new("idx_events_start_time", &["start_time"])),
        )
        .add_table(
            TableDefinition::new("user_events")
                .column(ColumnDefinition::new("user_id", DataType::Integer).constraint(NotNull))
                .column(ColumnDefinition::new("event_id", DataType::Integer).constraint(NotNull))
                .column(
                    ColumnDefinition::new("is_organizer", DataType::Integer)
                        .constraint(NotNull)
                        .default_value(DefaultValue::Integer(0)),
                )
                .primary_key(&["user_id", "event_id"])
                .foreign_key(ForeignKey::new("user_id", "users", "id"))
                .foreign_key(
                    ForeignKey::new("event_id", "events", "id").on_delete(ForeignKeyAction::Cascade),
                )
                .index(IndexDefinition::new("idx_user_events_event", &["event_id"])),
        )
}

/// Enable foreign keys, create missing tables and ensure the online room exists.
/// Safe to run on every open.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(&calendar_schema().to_sql())?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO meeting_rooms (id, name, capacity, is_virtual) VALUES (?1, ?2, ?3, 1)",
        rusqlite::params![ONLINE_ROOM_ID, ONLINE_ROOM_NAME, ONLINE_ROOM_CAPACITY],
    )?;
    debug!(online_room_created = inserted == 1, "calendar schema initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_join_table_with_composite_key_and_cascade() {
        let schema = calendar_schema();
        let join = schema.tables.iter().find(|t| t.name == "user_events").unwrap();
        let sql = join.create_statement();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS user_events ("));
        assert!(sql.contains("PRIMARY KEY (user_id, event_id)"));
        assert!(sql.contains("FOREIGN KEY (event_id) REFERENCES events (id) ON DELETE CASCADE"));
        assert!(sql.contains("is_organizer INTEGER NOT NULL DEFAULT 0"));
    }

    #[test]
    fn text_defaults_are_quoted() {
        let col = ColumnDefinition::new("label", DataType::Text)
            .default_value(DefaultValue::Text("it's".to_string()));
        assert_eq!(col.to_sql(), "label TEXT DEFAULT 'it''s'");
    }

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();

        let (count, name, virtual_flag): (i64, String, bool) = conn
            .query_row(
                "SELECT COUNT(*), MAX(name), MAX(is_virtual) FROM meeting_rooms",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(name, ONLINE_ROOM_NAME);
        assert!(virtual_flag);

        let fk: bool = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(fk);
    }
}
