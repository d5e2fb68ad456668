//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::GraphError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), GraphError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new graph schema v{}", SCHEMA_VERSION);
        conn.execute_batch(EDGES_SCHEMA)?;
        conn.execute_batch(INDEXES_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(GraphError::Internal(format!(
            "Database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    } else {
        info!("Graph schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, GraphError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), GraphError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

/// Edge tables
///
/// Person records live in an external directory, so there are no foreign keys
/// on the person id columns.
const EDGES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS parent_child (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_person_id TEXT NOT NULL,
    child_person_id TEXT NOT NULL,
    relationship_type TEXT NOT NULL DEFAULT 'biological',
    notes TEXT,
    confidence_score REAL,
    is_verified INTEGER NOT NULL DEFAULT 0,
    verified_at TEXT,
    verified_by TEXT,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (parent_person_id <> child_person_id)
);

-- person_low/person_high hold the canonical (min, max) ordering of the pair
CREATE TABLE IF NOT EXISTS partnerships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_a_id TEXT NOT NULL,
    person_b_id TEXT NOT NULL,
    person_low TEXT NOT NULL,
    person_high TEXT NOT NULL,
    partnership_type TEXT NOT NULL DEFAULT 'married',
    start_date TEXT,
    end_date TEXT,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (person_a_id <> person_b_id)
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_parent_child_active_pair
    ON parent_child(parent_person_id, child_person_id) WHERE is_deleted = 0;
CREATE INDEX IF NOT EXISTS idx_parent_child_child ON parent_child(child_person_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_partnerships_active_pair
    ON partnerships(person_low, person_high) WHERE is_deleted = 0;
CREATE INDEX IF NOT EXISTS idx_partnerships_a ON partnerships(person_a_id);
CREATE INDEX IF NOT EXISTS idx_partnerships_b ON partnerships(person_b_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
