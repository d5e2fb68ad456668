//! Partnership edge CRUD operations
//!
//! Pairs are matched through the canonical `(person_low, person_high)`
//! columns, so lookups are independent of the stored endpoint order.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{
    current_timestamp, CreatePartnershipInput, EdgeId, PairKey, PartnershipEdge, PartnershipPatch,
    PartnershipType,
};
use crate::error::GraphError;

const COLUMNS: &str = "id, person_a_id, person_b_id, partnership_type, start_date, end_date,
    is_deleted, created_at, updated_at";

fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<PartnershipEdge> {
    let partnership_type: String = row.get(3)?;
    let partnership_type = partnership_type
        .parse::<PartnershipType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(PartnershipEdge {
        id: row.get(0)?,
        person_a_id: row.get(1)?,
        person_b_id: row.get(2)?,
        partnership_type,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        is_deleted: row.get::<_, i32>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Get an active partnership by ID
pub fn get_partnership(conn: &Connection, id: EdgeId) -> Result<Option<PartnershipEdge>, GraphError> {
    let sql = format!("SELECT {} FROM partnerships WHERE id = ? AND is_deleted = 0", COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_edge).optional()?)
}

/// Get the active partnership between two people, in either stored order
pub fn find_partnership(conn: &Connection, a: &str, b: &str) -> Result<Option<PartnershipEdge>, GraphError> {
    let key = PairKey::new(a, b);
    let sql = format!(
        "SELECT {} FROM partnerships
         WHERE person_low = ? AND person_high = ? AND is_deleted = 0",
        COLUMNS
    );
    Ok(conn.query_row(&sql, params![key.low, key.high], row_to_edge).optional()?)
}

/// Active partnerships touching `person_id`, oldest first
pub fn list_partnerships_of(conn: &Connection, person_id: &str) -> Result<Vec<PartnershipEdge>, GraphError> {
    let sql = format!(
        "SELECT {} FROM partnerships
         WHERE (person_a_id = ? OR person_b_id = ?) AND is_deleted = 0 ORDER BY id",
        COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![person_id, person_id], row_to_edge)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Every active partnership, oldest first
pub fn list_all(conn: &Connection) -> Result<Vec<PartnershipEdge>, GraphError> {
    let sql = format!("SELECT {} FROM partnerships WHERE is_deleted = 0 ORDER BY id", COLUMNS);
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![], row_to_edge)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Active partnership counts grouped by type
pub fn count_by_type(conn: &Connection) -> Result<Vec<(String, i64)>, GraphError> {
    let mut stmt = conn.prepare(
        "SELECT partnership_type, COUNT(*) FROM partnerships
         WHERE is_deleted = 0 GROUP BY partnership_type ORDER BY partnership_type",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Insert a validated partnership
pub fn insert_partnership(conn: &Connection, input: &CreatePartnershipInput) -> Result<PartnershipEdge, GraphError> {
    let key = PairKey::new(&input.person_a_id, &input.person_b_id);
    let now = current_timestamp();
    conn.execute(
        "INSERT INTO partnerships (person_a_id, person_b_id, person_low, person_high, partnership_type,
         start_date, end_date, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            input.person_a_id,
            input.person_b_id,
            key.low,
            key.high,
            input.partnership_type.as_str(),
            input.start_date,
            input.end_date,
            now,
            now,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_partnership(conn, id)?
        .ok_or_else(|| GraphError::Internal("Failed to retrieve created partnership".to_string()))
}

/// Apply an attribute patch; `None` when the edge is missing or deleted
pub fn update_partnership(
    conn: &Connection,
    id: EdgeId,
    patch: &PartnershipPatch,
) -> Result<Option<PartnershipEdge>, GraphError> {
    let Some(edge) = get_partnership(conn, id)? else {
        return Ok(None);
    };
    let edge = apply_patch(edge, patch);

    conn.execute(
        "UPDATE partnerships SET partnership_type = ?, start_date = ?, end_date = ?, updated_at = ?
         WHERE id = ? AND is_deleted = 0",
        params![
            edge.partnership_type.as_str(),
            edge.start_date,
            edge.end_date,
            current_timestamp(),
            id,
        ],
    )?;

    get_partnership(conn, id)
}

/// Patched copy of `edge`, used to validate dates before writing
pub fn apply_patch(mut edge: PartnershipEdge, patch: &PartnershipPatch) -> PartnershipEdge {
    if let Some(t) = patch.partnership_type {
        edge.partnership_type = t;
    }
    if let Some(start) = &patch.start_date {
        edge.start_date = start.clone();
    }
    if let Some(end) = &patch.end_date {
        edge.end_date = end.clone();
    }
    edge
}

/// Soft-delete a partnership; false when it was missing or already deleted
pub fn soft_delete_partnership(conn: &Connection, id: EdgeId) -> Result<bool, GraphError> {
    let rows = conn.execute(
        "UPDATE partnerships SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
        params![current_timestamp(), id],
    )?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_find_in_either_order() {
        let conn = setup();
        let edge = insert_partnership(&conn, &CreatePartnershipInput::new("zoe", "adam", PartnershipType::Married)).unwrap();

        assert_eq!(find_partnership(&conn, "adam", "zoe").unwrap().map(|e| e.id), Some(edge.id));
        assert_eq!(find_partnership(&conn, "zoe", "adam").unwrap().map(|e| e.id), Some(edge.id));
        assert_eq!(list_partnerships_of(&conn, "adam").unwrap().len(), 1);
        assert_eq!(edge.other("adam"), Some("zoe"));
    }

    #[test]
    fn test_reverse_pair_hits_unique_index() {
        let conn = setup();
        insert_partnership(&conn, &CreatePartnershipInput::new("a", "b", PartnershipType::Partner)).unwrap();
        let reversed = CreatePartnershipInput::new("b", "a", PartnershipType::Partner);
        assert!(matches!(insert_partnership(&conn, &reversed), Err(GraphError::Database(_))));
    }

    #[test]
    fn test_update_and_delete() {
        let conn = setup();
        let edge = insert_partnership(&conn, &CreatePartnershipInput::new("a", "b", PartnershipType::Married)).unwrap();

        let patch = PartnershipPatch {
            partnership_type: Some(PartnershipType::Divorced),
            end_date: Some(Some("1990-05-01".into())),
            ..Default::default()
        };
        let updated = update_partnership(&conn, edge.id, &patch).unwrap().unwrap();
        assert_eq!(updated.partnership_type, PartnershipType::Divorced);
        assert_eq!(updated.end_date.as_deref(), Some("1990-05-01"));

        assert!(soft_delete_partnership(&conn, edge.id).unwrap());
        assert!(find_partnership(&conn, "a", "b").unwrap().is_none());
        assert!(update_partnership(&conn, edge.id, &patch).unwrap().is_none());
    }
}
