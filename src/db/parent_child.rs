//! Parent-child edge CRUD operations
//!
//! Every read excludes soft-deleted rows.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{
    current_timestamp, CreateParentChildInput, EdgeId, ParentChildEdge, ParentChildPatch,
    ParentChildType,
};
use crate::error::GraphError;

const COLUMNS: &str = "id, parent_person_id, child_person_id, relationship_type, notes,
    confidence_score, is_verified, verified_at, verified_by, is_deleted, created_at, updated_at";

fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<ParentChildEdge> {
    let relationship_type: String = row.get(3)?;
    let relationship_type = relationship_type
        .parse::<ParentChildType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(ParentChildEdge {
        id: row.get(0)?,
        parent_person_id: row.get(1)?,
        child_person_id: row.get(2)?,
        relationship_type,
        notes: row.get(4)?,
        confidence_score: row.get(5)?,
        is_verified: row.get::<_, i32>(6)? != 0,
        verified_at: row.get(7)?,
        verified_by: row.get(8)?,
        is_deleted: row.get::<_, i32>(9)? != 0,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn query_edges<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<ParentChildEdge>, GraphError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, row_to_edge)?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

// =============================================================================
// Reads
// =============================================================================

/// Get an active edge by ID
pub fn get_parent_child(conn: &Connection, id: EdgeId) -> Result<Option<ParentChildEdge>, GraphError> {
    let sql = format!("SELECT {} FROM parent_child WHERE id = ? AND is_deleted = 0", COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_edge).optional()?)
}

/// Get the active edge for an exact ordered pair
pub fn find_parent_child(conn: &Connection, parent_id: &str, child_id: &str) -> Result<Option<ParentChildEdge>, GraphError> {
    let sql = format!(
        "SELECT {} FROM parent_child
         WHERE parent_person_id = ? AND child_person_id = ? AND is_deleted = 0",
        COLUMNS
    );
    Ok(conn.query_row(&sql, params![parent_id, child_id], row_to_edge).optional()?)
}

/// Edges where `child_id` is the child, oldest first
pub fn list_parents_of(conn: &Connection, child_id: &str) -> Result<Vec<ParentChildEdge>, GraphError> {
    let sql = format!(
        "SELECT {} FROM parent_child WHERE child_person_id = ? AND is_deleted = 0 ORDER BY id",
        COLUMNS
    );
    query_edges(conn, &sql, params![child_id])
}

/// Edges where `parent_id` is the parent, oldest first
pub fn list_children_of(conn: &Connection, parent_id: &str) -> Result<Vec<ParentChildEdge>, GraphError> {
    let sql = format!(
        "SELECT {} FROM parent_child WHERE parent_person_id = ? AND is_deleted = 0 ORDER BY id",
        COLUMNS
    );
    query_edges(conn, &sql, params![parent_id])
}

/// Every active edge, oldest first
pub fn list_all(conn: &Connection) -> Result<Vec<ParentChildEdge>, GraphError> {
    let sql = format!("SELECT {} FROM parent_child WHERE is_deleted = 0 ORDER BY id", COLUMNS);
    query_edges(conn, &sql, params![])
}

/// Active edge counts grouped by relationship type
pub fn count_by_type(conn: &Connection) -> Result<Vec<(String, i64)>, GraphError> {
    let mut stmt = conn.prepare(
        "SELECT relationship_type, COUNT(*) FROM parent_child
         WHERE is_deleted = 0 GROUP BY relationship_type ORDER BY relationship_type",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// =============================================================================
// Writes
// =============================================================================

/// Insert a validated edge
pub fn insert_parent_child(conn: &Connection, input: &CreateParentChildInput) -> Result<ParentChildEdge, GraphError> {
    let now = current_timestamp();
    conn.execute(
        "INSERT INTO parent_child (parent_person_id, child_person_id, relationship_type, notes,
         confidence_score, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            input.parent_person_id,
            input.child_person_id,
            input.relationship_type.as_str(),
            input.notes,
            input.confidence_score,
            now,
            now,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_parent_child(conn, id)?
        .ok_or_else(|| GraphError::Internal("Failed to retrieve created parent-child edge".to_string()))
}

/// Apply an attribute patch; `None` when the edge is missing or deleted
pub fn update_parent_child(
    conn: &Connection,
    id: EdgeId,
    patch: &ParentChildPatch,
) -> Result<Option<ParentChildEdge>, GraphError> {
    let Some(mut edge) = get_parent_child(conn, id)? else {
        return Ok(None);
    };

    if let Some(t) = patch.relationship_type {
        edge.relationship_type = t;
    }
    if let Some(notes) = &patch.notes {
        edge.notes = notes.clone();
    }
    if let Some(score) = patch.confidence_score {
        edge.confidence_score = score;
    }

    conn.execute(
        "UPDATE parent_child SET relationship_type = ?, notes = ?, confidence_score = ?, updated_at = ?
         WHERE id = ? AND is_deleted = 0",
        params![
            edge.relationship_type.as_str(),
            edge.notes,
            edge.confidence_score,
            current_timestamp(),
            id,
        ],
    )?;

    get_parent_child(conn, id)
}

/// Mark an edge verified by `verified_by`
pub fn verify_parent_child(conn: &Connection, id: EdgeId, verified_by: &str) -> Result<Option<ParentChildEdge>, GraphError> {
    let now = current_timestamp();
    let rows = conn.execute(
        "UPDATE parent_child SET is_verified = 1, verified_at = ?, verified_by = ?, updated_at = ?
         WHERE id = ? AND is_deleted = 0",
        params![now, verified_by, now, id],
    )?;
    if rows == 0 {
        return Ok(None);
    }
    get_parent_child(conn, id)
}

/// Soft-delete an edge; false when it was missing or already deleted
pub fn soft_delete_parent_child(conn: &Connection, id: EdgeId) -> Result<bool, GraphError> {
    let rows = conn.execute(
        "UPDATE parent_child SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
        params![current_timestamp(), id],
    )?;
    Ok(rows > 0)
}
