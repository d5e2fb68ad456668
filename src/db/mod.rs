//! SQLite storage for relationship edges
//!
//! ## Tables
//!
//! - `parent_child` - directed parent -> child edges
//! - `partnerships` - undirected partnerships keyed by the canonical pair
//!
//! Both tables soft-delete: rows are flagged `is_deleted` and every query
//! filters them out.
//!
//! All access goes through one connection behind a mutex. Writes run inside
//! an IMMEDIATE transaction while that mutex is held, which makes
//! validate-then-insert a single-writer critical section.

pub mod models;
pub mod parent_child;
pub mod partnerships;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::error::GraphError;
use crate::graph::view::{GraphSnapshot, GraphView, Link, LinkKind};
use models::EdgeId;

/// SQLite database holding the edge tables
pub struct GraphDb {
    conn: Mutex<Connection>,
}

impl GraphDb {
    /// Open or create the database file at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, GraphError> {
        info!("Opening graph database at {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, GraphError> {
        debug!("Opening in-memory graph database");

        let conn = Connection::open_in_memory()?;
        let db = Self { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), GraphError> {
        let conn = self.lock()?;
        schema::init_schema(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, GraphError> {
        self.conn
            .lock()
            .map_err(|e| GraphError::Internal(format!("Lock poisoned: {}", e)))
    }

    /// Run a read against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&Connection) -> Result<T, GraphError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside an IMMEDIATE transaction; any error rolls the whole
    /// closure back
    pub fn with_write_tx<F, T>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, GraphError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Consistent copy of every active edge
    pub fn snapshot(&self) -> Result<GraphSnapshot, GraphError> {
        self.with_conn(|conn| {
            let parent_child = parent_child::list_all(conn)?;
            let partnerships = partnerships::list_all(conn)?;
            debug!(
                parent_child = parent_child.len(),
                partnerships = partnerships.len(),
                "Loaded graph snapshot"
            );
            Ok(GraphSnapshot::from_edges(parent_child, partnerships))
        })
    }

    /// Active edge counts
    pub fn stats(&self) -> Result<DbStats, GraphError> {
        self.with_conn(|conn| {
            let parent_child_by_type = parent_child::count_by_type(conn)?;
            let partnerships_by_type = partnerships::count_by_type(conn)?;
            Ok(DbStats {
                parent_child_count: parent_child_by_type.iter().map(|(_, n)| *n as u64).sum(),
                partnership_count: partnerships_by_type.iter().map(|(_, n)| *n as u64).sum(),
                parent_child_by_type,
                partnerships_by_type,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub parent_child_count: u64,
    pub partnership_count: u64,
    pub parent_child_by_type: Vec<(String, i64)>,
    pub partnerships_by_type: Vec<(String, i64)>,
}

/// `GraphView` over a live connection, used while the write lock is held
pub struct ConnView<'a> {
    conn: &'a Connection,
}

impl<'a> ConnView<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl GraphView for ConnView<'_> {
    fn parents_of(&self, child_id: &str) -> Result<Vec<Link>, GraphError> {
        Ok(parent_child::list_parents_of(self.conn, child_id)?
            .into_iter()
            .map(|e| Link {
                edge_id: e.id,
                person_id: e.parent_person_id,
                kind: LinkKind::ParentChild(e.relationship_type),
            })
            .collect())
    }

    fn children_of(&self, parent_id: &str) -> Result<Vec<Link>, GraphError> {
        Ok(parent_child::list_children_of(self.conn, parent_id)?
            .into_iter()
            .map(|e| Link {
                edge_id: e.id,
                person_id: e.child_person_id,
                kind: LinkKind::ParentChild(e.relationship_type),
            })
            .collect())
    }

    fn partners_of(&self, person_id: &str) -> Result<Vec<Link>, GraphError> {
        Ok(partnerships::list_partnerships_of(self.conn, person_id)?
            .into_iter()
            .filter_map(|e| {
                let other = e.other(person_id)?.to_string();
                Some(Link {
                    edge_id: e.id,
                    person_id: other,
                    kind: LinkKind::Partnership(e.partnership_type),
                })
            })
            .collect())
    }

    fn parent_child_between(&self, parent_id: &str, child_id: &str) -> Result<Option<EdgeId>, GraphError> {
        Ok(parent_child::find_parent_child(self.conn, parent_id, child_id)?.map(|e| e.id))
    }

    fn partnership_between(&self, a: &str, b: &str) -> Result<Option<EdgeId>, GraphError> {
        Ok(partnerships::find_partnership(self.conn, a, b)?.map(|e| e.id))
    }
}

// Re-exports
pub use models::{
    CreateParentChildInput, CreatePartnershipInput, ParentChildEdge, ParentChildPatch, ParentChildType,
    PartnershipEdge, PartnershipPatch, PartnershipType,
};
