//! Kinship Graph - relationship graph engine for family-history data
//!
//! Stores parent-child and partnership edges between person ids, refuses
//! structurally invalid edges (self relations, duplicates, ancestry cycles)
//! and answers bounded traversals: pedigrees, descendant trees, the mini
//! tree around one person and the shortest relationship path between two.
//!
//! Person records live elsewhere and are read through [`PersonDirectory`].
//!
//! ## Layout
//!
//! ```text
//! services/   RelationshipService (writes), TreeService (reads), EventBus
//! graph/      validation, traversal, path search over a GraphView
//! db/         SQLite edge tables, snapshots
//! directory   PersonDirectory / ActorLinks traits, in-memory directory
//! ```
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/kinship-graph/
//! ├── graph.db               # Edge tables (WAL mode)
//! └── config.toml            # Optional configuration
//! ```

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod graph;
pub mod services;
pub mod telemetry;

// Re-exports
pub use config::GraphConfig;
pub use db::{
    CreateParentChildInput, CreatePartnershipInput, DbStats, GraphDb, ParentChildEdge, ParentChildPatch,
    ParentChildType, PartnershipEdge, PartnershipPatch, PartnershipType,
};
pub use directory::{ActorLinks, InMemoryDirectory, Person, PersonDirectory};
pub use error::GraphError;
pub use graph::{CancelFlag, PathRole, Rejection, Relationship, UnrelatedReason};
pub use services::{EventBus, GraphEvent, RelationshipService, Services, TreeService};
