//! Service layer for kinship-graph
//!
//! Services sit between callers and the repository. They add:
//! - Input validation and person existence checks
//! - Structural validation inside the writer transaction
//! - Event emission for audit/notifications
//! - Person resolution for rendered views
//!
//! ## Architecture
//!
//! ```text
//! Caller (HTTP handler, importer, ...)
//!     ↓
//! Service Layer (relationship_service, tree_service)
//!     ↓
//! Graph algorithms (graph/*.rs) over a GraphView
//!     ↓
//! Repository Layer (db/*.rs) → SQLite
//! ```

pub mod events;
pub mod relationship_service;
pub mod tree_service;
pub mod views;

pub use events::{log_event, spawn_logging_listener, EventBus, GraphEvent};
pub use relationship_service::RelationshipService;
pub use tree_service::TreeService;
pub use views::{
    DescendantView, DescendantViewNode, MiniTreeView, PartnerView, PathResultView, PathStepView, PedigreeView,
    PedigreeViewNode, PersonSummary, RelationshipPathView, SiblingView,
};

use std::sync::Arc;

use crate::config::GraphConfig;
use crate::db::GraphDb;
use crate::directory::{ActorLinks, PersonDirectory};
use crate::error::GraphError;
use crate::graph::validation::ValidationRules;

/// Service container for dependency injection
///
/// Holds both services over one shared database and event bus.
pub struct Services {
    pub relationships: Arc<RelationshipService>,
    pub trees: Arc<TreeService>,
    pub events: Arc<EventBus>,
    pub db: Arc<GraphDb>,
}

impl Services {
    /// Open the database named by `config` and wire the services to it
    pub fn open(
        config: GraphConfig,
        directory: Arc<dyn PersonDirectory>,
        links: Arc<dyn ActorLinks>,
    ) -> Result<Self, GraphError> {
        config.validate()?;
        let db = Arc::new(GraphDb::open(&config.database_path())?);
        Ok(Self::new(db, config, directory, links))
    }

    /// Create all services over an existing database
    pub fn new(
        db: Arc<GraphDb>,
        config: GraphConfig,
        directory: Arc<dyn PersonDirectory>,
        links: Arc<dyn ActorLinks>,
    ) -> Self {
        let events = Arc::new(EventBus::with_capacity(config.event_capacity));
        let rules = ValidationRules { max_biological_parents: config.max_biological_parents };

        Self {
            relationships: Arc::new(RelationshipService::new(db.clone(), directory.clone(), events.clone(), rules)),
            trees: Arc::new(TreeService::new(db.clone(), directory, links, events.clone(), config)),
            events,
            db,
        }
    }

    /// In-memory database with default config (for testing)
    pub fn in_memory(directory: Arc<dyn PersonDirectory>, links: Arc<dyn ActorLinks>) -> Result<Self, GraphError> {
        let db = Arc::new(GraphDb::open_in_memory()?);
        Ok(Self::new(db, GraphConfig::default(), directory, links))
    }
}
