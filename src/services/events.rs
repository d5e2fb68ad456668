//! Event system for graph mutations
//!
//! Listeners receive every committed edge change, every rejected mutation
//! and every invariant violation met while reading. Useful for:
//! - Audit logging
//! - Cache invalidation of rendered trees
//! - Alerting on corrupted data

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::db::models::EdgeId;

/// Events emitted by the graph services
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    ParentChildCreated {
        id: EdgeId,
        parent_id: String,
        child_id: String,
        relationship_type: String,
    },
    ParentChildUpdated {
        id: EdgeId,
    },
    ParentChildVerified {
        id: EdgeId,
        verified_by: String,
    },
    ParentChildDeleted {
        id: EdgeId,
    },
    ParentChildBulkCreated {
        count: usize,
    },

    PartnershipCreated {
        id: EdgeId,
        person_a_id: String,
        person_b_id: String,
        partnership_type: String,
    },
    PartnershipUpdated {
        id: EdgeId,
    },
    PartnershipDeleted {
        id: EdgeId,
    },

    /// A structural check refused a mutation
    MutationRejected {
        code: &'static str,
        detail: String,
    },

    /// A read traversal met a cycle that validation should have prevented
    InvariantViolation {
        person_id: String,
        repeated_id: String,
    },
}

/// Event bus for broadcasting graph events
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
}

impl EventBus {
    /// Bus holding up to 1024 undelivered events per subscriber
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to every current subscriber; returns how many received it
    pub fn emit(&self, event: GraphEvent) -> usize {
        trace!(event = ?event, "Emitting graph event");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Write one event to the tracing log at a level matching its severity
pub fn log_event(event: &GraphEvent) {
    match event {
        GraphEvent::ParentChildCreated { parent_id, child_id, relationship_type, .. } => {
            debug!(parent = %parent_id, child = %child_id, rel_type = %relationship_type, "Parent-child edge created");
        }
        GraphEvent::PartnershipCreated { person_a_id, person_b_id, partnership_type, .. } => {
            debug!(a = %person_a_id, b = %person_b_id, rel_type = %partnership_type, "Partnership created");
        }
        GraphEvent::MutationRejected { code, detail } => {
            info!(code = %code, detail = %detail, "Mutation rejected");
        }
        GraphEvent::InvariantViolation { person_id, repeated_id } => {
            warn!(person = %person_id, repeated = %repeated_id, "Graph invariant violation");
        }
        _ => {
            trace!(event = ?event, "Graph event");
        }
    }
}

/// Log every event on `bus` from a background task until the bus is dropped
pub fn spawn_logging_listener(bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Logging listener fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Graph event bus closed, logging listener exiting");
                    break;
                }
            }
        }
    })
}
