//! Tree service - read-side queries over the relationship graph
//!
//! Each query loads one snapshot, traverses it without holding the
//! database lock, then resolves every person id it met with a single
//! directory call.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::GraphConfig;
use crate::db::GraphDb;
use crate::directory::{ActorLinks, PersonDirectory};
use crate::error::GraphError;
use crate::graph::guard::{CancelFlag, TraversalGuard};
use crate::graph::path::{shortest_path, PathOutcome};
use crate::graph::traversal::{descendants, effective_generations, mini_tree, pedigree, CycleViolation};
use crate::graph::view::GraphSnapshot;

use super::events::{EventBus, GraphEvent};
use super::views::{
    descendant_view, mini_tree_view, path_view, pedigree_view, DescendantView, MiniTreeView, PedigreeView,
    PersonResolver, RelationshipPathView,
};

/// Pedigree, descendant, mini tree and relationship path queries
pub struct TreeService {
    db: Arc<GraphDb>,
    directory: Arc<dyn PersonDirectory>,
    links: Arc<dyn ActorLinks>,
    events: Arc<EventBus>,
    config: GraphConfig,
}

impl TreeService {
    pub fn new(
        db: Arc<GraphDb>,
        directory: Arc<dyn PersonDirectory>,
        links: Arc<dyn ActorLinks>,
        events: Arc<EventBus>,
        config: GraphConfig,
    ) -> Self {
        Self { db, directory, links, events, config }
    }

    /// Ancestors of `person_id`; `generations <= 0` returns the person alone
    pub fn get_pedigree(&self, person_id: &str, generations: i32) -> Result<PedigreeView, GraphError> {
        self.pedigree_inner(person_id, generations, None)
    }

    pub fn get_pedigree_with(
        &self,
        person_id: &str,
        generations: i32,
        cancel: &CancelFlag,
    ) -> Result<PedigreeView, GraphError> {
        self.pedigree_inner(person_id, generations, Some(cancel))
    }

    /// Descendants of `person_id` with one partner per node
    pub fn get_descendants(&self, person_id: &str, generations: i32) -> Result<DescendantView, GraphError> {
        self.descendants_inner(person_id, generations, None)
    }

    pub fn get_descendants_with(
        &self,
        person_id: &str,
        generations: i32,
        cancel: &CancelFlag,
    ) -> Result<DescendantView, GraphError> {
        self.descendants_inner(person_id, generations, Some(cancel))
    }

    /// Neighbourhood of `person_id`, or of the default focal person when none is given
    pub fn get_mini_tree(&self, person_id: Option<&str>, generations: Option<i32>) -> Result<MiniTreeView, GraphError> {
        self.mini_tree_inner(person_id, generations, None)
    }

    pub fn get_mini_tree_with(
        &self,
        person_id: Option<&str>,
        generations: Option<i32>,
        cancel: &CancelFlag,
    ) -> Result<MiniTreeView, GraphError> {
        self.mini_tree_inner(person_id, generations, Some(cancel))
    }

    /// Mini tree of the person linked to `actor_id`
    pub fn get_my_mini_tree(&self, actor_id: &str) -> Result<MiniTreeView, GraphError> {
        let linked = self.links.linked_person(actor_id)?;
        if linked.is_none() {
            debug!(actor = %actor_id, "Actor has no linked person, using default focal person");
        }
        self.mini_tree_inner(linked.as_deref(), None, None)
    }

    /// Shortest path from `person_a` to `person_b` and what B is to A
    pub fn get_relationship_path(&self, person_a: &str, person_b: &str) -> Result<RelationshipPathView, GraphError> {
        self.path_inner(person_a, person_b, None)
    }

    pub fn get_relationship_path_with(
        &self,
        person_a: &str,
        person_b: &str,
        cancel: &CancelFlag,
    ) -> Result<RelationshipPathView, GraphError> {
        self.path_inner(person_a, person_b, Some(cancel))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn pedigree_inner(
        &self,
        person_id: &str,
        generations: i32,
        cancel: Option<&CancelFlag>,
    ) -> Result<PedigreeView, GraphError> {
        let snapshot = self.db.snapshot()?;
        let guard = self.guard(cancel);
        let max = effective_generations(generations, self.config.max_generations);

        let build = pedigree(&snapshot, person_id, max, &guard)?;
        self.report_violations(&build.violations);
        let people = self.resolve_entry(build.person_ids(), &[person_id])?;

        debug!(person = %person_id, generations = max, nodes = build.node_count, truncated = build.truncated, "Pedigree built");
        Ok(pedigree_view(&build, &people))
    }

    fn descendants_inner(
        &self,
        person_id: &str,
        generations: i32,
        cancel: Option<&CancelFlag>,
    ) -> Result<DescendantView, GraphError> {
        let snapshot = self.db.snapshot()?;
        let guard = self.guard(cancel);
        let max = effective_generations(generations, self.config.max_generations);

        let build = descendants(&snapshot, person_id, max, &guard)?;
        self.report_violations(&build.violations);
        let people = self.resolve_entry(build.person_ids(), &[person_id])?;

        debug!(person = %person_id, generations = max, nodes = build.node_count, truncated = build.truncated, "Descendant tree built");
        Ok(descendant_view(&build, &people))
    }

    fn mini_tree_inner(
        &self,
        person_id: Option<&str>,
        generations: Option<i32>,
        cancel: Option<&CancelFlag>,
    ) -> Result<MiniTreeView, GraphError> {
        let snapshot = self.db.snapshot()?;
        let focal = match person_id {
            Some(id) => id.to_string(),
            None => self.default_focal(&snapshot)?,
        };

        let guard = self.guard(cancel);
        let cap = self.config.max_generations;
        let gens = match generations {
            Some(g) => effective_generations(g, cap),
            None => self.config.mini_tree_generations.min(cap),
        };

        let tree = mini_tree(&snapshot, &focal, gens, &guard)?;
        self.report_violations(&tree.ancestors.violations);
        self.report_violations(&tree.descendants.violations);
        let people = self.resolve_entry(tree.person_ids(), &[&focal])?;

        debug!(person = %focal, generations = gens, partners = tree.partners.len(), siblings = tree.siblings.len(), "Mini tree built");
        Ok(mini_tree_view(&tree, &people))
    }

    fn path_inner(
        &self,
        person_a: &str,
        person_b: &str,
        cancel: Option<&CancelFlag>,
    ) -> Result<RelationshipPathView, GraphError> {
        let snapshot = self.db.snapshot()?;
        let guard = self.guard(cancel);

        let outcome = shortest_path(&snapshot, person_a, person_b, self.config.max_path_hops, &guard)?;

        let mut ids: BTreeSet<String> = [person_a.to_string(), person_b.to_string()].into_iter().collect();
        if let PathOutcome::Related { steps, .. } = &outcome {
            for step in steps {
                ids.insert(step.from.clone());
                ids.insert(step.to.clone());
            }
        }
        let people = self.resolve_entry(ids, &[person_a, person_b])?;

        debug!(a = %person_a, b = %person_b, related = outcome.is_related(), steps = guard.steps(), "Relationship path searched");
        Ok(path_view(person_a, person_b, &outcome, &people))
    }

    fn guard(&self, cancel: Option<&CancelFlag>) -> TraversalGuard {
        TraversalGuard::new(self.config.traversal_timeout(), cancel.cloned())
            .with_node_budget(self.config.max_tree_nodes)
    }

    /// Resolve every id in one directory call; entry persons must be live
    fn resolve_entry(&self, ids: BTreeSet<String>, entries: &[&str]) -> Result<PersonResolver, GraphError> {
        let people = PersonResolver::resolve(self.directory.as_ref(), ids)?;
        for id in entries {
            if people.summary(id).is_placeholder {
                return Err(GraphError::NotFound(format!("Person {}", id)));
            }
        }
        Ok(people)
    }

    /// Smallest live person id among active edge endpoints
    fn default_focal(&self, snapshot: &GraphSnapshot) -> Result<String, GraphError> {
        let candidates: Vec<String> = snapshot.person_ids().into_iter().map(str::to_string).collect();
        if candidates.is_empty() {
            return Err(GraphError::NotFound("No people in the graph".into()));
        }

        let found = self.directory.get_by_ids(&candidates)?;
        candidates
            .into_iter()
            .find(|id| found.get(id).is_some_and(|p| !p.is_deleted))
            .ok_or_else(|| GraphError::NotFound("No resolvable person in the graph".into()))
    }

    fn report_violations(&self, violations: &[CycleViolation]) {
        for v in violations {
            self.events.emit(GraphEvent::InvariantViolation {
                person_id: v.person_id.clone(),
                repeated_id: v.repeated_id.clone(),
            });
        }
    }
}
