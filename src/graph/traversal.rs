//! Bounded tree builders: pedigree, descendants and the mini tree
//!
//! Builders work on person ids only; attribute resolution happens in the
//! service layer. Depth is always bounded by the requested generation count.
//! Each builder also keeps the current root-to-node chain so that a cycle in
//! corrupted data is reported and cut instead of being expanded until the
//! depth limit.
//!
//! Shared ancestry is rendered once per line it appears in, so a densely
//! interconnected graph can grow exponentially with depth. The guard's node
//! budget stops expansion once a tree holds that many nodes and marks the
//! result truncated.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::guard::TraversalGuard;
use super::view::GraphView;
use crate::db::models::{EdgeId, ParentChildType, PartnershipType};
use crate::error::GraphError;

/// Ancestor node; generation 0 is the focal person
#[derive(Debug, Clone, PartialEq)]
pub struct PedigreeNode {
    pub person_id: String,
    pub generation: u32,
    /// Type of the edge linking this node to the child below it
    pub relationship_type: Option<ParentChildType>,
    pub parents: Vec<PedigreeNode>,
}

/// Partner attached to a descendant node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerRef {
    pub edge_id: EdgeId,
    pub person_id: String,
    pub partnership_type: PartnershipType,
}

/// Descendant node; generation 0 is the focal person
#[derive(Debug, Clone, PartialEq)]
pub struct DescendantNode {
    pub person_id: String,
    pub generation: u32,
    /// Type of the edge linking this node to the parent above it
    pub relationship_type: Option<ParentChildType>,
    pub partner: Option<PartnerRef>,
    pub children: Vec<DescendantNode>,
}

/// A cycle met while reading; only possible if stored data bypassed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleViolation {
    pub person_id: String,
    pub repeated_id: String,
}

/// Builder output plus bookkeeping
#[derive(Debug, Clone)]
pub struct TreeBuild<N> {
    pub root: N,
    pub generations: u32,
    /// Some node at the depth limit still had edges to follow, or the node budget ran out
    pub truncated: bool,
    /// Expansion stopped because the node budget was reached
    pub budget_exhausted: bool,
    pub node_count: usize,
    pub violations: Vec<CycleViolation>,
}

impl<N> TreeBuild<N> {
    /// Every person id in the tree
    pub fn person_ids(&self) -> BTreeSet<String>
    where
        N: CollectIds,
    {
        let mut ids = BTreeSet::new();
        self.root.collect_ids(&mut ids);
        ids
    }
}

/// Walks a tree collecting person ids for batch resolution
pub trait CollectIds {
    fn collect_ids(&self, ids: &mut BTreeSet<String>);
}

impl CollectIds for PedigreeNode {
    fn collect_ids(&self, ids: &mut BTreeSet<String>) {
        ids.insert(self.person_id.clone());
        for parent in &self.parents {
            parent.collect_ids(ids);
        }
    }
}

impl CollectIds for DescendantNode {
    fn collect_ids(&self, ids: &mut BTreeSet<String>) {
        ids.insert(self.person_id.clone());
        if let Some(partner) = &self.partner {
            ids.insert(partner.person_id.clone());
        }
        for child in &self.children {
            child.collect_ids(ids);
        }
    }
}

/// Turn a caller-supplied depth into a bounded one; non-positive means "focal only"
pub fn effective_generations(requested: i32, cap: u32) -> u32 {
    if requested <= 0 {
        0
    } else {
        (requested as u32).min(cap)
    }
}

struct Builder<'a, G: ?Sized> {
    graph: &'a G,
    guard: &'a TraversalGuard,
    max_generations: u32,
    truncated: bool,
    budget_exhausted: bool,
    node_count: usize,
    violations: Vec<CycleViolation>,
}

impl<'a, G: GraphView + ?Sized> Builder<'a, G> {
    fn new(graph: &'a G, guard: &'a TraversalGuard, max_generations: u32) -> Self {
        Self {
            graph,
            guard,
            max_generations,
            truncated: false,
            budget_exhausted: false,
            node_count: 0,
            violations: Vec::new(),
        }
    }

    fn finish<N>(self, root: N) -> TreeBuild<N> {
        TreeBuild {
            root,
            generations: self.max_generations,
            truncated: self.truncated,
            budget_exhausted: self.budget_exhausted,
            node_count: self.node_count,
            violations: self.violations,
        }
    }

    /// True once the tree holds as many nodes as the guard allows
    fn out_of_budget(&mut self) -> bool {
        let Some(budget) = self.guard.node_budget() else {
            return false;
        };
        if self.node_count < budget {
            return false;
        }
        if !self.budget_exhausted {
            debug!(nodes = self.node_count, "Tree node budget reached, expansion stopped");
        }
        self.budget_exhausted = true;
        self.truncated = true;
        true
    }

    fn record_cycle(&mut self, person_id: &str, repeated_id: &str) {
        warn!(
            person = %person_id,
            repeated = %repeated_id,
            "Invariant violation: cycle in parent-child edges, branch cut"
        );
        self.violations.push(CycleViolation {
            person_id: person_id.to_string(),
            repeated_id: repeated_id.to_string(),
        });
    }

    fn pedigree(
        &mut self,
        person_id: &str,
        generation: u32,
        relationship_type: Option<ParentChildType>,
        chain: &mut Vec<String>,
    ) -> Result<PedigreeNode, GraphError> {
        self.guard.step()?;
        self.node_count += 1;

        let mut node = PedigreeNode {
            person_id: person_id.to_string(),
            generation,
            relationship_type,
            parents: Vec::new(),
        };

        let parents = self.graph.parents_of(person_id)?;
        if generation >= self.max_generations {
            self.truncated |= !parents.is_empty();
            return Ok(node);
        }

        chain.push(person_id.to_string());
        for link in parents {
            if chain.contains(&link.person_id) {
                self.record_cycle(person_id, &link.person_id);
                continue;
            }
            if self.out_of_budget() {
                break;
            }
            let parent = self.pedigree(&link.person_id, generation + 1, link.parent_child_type(), chain)?;
            node.parents.push(parent);
        }
        chain.pop();

        Ok(node)
    }

    fn descendants(
        &mut self,
        person_id: &str,
        generation: u32,
        relationship_type: Option<ParentChildType>,
        chain: &mut Vec<String>,
    ) -> Result<DescendantNode, GraphError> {
        self.guard.step()?;
        self.node_count += 1;

        let partner = first_partner(self.graph, person_id)?;
        let mut node = DescendantNode {
            person_id: person_id.to_string(),
            generation,
            relationship_type,
            partner,
            children: Vec::new(),
        };

        let children = self.graph.children_of(person_id)?;
        if generation >= self.max_generations {
            self.truncated |= !children.is_empty();
            return Ok(node);
        }

        chain.push(person_id.to_string());
        for link in children {
            if chain.contains(&link.person_id) {
                self.record_cycle(person_id, &link.person_id);
                continue;
            }
            if self.out_of_budget() {
                break;
            }
            let child = self.descendants(&link.person_id, generation + 1, link.parent_child_type(), chain)?;
            node.children.push(child);
        }
        chain.pop();

        Ok(node)
    }
}

/// Partner shown beside a person: the active partnership with the lowest edge id
pub fn first_partner<G: GraphView + ?Sized>(graph: &G, person_id: &str) -> Result<Option<PartnerRef>, GraphError> {
    Ok(graph
        .partners_of(person_id)?
        .into_iter()
        .min_by_key(|l| l.edge_id)
        .and_then(|l| {
            l.partnership_type().map(|partnership_type| PartnerRef {
                edge_id: l.edge_id,
                person_id: l.person_id,
                partnership_type,
            })
        }))
}

/// Ancestors of `person_id`, at most `max_generations` deep
pub fn pedigree<G: GraphView + ?Sized>(
    graph: &G,
    person_id: &str,
    max_generations: u32,
    guard: &TraversalGuard,
) -> Result<TreeBuild<PedigreeNode>, GraphError> {
    let mut builder = Builder::new(graph, guard, max_generations);
    let root = builder.pedigree(person_id, 0, None, &mut Vec::new())?;
    Ok(builder.finish(root))
}

/// Descendants of `person_id` with one partner per node, at most `max_generations` deep
pub fn descendants<G: GraphView + ?Sized>(
    graph: &G,
    person_id: &str,
    max_generations: u32,
    guard: &TraversalGuard,
) -> Result<TreeBuild<DescendantNode>, GraphError> {
    let mut builder = Builder::new(graph, guard, max_generations);
    let root = builder.descendants(person_id, 0, None, &mut Vec::new())?;
    Ok(builder.finish(root))
}

/// Sibling of the focal person with the parents they share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingRef {
    pub person_id: String,
    pub shared_parent_ids: Vec<String>,
}

/// Compact neighbourhood around one person
#[derive(Debug, Clone)]
pub struct MiniTree {
    pub focal_id: String,
    pub partners: Vec<PartnerRef>,
    pub siblings: Vec<SiblingRef>,
    pub ancestors: TreeBuild<PedigreeNode>,
    pub descendants: TreeBuild<DescendantNode>,
}

impl MiniTree {
    pub fn person_ids(&self) -> BTreeSet<String> {
        let mut ids = self.ancestors.person_ids();
        ids.extend(self.descendants.person_ids());
        ids.extend(self.partners.iter().map(|p| p.person_id.clone()));
        ids.extend(self.siblings.iter().map(|s| s.person_id.clone()));
        ids
    }

    pub fn truncated(&self) -> bool {
        self.ancestors.truncated || self.descendants.truncated
    }
}

/// Ancestors, descendants, every partner and the siblings of `person_id`
pub fn mini_tree<G: GraphView + ?Sized>(
    graph: &G,
    person_id: &str,
    generations: u32,
    guard: &TraversalGuard,
) -> Result<MiniTree, GraphError> {
    let ancestors = pedigree(graph, person_id, generations, guard)?;
    let descendants = descendants(graph, person_id, generations, guard)?;

    let partners = graph
        .partners_of(person_id)?
        .into_iter()
        .filter_map(|l| {
            l.partnership_type().map(|partnership_type| PartnerRef {
                edge_id: l.edge_id,
                person_id: l.person_id,
                partnership_type,
            })
        })
        .collect();

    let mut siblings: Vec<SiblingRef> = Vec::new();
    for parent in graph.parents_of(person_id)? {
        guard.step()?;
        for child in graph.children_of(&parent.person_id)? {
            if child.person_id == person_id {
                continue;
            }
            match siblings.iter_mut().find(|s| s.person_id == child.person_id) {
                Some(sibling) => sibling.shared_parent_ids.push(parent.person_id.clone()),
                None => siblings.push(SiblingRef {
                    person_id: child.person_id,
                    shared_parent_ids: vec![parent.person_id.clone()],
                }),
            }
        }
    }

    Ok(MiniTree {
        focal_id: person_id.to_string(),
        partners,
        siblings,
        ancestors,
        descendants,
    })
}
