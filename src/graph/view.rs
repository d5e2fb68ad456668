//! Read access to the active edge set
//!
//! `GraphView` is the seam shared by the validator and the traversal
//! builders. It is implemented by the immutable [`GraphSnapshot`] (read
//! path) and by the live database connection (write path, inside the
//! writer critical section).

use std::collections::{BTreeSet, HashMap};

use crate::db::models::{
    EdgeId, PairKey, ParentChildEdge, ParentChildType, PartnershipEdge, PartnershipType,
};
use crate::error::GraphError;

/// What kind of edge a [`Link`] follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    ParentChild(ParentChildType),
    Partnership(PartnershipType),
}

/// One edge seen from one endpoint: `person_id` is the person on the far side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub edge_id: EdgeId,
    pub person_id: String,
    pub kind: LinkKind,
}

impl Link {
    pub fn parent_child_type(&self) -> Option<ParentChildType> {
        match self.kind {
            LinkKind::ParentChild(t) => Some(t),
            LinkKind::Partnership(_) => None,
        }
    }

    pub fn partnership_type(&self) -> Option<PartnershipType> {
        match self.kind {
            LinkKind::Partnership(t) => Some(t),
            LinkKind::ParentChild(_) => None,
        }
    }
}

/// Active (non-deleted) edges around a person. All lists are ordered by edge id.
pub trait GraphView {
    /// Links to the recorded parents of `child_id`
    fn parents_of(&self, child_id: &str) -> Result<Vec<Link>, GraphError>;

    /// Links to the recorded children of `parent_id`
    fn children_of(&self, parent_id: &str) -> Result<Vec<Link>, GraphError>;

    /// Links to every active partner of `person_id`
    fn partners_of(&self, person_id: &str) -> Result<Vec<Link>, GraphError>;

    /// Edge id of the exact ordered pair, if present
    fn parent_child_between(&self, parent_id: &str, child_id: &str) -> Result<Option<EdgeId>, GraphError>;

    /// Edge id of the unordered pair, if present
    fn partnership_between(&self, a: &str, b: &str) -> Result<Option<EdgeId>, GraphError>;
}

/// Immutable in-memory copy of the active edge set
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    parents: HashMap<String, Vec<Link>>,
    children: HashMap<String, Vec<Link>>,
    partners: HashMap<String, Vec<Link>>,
    parent_child_pairs: HashMap<(String, String), EdgeId>,
    partnership_pairs: HashMap<PairKey, EdgeId>,
}

impl GraphSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from edge rows; deleted rows are skipped
    pub fn from_edges(parent_child: Vec<ParentChildEdge>, partnerships: Vec<PartnershipEdge>) -> Self {
        let mut snapshot = Self::new();
        for edge in parent_child.into_iter().filter(|e| !e.is_deleted) {
            snapshot.add_parent_child(edge.id, &edge.parent_person_id, &edge.child_person_id, edge.relationship_type);
        }
        for edge in partnerships.into_iter().filter(|e| !e.is_deleted) {
            snapshot.add_partnership(edge.id, &edge.person_a_id, &edge.person_b_id, edge.partnership_type);
        }
        snapshot.sort_links();
        snapshot
    }

    /// Add a parent -> child edge
    pub fn add_parent_child(&mut self, id: EdgeId, parent: &str, child: &str, relationship_type: ParentChildType) {
        let kind = LinkKind::ParentChild(relationship_type);
        self.parents.entry(child.to_string()).or_default().push(Link {
            edge_id: id,
            person_id: parent.to_string(),
            kind,
        });
        self.children.entry(parent.to_string()).or_default().push(Link {
            edge_id: id,
            person_id: child.to_string(),
            kind,
        });
        self.parent_child_pairs.insert((parent.to_string(), child.to_string()), id);
    }

    /// Add an undirected partnership edge
    pub fn add_partnership(&mut self, id: EdgeId, a: &str, b: &str, partnership_type: PartnershipType) {
        let kind = LinkKind::Partnership(partnership_type);
        self.partners.entry(a.to_string()).or_default().push(Link {
            edge_id: id,
            person_id: b.to_string(),
            kind,
        });
        self.partners.entry(b.to_string()).or_default().push(Link {
            edge_id: id,
            person_id: a.to_string(),
            kind,
        });
        self.partnership_pairs.insert(PairKey::new(a, b), id);
    }

    fn sort_links(&mut self) {
        for links in self
            .parents
            .values_mut()
            .chain(self.children.values_mut())
            .chain(self.partners.values_mut())
        {
            links.sort_by_key(|l| l.edge_id);
        }
    }

    /// Every person id that appears on an active edge, in ascending order
    pub fn person_ids(&self) -> BTreeSet<&str> {
        self.parents
            .keys()
            .chain(self.children.keys())
            .chain(self.partners.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn parent_child_count(&self) -> usize {
        self.parent_child_pairs.len()
    }

    pub fn partnership_count(&self) -> usize {
        self.partnership_pairs.len()
    }

    fn links(map: &HashMap<String, Vec<Link>>, id: &str) -> Vec<Link> {
        map.get(id).cloned().unwrap_or_default()
    }
}

impl GraphView for GraphSnapshot {
    fn parents_of(&self, child_id: &str) -> Result<Vec<Link>, GraphError> {
        Ok(Self::links(&self.parents, child_id))
    }

    fn children_of(&self, parent_id: &str) -> Result<Vec<Link>, GraphError> {
        Ok(Self::links(&self.children, parent_id))
    }

    fn partners_of(&self, person_id: &str) -> Result<Vec<Link>, GraphError> {
        Ok(Self::links(&self.partners, person_id))
    }

    fn parent_child_between(&self, parent_id: &str, child_id: &str) -> Result<Option<EdgeId>, GraphError> {
        Ok(self
            .parent_child_pairs
            .get(&(parent_id.to_string(), child_id.to_string()))
            .copied())
    }

    fn partnership_between(&self, a: &str, b: &str) -> Result<Option<EdgeId>, GraphError> {
        Ok(self.partnership_pairs.get(&PairKey::new(a, b)).copied())
    }
}
