//! Response views assembled from traversal output
//!
//! Traversals produce person ids; views carry resolved display attributes.
//! People that no longer resolve (unknown or deleted in the directory) are
//! rendered as placeholders.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::db::models::{EdgeId, ParentChildType, PartnershipType};
use crate::directory::{Person, PersonDirectory};
use crate::error::GraphError;
use crate::graph::path::{PathOutcome, PathRole, Relationship, UnrelatedReason};
use crate::graph::traversal::{DescendantNode, MiniTree, PartnerRef, PedigreeNode, TreeBuild};

const PLACEHOLDER_NAME: &str = "Unknown person";

/// Display attributes of one person
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSummary {
    pub id: String,
    pub display_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub date_of_death: Option<String>,
    pub is_deceased: bool,
    /// The id did not resolve to a live person record
    pub is_placeholder: bool,
}

impl PersonSummary {
    pub fn from_person(person: &Person) -> Self {
        Self {
            id: person.id.clone(),
            display_name: person.display_name(),
            first_name: Some(person.first_name.clone()),
            last_name: Some(person.last_name.clone()),
            date_of_birth: person.date_of_birth.clone(),
            date_of_death: person.date_of_death.clone(),
            is_deceased: person.is_deceased,
            is_placeholder: false,
        }
    }

    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: PLACEHOLDER_NAME.to_string(),
            first_name: None,
            last_name: None,
            date_of_birth: None,
            date_of_death: None,
            is_deceased: false,
            is_placeholder: true,
        }
    }
}

/// Person summaries fetched with a single directory call
pub struct PersonResolver {
    resolved: HashMap<String, PersonSummary>,
}

impl PersonResolver {
    pub fn resolve(directory: &dyn PersonDirectory, ids: BTreeSet<String>) -> Result<Self, GraphError> {
        let ids: Vec<String> = ids.into_iter().collect();
        let resolved = directory
            .get_by_ids(&ids)?
            .into_iter()
            .filter(|(_, p)| !p.is_deleted)
            .map(|(id, p)| (id, PersonSummary::from_person(&p)))
            .collect();
        Ok(Self { resolved })
    }

    pub fn summary(&self, id: &str) -> PersonSummary {
        self.resolved
            .get(id)
            .cloned()
            .unwrap_or_else(|| PersonSummary::placeholder(id))
    }

    fn partner(&self, partner: &PartnerRef) -> PartnerView {
        PartnerView {
            edge_id: partner.edge_id,
            partnership_type: partner.partnership_type,
            person: self.summary(&partner.person_id),
        }
    }
}

// ============================================================================
// Trees
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PedigreeViewNode {
    pub person: PersonSummary,
    pub generation: u32,
    pub relationship_type: Option<ParentChildType>,
    pub parents: Vec<PedigreeViewNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerView {
    pub edge_id: EdgeId,
    pub partnership_type: PartnershipType,
    pub person: PersonSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescendantViewNode {
    pub person: PersonSummary,
    pub generation: u32,
    pub relationship_type: Option<ParentChildType>,
    pub partner: Option<PartnerView>,
    pub children: Vec<DescendantViewNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeView<N> {
    pub root: N,
    /// Depth actually used after clamping
    pub generations: u32,
    /// More generations exist beyond `generations`
    pub truncated: bool,
    pub node_count: usize,
}

pub type PedigreeView = TreeView<PedigreeViewNode>;
pub type DescendantView = TreeView<DescendantViewNode>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiblingView {
    pub person: PersonSummary,
    pub shared_parent_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniTreeView {
    pub focal: PersonSummary,
    pub generations: u32,
    pub partners: Vec<PartnerView>,
    pub siblings: Vec<SiblingView>,
    pub ancestors: PedigreeViewNode,
    pub descendants: DescendantViewNode,
    pub truncated: bool,
}

fn pedigree_node(node: &PedigreeNode, people: &PersonResolver) -> PedigreeViewNode {
    PedigreeViewNode {
        person: people.summary(&node.person_id),
        generation: node.generation,
        relationship_type: node.relationship_type,
        parents: node.parents.iter().map(|p| pedigree_node(p, people)).collect(),
    }
}

fn descendant_node(node: &DescendantNode, people: &PersonResolver) -> DescendantViewNode {
    DescendantViewNode {
        person: people.summary(&node.person_id),
        generation: node.generation,
        relationship_type: node.relationship_type,
        partner: node.partner.as_ref().map(|p| people.partner(p)),
        children: node.children.iter().map(|c| descendant_node(c, people)).collect(),
    }
}

pub fn pedigree_view(build: &TreeBuild<PedigreeNode>, people: &PersonResolver) -> PedigreeView {
    TreeView {
        root: pedigree_node(&build.root, people),
        generations: build.generations,
        truncated: build.truncated,
        node_count: build.node_count,
    }
}

pub fn descendant_view(build: &TreeBuild<DescendantNode>, people: &PersonResolver) -> DescendantView {
    TreeView {
        root: descendant_node(&build.root, people),
        generations: build.generations,
        truncated: build.truncated,
        node_count: build.node_count,
    }
}

pub fn mini_tree_view(tree: &MiniTree, people: &PersonResolver) -> MiniTreeView {
    MiniTreeView {
        focal: people.summary(&tree.focal_id),
        generations: tree.ancestors.generations,
        partners: tree.partners.iter().map(|p| people.partner(p)).collect(),
        siblings: tree
            .siblings
            .iter()
            .map(|s| SiblingView {
                person: people.summary(&s.person_id),
                shared_parent_ids: s.shared_parent_ids.clone(),
            })
            .collect(),
        ancestors: pedigree_node(&tree.ancestors.root, people),
        descendants: descendant_node(&tree.descendants.root, people),
        truncated: tree.truncated(),
    }
}

// ============================================================================
// Paths
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStepView {
    pub from: PersonSummary,
    pub to: PersonSummary,
    pub edge_id: EdgeId,
    pub role: PathRole,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PathResultView {
    Related {
        steps: Vec<PathStepView>,
        relationship: Relationship,
        /// Human-readable name of what person B is to person A
        label: String,
    },
    Unrelated {
        reason: UnrelatedReason,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipPathView {
    pub person_a: PersonSummary,
    pub person_b: PersonSummary,
    pub result: PathResultView,
}

impl RelationshipPathView {
    pub fn relationship(&self) -> Option<Relationship> {
        match &self.result {
            PathResultView::Related { relationship, .. } => Some(*relationship),
            PathResultView::Unrelated { .. } => None,
        }
    }
}

pub fn path_view(a: &str, b: &str, outcome: &PathOutcome, people: &PersonResolver) -> RelationshipPathView {
    let result = match outcome {
        PathOutcome::Related { steps, relationship } => PathResultView::Related {
            steps: steps
                .iter()
                .map(|s| PathStepView {
                    from: people.summary(&s.from),
                    to: people.summary(&s.to),
                    edge_id: s.edge_id,
                    role: s.role,
                })
                .collect(),
            relationship: *relationship,
            label: relationship.label(),
        },
        PathOutcome::Unrelated { reason } => PathResultView::Unrelated { reason: *reason },
    };

    RelationshipPathView {
        person_a: people.summary(a),
        person_b: people.summary(b),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;

    #[test]
    fn test_unresolved_and_deleted_become_placeholders() {
        let dir = InMemoryDirectory::new();
        dir.upsert(Person::new("alive", "Ada", "Byron"));
        let mut gone = Person::new("gone", "Old", "Record");
        gone.is_deleted = true;
        dir.upsert(gone);

        let ids: BTreeSet<String> = ["alive", "gone", "ghost"].iter().map(|s| s.to_string()).collect();
        let people = PersonResolver::resolve(&dir, ids).unwrap();

        assert!(!people.summary("alive").is_placeholder);
        assert!(people.summary("gone").is_placeholder);
        let ghost = people.summary("ghost");
        assert!(ghost.is_placeholder);
        assert_eq!(ghost.display_name, "Unknown person");
    }

    #[test]
    fn test_path_view_serializes_with_status_tag() {
        let dir = InMemoryDirectory::new();
        let people = PersonResolver::resolve(&dir, BTreeSet::new()).unwrap();
        let outcome = PathOutcome::Unrelated { reason: UnrelatedReason::Disconnected };

        let view = path_view("a", "b", &outcome, &people);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["result"]["status"], "unrelated");
        assert_eq!(json["result"]["reason"], "disconnected");
        assert_eq!(json["personA"]["isPlaceholder"], true);
    }
}
