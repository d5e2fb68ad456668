//! Shortest relationship path between two people
//!
//! Parent-child edges (walked in both directions) and partnerships form one
//! undirected graph. Breadth-first search finds the path with the fewest
//! edges, bounded by a hop limit; the shape of that path names the
//! relationship.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::guard::TraversalGuard;
use super::view::GraphView;
use crate::db::models::EdgeId;
use crate::error::GraphError;

/// How `from` relates to `to` across one edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathRole {
    /// `to` is a parent of `from`
    ChildOf,
    /// `to` is a child of `from`
    ParentOf,
    PartnerOf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub from: String,
    pub to: String,
    pub edge_id: EdgeId,
    pub role: PathRole,
}

/// What person B is to person A
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Relationship {
    SamePerson,
    Ancestor { generations: u32 },
    Descendant { generations: u32 },
    Sibling,
    AuntOrUncle { greats: u32 },
    NieceOrNephew { greats: u32 },
    Cousin { degree: u32, removed: u32 },
    CoParent,
    BloodRelative { hops: u32 },
    Partner,
    ParentInLaw,
    ChildInLaw,
    SiblingInLaw,
    StepParent,
    StepChild,
    RelativeByMarriage { hops: u32 },
}

impl Relationship {
    /// Related through at least one partnership
    pub fn is_affinity(&self) -> bool {
        matches!(
            self,
            Relationship::Partner
                | Relationship::ParentInLaw
                | Relationship::ChildInLaw
                | Relationship::SiblingInLaw
                | Relationship::StepParent
                | Relationship::StepChild
                | Relationship::RelativeByMarriage { .. }
        )
    }

    /// Human-readable name, e.g. "great-grandparent" or "second cousin once removed"
    pub fn label(&self) -> String {
        match *self {
            Relationship::SamePerson => "self".to_string(),
            Relationship::Ancestor { generations } => lineal(generations, "parent"),
            Relationship::Descendant { generations } => lineal(generations, "child"),
            Relationship::Sibling => "sibling".to_string(),
            Relationship::AuntOrUncle { greats } => format!("{}aunt/uncle", greats_prefix(greats)),
            Relationship::NieceOrNephew { greats } => format!("{}niece/nephew", greats_prefix(greats)),
            Relationship::Cousin { degree, removed } => {
                let base = format!("{} cousin", ordinal(degree));
                match removed {
                    0 => base,
                    1 => format!("{} once removed", base),
                    2 => format!("{} twice removed", base),
                    n => format!("{} {} times removed", base, n),
                }
            }
            Relationship::CoParent => "co-parent".to_string(),
            Relationship::BloodRelative { .. } => "blood relative".to_string(),
            Relationship::Partner => "partner".to_string(),
            Relationship::ParentInLaw => "parent-in-law".to_string(),
            Relationship::ChildInLaw => "child-in-law".to_string(),
            Relationship::SiblingInLaw => "sibling-in-law".to_string(),
            Relationship::StepParent => "step-parent".to_string(),
            Relationship::StepChild => "step-child".to_string(),
            Relationship::RelativeByMarriage { .. } => "relative by marriage".to_string(),
        }
    }
}

fn lineal(generations: u32, base: &str) -> String {
    match generations {
        0 => "self".to_string(),
        1 => base.to_string(),
        2 => format!("grand{}", base),
        3 => format!("great-grand{}", base),
        n => format!("{}x great-grand{}", n - 2, base),
    }
}

fn greats_prefix(greats: u32) -> String {
    match greats {
        0 => String::new(),
        1 => "great-".to_string(),
        n => format!("{}x great-", n),
    }
}

fn ordinal(n: u32) -> String {
    match n {
        1 => "first".to_string(),
        2 => "second".to_string(),
        3 => "third".to_string(),
        4 => "fourth".to_string(),
        5 => "fifth".to_string(),
        n => format!("{}th", n),
    }
}

/// Name the relationship of the path's last person to its first
pub fn classify(steps: &[PathStep]) -> Relationship {
    use PathRole::*;

    let roles: Vec<PathRole> = steps.iter().map(|s| s.role).collect();
    let hops = roles.len() as u32;

    if roles.contains(&PartnerOf) {
        return match roles.as_slice() {
            [PartnerOf] => Relationship::Partner,
            [PartnerOf, ChildOf] => Relationship::ParentInLaw,
            [ParentOf, PartnerOf] => Relationship::ChildInLaw,
            [ChildOf, PartnerOf] => Relationship::StepParent,
            [PartnerOf, ParentOf] => Relationship::StepChild,
            [ChildOf, ParentOf, PartnerOf] | [PartnerOf, ChildOf, ParentOf] => Relationship::SiblingInLaw,
            _ => Relationship::RelativeByMarriage { hops },
        };
    }

    // Blood paths of the form up^a down^d
    let up = roles.iter().take_while(|r| **r == ChildOf).count() as u32;
    let down = roles[up as usize..].iter().take_while(|r| **r == ParentOf).count() as u32;

    if up + down != hops {
        return match roles.as_slice() {
            [ParentOf, ChildOf] => Relationship::CoParent,
            _ => Relationship::BloodRelative { hops },
        };
    }

    match (up, down) {
        (0, 0) => Relationship::SamePerson,
        (a, 0) => Relationship::Ancestor { generations: a },
        (0, d) => Relationship::Descendant { generations: d },
        (1, 1) => Relationship::Sibling,
        (a, 1) => Relationship::AuntOrUncle { greats: a - 2 },
        (1, d) => Relationship::NieceOrNephew { greats: d - 2 },
        (a, d) => Relationship::Cousin { degree: a.min(d) - 1, removed: a.abs_diff(d) },
    }
}

/// Why no path was returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnrelatedReason {
    /// The two people sit in different connected components
    Disconnected,
    /// The search stopped at the hop limit with people still unexplored.
    /// `to` has edges of its own, but whether they lead back to `from` is unknown.
    HopLimitExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOutcome {
    Related {
        steps: Vec<PathStep>,
        relationship: Relationship,
    },
    Unrelated {
        reason: UnrelatedReason,
    },
}

impl PathOutcome {
    pub fn is_related(&self) -> bool {
        matches!(self, PathOutcome::Related { .. })
    }

    pub fn relationship(&self) -> Option<Relationship> {
        match self {
            PathOutcome::Related { relationship, .. } => Some(*relationship),
            PathOutcome::Unrelated { .. } => None,
        }
    }
}

fn neighbours<G: GraphView + ?Sized>(graph: &G, person_id: &str) -> Result<Vec<(String, EdgeId, PathRole)>, GraphError> {
    let mut out = Vec::new();
    for link in graph.parents_of(person_id)? {
        out.push((link.person_id, link.edge_id, PathRole::ChildOf));
    }
    for link in graph.children_of(person_id)? {
        out.push((link.person_id, link.edge_id, PathRole::ParentOf));
    }
    for link in graph.partners_of(person_id)? {
        out.push((link.person_id, link.edge_id, PathRole::PartnerOf));
    }
    Ok(out)
}

/// Breadth-first shortest path from `from` to `to`, at most `max_hops` edges
pub fn shortest_path<G: GraphView + ?Sized>(
    graph: &G,
    from: &str,
    to: &str,
    max_hops: u32,
    guard: &TraversalGuard,
) -> Result<PathOutcome, GraphError> {
    if from == to {
        return Ok(PathOutcome::Related {
            steps: Vec::new(),
            relationship: Relationship::SamePerson,
        });
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut came_from: HashMap<String, PathStep> = HashMap::new();
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();
    let mut hop_limited = false;

    visited.insert(from.to_string());
    queue.push_back((from.to_string(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        guard.step()?;
        let next = neighbours(graph, &current)?;

        if depth >= max_hops {
            hop_limited |= next.iter().any(|(id, _, _)| !visited.contains(id));
            continue;
        }

        for (person_id, edge_id, role) in next {
            if !visited.insert(person_id.clone()) {
                continue;
            }
            came_from.insert(
                person_id.clone(),
                PathStep { from: current.clone(), to: person_id.clone(), edge_id, role },
            );

            if person_id == to {
                let steps = unwind(&came_from, from, to);
                let relationship = classify(&steps);
                return Ok(PathOutcome::Related { steps, relationship });
            }

            queue.push_back((person_id, depth + 1));
        }
    }

    // A person with no edges cannot be in `from`'s component
    let reason = if hop_limited && !neighbours(graph, to)?.is_empty() {
        UnrelatedReason::HopLimitExceeded
    } else {
        UnrelatedReason::Disconnected
    };
    Ok(PathOutcome::Unrelated { reason })
}

fn unwind(came_from: &HashMap<String, PathStep>, from: &str, to: &str) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut cursor = to;
    while cursor != from {
        match came_from.get(cursor) {
            Some(step) => {
                steps.push(step.clone());
                cursor = &step.from;
            }
            None => break,
        }
    }
    steps.reverse();
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ParentChildType, PartnershipType};
    use crate::graph::view::GraphSnapshot;

    fn bio() -> ParentChildType {
        ParentChildType::Biological
    }

    fn scenario() -> GraphSnapshot {
        let mut graph = GraphSnapshot::new();
        graph.add_parent_child(1, "A", "B", bio());
        graph.add_parent_child(2, "A", "C", bio());
        graph.add_partnership(3, "B", "D", PartnershipType::Married);
        graph
    }

    fn path(graph: &GraphSnapshot, a: &str, b: &str) -> PathOutcome {
        shortest_path(graph, a, b, 16, &TraversalGuard::unbounded()).unwrap()
    }

    #[test]
    fn test_self_path_is_empty() {
        let graph = scenario();
        assert_eq!(
            path(&graph, "B", "B"),
            PathOutcome::Related { steps: vec![], relationship: Relationship::SamePerson }
        );
    }

    #[test]
    fn test_scenario_sibling_and_partner() {
        let graph = scenario();

        match path(&graph, "B", "C") {
            PathOutcome::Related { steps, relationship } => {
                assert_eq!(relationship, Relationship::Sibling);
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[0].to, "A");
                assert_eq!(steps[0].role, PathRole::ChildOf);
                assert_eq!(steps[1].role, PathRole::ParentOf);
            }
            other => panic!("expected sibling, got {:?}", other),
        }

        assert_eq!(path(&graph, "B", "D").relationship(), Some(Relationship::Partner));
        assert_eq!(path(&graph, "D", "A").relationship(), Some(Relationship::ParentInLaw));
        assert_eq!(path(&graph, "C", "D").relationship(), Some(Relationship::SiblingInLaw));
    }

    #[test]
    fn test_disconnected_is_not_an_error() {
        let mut graph = scenario();
        graph.add_parent_child(9, "X", "Y", bio());

        assert_eq!(
            path(&graph, "B", "Y"),
            PathOutcome::Unrelated { reason: UnrelatedReason::Disconnected }
        );
        assert_eq!(
            path(&graph, "B", "nobody"),
            PathOutcome::Unrelated { reason: UnrelatedReason::Disconnected }
        );
    }

    #[test]
    fn test_hop_limit() {
        let mut graph = GraphSnapshot::new();
        graph.add_parent_child(1, "g3", "g2", bio());
        graph.add_parent_child(2, "g2", "g1", bio());
        graph.add_parent_child(3, "g1", "me", bio());

        let outcome = shortest_path(&graph, "me", "g3", 2, &TraversalGuard::unbounded()).unwrap();
        assert_eq!(outcome, PathOutcome::Unrelated { reason: UnrelatedReason::HopLimitExceeded });

        let outcome = shortest_path(&graph, "me", "g3", 3, &TraversalGuard::unbounded()).unwrap();
        assert_eq!(outcome.relationship(), Some(Relationship::Ancestor { generations: 3 }));
        assert_eq!(outcome.relationship().unwrap().label(), "great-grandparent");
    }

    #[test]
    fn test_hop_limit_with_edgeless_target_is_disconnected() {
        let mut graph = GraphSnapshot::new();
        graph.add_parent_child(1, "g3", "g2", bio());
        graph.add_parent_child(2, "g2", "g1", bio());
        graph.add_parent_child(3, "g1", "me", bio());

        let outcome = shortest_path(&graph, "me", "loner", 2, &TraversalGuard::unbounded()).unwrap();
        assert_eq!(outcome, PathOutcome::Unrelated { reason: UnrelatedReason::Disconnected });

        let steps = match path(&graph, "me", "g3") {
            PathOutcome::Related { steps, .. } => steps,
            other => panic!("expected ancestor, got {:?}", other),
        };
        let roles = serde_json::to_value(steps.iter().map(|s| s.role).collect::<Vec<_>>()).unwrap();
        assert_eq!(roles, serde_json::json!(["child-of", "child-of", "child-of"]));
    }

    #[test]
    fn test_cousins() {
        let mut graph = GraphSnapshot::new();
        graph.add_parent_child(1, "G", "P1", bio());
        graph.add_parent_child(2, "G", "P2", bio());
        graph.add_parent_child(3, "P1", "C1", bio());
        graph.add_parent_child(4, "P2", "C2", bio());
        graph.add_parent_child(5, "C2", "K2", bio());

        let first = path(&graph, "C1", "C2").relationship().unwrap();
        assert_eq!(first, Relationship::Cousin { degree: 1, removed: 0 });
        assert_eq!(first.label(), "first cousin");

        let removed = path(&graph, "C1", "K2").relationship().unwrap();
        assert_eq!(removed, Relationship::Cousin { degree: 1, removed: 1 });
        assert_eq!(removed.label(), "first cousin once removed");

        assert_eq!(path(&graph, "C1", "P2").relationship(), Some(Relationship::AuntOrUncle { greats: 0 }));
        assert_eq!(path(&graph, "P2", "C1").relationship(), Some(Relationship::NieceOrNephew { greats: 0 }));
        assert_eq!(path(&graph, "G", "K2").relationship().unwrap().label(), "great-grandchild");
    }

    #[test]
    fn test_step_relations_and_co_parent() {
        let mut graph = GraphSnapshot::new();
        graph.add_parent_child(1, "mum", "kid", bio());
        graph.add_parent_child(2, "dad", "kid", bio());
        graph.add_partnership(3, "mum", "stepdad", PartnershipType::Married);

        assert_eq!(path(&graph, "kid", "stepdad").relationship(), Some(Relationship::StepParent));
        assert_eq!(path(&graph, "stepdad", "kid").relationship(), Some(Relationship::StepChild));
        assert_eq!(path(&graph, "mum", "dad").relationship(), Some(Relationship::CoParent));
        assert!(Relationship::StepParent.is_affinity());
        assert!(!Relationship::CoParent.is_affinity());
    }

    #[test]
    fn test_terminates_on_corrupt_cycle() {
        let mut graph = GraphSnapshot::new();
        graph.add_parent_child(1, "x", "y", bio());
        graph.add_parent_child(2, "y", "x", bio());

        assert_eq!(
            path(&graph, "x", "z"),
            PathOutcome::Unrelated { reason: UnrelatedReason::Disconnected }
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(Relationship::Ancestor { generations: 5 }.label(), "3x great-grandparent");
        assert_eq!(Relationship::AuntOrUncle { greats: 1 }.label(), "great-aunt/uncle");
        assert_eq!(Relationship::Cousin { degree: 2, removed: 3 }.label(), "second cousin 3 times removed");
        assert_eq!(Relationship::Descendant { generations: 1 }.label(), "child");
    }
}
