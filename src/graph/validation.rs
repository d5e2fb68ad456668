//! Structural checks for edge mutations
//!
//! `validate` is a pure function over a [`GraphView`]; it never writes.
//! Callers that commit the edge must hold the writer critical section for the
//! whole validate-then-insert sequence.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use thiserror::Error;

use super::view::GraphView;
use crate::db::models::{EdgeId, ParentChildType};
use crate::error::GraphError;

/// Why a mutation was refused
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum Rejection {
    #[error("person {person_id} cannot be related to themselves")]
    SelfRelation { person_id: String },

    #[error("an equivalent edge already exists (id {existing_id})")]
    DuplicateEdge { existing_id: EdgeId },

    /// `chain` runs from the proposed parent up to the proposed child
    #[error("edge would make a person their own ancestor: {}", chain.join(" -> "))]
    CycleDetected { chain: Vec<String> },

    #[error("{child_id} already has {limit} biological parents")]
    TooManyParents { child_id: String, limit: usize },
}

impl Rejection {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::SelfRelation { .. } => "SELF_RELATION",
            Rejection::DuplicateEdge { .. } => "DUPLICATE_EDGE",
            Rejection::CycleDetected { .. } => "CYCLE_DETECTED",
            Rejection::TooManyParents { .. } => "TOO_MANY_PARENTS",
        }
    }
}

/// Edge proposed for insertion
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    ParentChild {
        parent_id: &'a str,
        child_id: &'a str,
        relationship_type: ParentChildType,
    },
    Partnership {
        a: &'a str,
        b: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

impl Verdict {
    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Verdict::Accepted => Ok(()),
            Verdict::Rejected(r) => Err(r),
        }
    }
}

/// Tunable limits applied during validation
#[derive(Debug, Clone, Copy)]
pub struct ValidationRules {
    pub max_biological_parents: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self { max_biological_parents: 2 }
    }
}

/// Check a candidate edge against the current graph
pub fn validate<G: GraphView + ?Sized>(
    candidate: Candidate<'_>,
    graph: &G,
    rules: &ValidationRules,
) -> Result<Verdict, GraphError> {
    match candidate {
        Candidate::ParentChild { parent_id, child_id, relationship_type } => {
            if parent_id == child_id {
                return Ok(Verdict::Rejected(Rejection::SelfRelation { person_id: parent_id.to_string() }));
            }

            if let Some(existing_id) = graph.parent_child_between(parent_id, child_id)? {
                return Ok(Verdict::Rejected(Rejection::DuplicateEdge { existing_id }));
            }

            if let Some(chain) = ancestor_chain(graph, parent_id, child_id)? {
                return Ok(Verdict::Rejected(Rejection::CycleDetected { chain }));
            }

            if relationship_type == ParentChildType::Biological {
                if let Some(rejection) = check_parent_capacity(graph, child_id, rules)? {
                    return Ok(Verdict::Rejected(rejection));
                }
            }

            Ok(Verdict::Accepted)
        }
        Candidate::Partnership { a, b } => {
            if a == b {
                return Ok(Verdict::Rejected(Rejection::SelfRelation { person_id: a.to_string() }));
            }

            if let Some(existing_id) = graph.partnership_between(a, b)? {
                return Ok(Verdict::Rejected(Rejection::DuplicateEdge { existing_id }));
            }

            Ok(Verdict::Accepted)
        }
    }
}

/// Rejection when `child_id` cannot take another biological parent
pub fn check_parent_capacity<G: GraphView + ?Sized>(
    graph: &G,
    child_id: &str,
    rules: &ValidationRules,
) -> Result<Option<Rejection>, GraphError> {
    let biological = graph
        .parents_of(child_id)?
        .iter()
        .filter(|l| l.parent_child_type() == Some(ParentChildType::Biological))
        .count();
    if biological >= rules.max_biological_parents {
        return Ok(Some(Rejection::TooManyParents {
            child_id: child_id.to_string(),
            limit: rules.max_biological_parents,
        }));
    }
    Ok(None)
}

/// Upward search from `start` through recorded parents looking for `target`.
///
/// A new edge parent -> child closes a cycle exactly when the child is already
/// an ancestor of the parent, so the search starts at the proposed parent.
/// Returns the chain `start, .., target` when found. The visited set bounds
/// the search even if the stored graph is already inconsistent.
pub fn ancestor_chain<G: GraphView + ?Sized>(
    graph: &G,
    start: &str,
    target: &str,
) -> Result<Option<Vec<String>>, GraphError> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut came_from: HashMap<String, String> = HashMap::new();
    let mut frontier: VecDeque<String> = VecDeque::new();

    visited.insert(start.to_string());
    frontier.push_back(start.to_string());

    while let Some(current) = frontier.pop_front() {
        for link in graph.parents_of(&current)? {
            if !visited.insert(link.person_id.clone()) {
                continue;
            }
            came_from.insert(link.person_id.clone(), current.clone());

            if link.person_id == target {
                let mut chain = vec![link.person_id];
                while let Some(prev) = came_from.get(chain.last().map(String::as_str).unwrap_or_default()) {
                    chain.push(prev.clone());
                }
                chain.reverse();
                return Ok(Some(chain));
            }

            frontier.push_back(link.person_id);
        }
    }

    Ok(None)
}
