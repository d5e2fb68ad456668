//! Graph algorithms over the relationship edges
//!
//! - `view`: the `GraphView` trait and the in-memory `GraphSnapshot`
//! - `validation`: structural checks run before an edge is committed
//! - `traversal`: pedigree, descendant and mini tree builders
//! - `path`: shortest relationship path and its name
//! - `guard`: deadline and cancellation shared by the traversals
//!
//! Nothing here touches the database directly; everything reads through
//! `GraphView`.

pub mod guard;
pub mod path;
pub mod traversal;
pub mod validation;
pub mod view;

pub use guard::{CancelFlag, TraversalGuard};
pub use path::{PathOutcome, PathRole, PathStep, Relationship, UnrelatedReason};
pub use traversal::{DescendantNode, MiniTree, PartnerRef, PedigreeNode, SiblingRef, TreeBuild};
pub use validation::{Candidate, Rejection, ValidationRules, Verdict};
pub use view::{GraphSnapshot, GraphView, Link, LinkKind};
