//! Edge models stored in the graph database
//!
//! Timestamps and dates are kept as TEXT (ISO 8601) the same way they are
//! written to SQLite.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GraphError;

/// Repository-assigned edge identifier; strictly increasing, so lower is older
pub type EdgeId = i64;

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Validate an optional `YYYY-MM-DD` date
pub fn parse_date(field: &str, value: Option<&str>) -> Result<Option<chrono::NaiveDate>, GraphError> {
    match value {
        None => Ok(None),
        Some(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| GraphError::InvalidInput(format!("{} '{}' is not a YYYY-MM-DD date: {}", field, s, e))),
    }
}

// ============================================================================
// Relationship Types
// ============================================================================

/// Kind of parent-child link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentChildType {
    Biological,
    Adoptive,
    Step,
    Foster,
    Guardian,
}

impl ParentChildType {
    pub const ALL: [ParentChildType; 5] = [
        ParentChildType::Biological,
        ParentChildType::Adoptive,
        ParentChildType::Step,
        ParentChildType::Foster,
        ParentChildType::Guardian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParentChildType::Biological => "biological",
            ParentChildType::Adoptive => "adoptive",
            ParentChildType::Step => "step",
            ParentChildType::Foster => "foster",
            ParentChildType::Guardian => "guardian",
        }
    }
}

impl FromStr for ParentChildType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GraphError::InvalidInput(format!("relationship_type '{}' is not valid", s)))
    }
}

impl fmt::Display for ParentChildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of partnership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnershipType {
    Married,
    CivilUnion,
    Partner,
    Engaged,
    Divorced,
    Separated,
    Widowed,
}

impl PartnershipType {
    pub const ALL: [PartnershipType; 7] = [
        PartnershipType::Married,
        PartnershipType::CivilUnion,
        PartnershipType::Partner,
        PartnershipType::Engaged,
        PartnershipType::Divorced,
        PartnershipType::Separated,
        PartnershipType::Widowed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartnershipType::Married => "married",
            PartnershipType::CivilUnion => "civil_union",
            PartnershipType::Partner => "partner",
            PartnershipType::Engaged => "engaged",
            PartnershipType::Divorced => "divorced",
            PartnershipType::Separated => "separated",
            PartnershipType::Widowed => "widowed",
        }
    }
}

impl FromStr for PartnershipType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GraphError::InvalidInput(format!("partnership_type '{}' is not valid", s)))
    }
}

impl fmt::Display for PartnershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Edges
// ============================================================================

/// Directed parent -> child edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentChildEdge {
    pub id: EdgeId,
    pub parent_person_id: String,
    pub child_person_id: String,
    pub relationship_type: ParentChildType,
    pub notes: Option<String>,
    pub confidence_score: Option<f64>,
    pub is_verified: bool,
    pub verified_at: Option<String>,
    pub verified_by: Option<String>,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Undirected partnership edge; (a, b) and (b, a) denote the same pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnershipEdge {
    pub id: EdgeId,
    pub person_a_id: String,
    pub person_b_id: String,
    pub partnership_type: PartnershipType,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl PartnershipEdge {
    /// The endpoint opposite `person_id`, if the edge touches it
    pub fn other(&self, person_id: &str) -> Option<&str> {
        if self.person_a_id == person_id {
            Some(&self.person_b_id)
        } else if self.person_b_id == person_id {
            Some(&self.person_a_id)
        } else {
            None
        }
    }

    pub fn pair_key(&self) -> PairKey {
        PairKey::new(&self.person_a_id, &self.person_b_id)
    }
}

/// Canonical unordered pair `(min, max)` used for partnership uniqueness
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub low: String,
    pub high: String,
}

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self { low: a.to_string(), high: b.to_string() }
        } else {
            Self { low: b.to_string(), high: a.to_string() }
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Input for creating a parent-child edge
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParentChildInput {
    pub parent_person_id: String,
    pub child_person_id: String,
    #[serde(default = "default_parent_child_type")]
    pub relationship_type: ParentChildType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
}

fn default_parent_child_type() -> ParentChildType { ParentChildType::Biological }

impl CreateParentChildInput {
    pub fn new(parent: impl Into<String>, child: impl Into<String>, relationship_type: ParentChildType) -> Self {
        Self {
            parent_person_id: parent.into(),
            child_person_id: child.into(),
            relationship_type,
            notes: None,
            confidence_score: None,
        }
    }
}

/// Input for creating a partnership edge
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartnershipInput {
    pub person_a_id: String,
    pub person_b_id: String,
    #[serde(default = "default_partnership_type")]
    pub partnership_type: PartnershipType,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

fn default_partnership_type() -> PartnershipType { PartnershipType::Married }

impl CreatePartnershipInput {
    pub fn new(a: impl Into<String>, b: impl Into<String>, partnership_type: PartnershipType) -> Self {
        Self {
            person_a_id: a.into(),
            person_b_id: b.into(),
            partnership_type,
            start_date: None,
            end_date: None,
        }
    }
}

/// Attribute changes for a parent-child edge; endpoints are immutable
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentChildPatch {
    pub relationship_type: Option<ParentChildType>,
    /// `Some(None)` clears the notes
    pub notes: Option<Option<String>>,
    pub confidence_score: Option<Option<f64>>,
}

/// Attribute changes for a partnership edge; endpoints are immutable
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnershipPatch {
    pub partnership_type: Option<PartnershipType>,
    pub start_date: Option<Option<String>>,
    pub end_date: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(PairKey::new("b", "a"), PairKey::new("a", "b"));
        assert_eq!(PairKey::new("b", "a").low, "a");
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!("adoptive".parse::<ParentChildType>().unwrap(), ParentChildType::Adoptive);
        assert_eq!("civil_union".parse::<PartnershipType>().unwrap(), PartnershipType::CivilUnion);
        assert!("cousin".parse::<ParentChildType>().is_err());
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("start_date", Some("1901-02-30")).is_err());
        assert_eq!(
            parse_date("start_date", Some("1901-02-28")).unwrap(),
            chrono::NaiveDate::from_ymd_opt(1901, 2, 28)
        );
        assert_eq!(parse_date("start_date", None).unwrap(), None);
    }
}
