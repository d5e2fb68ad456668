//! Person directory and actor links
//!
//! Person records are owned elsewhere; the graph only reads them. The
//! in-memory implementation backs embedding and tests.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Person record as exposed by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub date_of_death: Option<String>,
    #[serde(default)]
    pub is_deceased: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Person {
    pub fn new(id: impl Into<String>, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth: None,
            date_of_death: None,
            is_deceased: false,
            is_deleted: false,
        }
    }

    pub fn display_name(&self) -> String {
        match (self.first_name.trim(), self.last_name.trim()) {
            ("", "") => self.id.clone(),
            (first, "") => first.to_string(),
            ("", last) => last.to_string(),
            (first, last) => format!("{} {}", first, last),
        }
    }
}

/// Read access to person records
pub trait PersonDirectory: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<Person>, GraphError>;

    /// Bulk lookup; ids that do not resolve are simply absent from the map
    fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Person>, GraphError>;
}

/// Maps an acting identity (account) to the person it represents
pub trait ActorLinks: Send + Sync {
    fn linked_person(&self, actor_id: &str) -> Result<Option<String>, GraphError>;
}

/// Concurrent in-memory directory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    persons: DashMap<String, Person>,
    actor_links: DashMap<String, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, person: Person) {
        self.persons.insert(person.id.clone(), person);
    }

    /// Flag a person deleted; the record stays but no longer resolves
    pub fn mark_deleted(&self, id: &str) -> bool {
        match self.persons.get_mut(id) {
            Some(mut person) => {
                person.is_deleted = true;
                true
            }
            None => false,
        }
    }

    pub fn link_actor(&self, actor_id: impl Into<String>, person_id: impl Into<String>) {
        self.actor_links.insert(actor_id.into(), person_id.into());
    }
}

impl PersonDirectory for InMemoryDirectory {
    fn get_by_id(&self, id: &str) -> Result<Option<Person>, GraphError> {
        Ok(self.persons.get(id).map(|p| p.value().clone()))
    }

    fn get_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Person>, GraphError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.persons.get(id).map(|p| (id.clone(), p.value().clone())))
            .collect())
    }
}

impl ActorLinks for InMemoryDirectory {
    fn linked_person(&self, actor_id: &str) -> Result<Option<String>, GraphError> {
        Ok(self.actor_links.get(actor_id).map(|p| p.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_lookup_skips_unknown() {
        let dir = InMemoryDirectory::new();
        dir.upsert(Person::new("p1", "Ada", "Lovelace"));

        let found = dir.get_by_ids(&["p1".to_string(), "ghost".to_string()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["p1"].display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_mark_deleted_keeps_record() {
        let dir = InMemoryDirectory::new();
        dir.upsert(Person::new("p1", "Ada", ""));
        assert!(dir.mark_deleted("p1"));
        assert!(!dir.mark_deleted("p2"));
        assert!(dir.get_by_id("p1").unwrap().unwrap().is_deleted);
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(Person::new("p9", " ", "").display_name(), "p9");
        assert_eq!(Person::new("p9", "Ada", "").display_name(), "Ada");
    }

    #[test]
    fn test_actor_links() {
        let dir = InMemoryDirectory::new();
        dir.link_actor("account-1", "p1");
        assert_eq!(dir.linked_person("account-1").unwrap().as_deref(), Some("p1"));
        assert_eq!(dir.linked_person("account-2").unwrap(), None);
    }
}
