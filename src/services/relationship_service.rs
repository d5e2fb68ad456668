//! Relationship service - edge mutations and listings
//!
//! Wraps the edge repository with field validation, person existence checks,
//! structural validation and event emission. Every write validates and
//! commits inside one writer transaction.

use std::collections::BTreeSet;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::models::{
    parse_date, CreateParentChildInput, CreatePartnershipInput, EdgeId, ParentChildEdge, ParentChildPatch,
    ParentChildType, PartnershipEdge, PartnershipPatch,
};
use crate::db::{parent_child, partnerships, ConnView, DbStats, GraphDb};
use crate::directory::PersonDirectory;
use crate::error::GraphError;
use crate::graph::validation::{check_parent_capacity, validate, Candidate, ValidationRules};

use super::events::{EventBus, GraphEvent};

/// Relationship service for parent-child and partnership edges
pub struct RelationshipService {
    db: Arc<GraphDb>,
    directory: Arc<dyn PersonDirectory>,
    events: Arc<EventBus>,
    rules: ValidationRules,
}

impl RelationshipService {
    pub fn new(
        db: Arc<GraphDb>,
        directory: Arc<dyn PersonDirectory>,
        events: Arc<EventBus>,
        rules: ValidationRules,
    ) -> Self {
        Self { db, directory, events, rules }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub fn get_parent_child(&self, id: EdgeId) -> Result<Option<ParentChildEdge>, GraphError> {
        self.db.with_conn(|conn| parent_child::get_parent_child(conn, id))
    }

    pub fn get_partnership(&self, id: EdgeId) -> Result<Option<PartnershipEdge>, GraphError> {
        self.db.with_conn(|conn| partnerships::get_partnership(conn, id))
    }

    /// Active edges naming `person_id` as the child
    pub fn parents_of(&self, person_id: &str) -> Result<Vec<ParentChildEdge>, GraphError> {
        self.db.with_conn(|conn| parent_child::list_parents_of(conn, person_id))
    }

    /// Active edges naming `person_id` as the parent
    pub fn children_of(&self, person_id: &str) -> Result<Vec<ParentChildEdge>, GraphError> {
        self.db.with_conn(|conn| parent_child::list_children_of(conn, person_id))
    }

    pub fn partnerships_of(&self, person_id: &str) -> Result<Vec<PartnershipEdge>, GraphError> {
        self.db.with_conn(|conn| partnerships::list_partnerships_of(conn, person_id))
    }

    pub fn stats(&self) -> Result<DbStats, GraphError> {
        self.db.stats()
    }

    // =========================================================================
    // Parent-child writes
    // =========================================================================

    /// Create a parent-child edge with validation
    pub fn create_parent_child(&self, input: CreateParentChildInput) -> Result<ParentChildEdge, GraphError> {
        validate_parent_child_input(&input)?;
        self.ensure_persons_exist([input.parent_person_id.as_str(), input.child_person_id.as_str()])?;

        let result = self.db.with_write_tx(|tx| self.insert_parent_child(tx, &input));
        let edge = self.observe(result)?;

        debug!(id = edge.id, parent = %edge.parent_person_id, child = %edge.child_person_id, "Parent-child edge committed");
        self.events.emit(GraphEvent::ParentChildCreated {
            id: edge.id,
            parent_id: edge.parent_person_id.clone(),
            child_id: edge.child_person_id.clone(),
            relationship_type: edge.relationship_type.to_string(),
        });

        Ok(edge)
    }

    /// Create a batch of parent-child edges (for imports)
    ///
    /// Each item is validated against the graph including the earlier items
    /// of the batch. The first failure rolls the whole batch back.
    pub fn bulk_create_parent_child(
        &self,
        inputs: Vec<CreateParentChildInput>,
    ) -> Result<Vec<ParentChildEdge>, GraphError> {
        for (i, input) in inputs.iter().enumerate() {
            validate_parent_child_input(input).map_err(|e| match e {
                GraphError::InvalidInput(msg) => GraphError::InvalidInput(format!("item[{}]: {}", i, msg)),
                other => other,
            })?;
        }
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        self.ensure_persons_exist(
            inputs
                .iter()
                .flat_map(|i| [i.parent_person_id.as_str(), i.child_person_id.as_str()]),
        )?;

        let result = self.db.with_write_tx(|tx| {
            let mut created = Vec::with_capacity(inputs.len());
            for (i, input) in inputs.iter().enumerate() {
                let edge = self.insert_parent_child(tx, input).inspect_err(|e| {
                    debug!(item = i, error = %e, "Bulk parent-child import aborted");
                })?;
                created.push(edge);
            }
            Ok(created)
        });
        let created = self.observe(result)?;

        info!(count = created.len(), "Bulk parent-child import committed");
        self.events.emit(GraphEvent::ParentChildBulkCreated { count: created.len() });

        Ok(created)
    }

    /// Change type, notes or confidence of an edge
    pub fn update_parent_child(&self, id: EdgeId, patch: ParentChildPatch) -> Result<ParentChildEdge, GraphError> {
        validate_confidence(patch.confidence_score.flatten())?;

        let result = self.db.with_write_tx(|tx| {
            let existing = parent_child::get_parent_child(tx, id)?.ok_or_else(|| parent_child_not_found(id))?;

            // Becoming biological must respect the per-child limit
            if patch.relationship_type == Some(ParentChildType::Biological)
                && existing.relationship_type != ParentChildType::Biological
            {
                if let Some(rejection) = check_parent_capacity(&ConnView::new(tx), &existing.child_person_id, &self.rules)? {
                    return Err(rejection.into());
                }
            }

            parent_child::update_parent_child(tx, id, &patch)?.ok_or_else(|| parent_child_not_found(id))
        });
        let edge = self.observe(result)?;

        self.events.emit(GraphEvent::ParentChildUpdated { id });
        Ok(edge)
    }

    /// Record who confirmed an edge
    pub fn verify_parent_child(&self, id: EdgeId, verified_by: &str) -> Result<ParentChildEdge, GraphError> {
        require_id("verified_by", verified_by)?;

        let edge = self
            .db
            .with_write_tx(|tx| parent_child::verify_parent_child(tx, id, verified_by))?
            .ok_or_else(|| parent_child_not_found(id))?;

        self.events.emit(GraphEvent::ParentChildVerified { id, verified_by: verified_by.to_string() });
        Ok(edge)
    }

    pub fn delete_parent_child(&self, id: EdgeId) -> Result<(), GraphError> {
        let deleted = self.db.with_write_tx(|tx| parent_child::soft_delete_parent_child(tx, id))?;
        if !deleted {
            return Err(parent_child_not_found(id));
        }

        debug!(id, "Parent-child edge deleted");
        self.events.emit(GraphEvent::ParentChildDeleted { id });
        Ok(())
    }

    // =========================================================================
    // Partnership writes
    // =========================================================================

    /// Create a partnership with validation
    pub fn create_partnership(&self, input: CreatePartnershipInput) -> Result<PartnershipEdge, GraphError> {
        require_id("person_a_id", &input.person_a_id)?;
        require_id("person_b_id", &input.person_b_id)?;
        validate_dates(input.start_date.as_deref(), input.end_date.as_deref())?;
        self.ensure_persons_exist([input.person_a_id.as_str(), input.person_b_id.as_str()])?;

        let result = self.db.with_write_tx(|tx| {
            let candidate = Candidate::Partnership { a: &input.person_a_id, b: &input.person_b_id };
            validate(candidate, &ConnView::new(tx), &self.rules)?.into_result()?;
            partnerships::insert_partnership(tx, &input)
        });
        let edge = self.observe(result)?;

        debug!(id = edge.id, a = %edge.person_a_id, b = %edge.person_b_id, "Partnership committed");
        self.events.emit(GraphEvent::PartnershipCreated {
            id: edge.id,
            person_a_id: edge.person_a_id.clone(),
            person_b_id: edge.person_b_id.clone(),
            partnership_type: edge.partnership_type.to_string(),
        });

        Ok(edge)
    }

    /// Change type or dates of a partnership
    pub fn update_partnership(&self, id: EdgeId, patch: PartnershipPatch) -> Result<PartnershipEdge, GraphError> {
        let edge = self.db.with_write_tx(|tx| {
            let existing = partnerships::get_partnership(tx, id)?.ok_or_else(|| partnership_not_found(id))?;
            let patched = partnerships::apply_patch(existing, &patch);
            validate_dates(patched.start_date.as_deref(), patched.end_date.as_deref())?;

            partnerships::update_partnership(tx, id, &patch)?.ok_or_else(|| partnership_not_found(id))
        })?;

        self.events.emit(GraphEvent::PartnershipUpdated { id });
        Ok(edge)
    }

    pub fn delete_partnership(&self, id: EdgeId) -> Result<(), GraphError> {
        let deleted = self.db.with_write_tx(|tx| partnerships::soft_delete_partnership(tx, id))?;
        if !deleted {
            return Err(partnership_not_found(id));
        }

        debug!(id, "Partnership deleted");
        self.events.emit(GraphEvent::PartnershipDeleted { id });
        Ok(())
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Structural check then insert; caller holds the write transaction
    fn insert_parent_child(&self, conn: &Connection, input: &CreateParentChildInput) -> Result<ParentChildEdge, GraphError> {
        let candidate = Candidate::ParentChild {
            parent_id: &input.parent_person_id,
            child_id: &input.child_person_id,
            relationship_type: input.relationship_type,
        };
        validate(candidate, &ConnView::new(conn), &self.rules)?.into_result()?;
        parent_child::insert_parent_child(conn, input)
    }

    /// Every id must resolve to a live person; one directory call
    fn ensure_persons_exist<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Result<(), GraphError> {
        let wanted: Vec<String> = ids
            .into_iter()
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let found = self.directory.get_by_ids(&wanted)?;

        for id in &wanted {
            match found.get(id) {
                Some(person) if !person.is_deleted => {}
                _ => return Err(GraphError::NotFound(format!("Person {}", id))),
            }
        }
        Ok(())
    }

    /// Log and publish structural rejections before handing the result back
    fn observe<T>(&self, result: Result<T, GraphError>) -> Result<T, GraphError> {
        if let Err(GraphError::Rejected(rejection)) = &result {
            info!(code = rejection.code(), reason = %rejection, "Edge mutation rejected");
            self.events.emit(GraphEvent::MutationRejected {
                code: rejection.code(),
                detail: rejection.to_string(),
            });
        }
        result
    }
}

fn parent_child_not_found(id: EdgeId) -> GraphError {
    GraphError::NotFound(format!("Parent-child edge {}", id))
}

fn partnership_not_found(id: EdgeId) -> GraphError {
    GraphError::NotFound(format!("Partnership {}", id))
}

fn require_id(field: &str, value: &str) -> Result<(), GraphError> {
    if value.trim().is_empty() {
        return Err(GraphError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_parent_child_input(input: &CreateParentChildInput) -> Result<(), GraphError> {
    require_id("parent_person_id", &input.parent_person_id)?;
    require_id("child_person_id", &input.child_person_id)?;
    validate_confidence(input.confidence_score)
}

fn validate_confidence(score: Option<f64>) -> Result<(), GraphError> {
    match score {
        Some(s) if !(0.0..=1.0).contains(&s) => Err(GraphError::InvalidInput(format!(
            "confidence_score must be between 0 and 1, got {}",
            s
        ))),
        _ => Ok(()),
    }
}

fn validate_dates(start: Option<&str>, end: Option<&str>) -> Result<(), GraphError> {
    let start = parse_date("start_date", start)?;
    let end = parse_date("end_date", end)?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(GraphError::InvalidInput(format!(
                "end_date {} is before start_date {}",
                end, start
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PartnershipType;
    use crate::directory::{InMemoryDirectory, Person};
    use crate::graph::validation::Rejection;

    struct Fixture {
        service: RelationshipService,
        directory: Arc<InMemoryDirectory>,
        events: Arc<EventBus>,
    }

    fn setup(ids: &[&str]) -> Fixture {
        let directory = Arc::new(InMemoryDirectory::new());
        for id in ids {
            directory.upsert(Person::new(*id, id.to_uppercase(), "Test"));
        }
        let events = Arc::new(EventBus::new());
        let service = RelationshipService::new(
            Arc::new(GraphDb::open_in_memory().unwrap()),
            directory.clone(),
            events.clone(),
            ValidationRules::default(),
        );
        Fixture { service, directory, events }
    }

    fn bio(parent: &str, child: &str) -> CreateParentChildInput {
        CreateParentChildInput::new(parent, child, ParentChildType::Biological)
    }

    #[test]
    fn test_reverse_edge_is_rejected_and_published() {
        let f = setup(&["a", "b"]);
        let mut rx = f.events.subscribe();

        f.service.create_parent_child(bio("a", "b")).unwrap();
        let err = f.service.create_parent_child(bio("b", "a")).unwrap_err();

        match err.rejection() {
            Some(Rejection::CycleDetected { chain }) => assert_eq!(chain, &vec!["b".to_string(), "a".to_string()]),
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(matches!(rx.try_recv().unwrap(), GraphEvent::ParentChildCreated { .. }));
        assert_eq!(
            rx.try_recv().unwrap(),
            GraphEvent::MutationRejected { code: "CYCLE_DETECTED", detail: err.rejection().unwrap().to_string() }
        );
        assert_eq!(f.service.stats().unwrap().parent_child_count, 1);
    }

    #[test]
    fn test_self_relation() {
        let f = setup(&["p"]);
        let err = f.service.create_parent_child(bio("p", "p")).unwrap_err();
        assert!(matches!(err.rejection(), Some(Rejection::SelfRelation { .. })));
    }

    #[test]
    fn test_unknown_or_deleted_person_is_not_found() {
        let f = setup(&["a", "b"]);
        assert!(f.service.create_parent_child(bio("a", "ghost")).unwrap_err().is_not_found());

        f.directory.mark_deleted("b");
        assert!(f.service.create_parent_child(bio("a", "b")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_field_validation_precedes_lookup() {
        let f = setup(&[]);
        let mut input = bio("a", "b");
        input.confidence_score = Some(1.5);
        assert!(matches!(f.service.create_parent_child(input), Err(GraphError::InvalidInput(_))));
        assert!(matches!(f.service.create_parent_child(bio("", "b")), Err(GraphError::InvalidInput(_))));
    }

    #[test]
    fn test_third_biological_parent_rejected() {
        let f = setup(&["m", "f", "x", "c"]);
        f.service.create_parent_child(bio("m", "c")).unwrap();
        f.service.create_parent_child(bio("f", "c")).unwrap();

        let err = f.service.create_parent_child(bio("x", "c")).unwrap_err();
        assert_eq!(err.rejection().map(|r| r.code()), Some("TOO_MANY_PARENTS"));

        let step = f
            .service
            .create_parent_child(CreateParentChildInput::new("x", "c", ParentChildType::Step))
            .unwrap();

        let err = f
            .service
            .update_parent_child(
                step.id,
                ParentChildPatch { relationship_type: Some(ParentChildType::Biological), ..Default::default() },
            )
            .unwrap_err();
        assert_eq!(err.rejection().map(|r| r.code()), Some("TOO_MANY_PARENTS"));
    }

    #[test]
    fn test_update_and_verify() {
        let f = setup(&["a", "b"]);
        let edge = f.service.create_parent_child(bio("a", "b")).unwrap();

        let updated = f
            .service
            .update_parent_child(
                edge.id,
                ParentChildPatch { notes: Some(Some("census 1881".into())), confidence_score: Some(Some(0.8)), ..Default::default() },
            )
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("census 1881"));
        assert_eq!(updated.confidence_score, Some(0.8));

        let verified = f.service.verify_parent_child(edge.id, "archivist").unwrap();
        assert!(verified.is_verified);
        assert_eq!(verified.verified_by.as_deref(), Some("archivist"));

        assert!(f.service.verify_parent_child(999, "archivist").unwrap_err().is_not_found());
        assert!(matches!(f.service.verify_parent_child(edge.id, " "), Err(GraphError::InvalidInput(_))));
    }

    #[test]
    fn test_delete_then_recreate() {
        let f = setup(&["a", "b"]);
        let first = f.service.create_parent_child(bio("a", "b")).unwrap();

        f.service.delete_parent_child(first.id).unwrap();
        assert!(f.service.delete_parent_child(first.id).unwrap_err().is_not_found());
        assert!(f.service.children_of("a").unwrap().is_empty());

        let second = f.service.create_parent_child(bio("a", "b")).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_partnership_duplicate_in_either_order() {
        let f = setup(&["a", "b"]);
        let edge = f
            .service
            .create_partnership(CreatePartnershipInput::new("a", "b", PartnershipType::Married))
            .unwrap();

        let err = f
            .service
            .create_partnership(CreatePartnershipInput::new("b", "a", PartnershipType::Partner))
            .unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::DuplicateEdge { existing_id: edge.id }));
        assert_eq!(f.service.partnerships_of("b").unwrap().len(), 1);
    }

    #[test]
    fn test_partnership_dates() {
        let f = setup(&["a", "b"]);
        let mut input = CreatePartnershipInput::new("a", "b", PartnershipType::Married);
        input.start_date = Some("1990-06-01".into());
        input.end_date = Some("1980-01-01".into());
        assert!(matches!(f.service.create_partnership(input.clone()), Err(GraphError::InvalidInput(_))));

        input.end_date = None;
        let edge = f.service.create_partnership(input).unwrap();

        let err = f
            .service
            .update_partnership(edge.id, PartnershipPatch { end_date: Some(Some("1989-12-31".into())), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidInput(_)));

        let updated = f
            .service
            .update_partnership(
                edge.id,
                PartnershipPatch {
                    partnership_type: Some(PartnershipType::Divorced),
                    end_date: Some(Some("2001-03-15".into())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.partnership_type, PartnershipType::Divorced);
        assert_eq!(updated.end_date.as_deref(), Some("2001-03-15"));

        f.service.delete_partnership(edge.id).unwrap();
        assert!(f.service.get_partnership(edge.id).unwrap().is_none());
    }

    #[test]
    fn test_bulk_create_rolls_back_on_first_failure() {
        let f = setup(&["a", "b", "c"]);

        let err = f
            .service
            .bulk_create_parent_child(vec![bio("a", "b"), bio("b", "c"), bio("c", "a")])
            .unwrap_err();
        assert_eq!(err.rejection().map(|r| r.code()), Some("CYCLE_DETECTED"));
        assert_eq!(f.service.stats().unwrap().parent_child_count, 0);

        let created = f.service.bulk_create_parent_child(vec![bio("a", "b"), bio("b", "c")]).unwrap();
        assert_eq!(created.len(), 2);
    }

    #[test]
    fn test_bulk_create_reports_item_index() {
        let f = setup(&["a", "b"]);
        match f.service.bulk_create_parent_child(vec![bio("a", "b"), bio("a", "")]) {
            Err(GraphError::InvalidInput(msg)) => assert!(msg.starts_with("item[1]: "), "{}", msg),
            other => panic!("expected invalid input, got {:?}", other),
        }
    }
}
