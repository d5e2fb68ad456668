//! Racing writers and parallel readers against one shared database

use std::sync::{Arc, Barrier};
use std::thread;

use kinship_graph::{
    CreateParentChildInput, CreatePartnershipInput, GraphConfig, GraphEvent, InMemoryDirectory, ParentChildType,
    PartnershipType, Person, Services,
};

fn shared_services(ids: &[&str]) -> Arc<Services> {
    let dir = Arc::new(InMemoryDirectory::new());
    for id in ids {
        dir.upsert(Person::new(*id, *id, "Family"));
    }
    Arc::new(Services::in_memory(dir.clone(), dir).unwrap())
}

#[test]
fn opposite_parent_child_edges_cannot_both_commit() {
    for _ in 0..20 {
        let s = shared_services(&["a", "b"]);
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [("a", "b"), ("b", "a")]
            .into_iter()
            .map(|(parent, child)| {
                let s = s.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    s.relationships
                        .create_parent_child(CreateParentChildInput::new(parent, child, ParentChildType::Biological))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1);

        let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(rejected.rejection().map(|r| r.code()), Some("CYCLE_DETECTED"));
        assert_eq!(s.relationships.stats().unwrap().parent_child_count, 1);
    }
}

#[test]
fn racing_partnerships_in_both_orders_store_one_edge() {
    let s = shared_services(&["a", "b"]);
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let s = s.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let (x, y) = if i % 2 == 0 { ("a", "b") } else { ("b", "a") };
                barrier.wait();
                s.relationships
                    .create_partnership(CreatePartnershipInput::new(x, y, PartnershipType::Partner))
                    .is_ok()
            })
        })
        .collect();

    let committed = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
    assert_eq!(committed, 1);
    assert_eq!(s.relationships.partnerships_of("a").unwrap().len(), 1);
}

#[test]
fn readers_run_alongside_writers() {
    let ids: Vec<String> = (0..30).map(|i| format!("p{:02}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let s = shared_services(&id_refs);

    // Chain p00 -> p01 -> ... built by one writer while readers query
    let writer = {
        let s = s.clone();
        let ids = ids.clone();
        thread::spawn(move || {
            for pair in ids.windows(2) {
                s.relationships
                    .create_parent_child(CreateParentChildInput::new(&pair[0], &pair[1], ParentChildType::Biological))
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let s = s.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let view = s.trees.get_pedigree("p29", 40).unwrap();
                    assert!(view.node_count >= 1);
                    assert_eq!(view.generations, GraphConfig::default().max_generations);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }

    let view = s.trees.get_pedigree("p29", 40).unwrap();
    assert_eq!(view.node_count, 11);
    assert!(view.truncated);
}

#[tokio::test]
async fn events_follow_commits() {
    let s = shared_services(&["a", "b"]);
    let mut rx = s.events.subscribe();

    s.relationships
        .create_parent_child(CreateParentChildInput::new("a", "b", ParentChildType::Adoptive))
        .unwrap();
    let _ = s
        .relationships
        .create_parent_child(CreateParentChildInput::new("a", "b", ParentChildType::Adoptive));

    match rx.recv().await.unwrap() {
        GraphEvent::ParentChildCreated { parent_id, child_id, relationship_type, .. } => {
            assert_eq!((parent_id.as_str(), child_id.as_str()), ("a", "b"));
            assert_eq!(relationship_type, "adoptive");
        }
        other => panic!("unexpected event {:?}", other),
    }
    match rx.recv().await.unwrap() {
        GraphEvent::MutationRejected { code, .. } => assert_eq!(code, "DUPLICATE_EDGE"),
        other => panic!("unexpected event {:?}", other),
    }
}
