use std::rc::Rc;

use vizij_animgraph_core::{AnimEventKind, AnimGraphError, Config, Engine, InstId};

fn hero_json() -> String {
    vizij_test_fixtures::graphs::json("hero").expect("hero fixture")
}

#[test]
fn loading_the_same_graph_twice_hits_the_cache() {
    let mut engine = Engine::new(Config::default());
    let first = engine.load_graph_json(&hero_json()).unwrap();
    let second = engine.load_graph_json(&hero_json()).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(engine.graph_names().collect::<Vec<_>>(), vec!["hero"]);
    assert_eq!(first.borrow().clip_count(), 4);
}

#[test]
fn update_collects_events_in_creation_order() {
    let mut engine = Engine::default();
    engine.load_graph_json(&hero_json()).unwrap();
    let a = engine.create_instance("hero").unwrap();
    let b = engine.create_instance("hero").unwrap();
    let idle = engine.create_instance("hero").unwrap();

    engine.instance_mut(a).unwrap().set_current_anim_from_name("run").unwrap();
    engine.instance_mut(b).unwrap().set_current_anim_from_name("idle").unwrap();

    let out = engine.update(0.25);
    assert!(out.failures.is_empty(), "idle instances are not failures");
    let owners: Vec<InstId> = out.events.iter().map(|e| e.instance).collect();
    let first_b = owners.iter().position(|id| *id == b).unwrap();
    assert!(owners[..first_b].iter().all(|id| *id == a));
    assert!(owners.iter().all(|id| *id != idle));

    let run_events: Vec<_> = out.events_for(a).map(|e| e.kind.clone()).collect();
    assert_eq!(run_events[0], AnimEventKind::Start);
    assert!(run_events.contains(&AnimEventKind::Update { key: 1 }));
    assert_eq!(engine.instance(a).unwrap().current_anim_name().as_deref(), Some("run"));
}

#[test]
fn events_beyond_the_tick_limit_are_dropped() {
    let mut engine = Engine::new(Config {
        max_events_per_tick: 3,
        ..Config::default()
    });
    engine.load_graph_json(&hero_json()).unwrap();
    let id = engine.create_instance("hero").unwrap();
    engine
        .instance_mut(id)
        .unwrap()
        .set_current_anim_from_name("run")
        .unwrap();

    // Two full loops of run raise far more than three events.
    let out = engine.update(0.9);
    assert_eq!(out.events.len(), 3);
    assert_eq!(out.events[0].kind, AnimEventKind::Start);

    // The instance queue was drained regardless.
    assert!(engine.instance(id).unwrap().pending_events().is_empty());
}

#[test]
fn removing_instances_releases_the_graph() {
    let mut engine = Engine::default();
    let graph = engine.load_graph_json(&hero_json()).unwrap();
    let id = engine.create_instance("hero").unwrap();
    assert_eq!(graph.borrow().reference_count(), 1);

    engine.remove_instance(id).unwrap();
    assert_eq!(graph.borrow().reference_count(), 0);
    assert!(engine.instance(id).is_none());
    assert!(matches!(
        engine.remove_instance(id),
        Err(AnimGraphError::UnknownInstance { .. })
    ));
}

#[test]
fn failures_are_reported_per_instance() {
    let mut engine = Engine::default();
    let graph = engine.load_graph_json(&hero_json()).unwrap();
    let id = engine.create_instance("hero").unwrap();
    engine
        .instance_mut(id)
        .unwrap()
        .set_current_anim_from_name("land")
        .unwrap();

    // Non-static graphs stay editable while played.
    let land = graph.borrow().clip_id_from_name("land").unwrap();
    graph.borrow_mut().remove_clip(land).unwrap();

    let out = engine.update(0.1);
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].instance, id);
    assert!(matches!(
        out.failures[0].error,
        AnimGraphError::InvalidClip { .. }
    ));
}
