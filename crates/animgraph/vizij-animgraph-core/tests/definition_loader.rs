use vizij_animgraph_core::{
    parse_graph_json, AnimGraphError, ClipFlags, Config, EdgeProperty, EdgePropertyKind,
    GraphDefinition, ListKind,
};

fn approx(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

#[test]
fn hero_fixture_builds_the_authored_graph() {
    let def: GraphDefinition = vizij_test_fixtures::graphs::load("hero").expect("load hero");
    assert_eq!(def.name, "hero");
    assert!(!def.static_links);

    let graph = def.build(&Config::default()).unwrap();
    assert_eq!(graph.capacity(), 8);
    assert_eq!(graph.clip_count(), 4);
    assert_eq!(graph.edge_count(), 7);
    assert!(!graph.is_static());

    let idle = graph.clip_id_from_name("idle").unwrap();
    let idle_clip = graph.clip(idle).unwrap();
    let stamps: Vec<f32> = idle_clip.keys().iter().map(|k| k.time).collect();
    assert!(approx(stamps[1], 0.5, 1e-6) && approx(stamps[2], 1.0, 1e-6));
    assert!(approx(idle_clip.length(), 1.0, 1e-6));

    let jump = graph.clip_id_from_name("jump").unwrap();
    assert!(graph.clip(jump).unwrap().flags().contains(ClipFlags(1)));

    let edge = graph.edge(idle, jump).unwrap();
    assert_eq!(
        graph.edge_property(edge, EdgePropertyKind::ImmediateCut).unwrap(),
        EdgeProperty::ImmediateCut(true)
    );
    assert_eq!(
        graph.edge_property(edge, EdgePropertyKind::Priority).unwrap(),
        EdgeProperty::Priority(2)
    );
}

#[test]
fn static_fixture_keeps_its_repeat_counts() {
    let json = vizij_test_fixtures::graphs::json("turnstile").unwrap();
    let graph = parse_graph_json(&json)
        .unwrap()
        .build(&Config::default())
        .unwrap();
    assert!(graph.is_static());
    let c = graph.clip_id_from_name("C").unwrap();
    let gate = graph.edge(c, c).unwrap();
    assert_eq!(graph.edge_info(gate).unwrap().repeat_count, 3);
}

#[test]
fn duplicate_edges_are_rejected() {
    let json = r#"{
        "name": "dup",
        "clips": [
            { "name": "a", "keys": [{ "payload": "a0", "time": 0 }] },
            { "name": "b", "keys": [{ "payload": "b0", "time": 0 }] }
        ],
        "edges": [
            { "source": "a", "destination": "b" },
            { "source": "a", "destination": "b", "priority": 3 }
        ]
    }"#;
    let err = parse_graph_json(json)
        .unwrap()
        .build(&Config::default())
        .unwrap_err();
    assert!(matches!(err, AnimGraphError::DuplicateEdge { .. }));
}

#[test]
fn capacity_and_ordering_errors_surface() {
    let too_small = r#"{
        "name": "tiny", "capacity": 1,
        "clips": [{ "name": "a" }, { "name": "b" }]
    }"#;
    assert!(matches!(
        parse_graph_json(too_small).unwrap().build(&Config::default()),
        Err(AnimGraphError::ClipCapacity { capacity: 1, .. })
    ));

    let backwards = r#"{
        "name": "rewind",
        "clips": [{ "name": "a", "keys": [
            { "payload": "a0", "time": 0.5 },
            { "payload": "a1", "time": 0.2 }
        ] }]
    }"#;
    assert!(matches!(
        parse_graph_json(backwards).unwrap().build(&Config::default()),
        Err(AnimGraphError::OutOfOrderTimestamp { what: ListKind::Key, .. })
    ));
}

#[test]
fn definitions_serialize_back_to_camel_case() {
    let def = parse_graph_json(&vizij_test_fixtures::graphs::json("ab-transition").unwrap())
        .unwrap();
    let value = serde_json::to_value(&def).unwrap();
    assert_eq!(value["staticLinks"], false);
    assert_eq!(value["edges"][0]["immediateCut"], false);
    assert_eq!(value["edges"][0]["priority"], 10);
}
