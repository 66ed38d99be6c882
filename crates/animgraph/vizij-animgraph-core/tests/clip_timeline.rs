use vizij_animgraph_core::{AnimGraphError, Clip, ListKind};

fn mk_clip(name: &str, stamps: &[f32]) -> Clip {
    let mut clip = Clip::new(name, stamps.len() + 1, 4).unwrap();
    for (i, t) in stamps.iter().enumerate() {
        clip.add_key(format!("{name}_{i}"), *t).unwrap();
    }
    clip
}

#[test]
fn key_index_is_monotonic_and_exact_at_stamps() {
    let stamps = [0.0, 0.1, 0.1, 0.35, 0.8, 1.2];
    let clip = mk_clip("walk", &stamps);

    let mut last = None;
    let mut t = 0.0f32;
    while t <= 1.5 {
        let index = clip.key_index_for_time(t);
        assert!(index >= last, "index went backwards at t={t}");
        last = index;
        t += 0.01;
    }

    // Duplicate stamps resolve to the later key.
    for (i, stamp) in stamps.iter().enumerate() {
        let expected = stamps.iter().rposition(|s| s == stamp).unwrap();
        assert_eq!(clip.key_index_for_time(*stamp), Some(expected), "key {i}");
    }
    assert_eq!(clip.key_index_for_time(0.35), Some(3));
    assert_eq!(clip.key_index_for_time(0.349), Some(2));
}

#[test]
fn no_key_before_first_stamp() {
    let clip = mk_clip("late", &[0.5, 1.0]);
    assert_eq!(clip.key_index_for_time(0.2), None);
    assert_eq!(clip.key_index_for_time(0.5), Some(0));

    let empty = Clip::new("empty", 0, 0).unwrap();
    assert_eq!(empty.key_index_for_time(0.0), None);
    assert_eq!(empty.length(), 0.0);
}

#[test]
fn add_then_remove_last_key_round_trips() {
    let mut clip = mk_clip("jump", &[0.0, 0.3]);
    let count = clip.key_count();
    let length = clip.length();

    clip.add_key("jump_extra", 0.9).unwrap();
    assert_eq!(clip.length(), 0.9);

    let removed = clip.remove_last_key().unwrap();
    assert_eq!(removed.payload.as_str(), "jump_extra");
    assert_eq!(clip.key_count(), count);
    assert_eq!(clip.length(), length);
}

#[test]
fn removing_from_empty_lists_fails() {
    let mut clip = Clip::new("empty", 1, 1).unwrap();
    assert!(matches!(
        clip.remove_last_key(),
        Err(AnimGraphError::EmptyList { what: ListKind::Key, .. })
    ));
    assert!(matches!(
        clip.remove_last_event(),
        Err(AnimGraphError::EmptyList { what: ListKind::Event, .. })
    ));
}

#[test]
fn length_follows_the_last_key_only() {
    let mut clip = mk_clip("swing", &[0.0, 0.4]);
    clip.add_event("whoosh", 0.7, 1.0).unwrap();
    assert_eq!(clip.length(), 0.4);

    clip.remove_all_events();
    assert_eq!(clip.length(), 0.4);
    clip.remove_last_key().unwrap();
    assert_eq!(clip.length(), 0.0);
    clip.add_key("swing_late", 0.6).unwrap();
    assert_eq!(clip.length(), 0.6);
    clip.remove_all_keys();
    assert_eq!(clip.length(), 0.0);
    assert_eq!(clip.key_capacity(), 3);
}

#[test]
fn next_event_after_walks_the_timeline_once() {
    let mut clip = mk_clip("attack", &[0.0, 1.0]);
    clip.add_event("windup", 0.0, 0.0).unwrap();
    clip.add_event("hit", 0.5, 10.0).unwrap();
    clip.add_event("recover", 0.9, 0.0).unwrap();

    let mut fired = Vec::new();
    let mut cursor = -1.0;
    while let Some(event) = clip.next_event_after(cursor) {
        fired.push(event.name.to_string());
        cursor = event.time;
    }
    assert_eq!(fired, ["windup", "hit", "recover"]);

    clip.add_event("late", 2.0, 0.0).unwrap();
    assert!(matches!(
        clip.add_event("later", 3.0, 0.0),
        Err(AnimGraphError::EventCapacity { capacity: 4, .. })
    ));
    assert_eq!(clip.length(), 1.0);
}
