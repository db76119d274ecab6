use super::*;
use crate::events::{EventArg, EventType};
use crate::scene::RenderHints;
use crate::test_support::frame_at;
use crate::tracking::TrackingState;

fn cycles(count: usize) -> Vec<RawEstimate> {
    let mut script = vec![RawEstimate::normal(Transform::identity())];
    for _ in 0..count {
        script.push(RawEstimate::no_pose());
        script.push(RawEstimate::normal(Transform::from_position(Vec3::new(0.05, 0.0, 0.0))));
    }
    script
}

fn tracking_config() -> TrackingConfig {
    TrackingConfig {
        init_frames_required: 1,
        ..TrackingConfig::default()
    }
    .with_relocalization_budget(10, 60_000)
}

struct Clock(u64);

impl Clock {
    fn step(&mut self, direct: &mut Direct) -> Option<Arc<RenderFrame>> {
        self.0 += 10;
        direct.scheduler.process_frame(frame_at(self.0))
    }
}

#[test]
fn test_anchor_survives_budgeted_relocalizations() {
    let mut direct = direct(cycles(10), tracking_config());
    let mut clock = Clock(0);

    clock.step(&mut direct).unwrap();
    let anchor = direct.scheduler.composer().active_anchor().copied().unwrap();

    for _ in 0..10 {
        assert!(clock.step(&mut direct).is_none());
        assert_eq!(direct.scheduler.tracking_state(), TrackingState::Lost);
        assert!(direct.scheduler.composer().active_anchor().unwrap().frozen);
        // Frozen scene stays on the exchange
        assert!(direct.exchange.latest().is_some());

        let frame = clock.step(&mut direct).unwrap();
        assert!(frame.scene.hints.contains(RenderHints::RELOCALIZED));
        let current = direct.scheduler.composer().active_anchor().unwrap();
        assert_eq!(current.id, anchor.id);
        assert_eq!(current.world, anchor.world);
        assert!(!current.frozen);
    }

    assert_eq!(direct.scheduler.tracker_stats().relocalizations, 10);
    assert_eq!(direct.scheduler.stats().anchor_resets, 0);
    assert_eq!(*direct.backend_resets.lock(), 0);
}

#[test]
fn test_cycle_over_budget_discards_anchor() {
    let mut direct = direct(cycles(11), tracking_config());
    let mut clock = Clock(0);

    clock.step(&mut direct).unwrap();
    let first_anchor = direct.scheduler.composer().active_anchor().unwrap().id;
    for _ in 0..10 {
        clock.step(&mut direct);
        clock.step(&mut direct).unwrap();
    }

    assert!(clock.step(&mut direct).is_none());
    assert_eq!(direct.scheduler.tracking_state(), TrackingState::Lost);

    assert!(clock.step(&mut direct).is_none());
    assert_eq!(direct.scheduler.tracking_state(), TrackingState::Initializing);
    assert!(direct.scheduler.composer().active_anchor().is_none());
    assert!(direct.exchange.latest().is_none());
    assert_eq!(direct.scheduler.stats().anchor_resets, 1);
    assert_eq!(*direct.backend_resets.lock(), 1);

    let reset_events = direct
        .events
        .drain()
        .into_iter()
        .filter(|event| event.event_type == EventType::TrackingStateChanged)
        .filter(|event| event.get_arg("reset") == Some(&EventArg::Flag(true)))
        .count();
    assert_eq!(reset_events, 1);

    // The unconsumed estimate re-initializes and places fresh art
    let frame = clock.step(&mut direct).unwrap();
    assert!(!frame.scene.hints.contains(RenderHints::RELOCALIZED));
    let fresh = direct.scheduler.composer().active_anchor().unwrap();
    assert_ne!(fresh.id, first_anchor);
    assert_eq!(direct.scheduler.composer().anchor_count(), 1);
}

#[test]
fn test_failed_art_is_flagged_on_later_frames() {
    let script = vec![RawEstimate::normal(Transform::identity()); 2];
    let mut direct = direct(script, tracking_config());
    direct.store.fail_next("sunny_tree", 10);
    let mut clock = Clock(0);

    let frame = clock.step(&mut direct).unwrap();
    let model = frame.scene.model().unwrap().wait(Duration::from_secs(2)).unwrap();
    assert!(model.is_placeholder());

    let later = clock.step(&mut direct).unwrap();
    assert!(later.scene.hints.contains(RenderHints::PLACEHOLDER_ART));
    assert!(later.scene.model().is_some());
}
