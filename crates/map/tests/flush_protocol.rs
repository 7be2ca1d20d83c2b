//! Leader-driven compaction: flush scheduling, adoption by every client,
//! and cache behavior across the root swap.

mod common;

use common::{Cluster, val};
use hive_map::MapEvent;
use hive_types::MapConfig;

fn flushing_config(threshold: usize) -> MapConfig {
    MapConfig::builder().flush_threshold(threshold).build().expect("config")
}

/// Drains deliveries and keeps re-evaluating the leader's flush gate until
/// nothing is left unflushed; the host's op loop does the same after every
/// applied op.
async fn settle(cluster: &mut Cluster, leader: usize) {
    cluster.run_until_quiet().await;
    while cluster.client(leader).needs_flush() {
        cluster.client(leader).flush_if_needed().await;
        cluster.run_until_quiet().await;
    }
}

#[tokio::test]
async fn test_leader_flush_is_adopted_by_all_clients() {
    let mut cluster = Cluster::new(flushing_config(3), 2);
    cluster.client(0).promote();
    let mut leader_events = cluster.client(0).subscribe();
    let mut follower_events = cluster.client(1).subscribe();

    // The fourth set trips the threshold with every set already sequenced,
    // so one flush covers them all.
    for n in 0..4 {
        cluster.client(0).set(&format!("k{n}"), val(&format!("v{n}"))).expect("set");
    }
    cluster.run_until_quiet().await;

    assert_eq!(cluster.client(0).unflushed_change_count(), 0);
    assert_eq!(cluster.client(1).unflushed_change_count(), 0);
    for n in 0..4 {
        assert_eq!(
            cluster.client(1).get(&format!("k{n}")).await.expect("get"),
            Some(val(&format!("v{n}")))
        );
    }

    let leader_saw: Vec<MapEvent> = std::iter::from_fn(|| leader_events.try_recv().ok())
        .filter(|e| matches!(e, MapEvent::StartFlush | MapEvent::Flushed { .. }))
        .collect();
    assert!(leader_saw.contains(&MapEvent::StartFlush));
    assert!(leader_saw.contains(&MapEvent::Flushed { is_leader: true }));

    let follower_saw: Vec<MapEvent> = std::iter::from_fn(|| follower_events.try_recv().ok())
        .filter(|e| matches!(e, MapEvent::Flushed { .. }))
        .collect();
    assert_eq!(follower_saw, vec![MapEvent::Flushed { is_leader: false }]);
}

#[tokio::test]
async fn test_at_most_one_flush_in_flight() {
    let mut cluster = Cluster::new(flushing_config(2), 2);
    cluster.client(0).promote();

    // Far more changes than the threshold, sequenced before any flush op is
    // delivered: the gate must hold the leader to a single in-flight flush.
    for n in 0..20 {
        cluster.client(0).set(&format!("k{n}"), val("v")).expect("set");
    }
    let mut leader_events = cluster.client(0).subscribe();
    cluster.run_until_quiet().await;

    let started = std::iter::from_fn(|| leader_events.try_recv().ok())
        .filter(|e| matches!(e, MapEvent::StartFlush))
        .count();
    assert_eq!(started, 1, "the gate must admit exactly one flush per cycle");

    // The first flush only covered ops up to its reference point; the
    // host's re-evaluation loop folds in the rest.
    settle(&mut cluster, 0).await;
    assert_eq!(cluster.client(0).unflushed_change_count(), 0, "every change was folded in");
    for n in 0..20 {
        assert!(cluster.client(1).has(&format!("k{n}")).await.expect("has"));
    }
}

#[tokio::test]
async fn test_flushed_state_survives_cache_eviction() {
    let config = MapConfig::builder()
        .flush_threshold(3)
        .cache_size_hint(2)
        .build()
        .expect("config");
    let mut cluster = Cluster::new(config, 2);
    cluster.client(0).promote();

    for n in 0..8 {
        cluster.client(0).set(&format!("k{n}"), val(&format!("v{n}"))).expect("set");
    }
    cluster.run_until_quiet().await;

    // The follower's cache is tiny; reads must fall through to the chunked
    // tree and still see every flushed value.
    for n in 0..8 {
        assert_eq!(
            cluster.client(1).get(&format!("k{n}")).await.expect("get"),
            Some(val(&format!("v{n}"))),
            "key k{n} lost across flush adoption and eviction"
        );
    }
}

#[tokio::test]
async fn test_writes_after_flush_reference_point_are_reapplied() {
    let mut cluster = Cluster::new(flushing_config(2), 2);
    cluster.client(0).promote();

    for n in 0..3 {
        cluster.client(0).set(&format!("k{n}"), val("old")).expect("set");
    }
    // Sequence exactly the three sets; the third trips the threshold and
    // starts a flush whose op stays queued, undelivered.
    for _ in 0..3 {
        assert!(cluster.deliver_one_from(0).await);
    }
    assert!(cluster.client(0).flush_in_flight());

    // More writes land while the flush is in flight; they are sequenced
    // after the flush's reference point.
    cluster.client(1).set("k0", val("newer")).expect("set");
    cluster.deliver_all_from(1).await;
    cluster.run_until_quiet().await;

    // The flush op has now been applied; ops beyond its reference sequence
    // number survive in the sequenced layer on top of the new tree.
    assert_eq!(cluster.client(0).get("k0").await.expect("get"), Some(val("newer")));
    assert_eq!(cluster.client(1).get("k0").await.expect("get"), Some(val("newer")));
    assert_eq!(cluster.client(0).get("k1").await.expect("get"), Some(val("old")));
}

#[tokio::test]
async fn test_gc_roots_cover_the_persisted_tree() {
    let mut cluster = Cluster::new(flushing_config(2), 1);
    cluster.client(0).promote();

    for n in 0..10 {
        cluster.client(0).set(&format!("k{n}"), val("v")).expect("set");
    }
    cluster.run_until_quiet().await;

    let roots = cluster.client(0).gc_handles();
    assert!(!roots.is_empty());
    // Every enumerated root must actually exist in the blob store.
    for handle in roots {
        assert!(cluster.store.contains(handle), "GC root {handle} missing from store");
    }
}
