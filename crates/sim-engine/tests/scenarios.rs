// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! Cross-module scenarios exercising the Engine and the Topology Router
//! together, as a workload author would use them.

use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use sim_engine::{Engine, EngineConfig, EngineInitError, EngineState, Event, SimulationTime};
use sim_topology::{Address, AttachHints, LoadError, ShadowId};

fn write_graph(doc: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(doc.as_bytes()).expect("write graph fixture");
    file
}

const KEYS: &str = r#"
  <key id="d0" for="node" attr.name="id" attr.type="string"/>
  <key id="d1" for="node" attr.name="type" attr.type="string"/>
  <key id="d2" for="node" attr.name="ip" attr.type="string"/>
  <key id="d3" for="node" attr.name="geocode" attr.type="string"/>
  <key id="d4" for="node" attr.name="bandwidthup" attr.type="double"/>
  <key id="d5" for="node" attr.name="bandwidthdown" attr.type="double"/>
  <key id="d6" for="node" attr.name="packetloss" attr.type="double"/>
  <key id="d7" for="edge" attr.name="latency" attr.type="double"/>
  <key id="d8" for="edge" attr.name="jitter" attr.type="double"/>
  <key id="d9" for="edge" attr.name="packetloss" attr.type="double"/>
"#;

fn node(id: &str, geocode: &str, ip: &str, ploss: f64) -> String {
    format!(
        r#"<node id="{id}"><data key="d0">{id}</data><data key="d1">poi</data><data key="d2">{ip}</data><data key="d3">{geocode}</data><data key="d4">1000</data><data key="d5">1000</data><data key="d6">{ploss}</data></node>"#
    )
}

fn edge(src: &str, dst: &str, latency: f64, ploss: f64) -> String {
    format!(
        r#"<edge source="{src}" target="{dst}"><data key="d7">{latency}</data><data key="d8">0</data><data key="d9">{ploss}</data></edge>"#
    )
}

fn engine_config(graph_path: std::path::PathBuf) -> EngineConfig {
    EngineConfig {
        worker_threads: 2,
        min_time_jump_ns: 1000,
        end_time_ns: 5000,
        graph_path,
        seed: 7,
    }
}

/// Scenario 1: two directly connected PoIs with no loss anywhere.
#[test]
fn scenario_two_hop_direct_edge_is_lossless() {
    let doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><graphml>{KEYS}<graph edgedefault=\"directed\">{}{}{}{}</graph></graphml>",
        node("poi-a", "us-east", "10.0.0.1", 0.0),
        node("poi-b", "us-west", "10.0.0.2", 0.0),
        edge("poi-a", "poi-b", 10.0, 0.0),
        edge("poi-b", "poi-a", 10.0, 0.0),
    );
    let graph_file = write_graph(&doc);
    let engine = Engine::new(engine_config(graph_file.path().to_path_buf())).expect("construct");
    let router = engine.router();
    let mut rng = StdRng::seed_from_u64(1);

    let h1 = Address::new(1, Ipv4Addr::new(10, 0, 0, 1));
    let h2 = Address::new(2, Ipv4Addr::new(10, 0, 0, 2));
    router
        .attach(
            h1,
            &mut rng,
            &AttachHints {
                ip_hint: Some("10.0.0.1".to_string()),
                ..Default::default()
            },
        )
        .expect("attach h1");
    router
        .attach(
            h2,
            &mut rng,
            &AttachHints {
                ip_hint: Some("10.0.0.2".to_string()),
                ..Default::default()
            },
        )
        .expect("attach h2");

    assert_eq!(router.get_latency(h1, h2), 10.0);
    assert_eq!(router.get_reliability(h1, h2), 1.0);
}

/// Scenario 2: loss compounds across source vertex, edge, destination vertex.
#[test]
fn scenario_reliability_compounds_src_edge_dst() {
    let doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><graphml>{KEYS}<graph edgedefault=\"directed\">{}{}{}</graph></graphml>",
        node("poi-a", "us-east", "10.0.0.1", 0.1),
        node("poi-b", "us-west", "10.0.0.2", 0.2),
        edge("poi-a", "poi-b", 10.0, 0.05),
    );
    let graph_file = write_graph(&doc);
    let engine = Engine::new(engine_config(graph_file.path().to_path_buf())).expect("construct");
    let router = engine.router();
    let mut rng = StdRng::seed_from_u64(1);

    let h1 = Address::new(1, Ipv4Addr::new(10, 0, 0, 1));
    let h2 = Address::new(2, Ipv4Addr::new(10, 0, 0, 2));
    router.attach(h1, &mut rng, &Default::default()).expect("attach h1");
    router.attach(h2, &mut rng, &Default::default()).expect("attach h2");

    let reliability = router.get_reliability(h1, h2);
    assert!((reliability - 0.684).abs() < 1e-9, "got {reliability}");
}

/// Scenario 3: a triangle where the direct edge is absent, forcing a
/// two-hop shortest path.
#[test]
fn scenario_triangle_without_direct_edge_takes_two_hops() {
    let doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><graphml>{KEYS}<graph edgedefault=\"directed\">{}{}{}{}{}{}</graph></graphml>",
        node("poi-a", "us-east", "10.0.0.1", 0.0),
        node("poi-b", "us-central", "10.0.0.2", 0.0),
        node("poi-c", "us-west", "10.0.0.3", 0.0),
        edge("poi-a", "poi-b", 5.0, 0.0),
        edge("poi-b", "poi-c", 5.0, 0.0),
        edge("poi-b", "poi-a", 5.0, 0.0),
    );
    let graph_file = write_graph(&doc);
    let engine = Engine::new(engine_config(graph_file.path().to_path_buf())).expect("construct");
    let router = engine.router();
    let mut rng = StdRng::seed_from_u64(1);

    let h1 = Address::new(1, Ipv4Addr::new(10, 0, 0, 1));
    let h3 = Address::new(3, Ipv4Addr::new(10, 0, 0, 3));
    router
        .attach(h1, &mut rng, &AttachHints { ip_hint: Some("10.0.0.1".into()), ..Default::default() })
        .expect("attach h1");
    router
        .attach(h3, &mut rng, &AttachHints { ip_hint: Some("10.0.0.3".into()), ..Default::default() })
        .expect("attach h3");

    assert_eq!(router.get_latency(h1, h3), 10.0);
}

/// Scenario 4: querying against an unattached address returns the sentinel.
#[test]
fn scenario_unattached_address_returns_sentinel() {
    let doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><graphml>{KEYS}<graph edgedefault=\"directed\">{}{}{}</graph></graphml>",
        node("poi-a", "us-east", "10.0.0.1", 0.0),
        node("poi-b", "us-west", "10.0.0.2", 0.0),
        edge("poi-a", "poi-b", 10.0, 0.0),
    );
    let graph_file = write_graph(&doc);
    let engine = Engine::new(engine_config(graph_file.path().to_path_buf())).expect("construct");
    let router = engine.router();
    let mut rng = StdRng::seed_from_u64(1);

    let h1 = Address::new(1, Ipv4Addr::new(10, 0, 0, 1));
    let unattached = Address::new(99, Ipv4Addr::new(10, 0, 0, 99));
    router.attach(h1, &mut rng, &Default::default()).expect("attach h1");

    assert_eq!(router.get_latency(h1, unattached), -1.0);
    assert!(!router.is_routable(h1, unattached));
}

/// Scenario 5: the run advances through all five windows to end_time even
/// though the host queue empties after the first window and a later event
/// fires only in the final window.
#[test]
fn scenario_run_advances_through_empty_windows_to_end_time() {
    let doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><graphml>{KEYS}<graph edgedefault=\"directed\">{}{}{}</graph></graphml>",
        node("poi-a", "us-east", "10.0.0.1", 0.0),
        node("poi-b", "us-west", "10.0.0.2", 0.0),
        edge("poi-a", "poi-b", 10.0, 0.0),
    );
    let graph_file = write_graph(&doc);
    let mut engine = Engine::new(engine_config(graph_file.path().to_path_buf())).expect("construct");
    let router = engine.router();
    let mut rng = StdRng::seed_from_u64(1);

    let h1 = Address::new(1, Ipv4Addr::new(10, 0, 0, 1));
    let h2 = Address::new(2, Ipv4Addr::new(10, 0, 0, 2));
    router.attach(h1, &mut rng, &Default::default()).expect("attach h1");
    router.attach(h2, &mut rng, &Default::default()).expect("attach h2");

    let second_fired = Arc::new(AtomicU32::new(0));
    {
        let second_fired = second_fired.clone();
        engine.push_event(Event::new(SimulationTime(500), ShadowId(1), 0, move || {
            vec![Event::new(SimulationTime(2000), ShadowId(2), 0, move || {
                second_fired.fetch_add(1, Ordering::SeqCst);
                Vec::new()
            })]
        }));
    }

    let exit_code = engine.run();
    assert_eq!(exit_code, 0);
    assert_eq!(engine.state(), EngineState::Killed);
    assert_eq!(second_fired.load(Ordering::SeqCst), 1);
}

/// Scenario 6: a disconnected graph (two clusters) is rejected at load.
#[test]
fn scenario_disconnected_graph_rejected_at_load() {
    let doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><graphml>{KEYS}<graph edgedefault=\"directed\">{}{}</graph></graphml>",
        node("poi-a", "us-east", "10.0.0.1", 0.0),
        node("poi-b", "us-west", "10.0.0.2", 0.0),
    );
    let graph_file = write_graph(&doc);
    let result = Engine::new(engine_config(graph_file.path().to_path_buf()));
    assert!(matches!(
        result,
        Err(EngineInitError::Load(LoadError::NotConnected { cluster_count: 2 }))
    ));
}

/// Invariant: repeated queries for the same pair return a bitwise-identical
/// cached Path, and latency/reliability stay within their defined ranges.
#[test]
fn invariant_cache_returns_stable_path_within_bounds() {
    let doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><graphml>{KEYS}<graph edgedefault=\"directed\">{}{}{}{}</graph></graphml>",
        node("poi-a", "us-east", "10.0.0.1", 0.1),
        node("poi-b", "us-west", "10.0.0.2", 0.1),
        edge("poi-a", "poi-b", 10.0, 0.1),
        edge("poi-b", "poi-a", 10.0, 0.1),
    );
    let graph_file = write_graph(&doc);
    let engine = Engine::new(engine_config(graph_file.path().to_path_buf())).expect("construct");
    let router = engine.router();
    let mut rng = StdRng::seed_from_u64(1);

    let h1 = Address::new(1, Ipv4Addr::new(10, 0, 0, 1));
    let h2 = Address::new(2, Ipv4Addr::new(10, 0, 0, 2));
    router.attach(h1, &mut rng, &Default::default()).expect("attach h1");
    router.attach(h2, &mut rng, &Default::default()).expect("attach h2");

    let first_latency = router.get_latency(h1, h2);
    let first_reliability = router.get_reliability(h1, h2);
    for _ in 0..5 {
        assert_eq!(router.get_latency(h1, h2), first_latency);
        assert_eq!(router.get_reliability(h1, h2), first_reliability);
    }
    assert!(first_latency >= 0.0);
    assert!((0.0..=1.0).contains(&first_reliability));

    let self_latency = router.get_latency(h1, h1);
    let self_reliability = router.get_reliability(h1, h1);
    assert_eq!(self_latency, 1.0);
    assert!(self_reliability > 0.0 && self_reliability <= 1.0);
}
