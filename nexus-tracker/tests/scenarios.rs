use nexus_tracker::{BindError, EndpointId, Graph, Order, RemoteKind, Reporter, Tracker};

type TestGraph = Graph<&'static str>;

/// Every slot of `tracker` is mirrored by its peer, looked up in `all`.
fn assert_mutual(graph: &TestGraph, tracker: &Tracker, all: &[&Tracker]) {
    for handle in tracker.handles(graph) {
        match tracker.remote_of(graph, handle) {
            Some(EndpointId::Tracker(id)) => {
                let peer = all
                    .iter()
                    .find(|t| t.id() == EndpointId::Tracker(id))
                    .expect("known peer");
                let mirror = tracker.mirror_of(graph, handle).expect("tracker peer has a mirror");
                assert_eq!(peer.remote_of(graph, mirror), Some(tracker.id()));
                assert_eq!(peer.mirror_of(graph, mirror), Some(handle));
            }
            Some(EndpointId::Reporter(_)) => {}
            None => panic!("unbound slot in tracker"),
        }
    }
}

// =============================================================================
// Basic pair
// =============================================================================

#[test]
fn basic_pair() {
    let mut graph: TestGraph = Graph::with_capacity(16);
    let t = graph.add_tracker("T", RemoteKind::Reporter).unwrap();
    let r = graph.add_reporter("r", RemoteKind::Tracker).unwrap();

    r.bind(&mut graph, &t).unwrap();
    assert_eq!(t.len(&graph), 1);
    assert_eq!(r.remote(&graph), Some(t.id()));
    assert_eq!(t.iter(&graph).next(), Some(&"r"));

    assert_eq!(r.destroy(&mut graph), "r");
    assert_eq!(t.len(&graph), 0);
}

#[test]
fn destroying_tracker_unbinds_reporters() {
    let mut graph: TestGraph = Graph::with_capacity(16);
    let t = graph.add_tracker("T", RemoteKind::Reporter).unwrap();
    let a = graph.add_reporter("a", RemoteKind::Tracker).unwrap();
    let b = graph.add_reporter("b", RemoteKind::Tracker).unwrap();
    t.track_many(&mut graph, [&a, &b]).unwrap();

    t.destroy(&mut graph);
    assert!(!a.is_bound(&graph));
    assert!(!b.is_bound(&graph));
    assert_eq!(graph.len(), 2);
}

// =============================================================================
// Triangle of self-referential trackers
// =============================================================================

#[test]
fn triangle() {
    let mut graph: TestGraph = Graph::with_capacity(32);
    let p = graph.add_tracker("p", RemoteKind::Tracker).unwrap();
    let q = graph.add_tracker("q", RemoteKind::Tracker).unwrap();
    let r = graph.add_tracker("r", RemoteKind::Tracker).unwrap();

    p.track(&mut graph, &q).unwrap();
    q.track(&mut graph, &r).unwrap();
    r.track(&mut graph, &p).unwrap();

    let all = [&p, &q, &r];
    for t in all {
        assert_eq!(t.len(&graph), 2);
        assert_mutual(&graph, t, &all);
    }

    p.destroy(&mut graph);
    assert_eq!(q.len(&graph), 1);
    assert_eq!(r.len(&graph), 1);
    assert!(q.iter(&graph).all(|owner| *owner != "p"));
    assert!(r.iter(&graph).all(|owner| *owner != "p"));
    assert!(q.has_remote(&graph, &r));
    assert!(r.has_remote(&graph, &q));
}

// =============================================================================
// Copy policy
// =============================================================================

#[test]
fn tracker_copy_duplicates_edges() {
    let mut graph: TestGraph = Graph::with_capacity(32);
    let x = graph.add_tracker("x", RemoteKind::Tracker).unwrap();
    let y = graph.add_tracker("y", RemoteKind::Tracker).unwrap();
    let src = graph.add_tracker("src", RemoteKind::Tracker).unwrap();
    src.track_many(&mut graph, [&x, &y]).unwrap();

    let copy = src.try_clone(&mut graph, "copy").unwrap();
    assert_eq!(src.len(&graph), 2);
    assert_eq!(copy.len(&graph), 2);
    assert_eq!(x.len(&graph), 2);
    assert_eq!(y.len(&graph), 2);
    assert!(x.has_remote(&graph, &copy));
    assert!(y.has_remote(&graph, &copy));

    // assignment snapshots the source the same way
    let dst = graph.add_tracker("dst", RemoteKind::Tracker).unwrap();
    dst.track(&mut graph, &y).unwrap();
    dst.assign_from(&mut graph, &src).unwrap();
    assert_eq!(dst.iter(&graph).copied().collect::<Vec<_>>(), vec!["x", "y"]);
    assert_eq!(x.len(&graph), 3);
    assert_eq!(y.len(&graph), 3);
}

#[test]
fn one_to_many_reporter_copy_rebinds_to_same_tracker() {
    let mut graph: TestGraph = Graph::with_capacity(32);
    let t = graph.add_tracker("T", RemoteKind::Reporter).unwrap();
    let u = graph.add_tracker("U", RemoteKind::Reporter).unwrap();
    let r = graph.add_reporter("r", RemoteKind::Tracker).unwrap();
    r.bind(&mut graph, &t).unwrap();

    let copy = r.try_clone(&mut graph, "copy").unwrap();
    assert_eq!(copy.remote(&graph), Some(t.id()));
    assert_eq!(t.len(&graph), 2);

    let other = graph.add_reporter("other", RemoteKind::Tracker).unwrap();
    other.bind(&mut graph, &u).unwrap();
    other.assign_from(&mut graph, &r).unwrap();
    assert_eq!(other.remote(&graph), Some(t.id()));
    assert!(u.is_empty(&graph));
    assert_eq!(t.len(&graph), 3);
}

#[test]
fn one_to_one_reporter_copy_is_refused() {
    let mut graph: TestGraph = Graph::with_capacity(16);
    let a = graph.add_reporter("a", RemoteKind::Reporter).unwrap();
    let b = graph.add_reporter("b", RemoteKind::Reporter).unwrap();
    let c = graph.add_reporter("c", RemoteKind::Reporter).unwrap();
    a.bind(&mut graph, &b).unwrap();

    assert_eq!(a.try_clone(&mut graph, "copy").unwrap_err(), BindError::Exclusive);
    assert_eq!(c.assign_from(&mut graph, &a), Err(BindError::Exclusive));
    assert_eq!(a.remote(&graph), Some(b.id()));
    assert_eq!(b.remote(&graph), Some(a.id()));
    assert!(!c.is_bound(&graph));
    assert_eq!(graph.len(), 3);
}

// =============================================================================
// Failure during multi-bind
// =============================================================================

#[test]
fn multi_bind_failure_leaves_zero_bindings() {
    // tracker + 3 reporters + exactly one spare node: the second slot fails
    let mut graph: TestGraph = Graph::with_capacity(5);
    let t = graph.add_tracker("T", RemoteKind::Reporter).unwrap();
    let rs: Vec<Reporter> = ["r1", "r2", "r3"]
        .into_iter()
        .map(|owner| graph.add_reporter(owner, RemoteKind::Tracker).unwrap())
        .collect();

    assert_eq!(t.track_many(&mut graph, &rs), Err(BindError::Full));
    assert!(t.is_empty(&graph));
    assert!(rs.iter().all(|r| !r.is_bound(&graph)));
    assert_eq!(graph.len(), 4);
}

#[test]
fn multi_bind_failure_keeps_existing_bindings() {
    let mut graph: TestGraph = Graph::with_capacity(7);
    let t = graph.add_tracker("T", RemoteKind::Reporter).unwrap();
    let u = graph.add_tracker("U", RemoteKind::Reporter).unwrap();
    let rs: Vec<Reporter> = ["r1", "r2", "r3"]
        .into_iter()
        .map(|owner| graph.add_reporter(owner, RemoteKind::Tracker).unwrap())
        .collect();
    u.track(&mut graph, &rs[0]).unwrap();

    // one node left: r1 would move from U to T, but r2 cannot be stored
    assert_eq!(t.track_many(&mut graph, [&rs[0], &rs[1]]), Err(BindError::Full));
    assert_eq!(rs[0].remote(&graph), Some(u.id()));
    assert_eq!(u.len(&graph), 1);
    assert!(t.is_empty(&graph));
}

#[test]
fn tracker_peer_mirror_failure() {
    // tracker/tracker binds need two nodes per binding
    let mut graph: TestGraph = Graph::with_capacity(5);
    let p = graph.add_tracker("p", RemoteKind::Tracker).unwrap();
    let q = graph.add_tracker("q", RemoteKind::Tracker).unwrap();
    let r = graph.add_tracker("r", RemoteKind::Tracker).unwrap();

    assert_eq!(p.track_many(&mut graph, [&q, &r]), Err(BindError::Full));
    assert!(p.is_empty(&graph));
    assert!(q.is_empty(&graph));
    assert!(r.is_empty(&graph));
    assert_eq!(graph.len(), 3);
}

#[test]
fn add_tracker_bound_is_all_or_nothing() {
    let mut graph: TestGraph = Graph::with_capacity(4);
    let a = graph.add_reporter("a", RemoteKind::Tracker).unwrap();
    let b = graph.add_reporter("b", RemoteKind::Tracker).unwrap();

    let err = graph
        .add_tracker_bound("T", RemoteKind::Reporter, [&a, &b])
        .unwrap_err();
    assert_eq!(err, BindError::Full);
    assert_eq!(graph.len(), 2);
    assert!(!a.is_bound(&graph));

    let single = graph
        .add_reporter_bound("c", RemoteKind::Reporter, &a)
        .unwrap_err();
    assert_eq!(
        single,
        BindError::KindMismatch {
            expected: RemoteKind::Tracker,
            found: RemoteKind::Reporter,
        }
    );
    assert_eq!(graph.len(), 2);
}

// =============================================================================
// Rebind
// =============================================================================

fn snapshot(graph: &TestGraph, trackers: &[&Tracker], reporters: &[&Reporter]) -> Vec<String> {
    let mut out = Vec::new();
    for t in trackers {
        for handle in t.handles(graph) {
            out.push(format!("{:?}->{:?}", handle, t.remote_of(graph, handle)));
        }
    }
    for r in reporters {
        out.push(format!("{:?}->{:?}@{:?}", r.id(), r.remote(graph), r.mirror(graph)));
    }
    out
}

#[test]
fn rebind_to_current_peer_changes_nothing() {
    let mut graph: TestGraph = Graph::with_capacity(32);
    let t = graph.add_tracker("T", RemoteKind::Reporter).unwrap();
    let p = graph.add_tracker("p", RemoteKind::Tracker).unwrap();
    let q = graph.add_tracker("q", RemoteKind::Tracker).unwrap();
    let a = graph.add_reporter("a", RemoteKind::Tracker).unwrap();
    let b = graph.add_reporter("b", RemoteKind::Reporter).unwrap();
    let c = graph.add_reporter("c", RemoteKind::Reporter).unwrap();
    a.bind(&mut graph, &t).unwrap();
    b.bind(&mut graph, &c).unwrap();
    let h = p.track(&mut graph, &q).unwrap();

    let before = snapshot(&graph, &[&t, &p, &q], &[&a, &b, &c]);
    a.rebind(&mut graph, &t).unwrap();
    b.rebind(&mut graph, &c).unwrap();
    c.rebind(&mut graph, &b).unwrap();
    p.rebind(&mut graph, h, &q).unwrap();
    assert_eq!(snapshot(&graph, &[&t, &p, &q], &[&a, &b, &c]), before);
}

#[test]
fn rebind_unbound_reporter() {
    let mut graph: TestGraph = Graph::with_capacity(8);
    let t = graph.add_tracker("T", RemoteKind::Reporter).unwrap();
    let r = graph.add_reporter("r", RemoteKind::Tracker).unwrap();

    r.rebind(&mut graph, &t).unwrap();
    assert_eq!(r.remote(&graph), Some(t.id()));
    assert_eq!(r.position(&graph), Some(0));
}

// =============================================================================
// Moves
// =============================================================================

#[test]
fn tracker_move_repoints_every_peer() {
    let mut graph: TestGraph = Graph::with_capacity(32);
    let src = graph.add_tracker("src", RemoteKind::Tracker).unwrap();
    let dst = graph.add_tracker("dst", RemoteKind::Tracker).unwrap();
    let peers: Vec<Tracker> = ["a", "b", "c"]
        .into_iter()
        .map(|owner| graph.add_tracker(owner, RemoteKind::Tracker).unwrap())
        .collect();
    src.track_many(&mut graph, &peers).unwrap();

    dst.move_from(&mut graph, &src).unwrap();
    assert!(src.is_empty(&graph));
    assert_eq!(dst.len(&graph), 3);
    for peer in &peers {
        assert_eq!(peer.remotes(&graph).collect::<Vec<_>>(), vec![dst.id()]);
        let handle = peer.front(&graph).unwrap();
        let mirror = peer.mirror_of(&graph, handle).unwrap();
        assert_eq!(dst.mirror_of(&graph, mirror), Some(handle));
    }
}

#[test]
fn reporter_move_repoints_tracker_slot() {
    let mut graph: TestGraph = Graph::with_capacity(16);
    let t = graph.add_tracker("T", RemoteKind::Reporter).unwrap();
    let a = graph.add_reporter("a", RemoteKind::Tracker).unwrap();
    let b = graph.add_reporter("b", RemoteKind::Tracker).unwrap();
    a.bind(&mut graph, &t).unwrap();
    let slot = a.mirror(&graph);

    b.move_from(&mut graph, &a).unwrap();
    assert!(!a.is_bound(&graph));
    assert_eq!(b.mirror(&graph), slot);
    assert_eq!(t.iter(&graph).collect::<Vec<_>>(), vec![&"b"]);
}

#[test]
fn reporter_move_kind_mismatch() {
    let mut graph: TestGraph = Graph::with_capacity(16);
    let a = graph.add_reporter("a", RemoteKind::Tracker).unwrap();
    let b = graph.add_reporter("b", RemoteKind::Reporter).unwrap();
    assert!(matches!(
        b.move_from(&mut graph, &a),
        Err(BindError::KindMismatch { .. })
    ));
}

// =============================================================================
// Splice & transfer conservation
// =============================================================================

#[test]
fn splice_conserves_bindings() {
    let mut graph: TestGraph = Graph::with_capacity(64);
    let a = graph.add_tracker("A", RemoteKind::Tracker).unwrap();
    let b = graph.add_tracker("B", RemoteKind::Tracker).unwrap();
    let peers: Vec<Tracker> = ["p0", "p1", "p2", "p3", "p4"]
        .into_iter()
        .map(|owner| graph.add_tracker(owner, RemoteKind::Tracker).unwrap())
        .collect();
    a.track_many(&mut graph, &peers[..2]).unwrap();
    b.track_many(&mut graph, &peers[2..]).unwrap();
    // an edge between the two trackers themselves
    a.track(&mut graph, &b).unwrap();

    let (n, m) = (a.len(&graph), b.len(&graph));
    a.splice(&mut graph, None, &b).unwrap();
    assert_eq!(a.len(&graph), n + m);
    assert!(b.is_empty(&graph));

    for peer in &peers {
        assert_eq!(peer.remotes(&graph).collect::<Vec<_>>(), vec![a.id()]);
    }
    let mut all: Vec<&Tracker> = peers.iter().collect();
    all.extend([&a, &b]);
    for t in &all {
        assert_mutual(&graph, t, &all);
    }
    // the A-B edge is now a self edge of A, visible from both slots
    let self_edges = a.remotes(&graph).filter(|id| *id == a.id()).count();
    assert_eq!(self_edges, 2);
    for handle in a.handles(&graph) {
        let Some(mirror) = a.mirror_of(&graph, handle) else {
            panic!("tracker slot without mirror");
        };
        let remote = a.remote_of(&graph, handle);
        if remote == Some(a.id()) {
            assert_eq!(a.mirror_of(&graph, mirror), Some(handle));
        }
    }
}

#[test]
fn transfer_moves_only_range() {
    let mut graph: TestGraph = Graph::with_capacity(64);
    let a = graph.add_tracker("A", RemoteKind::Reporter).unwrap();
    let b = graph.add_tracker("B", RemoteKind::Reporter).unwrap();
    let rs: Vec<Reporter> = ["r0", "r1", "r2", "r3"]
        .into_iter()
        .map(|owner| graph.add_reporter(owner, RemoteKind::Tracker).unwrap())
        .collect();
    b.track_many(&mut graph, &rs).unwrap();

    let first = b.nth(&graph, 1).unwrap();
    a.transfer(&mut graph, None, &b, first, None).unwrap();

    assert_eq!(a.len(&graph), 3);
    assert_eq!(b.len(&graph), 1);
    assert_eq!(rs[0].remote(&graph), Some(b.id()));
    assert!(rs[1..].iter().all(|r| r.remote(&graph) == Some(a.id())));
    // handles survive the move
    assert_eq!(a.front(&graph), Some(first));
}

#[test]
fn splice_kind_mismatch() {
    let mut graph: TestGraph = Graph::with_capacity(8);
    let a = graph.add_tracker("A", RemoteKind::Reporter).unwrap();
    let b = graph.add_tracker("B", RemoteKind::Tracker).unwrap();
    assert_eq!(
        a.splice(&mut graph, None, &b),
        Err(BindError::KindMismatch {
            expected: RemoteKind::Reporter,
            found: RemoteKind::Tracker,
        })
    );
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn sorted_graph_keeps_trackers_sorted() {
    let mut graph: TestGraph = Graph::with_capacity(64);
    let rs: Vec<Reporter> = ["r0", "r1", "r2", "r3"]
        .into_iter()
        .map(|owner| graph.add_reporter(owner, RemoteKind::Tracker).unwrap())
        .collect();
    let t = graph
        .add_tracker_ordered("T", RemoteKind::Reporter, Order::ByRemote)
        .unwrap();

    t.track_many(&mut graph, [&rs[3], &rs[1], &rs[2], &rs[0], &rs[1]]).unwrap();
    // r1 appears once: the second bind replaced the first
    assert_eq!(
        t.iter(&graph).copied().collect::<Vec<_>>(),
        vec!["r0", "r1", "r2", "r3"]
    );
    assert!(t.is_sorted(&graph));
}

#[test]
fn duplicate_tracker_bindings_are_allowed() {
    let mut graph: TestGraph = Graph::with_capacity(16);
    let p = graph.add_tracker("p", RemoteKind::Tracker).unwrap();
    let q = graph.add_tracker("q", RemoteKind::Tracker).unwrap();

    p.track(&mut graph, &q).unwrap();
    p.track(&mut graph, &q).unwrap();
    assert_eq!(p.len(&graph), 2);
    assert_eq!(q.len(&graph), 2);
}

// =============================================================================
// Teardown
// =============================================================================

#[test]
fn destroying_everything_frees_every_node() {
    let mut graph: TestGraph = Graph::with_capacity(64);
    let p = graph.add_tracker("p", RemoteKind::Tracker).unwrap();
    let q = graph.add_tracker("q", RemoteKind::Tracker).unwrap();
    let t = graph.add_tracker("T", RemoteKind::Reporter).unwrap();
    let a = graph.add_reporter("a", RemoteKind::Tracker).unwrap();
    let b = graph.add_reporter("b", RemoteKind::Reporter).unwrap();
    let c = graph.add_reporter("c", RemoteKind::Reporter).unwrap();

    p.track_many(&mut graph, [&q, &p, &q]).unwrap();
    t.track(&mut graph, &a).unwrap();
    b.bind(&mut graph, &c).unwrap();

    p.destroy(&mut graph);
    q.destroy(&mut graph);
    a.destroy(&mut graph);
    t.destroy(&mut graph);
    b.destroy(&mut graph);
    c.destroy(&mut graph);
    assert!(graph.is_empty());
}

#[test]
fn wipe_during_full_teardown() {
    let mut graph: TestGraph = Graph::with_capacity(32);
    let p = graph.add_tracker("p", RemoteKind::Tracker).unwrap();
    let q = graph.add_tracker("q", RemoteKind::Tracker).unwrap();
    p.track(&mut graph, &q).unwrap();
    q.track(&mut graph, &p).unwrap();

    p.wipe(&mut graph);
    q.wipe(&mut graph);
    assert_eq!(p.destroy(&mut graph), "p");
    assert_eq!(q.destroy(&mut graph), "q");
    assert!(graph.is_empty());
}

#[cfg(feature = "slab")]
#[test]
fn slab_backed_graph_grows() {
    use nexus_tracker::GraphBuilder;

    let mut graph: Graph<u32, usize, slab::Slab<_>> =
        GraphBuilder::new().build_with(slab::Slab::new());
    let t = graph.add_tracker(0, RemoteKind::Reporter).unwrap();
    let rs: Vec<_> = (1..=100)
        .map(|i| graph.add_reporter(i, RemoteKind::Tracker).unwrap())
        .collect();
    t.track_many(&mut graph, &rs).unwrap();
    assert_eq!(t.len(&graph), 100);
    assert_eq!(graph.len(), 201);
}
