//! The storage that every reporter, tracker and slot of one world lives in.
//!
//! A [`Graph`] is not a registry: it holds no lookup tables. It is the
//! storage the binding protocol follows keys through, the same way a
//! `nexus-collections` list follows keys through its node storage.

use std::marker::PhantomData;

use crate::node::{Remote, ReporterNode, Repr, SlotNode, TrackerNode};
use crate::protocol::{Peer, Placement};
use crate::{
    BindError, BoxedStorage, EndpointId, Full, Key, Node, Order, RemoteKind, Reporter, Storage,
    Tracker,
};

/// Storage that can hold graph nodes.
///
/// Blanket-implemented for every [`Storage`] of [`Node`]s whose key type is
/// `K`; it only exists to shorten bounds.
pub trait NodeStorage<O, K: Key>: Storage<Node<O, K>, Key = K> {}

impl<O, K: Key, S> NodeStorage<O, K> for S where S: Storage<Node<O, K>, Key = K> {}

/// Type alias for bounded graph storage backed by a boxed allocation.
pub type BoxedNodeStorage<O, K = u32> = BoxedStorage<Node<O, K>, K>;

/// Type alias for unbounded graph storage backed by `slab::Slab`.
#[cfg(feature = "slab")]
pub type SlabNodeStorage<O> = slab::Slab<Node<O, usize>>;

/// Storage for a world of mutually bound reporters and trackers.
///
/// Every operation on a [`Reporter`] or [`Tracker`] takes the graph it was
/// created in.
///
/// # Storage Invariant
///
/// Handles must always be used with the graph that created them. Passing a
/// handle to a different graph panics or binds unrelated nodes. This is the
/// caller's responsibility (same discipline as the `slab` crate).
///
/// # Example
///
/// ```
/// use nexus_tracker::{Graph, RemoteKind};
///
/// let mut graph: Graph<&str> = Graph::with_capacity(16);
///
/// let tracker = graph.add_tracker("list", RemoteKind::Reporter).unwrap();
/// let item = graph.add_reporter("item", RemoteKind::Tracker).unwrap();
///
/// item.bind(&mut graph, &tracker).unwrap();
/// assert_eq!(tracker.len(&graph), 1);
/// assert_eq!(item.remote_owner(&graph), Some(&"list"));
///
/// item.destroy(&mut graph);
/// assert!(tracker.is_empty(&graph));
/// ```
#[derive(Debug)]
pub struct Graph<O, K: Key = u32, S = BoxedNodeStorage<O, K>> {
    storage: S,
    order: Order,
    _marker: PhantomData<(O, K)>,
}

/// Builder for a boxed [`Graph`].
///
/// # Example
///
/// ```
/// use nexus_tracker::{Graph, GraphBuilder, Order, RemoteKind};
///
/// let mut graph: Graph<u32> = GraphBuilder::new()
///     .capacity(64)
///     .order(Order::ByRemote)
///     .build();
///
/// let tracker = graph.add_tracker(0, RemoteKind::Reporter).unwrap();
/// assert_eq!(tracker.order(&graph), Order::ByRemote);
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    capacity: usize,
    order: Order,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self {
            capacity: 1024,
            order: Order::Insertion,
        }
    }
}

impl GraphBuilder {
    /// Creates a builder with capacity 1024 and [`Order::Insertion`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of nodes the boxed storage can hold.
    ///
    /// Every reporter, every tracker and every slot takes one node.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the order given to trackers created without an explicit one.
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Builds a graph over [`BoxedStorage`].
    ///
    /// # Panics
    ///
    /// Panics if the capacity is 0 or does not fit the key type.
    pub fn build<O, K: Key>(self) -> Graph<O, K> {
        let storage = BoxedStorage::with_capacity(self.capacity);
        self.build_with(storage)
    }

    /// Builds a graph over caller-provided storage. The capacity is ignored.
    pub fn build_with<O, K: Key, S: NodeStorage<O, K>>(self, storage: S) -> Graph<O, K, S> {
        Graph {
            storage,
            order: self.order,
            _marker: PhantomData,
        }
    }
}

impl<O, K: Key> Graph<O, K, BoxedNodeStorage<O, K>> {
    /// Creates a graph over [`BoxedStorage`] holding up to `capacity` nodes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 or does not fit the key type.
    pub fn with_capacity(capacity: usize) -> Self {
        GraphBuilder::new().capacity(capacity).build()
    }

    /// Returns the number of nodes the storage can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }
}

impl<O, K: Key, S: NodeStorage<O, K>> Graph<O, K, S> {
    /// Creates a graph over caller-provided storage.
    pub fn with_storage(storage: S) -> Self {
        GraphBuilder::new().build_with(storage)
    }

    /// Returns the number of live nodes (endpoints and slots).
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if no nodes are live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Returns the order given to trackers created by [`add_tracker`](Self::add_tracker).
    #[inline]
    pub fn default_order(&self) -> Order {
        self.order
    }

    /// Returns the underlying storage.
    #[inline]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ========================================================================
    // Endpoint construction
    // ========================================================================

    /// Creates an unbound reporter that binds to peers of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(owner))` if storage is full.
    pub fn add_reporter(&mut self, owner: O, kind: RemoteKind) -> Result<Reporter<K>, Full<O>> {
        let node = Node(Repr::Reporter(ReporterNode {
            owner,
            kind,
            remote: Remote::Unbound,
        }));
        let key = self.storage.try_insert(node).map_err(|Full(node)| Full(node.into_owner()))?;
        Ok(Reporter::from_key(key))
    }

    /// Creates an empty tracker that binds to peers of `kind`, using the
    /// graph's default order.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(owner))` if storage is full.
    pub fn add_tracker(&mut self, owner: O, kind: RemoteKind) -> Result<Tracker<K>, Full<O>> {
        self.add_tracker_ordered(owner, kind, self.order)
    }

    /// Creates an empty tracker with an explicit [`Order`].
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(owner))` if storage is full.
    pub fn add_tracker_ordered(
        &mut self,
        owner: O,
        kind: RemoteKind,
        order: Order,
    ) -> Result<Tracker<K>, Full<O>> {
        let node = Node(Repr::Tracker(TrackerNode {
            owner,
            kind,
            order,
            head: K::NONE,
            tail: K::NONE,
            len: 0,
        }));
        let key = self.storage.try_insert(node).map_err(|Full(node)| Full(node.into_owner()))?;
        Ok(Tracker::from_key(key))
    }

    /// Creates a reporter already bound to `peer`.
    ///
    /// # Errors
    ///
    /// On any error nothing is created and `owner` is dropped.
    pub fn add_reporter_bound<'p>(
        &mut self,
        owner: O,
        kind: RemoteKind,
        peer: impl Into<Peer<'p, K>>,
    ) -> Result<Reporter<K>, BindError> {
        let reporter = self.add_reporter(owner, kind)?;
        match reporter.bind(self, peer) {
            Ok(()) => Ok(reporter),
            Err(err) => {
                reporter.destroy(self);
                Err(err)
            }
        }
    }

    /// Creates a tracker bound to every peer in `peers`, in order.
    ///
    /// # Errors
    ///
    /// All-or-nothing: on any error nothing is created, no peer is touched
    /// and `owner` is dropped.
    pub fn add_tracker_bound<'p, I>(
        &mut self,
        owner: O,
        kind: RemoteKind,
        peers: I,
    ) -> Result<Tracker<K>, BindError>
    where
        I: IntoIterator,
        I::Item: Into<Peer<'p, K>>,
    {
        let tracker = self.add_tracker(owner, kind)?;
        match tracker.track_many(self, peers) {
            Ok(()) => Ok(tracker),
            Err(err) => {
                tracker.destroy(self);
                Err(err)
            }
        }
    }

    // ========================================================================
    // Node access
    // ========================================================================

    #[inline]
    pub(crate) fn reporter(&self, key: K) -> &ReporterNode<O, K> {
        match self.storage.get(key) {
            Some(Node(Repr::Reporter(node))) => node,
            _ => panic!("invalid reporter key {key:?}"),
        }
    }

    #[inline]
    pub(crate) fn reporter_mut(&mut self, key: K) -> &mut ReporterNode<O, K> {
        match self.storage.get_mut(key) {
            Some(Node(Repr::Reporter(node))) => node,
            _ => panic!("invalid reporter key {key:?}"),
        }
    }

    #[inline]
    pub(crate) fn tracker(&self, key: K) -> &TrackerNode<O, K> {
        match self.storage.get(key) {
            Some(Node(Repr::Tracker(node))) => node,
            _ => panic!("invalid tracker key {key:?}"),
        }
    }

    #[inline]
    pub(crate) fn tracker_mut(&mut self, key: K) -> &mut TrackerNode<O, K> {
        match self.storage.get_mut(key) {
            Some(Node(Repr::Tracker(node))) => node,
            _ => panic!("invalid tracker key {key:?}"),
        }
    }

    #[inline]
    pub(crate) fn slot(&self, key: K) -> &SlotNode<K> {
        match self.storage.get(key) {
            Some(Node(Repr::Slot(node))) => node,
            _ => panic!("invalid slot key {key:?}"),
        }
    }

    #[inline]
    pub(crate) fn slot_mut(&mut self, key: K) -> &mut SlotNode<K> {
        match self.storage.get_mut(key) {
            Some(Node(Repr::Slot(node))) => node,
            _ => panic!("invalid slot key {key:?}"),
        }
    }

    /// Returns `true` if `key` is a live slot threaded through `tracker`.
    #[inline]
    pub(crate) fn is_slot_of(&self, tracker: K, key: K) -> bool {
        matches!(
            self.storage.get(key),
            Some(Node(Repr::Slot(node))) if node.tracker == tracker
        )
    }

    /// Kind of peer the endpoint binds to.
    #[inline]
    pub(crate) fn accepts(&self, id: EndpointId<K>) -> RemoteKind {
        match id {
            EndpointId::Reporter(key) => self.reporter(key).kind,
            EndpointId::Tracker(key) => self.tracker(key).kind,
        }
    }

    #[inline]
    pub(crate) fn owner_of(&self, id: EndpointId<K>) -> &O {
        match id {
            EndpointId::Reporter(key) => &self.reporter(key).owner,
            EndpointId::Tracker(key) => &self.tracker(key).owner,
        }
    }

    /// Inserts a detached slot for `tracker`.
    #[inline]
    pub(crate) fn alloc_slot(&mut self, tracker: K) -> Result<K, BindError> {
        Ok(self.storage.try_insert(Node(Repr::Slot(SlotNode::detached(tracker))))?)
    }

    /// Removes a node from storage, returning the owner for endpoints.
    #[inline]
    pub(crate) fn free(&mut self, key: K) -> Option<O> {
        match self.storage.remove(key)?.0 {
            Repr::Reporter(node) => Some(node.owner),
            Repr::Tracker(node) => Some(node.owner),
            Repr::Slot(_) => None,
        }
    }

    /// Removes an endpoint node, returning its owner.
    pub(crate) fn remove_endpoint(&mut self, key: K) -> O {
        match self.free(key) {
            Some(owner) => owner,
            None => panic!("invalid endpoint key {key:?}"),
        }
    }

    /// Peer of a linked slot. Linked slots are always bound.
    #[inline]
    pub(crate) fn slot_peer(&self, key: K) -> EndpointId<K> {
        match self.slot(key).remote.endpoint() {
            Some(peer) => peer,
            None => panic!("unbound slot {key:?} in tracker chain"),
        }
    }

    // ========================================================================
    // Chain primitives (no remote is touched)
    // ========================================================================

    /// Links a detached slot before `before`, or at the back if `before` is `NONE`.
    pub(crate) fn link_before(&mut self, tracker: K, before: K, key: K) {
        let prev = if before.is_some() {
            self.slot(before).prev
        } else {
            self.tracker(tracker).tail
        };

        let node = self.slot_mut(key);
        node.tracker = tracker;
        node.prev = prev;
        node.next = before;

        if before.is_some() {
            self.slot_mut(before).prev = key;
        } else {
            self.tracker_mut(tracker).tail = key;
        }

        if prev.is_some() {
            self.slot_mut(prev).next = key;
        } else {
            self.tracker_mut(tracker).head = key;
        }

        self.tracker_mut(tracker).len += 1;
    }

    /// Unlinks a slot from its tracker's chain without freeing it.
    pub(crate) fn unlink(&mut self, key: K) {
        let node = self.slot(key);
        let (tracker, prev, next) = (node.tracker, node.prev, node.next);

        if prev.is_some() {
            self.slot_mut(prev).next = next;
        } else {
            self.tracker_mut(tracker).head = next;
        }

        if next.is_some() {
            self.slot_mut(next).prev = prev;
        } else {
            self.tracker_mut(tracker).tail = prev;
        }

        let node = self.slot_mut(key);
        node.prev = K::NONE;
        node.next = K::NONE;

        self.tracker_mut(tracker).len -= 1;
    }

    /// Detaches the chain `first..=last` of `count` slots from `tracker`.
    ///
    /// The detached chain keeps its inner links.
    pub(crate) fn unlink_chain(&mut self, tracker: K, first: K, last: K, count: usize) {
        let prev = self.slot(first).prev;
        let next = self.slot(last).next;

        if prev.is_some() {
            self.slot_mut(prev).next = next;
        } else {
            self.tracker_mut(tracker).head = next;
        }

        if next.is_some() {
            self.slot_mut(next).prev = prev;
        } else {
            self.tracker_mut(tracker).tail = prev;
        }

        self.slot_mut(first).prev = K::NONE;
        self.slot_mut(last).next = K::NONE;
        self.tracker_mut(tracker).len -= count;
    }

    /// Links a detached chain `first..=last` of `count` slots before `before`
    /// (or at the back). Slot `tracker` fields are left to the caller.
    pub(crate) fn link_chain_before(
        &mut self,
        tracker: K,
        before: K,
        first: K,
        last: K,
        count: usize,
    ) {
        let prev = if before.is_some() {
            self.slot(before).prev
        } else {
            self.tracker(tracker).tail
        };

        self.slot_mut(first).prev = prev;
        self.slot_mut(last).next = before;

        if before.is_some() {
            self.slot_mut(before).prev = last;
        } else {
            self.tracker_mut(tracker).tail = last;
        }

        if prev.is_some() {
            self.slot_mut(prev).next = first;
        } else {
            self.tracker_mut(tracker).head = first;
        }

        self.tracker_mut(tracker).len += count;
    }

    /// Number of slots before `key` in its chain. O(n).
    pub(crate) fn ordinal(&self, key: K) -> usize {
        let mut count = 0;
        let mut curr = self.slot(key).prev;
        while curr.is_some() {
            count += 1;
            curr = self.slot(curr).prev;
        }
        count
    }

    /// First slot whose remote sorts at or after `sort_key`, or `NONE`.
    pub(crate) fn lower_bound(&self, tracker: K, sort_key: usize) -> K {
        let mut curr = self.tracker(tracker).head;
        while curr.is_some() {
            let node = self.slot(curr);
            if node.remote.sort_key() >= sort_key {
                return curr;
            }
            curr = node.next;
        }
        K::NONE
    }

    /// Resolves a placement to the slot to link before (`NONE` = back).
    pub(crate) fn resolve(&self, tracker: K, placement: Placement<K>, sort_key: usize) -> K {
        match placement {
            Placement::Back => K::NONE,
            Placement::Before(before) => before,
            Placement::Policy => match self.tracker(tracker).order {
                Order::Insertion => K::NONE,
                Order::ByRemote => self.lower_bound(tracker, sort_key),
            },
        }
    }
}

impl<O, K: Key> Node<O, K> {
    fn into_owner(self) -> O {
        match self.0 {
            Repr::Reporter(node) => node.owner,
            Repr::Tracker(node) => node.owner,
            Repr::Slot(_) => unreachable!("slots have no owner"),
        }
    }
}
