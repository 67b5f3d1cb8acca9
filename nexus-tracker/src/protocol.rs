//! The symmetric binding protocol.
//!
//! Every fallible operation here follows the same shape: validate, allocate
//! every node the result needs, then commit with operations that cannot
//! fail. A failed allocation frees what was reserved and returns before any
//! existing binding is touched.

use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::graph::NodeStorage;
use crate::node::Remote;
use crate::slot::Reserved;
use crate::{BindError, EndpointId, Graph, Key, Order, RemoteKind, Reporter, Tracker};

/// Where new slots go inside a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement<K> {
    /// Follow the tracker's [`Order`](crate::Order).
    Policy,
    Back,
    Before(K),
}

impl<K: Key> Placement<K> {
    /// `None` means the back of the tracker.
    pub(crate) fn at(position: Option<K>) -> Self {
        match position {
            Some(before) => Placement::Before(before),
            None => Placement::Back,
        }
    }
}

/// A borrowed reference to an endpoint that something binds to.
///
/// Built from `&Reporter` or `&Tracker`, so every binding method accepts either.
///
/// ```
/// use nexus_tracker::{EndpointId, Graph, Peer, RemoteKind};
///
/// let mut graph: Graph<()> = Graph::with_capacity(4);
/// let tracker = graph.add_tracker((), RemoteKind::Reporter).unwrap();
///
/// let peer = Peer::from(&tracker);
/// assert_eq!(peer.id(), tracker.id());
/// assert!(matches!(peer.id(), EndpointId::Tracker(_)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer<'a, K = u32> {
    id: EndpointId<K>,
    _borrow: PhantomData<&'a ()>,
}

impl<K: Key> Peer<'_, K> {
    /// Returns the identity of the referenced endpoint.
    #[inline]
    pub fn id(&self) -> EndpointId<K> {
        self.id
    }
}

impl<'a, K: Key> From<&'a Reporter<K>> for Peer<'a, K> {
    #[inline]
    fn from(reporter: &'a Reporter<K>) -> Self {
        Peer {
            id: reporter.id(),
            _borrow: PhantomData,
        }
    }
}

impl<'a, K: Key> From<&'a Tracker<K>> for Peer<'a, K> {
    #[inline]
    fn from(tracker: &'a Tracker<K>) -> Self {
        Peer {
            id: tracker.id(),
            _borrow: PhantomData,
        }
    }
}

impl<O, K: Key, S: NodeStorage<O, K>> Graph<O, K, S> {
    // ========================================================================
    // Validation
    // ========================================================================

    /// Both ends must accept each other's kind.
    pub(crate) fn check_kinds(
        &self,
        local: EndpointId<K>,
        peer: EndpointId<K>,
    ) -> Result<(), BindError> {
        let expected = self.accepts(local);
        if expected != peer.kind() {
            return Err(BindError::KindMismatch {
                expected,
                found: peer.kind(),
            });
        }
        let expected = self.accepts(peer);
        if expected != local.kind() {
            return Err(BindError::KindMismatch {
                expected,
                found: local.kind(),
            });
        }
        Ok(())
    }

    fn check_same_kind(&self, tracker: K, other: K) -> Result<(), BindError> {
        let expected = self.tracker(tracker).kind;
        let found = self.tracker(other).kind;
        if expected != found {
            return Err(BindError::KindMismatch { expected, found });
        }
        Ok(())
    }

    fn check_position(&self, tracker: K, position: Option<K>) -> Result<(), BindError> {
        match position {
            Some(before) if !self.is_slot_of(tracker, before) => Err(BindError::ForeignHandle),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// Binds `tracker` to every peer, in order. All-or-nothing.
    ///
    /// Returns the new slots in peer order. A slot may already be gone when
    /// the same reporter appears twice; the later binding wins.
    pub(crate) fn bind_batch(
        &mut self,
        tracker: K,
        placement: Placement<K>,
        peers: &[EndpointId<K>],
    ) -> Result<Vec<K>, BindError> {
        for &peer in peers {
            self.check_kinds(EndpointId::Tracker(tracker), peer)?;
        }
        if let Placement::Before(before) = placement {
            self.check_position(tracker, Some(before))?;
        }

        let mut reserved: Vec<Reserved<K>> = Vec::with_capacity(peers.len());
        for &peer in peers {
            match self.reserve(tracker, peer) {
                Ok(entry) => reserved.push(entry),
                Err(err) => {
                    debug!(
                        tracker = ?tracker,
                        reserved = reserved.len(),
                        requested = peers.len(),
                        "bind failed, rolling back"
                    );
                    for entry in reserved {
                        self.release(entry);
                    }
                    return Err(err);
                }
            }
        }

        // Link every slot before any reporter is attached: attaching may
        // erase a reporter's previous slot, which can be the anchor.
        for &entry in &reserved {
            self.link_reserved(tracker, placement, entry);
        }
        for entry in &reserved {
            if let EndpointId::Reporter(reporter) = entry.peer {
                self.attach_reporter(
                    reporter,
                    Remote::Slot {
                        tracker,
                        slot: entry.slot,
                    },
                );
            }
        }

        if !reserved.is_empty() {
            trace!(tracker = ?tracker, added = reserved.len(), "bound slots");
        }
        Ok(reserved.into_iter().map(|entry| entry.slot).collect())
    }

    /// Binds one peer to `tracker`, returning the new slot.
    pub(crate) fn bind_one(
        &mut self,
        tracker: K,
        placement: Placement<K>,
        peer: EndpointId<K>,
    ) -> Result<K, BindError> {
        let slots = self.bind_batch(tracker, placement, &[peer])?;
        Ok(slots[0])
    }

    pub(crate) fn bind_reporter(
        &mut self,
        reporter: K,
        peer: EndpointId<K>,
    ) -> Result<(), BindError> {
        self.check_kinds(EndpointId::Reporter(reporter), peer)?;
        match peer {
            EndpointId::Reporter(other) => self.pair_reporters(reporter, other),
            EndpointId::Tracker(tracker) => {
                self.bind_one(tracker, Placement::Policy, EndpointId::Reporter(reporter))?;
            }
        }
        Ok(())
    }

    pub(crate) fn rebind_reporter(
        &mut self,
        reporter: K,
        peer: EndpointId<K>,
    ) -> Result<(), BindError> {
        if self.reporter(reporter).remote.endpoint() == Some(peer) {
            return Ok(());
        }
        self.bind_reporter(reporter, peer)
    }

    /// Points an existing slot at a new peer, in place.
    pub(crate) fn rebind_slot(
        &mut self,
        tracker: K,
        slot: K,
        peer: EndpointId<K>,
    ) -> Result<(), BindError> {
        if !self.is_slot_of(tracker, slot) {
            return Err(BindError::ForeignHandle);
        }
        self.check_kinds(EndpointId::Tracker(tracker), peer)?;
        if self.slot(slot).remote.endpoint() == Some(peer) {
            return Ok(());
        }

        match peer {
            EndpointId::Reporter(reporter) => {
                let old = core::mem::replace(
                    &mut self.slot_mut(slot).remote,
                    Remote::Reporter(reporter),
                );
                self.reset_remote(old);
                self.attach_reporter(reporter, Remote::Slot { tracker, slot });
            }
            EndpointId::Tracker(other) => {
                let mirror = self.alloc_slot(other)?;
                let old = core::mem::replace(
                    &mut self.slot_mut(slot).remote,
                    Remote::Slot { tracker: other, slot: mirror },
                );
                self.reset_remote(old);

                let back = Remote::Slot { tracker, slot };
                self.slot_mut(mirror).remote = back;
                let before = self.resolve(other, Placement::Policy, back.sort_key());
                self.link_before(other, before, mirror);
            }
        }

        self.resort_slot(slot);
        Ok(())
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Erases `first` up to (not including) `last`; `NONE` means the end.
    ///
    /// Returns `false` without erasing anything unless `first` is a slot of
    /// `tracker` and `last` is `NONE` or follows it.
    pub(crate) fn erase_range(&mut self, tracker: K, first: K, last: K) -> bool {
        if !self.is_slot_of(tracker, first) {
            return false;
        }

        let mut doomed = Vec::new();
        let mut curr = first;
        while curr != last {
            if curr.is_none() {
                return false;
            }
            doomed.push(curr);
            curr = self.slot(curr).next;
        }

        // A slot bound to another slot of the same tracker takes its mirror
        // with it, so later entries may already be gone.
        for slot in doomed {
            if self.is_slot_of(tracker, slot) {
                self.erase_slot(slot);
            }
        }
        true
    }

    pub(crate) fn clear_tracker(&mut self, tracker: K) {
        loop {
            let head = self.tracker(tracker).head;
            if head.is_none() {
                break;
            }
            self.erase_slot(head);
        }
    }

    /// Frees every slot without telling any remote.
    pub(crate) fn wipe_tracker(&mut self, tracker: K) {
        let mut curr = self.tracker(tracker).head;
        let mut wiped = 0usize;
        while curr.is_some() {
            let next = self.slot(curr).next;
            self.free(curr);
            curr = next;
            wiped += 1;
        }

        let node = self.tracker_mut(tracker);
        node.head = K::NONE;
        node.tail = K::NONE;
        node.len = 0;
        trace!(tracker = ?tracker, wiped, "wiped tracker");
    }

    // ========================================================================
    // Structural moves
    // ========================================================================

    /// Gives every slot of a detached chain to `tracker` and repoints the
    /// remotes at their new home.
    fn adopt_chain(&mut self, tracker: K, first: K) {
        let mut curr = first;
        while curr.is_some() {
            let node = self.slot_mut(curr);
            node.tracker = tracker;
            let (remote, next) = (node.remote, node.next);
            self.repoint(remote, Remote::Slot { tracker, slot: curr });
            curr = next;
        }
    }

    /// Adds the tracker holding `slot`'s mirror to `touched` if it is kept
    /// sorted by remote and is not `skip`.
    fn note_sorted_peer(&self, slot: K, skip: K, touched: &mut Vec<K>) {
        let Some(mirror) = self.slot(slot).remote.mirror() else {
            return;
        };
        let peer = self.slot(mirror).tracker;
        let sorted = self.tracker(peer).order == Order::ByRemote;
        if sorted && peer != skip && !touched.contains(&peer) {
            touched.push(peer);
        }
    }

    /// Re-sorts the by-remote trackers mirroring the linked chain of `count`
    /// slots starting at `first`. Repointing changed their sort keys.
    fn resort_peers_of_chain(&mut self, first: K, count: usize, skip: K) {
        let mut touched = Vec::new();
        let mut curr = first;
        for _ in 0..count {
            self.note_sorted_peer(curr, skip, &mut touched);
            curr = self.slot(curr).next;
        }
        for peer in touched {
            self.sort(peer);
        }
    }

    pub(crate) fn splice(
        &mut self,
        tracker: K,
        position: Option<K>,
        other: K,
    ) -> Result<(), BindError> {
        if tracker == other {
            return Ok(());
        }
        self.check_same_kind(tracker, other)?;
        self.check_position(tracker, position)?;

        let node = self.tracker(other);
        let (first, last, count) = (node.head, node.tail, node.len);
        if count == 0 {
            return Ok(());
        }

        self.unlink_chain(other, first, last, count);
        self.adopt_chain(tracker, first);
        self.link_chain_before(tracker, crate::key::or_none(position), first, last, count);
        self.resort_peers_of_chain(first, count, tracker);

        trace!(tracker = ?tracker, from = ?other, moved = count, "spliced");
        Ok(())
    }

    /// Moves `first` up to (not including) `last` of `other` into `tracker`.
    pub(crate) fn transfer(
        &mut self,
        tracker: K,
        position: Option<K>,
        other: K,
        first: K,
        last: Option<K>,
    ) -> Result<(), BindError> {
        self.check_same_kind(tracker, other)?;
        self.check_position(tracker, position)?;
        if !self.is_slot_of(other, first) {
            return Err(BindError::ForeignHandle);
        }
        let end = crate::key::or_none(last);
        if end.is_some() && !self.is_slot_of(other, end) {
            return Err(BindError::ForeignHandle);
        }

        let before = crate::key::or_none(position);
        let mut count = 0usize;
        let mut tail = K::NONE;
        let mut covers_position = false;
        let mut curr = first;
        while curr != end {
            if curr.is_none() {
                // `last` comes before `first`
                return Err(BindError::ForeignHandle);
            }
            covers_position |= curr == before;
            count += 1;
            tail = curr;
            curr = self.slot(curr).next;
        }

        if count == 0 || (tracker == other && covers_position) {
            return Ok(());
        }

        self.unlink_chain(other, first, tail, count);
        if tracker != other {
            self.adopt_chain(tracker, first);
        }
        self.link_chain_before(tracker, before, first, tail, count);
        if tracker != other {
            self.resort_peers_of_chain(first, count, tracker);
        }

        trace!(tracker = ?tracker, from = ?other, moved = count, "transferred");
        Ok(())
    }

    /// Returns `true` if slots are in non-decreasing order of remote key.
    pub(crate) fn is_sorted(&self, tracker: K) -> bool {
        let mut prev = 0usize;
        let mut curr = self.tracker(tracker).head;
        while curr.is_some() {
            let node = self.slot(curr);
            let sort_key = node.remote.sort_key();
            if sort_key < prev {
                return false;
            }
            prev = sort_key;
            curr = node.next;
        }
        true
    }

    /// Stable merge of two sorted trackers into `tracker`.
    ///
    /// Ties keep `tracker`'s slots first. Slots are placed by the keys they
    /// had before the merge; by-remote trackers whose keys the merge changed,
    /// `tracker` included, are re-sorted afterwards.
    pub(crate) fn merge(&mut self, tracker: K, other: K) -> Result<(), BindError> {
        if tracker == other {
            return Ok(());
        }
        self.check_same_kind(tracker, other)?;
        if !self.is_sorted(tracker) || !self.is_sorted(other) {
            return Err(BindError::Unsorted);
        }

        let node = self.tracker(other);
        let (first, last, count) = (node.head, node.tail, node.len);
        if count == 0 {
            return Ok(());
        }
        self.unlink_chain(other, first, last, count);

        let mut moved = Vec::with_capacity(count);
        let mut at = self.tracker(tracker).head;
        let mut curr = first;
        while curr.is_some() {
            let node = self.slot(curr);
            let (next, sort_key) = (node.next, node.remote.sort_key());
            while at.is_some() && self.slot(at).remote.sort_key() <= sort_key {
                at = self.slot(at).next;
            }
            self.link_before(tracker, at, curr);
            moved.push(curr);
            curr = next;
        }

        for &slot in &moved {
            let remote = self.slot(slot).remote;
            self.repoint(remote, Remote::Slot { tracker, slot });
        }
        let mut touched = Vec::new();
        for &slot in &moved {
            self.note_sorted_peer(slot, K::NONE, &mut touched);
        }
        for peer in touched {
            self.sort(peer);
        }

        trace!(tracker = ?tracker, from = ?other, moved = count, "merged");
        Ok(())
    }

    /// Stable sort by remote key.
    pub(crate) fn sort(&mut self, tracker: K) {
        let mut slots = Vec::with_capacity(self.tracker(tracker).len);
        let mut curr = self.tracker(tracker).head;
        while curr.is_some() {
            let node = self.slot(curr);
            slots.push((node.remote.sort_key(), curr));
            curr = node.next;
        }
        slots.sort_by_key(|&(sort_key, _)| sort_key);

        let mut prev = K::NONE;
        for &(_, slot) in &slots {
            self.slot_mut(slot).prev = prev;
            if prev.is_some() {
                self.slot_mut(prev).next = slot;
            } else {
                self.tracker_mut(tracker).head = slot;
            }
            prev = slot;
        }
        if prev.is_some() {
            self.slot_mut(prev).next = K::NONE;
        }
        let node = self.tracker_mut(tracker);
        node.tail = prev;
        if prev.is_none() {
            node.head = K::NONE;
        }
    }

    // ========================================================================
    // Copy
    // ========================================================================

    fn remotes_of(&self, tracker: K) -> Vec<EndpointId<K>> {
        let mut peers = Vec::with_capacity(self.tracker(tracker).len);
        let mut curr = self.tracker(tracker).head;
        while curr.is_some() {
            let node = self.slot(curr);
            peers.extend(node.remote.endpoint());
            curr = node.next;
        }
        peers
    }

    fn check_copyable(&self, tracker: K) -> Result<(), BindError> {
        match self.tracker(tracker).kind {
            RemoteKind::Tracker => Ok(()),
            found => Err(BindError::KindMismatch {
                expected: RemoteKind::Tracker,
                found,
            }),
        }
    }

    /// New tracker bound to the same remotes as `tracker`.
    pub(crate) fn clone_tracker(&mut self, tracker: K, owner: O) -> Result<K, BindError> {
        self.check_copyable(tracker)?;
        let order = self.tracker(tracker).order;
        let peers = self.remotes_of(tracker);

        let copy = self.add_tracker_ordered(owner, RemoteKind::Tracker, order)?.into_key();
        if let Err(err) = self.bind_batch(copy, Placement::Policy, &peers) {
            self.free(copy);
            return Err(err);
        }
        Ok(copy)
    }

    /// Makes `tracker`'s bindings a snapshot of `other`'s.
    ///
    /// New bindings are added before the old ones are erased, so a remote
    /// present in both is never left unbound in between.
    pub(crate) fn replace_bindings(&mut self, tracker: K, other: K) -> Result<(), BindError> {
        if tracker == other {
            return Ok(());
        }
        self.check_copyable(tracker)?;
        self.check_copyable(other)?;

        let mut old = Vec::with_capacity(self.tracker(tracker).len);
        let mut curr = self.tracker(tracker).head;
        while curr.is_some() {
            old.push(curr);
            curr = self.slot(curr).next;
        }

        let peers = self.remotes_of(other);
        self.bind_batch(tracker, Placement::Policy, &peers)?;

        let replaced = old.len();
        for slot in old {
            if self.is_slot_of(tracker, slot) {
                self.erase_slot(slot);
            }
        }
        trace!(
            tracker = ?tracker,
            from = ?other,
            added = peers.len(),
            replaced,
            "replaced bindings"
        );
        Ok(())
    }

    /// New reporter bound to the same tracker as `reporter`.
    pub(crate) fn clone_reporter(&mut self, reporter: K, owner: O) -> Result<K, BindError> {
        let node = self.reporter(reporter);
        if node.kind == RemoteKind::Reporter {
            return Err(BindError::Exclusive);
        }
        let (kind, remote) = (node.kind, node.remote);

        let copy = self.add_reporter(owner, kind)?.into_key();
        if let Some(peer) = remote.endpoint() {
            if let Err(err) = self.bind_reporter(copy, peer) {
                self.free(copy);
                return Err(err);
            }
        }
        Ok(copy)
    }

    pub(crate) fn assign_reporter(&mut self, reporter: K, source: K) -> Result<(), BindError> {
        if self.reporter(reporter).kind == RemoteKind::Reporter
            || self.reporter(source).kind == RemoteKind::Reporter
        {
            return Err(BindError::Exclusive);
        }
        match self.reporter(source).remote.endpoint() {
            Some(peer) => self.rebind_reporter(reporter, peer),
            None => {
                self.debind_reporter(reporter);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Protocol-level moves
    // ========================================================================

    /// Moves `source`'s binding onto `reporter`; `source` ends unbound.
    pub(crate) fn take_reporter_binding(&mut self, reporter: K, source: K) {
        if reporter == source {
            return;
        }
        self.debind_reporter(reporter);

        let remote = core::mem::replace(&mut self.reporter_mut(source).remote, Remote::Unbound);
        match remote {
            Remote::Unbound => {}
            Remote::Reporter(peer) => {
                let peer = if peer == source { reporter } else { peer };
                self.reporter_mut(reporter).remote = Remote::Reporter(peer);
                self.reporter_mut(peer).remote = Remote::Reporter(reporter);
            }
            Remote::Slot { tracker, slot } => {
                self.slot_mut(slot).remote = Remote::Reporter(reporter);
                self.reporter_mut(reporter).remote = Remote::Slot { tracker, slot };
                self.resort_slot(slot);
            }
        }
        trace!(reporter = ?reporter, from = ?source, "moved reporter binding");
    }

    /// Replaces `tracker`'s bindings with all of `source`'s; `source` ends empty.
    pub(crate) fn take_tracker_bindings(&mut self, tracker: K, source: K) -> Result<(), BindError> {
        if tracker == source {
            return Ok(());
        }
        self.check_same_kind(tracker, source)?;
        self.clear_tracker(tracker);
        self.splice(tracker, None, source)?;
        if self.tracker(tracker).order == Order::ByRemote {
            self.sort(tracker);
        }
        Ok(())
    }

    pub(crate) fn check_reporter_kinds(&self, reporter: K, source: K) -> Result<(), BindError> {
        let expected = self.reporter(reporter).kind;
        let found = self.reporter(source).kind;
        if expected != found {
            return Err(BindError::KindMismatch { expected, found });
        }
        Ok(())
    }

    pub(crate) fn relocate_tracker(&mut self, tracker: K, owner: O) -> Result<K, crate::Full<O>> {
        let node = self.tracker(tracker);
        let (kind, order) = (node.kind, node.order);
        let moved = self.add_tracker_ordered(owner, kind, order)?.into_key();

        let node = self.tracker(tracker);
        let (first, last, count) = (node.head, node.tail, node.len);
        if count > 0 {
            self.unlink_chain(tracker, first, last, count);
            self.adopt_chain(moved, first);
            self.link_chain_before(moved, K::NONE, first, last, count);
            self.resort_peers_of_chain(first, count, K::NONE);
        }
        trace!(tracker = ?tracker, to = ?moved, moved = count, "relocated tracker");
        Ok(moved)
    }
}
