//! Multi-binding endpoints.
//!
//! A tracker owns a chain of slots threaded through graph storage. Each slot
//! is one binding. Slot keys ([`Handle`]s) are stable: inserting, erasing or
//! moving other slots never invalidates them.

use crate::graph::NodeStorage;
use crate::iter::{Handles, Iter, Remotes};
use crate::protocol::{Peer, Placement};
use crate::{BindError, EndpointId, Full, Graph, Key, Order, RemoteKind};

/// Stable position of one slot inside a tracker.
///
/// Valid until the slot is erased. [`splice`](Tracker::splice),
/// [`transfer`](Tracker::transfer) and [`merge`](Tracker::merge) keep the
/// handle but move it to the destination tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle<K = u32>(pub(crate) K);

impl<K: Key> Handle<K> {
    /// Returns the slot's storage key.
    #[inline]
    pub fn key(&self) -> K {
        self.0
    }
}

/// An endpoint holding any number of bindings, in order.
///
/// A tracker of kind [`RemoteKind::Reporter`] collects reporters (1:N). A
/// tracker of kind [`RemoteKind::Tracker`] binds to other trackers (N:M),
/// each binding being a slot on both sides that names the other.
///
/// # Example
///
/// ```
/// use nexus_tracker::{Graph, RemoteKind};
///
/// let mut graph: Graph<&str> = Graph::with_capacity(16);
/// let p = graph.add_tracker("p", RemoteKind::Tracker).unwrap();
/// let q = graph.add_tracker("q", RemoteKind::Tracker).unwrap();
///
/// p.track(&mut graph, &q).unwrap();
/// assert_eq!(p.iter(&graph).collect::<Vec<_>>(), vec![&"q"]);
/// assert_eq!(q.iter(&graph).collect::<Vec<_>>(), vec![&"p"]);
///
/// q.destroy(&mut graph);
/// assert!(p.is_empty(&graph));
/// ```
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Tracker<K = u32> {
    key: K,
}

fn peer_ids<'p, K: Key, I>(peers: I) -> Vec<EndpointId<K>>
where
    I: IntoIterator,
    I::Item: Into<Peer<'p, K>>,
{
    peers.into_iter().map(|peer| peer.into().id()).collect()
}

impl<K: Key> Tracker<K> {
    #[inline]
    pub(crate) fn from_key(key: K) -> Self {
        Self { key }
    }

    #[cfg(test)]
    pub(crate) fn key(&self) -> K {
        self.key
    }

    #[inline]
    pub(crate) fn into_key(self) -> K {
        self.key
    }

    /// Returns this tracker's identity.
    #[inline]
    pub fn id(&self) -> EndpointId<K> {
        EndpointId::Tracker(self.key)
    }

    /// Returns the kind of peer this tracker binds to.
    #[inline]
    pub fn kind<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> RemoteKind {
        graph.tracker(self.key).kind
    }

    /// Returns the placement policy of [`track`](Self::track).
    #[inline]
    pub fn order<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> Order {
        graph.tracker(self.key).order
    }

    /// Returns the owner value.
    #[inline]
    pub fn owner<'g, O, S: NodeStorage<O, K>>(&self, graph: &'g Graph<O, K, S>) -> &'g O {
        &graph.tracker(self.key).owner
    }

    /// Returns the owner value mutably.
    #[inline]
    pub fn owner_mut<'g, O, S: NodeStorage<O, K>>(
        &self,
        graph: &'g mut Graph<O, K, S>,
    ) -> &'g mut O {
        &mut graph.tracker_mut(self.key).owner
    }

    /// Replaces the owner value, returning the previous one.
    #[inline]
    pub fn set_owner<O, S: NodeStorage<O, K>>(&self, graph: &mut Graph<O, K, S>, owner: O) -> O {
        core::mem::replace(&mut graph.tracker_mut(self.key).owner, owner)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Returns the number of bindings.
    #[doc(alias = "num_reporters")]
    #[inline]
    pub fn len<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> usize {
        graph.tracker(self.key).len
    }

    /// Returns `true` if there are no bindings.
    #[inline]
    pub fn is_empty<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> bool {
        self.len(graph) == 0
    }

    /// Returns the first slot.
    #[inline]
    pub fn front<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> Option<Handle<K>> {
        graph.tracker(self.key).head.into_option().map(Handle)
    }

    /// Returns the last slot.
    #[inline]
    pub fn back<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> Option<Handle<K>> {
        graph.tracker(self.key).tail.into_option().map(Handle)
    }

    /// Returns the slot after `handle`. `None` at the back or if `handle`
    /// is not one of this tracker's slots.
    pub fn next<O, S: NodeStorage<O, K>>(
        &self,
        graph: &Graph<O, K, S>,
        handle: Handle<K>,
    ) -> Option<Handle<K>> {
        if !graph.is_slot_of(self.key, handle.0) {
            return None;
        }
        graph.slot(handle.0).next.into_option().map(Handle)
    }

    /// Returns the slot before `handle`. `None` at the front or if `handle`
    /// is not one of this tracker's slots.
    pub fn prev<O, S: NodeStorage<O, K>>(
        &self,
        graph: &Graph<O, K, S>,
        handle: Handle<K>,
    ) -> Option<Handle<K>> {
        if !graph.is_slot_of(self.key, handle.0) {
            return None;
        }
        graph.slot(handle.0).prev.into_option().map(Handle)
    }

    /// Returns the slot at offset `n`. O(n).
    pub fn nth<O, S: NodeStorage<O, K>>(
        &self,
        graph: &Graph<O, K, S>,
        n: usize,
    ) -> Option<Handle<K>> {
        self.handles(graph).nth(n)
    }

    /// Returns the offset of `handle` from the front. O(n).
    #[doc(alias = "get_offset")]
    pub fn offset<O, S: NodeStorage<O, K>>(
        &self,
        graph: &Graph<O, K, S>,
        handle: Handle<K>,
    ) -> Option<usize> {
        if !graph.is_slot_of(self.key, handle.0) {
            return None;
        }
        Some(graph.ordinal(handle.0))
    }

    /// Returns the peer bound through `handle`.
    pub fn remote_of<O, S: NodeStorage<O, K>>(
        &self,
        graph: &Graph<O, K, S>,
        handle: Handle<K>,
    ) -> Option<EndpointId<K>> {
        if !graph.is_slot_of(self.key, handle.0) {
            return None;
        }
        graph.slot(handle.0).remote.endpoint()
    }

    /// Returns the owner of the peer bound through `handle`.
    pub fn remote_owner_of<'g, O, S: NodeStorage<O, K>>(
        &self,
        graph: &'g Graph<O, K, S>,
        handle: Handle<K>,
    ) -> Option<&'g O> {
        let peer = self.remote_of(graph, handle)?;
        Some(graph.owner_of(peer))
    }

    /// Returns the peer tracker's slot that mirrors `handle`.
    ///
    /// `None` for slots bound to reporters.
    pub fn mirror_of<O, S: NodeStorage<O, K>>(
        &self,
        graph: &Graph<O, K, S>,
        handle: Handle<K>,
    ) -> Option<Handle<K>> {
        if !graph.is_slot_of(self.key, handle.0) {
            return None;
        }
        graph.slot(handle.0).remote.mirror().map(Handle)
    }

    /// Returns the offset of `handle`'s mirror inside the peer tracker. O(n).
    #[doc(alias = "get_position")]
    pub fn remote_position<O, S: NodeStorage<O, K>>(
        &self,
        graph: &Graph<O, K, S>,
        handle: Handle<K>,
    ) -> Option<usize> {
        let mirror = self.mirror_of(graph, handle)?;
        Some(graph.ordinal(mirror.0))
    }

    /// Returns `true` if any slot is bound to `peer`. O(n).
    pub fn has_remote<'p, O, S: NodeStorage<O, K>>(
        &self,
        graph: &Graph<O, K, S>,
        peer: impl Into<Peer<'p, K>>,
    ) -> bool {
        let peer = peer.into().id();
        self.remotes(graph).any(|remote| remote == peer)
    }

    /// Returns `true` if slots are ordered by remote key.
    pub fn is_sorted<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> bool {
        graph.is_sorted(self.key)
    }

    /// Iterates over the owners of every peer, front to back.
    pub fn iter<'g, O, S: NodeStorage<O, K>>(
        &self,
        graph: &'g Graph<O, K, S>,
    ) -> Iter<'g, O, K, S> {
        Iter::new(graph, self.key)
    }

    /// Iterates over slot handles, front to back.
    pub fn handles<'g, O, S: NodeStorage<O, K>>(
        &self,
        graph: &'g Graph<O, K, S>,
    ) -> Handles<'g, O, K, S> {
        Handles::new(graph, self.key)
    }

    /// Iterates over peer identities, front to back.
    pub fn remotes<'g, O, S: NodeStorage<O, K>>(
        &self,
        graph: &'g Graph<O, K, S>,
    ) -> Remotes<'g, O, K, S> {
        Remotes::new(graph, self.key)
    }

    // ========================================================================
    // Binding
    // ========================================================================

    /// Binds to `peer` through a new slot placed by this tracker's [`Order`].
    ///
    /// A reporter peer drops its previous binding. Binding the same tracker
    /// peer twice creates two slots.
    ///
    /// # Errors
    ///
    /// - [`BindError::KindMismatch`] if either side does not accept the other
    /// - [`BindError::Full`] if storage is full; nothing changes
    pub fn track<'p, O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        peer: impl Into<Peer<'p, K>>,
    ) -> Result<Handle<K>, BindError> {
        graph
            .bind_one(self.key, Placement::Policy, peer.into().id())
            .map(Handle)
    }

    /// Binds to `peer` through a new slot before `position` (`None` = back).
    ///
    /// The position is taken as given, even for [`Order::ByRemote`].
    ///
    /// # Errors
    ///
    /// - [`BindError::ForeignHandle`] if `position` is not one of this
    ///   tracker's slots
    /// - otherwise as [`track`](Self::track)
    pub fn insert<'p, O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        position: Option<Handle<K>>,
        peer: impl Into<Peer<'p, K>>,
    ) -> Result<Handle<K>, BindError> {
        let placement = Placement::at(position.map(|handle| handle.0));
        graph.bind_one(self.key, placement, peer.into().id()).map(Handle)
    }

    /// Binds to every peer before `position` (`None` = back), keeping their
    /// relative order.
    ///
    /// # Errors
    ///
    /// All-or-nothing: if any peer cannot be bound, no new binding exists and
    /// no existing binding changed.
    pub fn insert_many<'p, O, S: NodeStorage<O, K>, I>(
        &self,
        graph: &mut Graph<O, K, S>,
        position: Option<Handle<K>>,
        peers: I,
    ) -> Result<(), BindError>
    where
        I: IntoIterator,
        I::Item: Into<Peer<'p, K>>,
    {
        let placement = Placement::at(position.map(|handle| handle.0));
        graph.bind_batch(self.key, placement, &peer_ids(peers))?;
        Ok(())
    }

    /// Binds to every peer, each placed by this tracker's [`Order`].
    ///
    /// # Errors
    ///
    /// All-or-nothing, as [`insert_many`](Self::insert_many).
    pub fn track_many<'p, O, S: NodeStorage<O, K>, I>(
        &self,
        graph: &mut Graph<O, K, S>,
        peers: I,
    ) -> Result<(), BindError>
    where
        I: IntoIterator,
        I::Item: Into<Peer<'p, K>>,
    {
        graph.bind_batch(self.key, Placement::Policy, &peer_ids(peers))?;
        Ok(())
    }

    /// Points the slot at `handle` to a new peer, keeping the handle.
    ///
    /// A no-op if already bound to `peer`. A sorted tracker moves the slot
    /// to its new place.
    ///
    /// # Errors
    ///
    /// - [`BindError::ForeignHandle`] if `handle` is not one of this
    ///   tracker's slots
    /// - [`BindError::KindMismatch`] if either side does not accept the other
    /// - [`BindError::Full`] if the peer's mirror slot cannot be stored; the
    ///   old binding is kept
    pub fn rebind<'p, O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        handle: Handle<K>,
        peer: impl Into<Peer<'p, K>>,
    ) -> Result<(), BindError> {
        graph.rebind_slot(self.key, handle.0, peer.into().id())
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Debinds and removes the slot at `handle`.
    ///
    /// Returns `false` if `handle` is not one of this tracker's slots.
    pub fn erase<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        handle: Handle<K>,
    ) -> bool {
        if !graph.is_slot_of(self.key, handle.0) {
            return false;
        }
        graph.erase_slot(handle.0);
        true
    }

    /// Debinds and removes `first` up to, not including, `last` (`None` = the
    /// back).
    ///
    /// Returns `false` and erases nothing if `first` is not one of this
    /// tracker's slots, or if `last` is not a later slot of this tracker.
    pub fn erase_range<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        first: Handle<K>,
        last: Option<Handle<K>>,
    ) -> bool {
        let last = crate::key::or_none(last.map(|handle| handle.0));
        graph.erase_range(self.key, first.0, last)
    }

    /// Debinds and removes every slot.
    pub fn clear<O, S: NodeStorage<O, K>>(&self, graph: &mut Graph<O, K, S>) {
        graph.clear_tracker(self.key);
    }

    /// Removes every slot **without** telling the peers.
    ///
    /// # Warning
    ///
    /// Every peer keeps pointing at a slot that no longer exists and its key
    /// may be handed out again. Only call this while tearing down every
    /// endpoint this tracker is bound to, touching none of them except to
    /// destroy or wipe them.
    pub fn wipe<O, S: NodeStorage<O, K>>(&self, graph: &mut Graph<O, K, S>) {
        graph.wipe_tracker(self.key);
    }

    // ========================================================================
    // Structural moves
    // ========================================================================

    /// Moves every slot of `other` before `position` (`None` = back).
    ///
    /// O(k) in the slots moved. The moved slots keep their order even if
    /// this tracker is kept by remote. Peers are repointed to this tracker;
    /// peers kept by remote are re-sorted. `other` ends empty.
    ///
    /// # Errors
    ///
    /// - [`BindError::KindMismatch`] if the trackers bind to different kinds
    /// - [`BindError::ForeignHandle`] if `position` is not one of this
    ///   tracker's slots
    pub fn splice<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        position: Option<Handle<K>>,
        other: &Tracker<K>,
    ) -> Result<(), BindError> {
        graph.splice(self.key, position.map(|handle| handle.0), other.key)
    }

    /// Moves `first` up to, not including, `last` (`None` = the back) from
    /// `other` before `position`.
    ///
    /// Moving a range within one tracker is allowed; a `position` inside
    /// the range leaves it in place. Peers kept by remote are re-sorted.
    ///
    /// # Errors
    ///
    /// - [`BindError::KindMismatch`] if the trackers bind to different kinds
    /// - [`BindError::ForeignHandle`] if a handle does not belong to its
    ///   tracker or `last` does not follow `first`; nothing moves
    pub fn transfer<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        position: Option<Handle<K>>,
        other: &Tracker<K>,
        first: Handle<K>,
        last: Option<Handle<K>>,
    ) -> Result<(), BindError> {
        graph.transfer(
            self.key,
            position.map(|handle| handle.0),
            other.key,
            first.0,
            last.map(|handle| handle.0),
        )
    }

    /// Merges all of `other` into this tracker, keeping remote order.
    ///
    /// O(n + m). Equal keys keep this tracker's slots first. Peers kept by
    /// remote are re-sorted, since their slots now name this tracker.
    ///
    /// # Errors
    ///
    /// - [`BindError::KindMismatch`] if the trackers bind to different kinds
    /// - [`BindError::Unsorted`] if either tracker is not sorted by remote
    pub fn merge<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        other: &Tracker<K>,
    ) -> Result<(), BindError> {
        graph.merge(self.key, other.key)
    }

    /// Stable-sorts slots by remote key.
    pub fn sort<O, S: NodeStorage<O, K>>(&self, graph: &mut Graph<O, K, S>) {
        graph.sort(self.key);
    }

    // ========================================================================
    // Copy & move
    // ========================================================================

    /// Creates a tracker owned by `owner` bound to the same peers, in order.
    ///
    /// # Errors
    ///
    /// - [`BindError::KindMismatch`] for trackers of reporters, whose
    ///   reporters cannot be shared
    /// - [`BindError::Full`] if storage is full; nothing is created
    pub fn try_clone<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        owner: O,
    ) -> Result<Tracker<K>, BindError> {
        graph.clone_tracker(self.key, owner).map(Tracker::from_key)
    }

    /// Makes this tracker's bindings a copy of `other`'s.
    ///
    /// Bindings to peers present in both are replaced without the peer ever
    /// seeing this tracker unbound.
    ///
    /// # Errors
    ///
    /// - [`BindError::KindMismatch`] unless both trackers bind to trackers
    /// - [`BindError::Full`] if storage is full; nothing changes
    pub fn replace_bindings<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        other: &Tracker<K>,
    ) -> Result<(), BindError> {
        graph.replace_bindings(self.key, other.key)
    }

    /// Alias for [`replace_bindings`](Self::replace_bindings).
    ///
    /// # Errors
    ///
    /// As [`replace_bindings`](Self::replace_bindings).
    #[inline]
    pub fn assign_from<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        other: &Tracker<K>,
    ) -> Result<(), BindError> {
        self.replace_bindings(graph, other)
    }

    /// Drops every binding, then takes over all of `source`'s.
    ///
    /// `source` ends empty. If this tracker is kept by remote, the taken
    /// slots are sorted into place.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::KindMismatch`] if the trackers bind to different
    /// kinds. Nothing changes.
    pub fn move_from<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        source: &Tracker<K>,
    ) -> Result<(), BindError> {
        graph.take_tracker_bindings(self.key, source.key)
    }

    /// Moves every binding to a new tracker owned by `owner`, with the same
    /// kind and order. This tracker stays alive, empty.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(owner))` if storage is full. Nothing changes.
    pub fn relocate<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        owner: O,
    ) -> Result<Tracker<K>, Full<O>> {
        graph.relocate_tracker(self.key, owner).map(Tracker::from_key)
    }

    /// Debinds every slot and removes this tracker, returning its owner.
    pub fn destroy<O, S: NodeStorage<O, K>>(self, graph: &mut Graph<O, K, S>) -> O {
        graph.clear_tracker(self.key);
        graph.remove_endpoint(self.key)
    }
}
