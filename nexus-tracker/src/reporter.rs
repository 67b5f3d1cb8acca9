//! Single-binding endpoints.

use crate::graph::NodeStorage;
use crate::protocol::Peer;
use crate::{BindError, EndpointId, Full, Graph, Handle, Key, RemoteKind};

/// An endpoint holding at most one binding.
///
/// A reporter of kind [`RemoteKind::Reporter`] pairs exclusively with another
/// reporter (1:1). A reporter of kind [`RemoteKind::Tracker`] appears as one
/// slot inside a tracker of kind [`RemoteKind::Reporter`] (N:1).
///
/// The handle is unique: it is neither `Copy` nor `Clone`, and
/// [`destroy`](Self::destroy) consumes it. Moving the handle (or the struct
/// embedding it) never touches the binding.
///
/// # Example
///
/// ```
/// use nexus_tracker::{Graph, RemoteKind};
///
/// let mut graph: Graph<&str> = Graph::with_capacity(8);
/// let left = graph.add_reporter("left", RemoteKind::Reporter).unwrap();
/// let right = graph.add_reporter("right", RemoteKind::Reporter).unwrap();
///
/// left.bind(&mut graph, &right).unwrap();
/// assert_eq!(left.remote(&graph), Some(right.id()));
/// assert_eq!(right.remote(&graph), Some(left.id()));
///
/// right.debind(&mut graph);
/// assert!(!left.is_bound(&graph));
/// ```
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Reporter<K = u32> {
    key: K,
}

impl<K: Key> Reporter<K> {
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

    /// Returns this reporter's identity.
    #[inline]
    pub fn id(&self) -> EndpointId<K> {
        EndpointId::Reporter(self.key)
    }

    /// Returns the kind of peer this reporter binds to.
    #[inline]
    pub fn kind<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> RemoteKind {
        graph.reporter(self.key).kind
    }

    /// Returns the owner value.
    #[inline]
    pub fn owner<'g, O, S: NodeStorage<O, K>>(&self, graph: &'g Graph<O, K, S>) -> &'g O {
        &graph.reporter(self.key).owner
    }

    /// Returns the owner value mutably.
    #[inline]
    pub fn owner_mut<'g, O, S: NodeStorage<O, K>>(
        &self,
        graph: &'g mut Graph<O, K, S>,
    ) -> &'g mut O {
        &mut graph.reporter_mut(self.key).owner
    }

    /// Replaces the owner value, returning the previous one.
    ///
    /// Bindings are untouched; peers see the new owner immediately.
    #[inline]
    pub fn set_owner<O, S: NodeStorage<O, K>>(&self, graph: &mut Graph<O, K, S>, owner: O) -> O {
        core::mem::replace(&mut graph.reporter_mut(self.key).owner, owner)
    }

    /// Returns `true` if bound.
    #[inline]
    pub fn is_bound<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> bool {
        graph.reporter(self.key).remote.is_bound()
    }

    /// Returns the peer, if bound.
    #[inline]
    pub fn remote<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> Option<EndpointId<K>> {
        graph.reporter(self.key).remote.endpoint()
    }

    /// Returns the peer's owner, if bound.
    pub fn remote_owner<'g, O, S: NodeStorage<O, K>>(
        &self,
        graph: &'g Graph<O, K, S>,
    ) -> Option<&'g O> {
        let peer = self.remote(graph)?;
        Some(graph.owner_of(peer))
    }

    /// Returns `true` if bound to `peer`.
    pub fn has_remote<'p, O, S: NodeStorage<O, K>>(
        &self,
        graph: &Graph<O, K, S>,
        peer: impl Into<Peer<'p, K>>,
    ) -> bool {
        self.remote(graph) == Some(peer.into().id())
    }

    /// Returns this reporter's slot inside the peer tracker, if bound to one.
    #[inline]
    pub fn mirror<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> Option<Handle<K>> {
        graph.reporter(self.key).remote.mirror().map(Handle)
    }

    /// Returns the offset of this reporter's slot inside the peer tracker.
    ///
    /// O(n) in the slot's offset.
    pub fn position<O, S: NodeStorage<O, K>>(&self, graph: &Graph<O, K, S>) -> Option<usize> {
        let mirror = graph.reporter(self.key).remote.mirror()?;
        Some(graph.ordinal(mirror))
    }

    /// Binds to `peer`, dropping any current binding.
    ///
    /// A reporter peer loses its own previous binding; a tracker peer gains
    /// one slot, placed according to its [`Order`](crate::Order).
    ///
    /// # Errors
    ///
    /// - [`BindError::KindMismatch`] if either side does not accept the other
    /// - [`BindError::Full`] if the tracker's new slot cannot be stored; the
    ///   current binding is kept
    pub fn bind<'p, O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        peer: impl Into<Peer<'p, K>>,
    ) -> Result<(), BindError> {
        graph.bind_reporter(self.key, peer.into().id())
    }

    /// Like [`bind`](Self::bind), but a no-op if already bound to `peer`.
    ///
    /// # Errors
    ///
    /// Same as [`bind`](Self::bind).
    pub fn rebind<'p, O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        peer: impl Into<Peer<'p, K>>,
    ) -> Result<(), BindError> {
        graph.rebind_reporter(self.key, peer.into().id())
    }

    /// Drops the binding on both sides. No-op if unbound.
    pub fn debind<O, S: NodeStorage<O, K>>(&self, graph: &mut Graph<O, K, S>) {
        graph.debind_reporter(self.key);
    }

    /// Takes over `source`'s binding; `source` ends unbound.
    ///
    /// The peer is repointed in O(1). Any binding this reporter held is
    /// dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::KindMismatch`] if the two reporters bind to
    /// different kinds. Nothing changes.
    pub fn move_from<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        source: &Reporter<K>,
    ) -> Result<(), BindError> {
        graph.check_reporter_kinds(self.key, source.key)?;
        graph.take_reporter_binding(self.key, source.key);
        Ok(())
    }

    /// Moves this reporter's binding to a new reporter owned by `owner`.
    ///
    /// This reporter stays alive, unbound.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(owner))` if storage is full. Nothing changes.
    pub fn relocate<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        owner: O,
    ) -> Result<Reporter<K>, Full<O>> {
        let kind = graph.reporter(self.key).kind;
        let moved = graph.add_reporter(owner, kind)?;
        graph.take_reporter_binding(moved.key, self.key);
        Ok(moved)
    }

    /// Creates a new reporter owned by `owner`, bound to the same tracker.
    ///
    /// An unbound reporter clones to an unbound reporter.
    ///
    /// # Errors
    ///
    /// - [`BindError::Exclusive`] for 1:1 reporters
    /// - [`BindError::Full`] if storage is full; nothing is created
    pub fn try_clone<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        owner: O,
    ) -> Result<Reporter<K>, BindError> {
        graph.clone_reporter(self.key, owner).map(Reporter::from_key)
    }

    /// Rebinds to `source`'s tracker (or debinds if `source` is unbound).
    ///
    /// # Errors
    ///
    /// - [`BindError::Exclusive`] if either reporter is 1:1
    /// - [`BindError::Full`] if storage is full; the current binding is kept
    pub fn assign_from<O, S: NodeStorage<O, K>>(
        &self,
        graph: &mut Graph<O, K, S>,
        source: &Reporter<K>,
    ) -> Result<(), BindError> {
        graph.assign_reporter(self.key, source.key)
    }

    /// Debinds and removes this reporter, returning its owner.
    pub fn destroy<O, S: NodeStorage<O, K>>(self, graph: &mut Graph<O, K, S>) -> O {
        graph.debind_reporter(self.key);
        graph.remove_endpoint(self.key)
    }
}
