//! Node layout shared by reporters, trackers and tracker slots.
//!
//! All three live in the same storage. A reporter node holds a single
//! [`Remote`]; a tracker node holds the head/tail/len of a doubly-linked chain
//! of slot nodes, each of which holds one [`Remote`].

use core::fmt;

use crate::Key;

/// Which side of a binding an endpoint is, or which side it binds to.
///
/// Fixed per endpoint at construction:
///
/// | endpoint | binds to | relation |
/// |----------|----------|----------|
/// | reporter | reporter | 1:1 |
/// | reporter | tracker  | N:1 (the tracker must bind to reporters) |
/// | tracker  | reporter | 1:N |
/// | tracker  | tracker  | N:M |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKind {
    /// A single-slot endpoint.
    Reporter,
    /// A collection of slots.
    Tracker,
}

impl fmt::Display for RemoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteKind::Reporter => f.write_str("reporter"),
            RemoteKind::Tracker => f.write_str("tracker"),
        }
    }
}

/// Placement policy for slots added through [`Tracker::track`](crate::Tracker::track).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Order {
    /// New slots go to the back.
    #[default]
    Insertion,
    /// New slots go to the lower bound of their remote's key, keeping the
    /// tracker sorted by remote. Duplicates are allowed.
    ByRemote,
}

/// Identity of a reporter or tracker within a graph.
///
/// Returned by queries such as [`Reporter::remote`](crate::Reporter::remote);
/// compare against [`Reporter::id`](crate::Reporter::id) or
/// [`Tracker::id`](crate::Tracker::id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointId<K = u32> {
    /// A reporter endpoint.
    Reporter(K),
    /// A tracker endpoint.
    Tracker(K),
}

impl<K: Key> EndpointId<K> {
    /// Returns the endpoint's own kind.
    #[inline]
    pub fn kind(&self) -> RemoteKind {
        match self {
            EndpointId::Reporter(_) => RemoteKind::Reporter,
            EndpointId::Tracker(_) => RemoteKind::Tracker,
        }
    }

    /// Returns the endpoint's storage key.
    #[inline]
    pub fn key(&self) -> K {
        match *self {
            EndpointId::Reporter(key) | EndpointId::Tracker(key) => key,
        }
    }
}

/// What a slot points at.
///
/// A reporter remote is just the peer reporter's key. A tracker remote is the
/// tracker's key plus the key of the mirror slot inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Remote<K> {
    Unbound,
    Reporter(K),
    Slot { tracker: K, slot: K },
}

impl<K: Key> Remote<K> {
    #[inline]
    pub(crate) fn is_bound(&self) -> bool {
        !matches!(self, Remote::Unbound)
    }

    /// The endpoint on the far side, if any.
    #[inline]
    pub(crate) fn endpoint(&self) -> Option<EndpointId<K>> {
        match *self {
            Remote::Unbound => None,
            Remote::Reporter(key) => Some(EndpointId::Reporter(key)),
            Remote::Slot { tracker, .. } => Some(EndpointId::Tracker(tracker)),
        }
    }

    /// The mirror slot, for tracker remotes.
    #[inline]
    pub(crate) fn mirror(&self) -> Option<K> {
        match *self {
            Remote::Slot { slot, .. } => Some(slot),
            _ => None,
        }
    }

    /// Sort key used by [`Order::ByRemote`]. Unbound sorts last.
    #[inline]
    pub(crate) fn sort_key(&self) -> usize {
        self.endpoint().map_or(usize::MAX, |id| id.key().as_usize())
    }
}

#[derive(Debug)]
pub(crate) struct ReporterNode<O, K> {
    pub(crate) owner: O,
    pub(crate) kind: RemoteKind,
    pub(crate) remote: Remote<K>,
}

#[derive(Debug)]
pub(crate) struct TrackerNode<O, K> {
    pub(crate) owner: O,
    pub(crate) kind: RemoteKind,
    pub(crate) order: Order,
    pub(crate) head: K,
    pub(crate) tail: K,
    pub(crate) len: usize,
}

#[derive(Debug)]
pub(crate) struct SlotNode<K> {
    /// Tracker whose chain this slot is threaded through.
    pub(crate) tracker: K,
    pub(crate) prev: K,
    pub(crate) next: K,
    pub(crate) remote: Remote<K>,
}

impl<K: Key> SlotNode<K> {
    /// An unlinked, unbound slot owned by `tracker`.
    #[inline]
    pub(crate) fn detached(tracker: K) -> Self {
        Self {
            tracker,
            prev: K::NONE,
            next: K::NONE,
            remote: Remote::Unbound,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Repr<O, K> {
    Reporter(ReporterNode<O, K>),
    Tracker(TrackerNode<O, K>),
    Slot(SlotNode<K>),
}

/// A node stored in a graph's storage.
///
/// This is an implementation detail exposed only so storage types can be
/// named, e.g. `BoxedStorage<Node<O>>`.
#[derive(Debug)]
pub struct Node<O, K: Key = u32>(pub(crate) Repr<O, K>);
