//! Per-binding primitives: forgetting, erasing, repointing and attaching.
//!
//! These are the building blocks of every protocol operation. Only
//! [`Graph::reset_remote`] and the reserve/link pair leave a binding visible
//! from one side; each caller restores mutual visibility before returning.

use tracing::trace;

use crate::graph::NodeStorage;
use crate::node::Remote;
use crate::protocol::Placement;
use crate::{BindError, EndpointId, Graph, Key};

/// Slots allocated for one peer but not yet linked.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reserved<K> {
    pub(crate) slot: K,
    pub(crate) peer: EndpointId<K>,
    /// Mirror slot inside the peer tracker, `NONE` for reporter peers.
    pub(crate) mirror: K,
}

impl<O, K: Key, S: NodeStorage<O, K>> Graph<O, K, S> {
    /// Makes the far side of `remote` forget its binding. The near side is
    /// left as is.
    pub(crate) fn reset_remote(&mut self, remote: Remote<K>) {
        match remote {
            Remote::Unbound => {}
            Remote::Reporter(reporter) => {
                self.reporter_mut(reporter).remote = Remote::Unbound;
            }
            Remote::Slot { slot, .. } => {
                self.unlink(slot);
                self.free(slot);
            }
        }
    }

    /// Points the far side of `remote` at `back`.
    pub(crate) fn repoint(&mut self, remote: Remote<K>, back: Remote<K>) {
        match remote {
            Remote::Unbound => {}
            Remote::Reporter(reporter) => self.reporter_mut(reporter).remote = back,
            Remote::Slot { slot, .. } => self.slot_mut(slot).remote = back,
        }
    }

    /// Symmetric debind of a reporter.
    pub(crate) fn debind_reporter(&mut self, reporter: K) {
        let remote = core::mem::replace(&mut self.reporter_mut(reporter).remote, Remote::Unbound);
        if remote.is_bound() {
            trace!(reporter = ?reporter, remote = ?remote, "debind reporter");
        }
        self.reset_remote(remote);
    }

    /// Symmetric erase of one slot: the remote forgets it, then it leaves the
    /// chain and storage.
    pub(crate) fn erase_slot(&mut self, slot: K) {
        let remote = core::mem::replace(&mut self.slot_mut(slot).remote, Remote::Unbound);
        self.reset_remote(remote);
        self.unlink(slot);
        self.free(slot);
    }

    /// Binds `reporter` to `remote`, dropping any previous binding first.
    /// The far side must already point back.
    pub(crate) fn attach_reporter(&mut self, reporter: K, remote: Remote<K>) {
        self.debind_reporter(reporter);
        self.reporter_mut(reporter).remote = remote;
    }

    /// Pairs two 1:1 reporters. Already-paired reporters are left untouched.
    pub(crate) fn pair_reporters(&mut self, a: K, b: K) {
        if self.reporter(a).remote == Remote::Reporter(b) {
            return;
        }
        self.debind_reporter(a);
        self.debind_reporter(b);
        self.reporter_mut(a).remote = Remote::Reporter(b);
        self.reporter_mut(b).remote = Remote::Reporter(a);
    }

    /// Allocates every node a binding between `tracker` and `peer` needs.
    ///
    /// Nothing is linked; on error nothing stays allocated.
    pub(crate) fn reserve(
        &mut self,
        tracker: K,
        peer: EndpointId<K>,
    ) -> Result<Reserved<K>, BindError> {
        let slot = self.alloc_slot(tracker)?;
        let mirror = match peer {
            EndpointId::Reporter(_) => K::NONE,
            EndpointId::Tracker(remote) => match self.alloc_slot(remote) {
                Ok(mirror) => mirror,
                Err(err) => {
                    self.free(slot);
                    return Err(err);
                }
            },
        };
        Ok(Reserved { slot, peer, mirror })
    }

    /// Frees a reservation that was never linked.
    pub(crate) fn release(&mut self, reserved: Reserved<K>) {
        self.free(reserved.slot);
        if reserved.mirror.is_some() {
            self.free(reserved.mirror);
        }
    }

    /// Links a reservation into `tracker` and, for tracker peers, its mirror
    /// into the peer. A reporter peer is not yet told about its new slot; see
    /// [`attach_reporter`](Self::attach_reporter).
    pub(crate) fn link_reserved(
        &mut self,
        tracker: K,
        placement: Placement<K>,
        reserved: Reserved<K>,
    ) {
        let Reserved { slot, peer, mirror } = reserved;
        match peer {
            EndpointId::Reporter(reporter) => {
                let remote = Remote::Reporter(reporter);
                self.slot_mut(slot).remote = remote;
                let before = self.resolve(tracker, placement, remote.sort_key());
                self.link_before(tracker, before, slot);
            }
            EndpointId::Tracker(other) => {
                let remote = Remote::Slot { tracker: other, slot: mirror };
                let back = Remote::Slot { tracker, slot };
                self.slot_mut(slot).remote = remote;
                self.slot_mut(mirror).remote = back;

                let before = self.resolve(tracker, placement, remote.sort_key());
                self.link_before(tracker, before, slot);
                let before = self.resolve(other, Placement::Policy, back.sort_key());
                self.link_before(other, before, mirror);
            }
        }
    }

    /// Moves `slot` to its lower bound if its tracker is kept sorted.
    pub(crate) fn resort_slot(&mut self, slot: K) {
        let node = self.slot(slot);
        let (tracker, sort_key) = (node.tracker, node.remote.sort_key());
        if self.tracker(tracker).order != crate::Order::ByRemote {
            return;
        }
        self.unlink(slot);
        let before = self.lower_bound(tracker, sort_key);
        self.link_before(tracker, before, slot);
    }
}
