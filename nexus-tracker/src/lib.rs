//! Symmetric lifetime tracking between mutually aware objects.
//!
//! Plain back-references go stale when the referent moves or dies. This
//! crate keeps both ends of every link in sync: when one side is destroyed,
//! moved or copied, the other side's bookkeeping follows, and a dangling
//! reference is never observable.
//!
//! # Design Philosophy
//!
//! Storage owns data, structure coordinates keys:
//!
//! ```text
//! Graph (storage)   - owns every reporter, tracker and slot node
//! Reporter/Tracker  - unique key handles embedded in your own types
//! Handle            - stable key of one slot inside a tracker
//! ```
//!
//! Two endpoint types exist:
//!
//! - a [`Reporter`] holds at most one binding;
//! - a [`Tracker`] holds an ordered chain of slots, one per binding.
//!
//! Each endpoint binds to one [`RemoteKind`], fixed at creation. That gives
//! four relations: reporter/reporter (1:1), reporter/tracker (N:1),
//! tracker/reporter (1:N) and tracker/tracker (N:M).
//!
//! Every binding is visible from both ends after every public call, whether
//! it returned `Ok` or `Err`. The single exception is [`Tracker::wipe`].
//!
//! # Quick Start
//!
//! ```
//! use nexus_tracker::{Graph, RemoteKind};
//!
//! let mut graph: Graph<&str> = Graph::with_capacity(64);
//!
//! let inbox = graph.add_tracker("inbox", RemoteKind::Reporter).unwrap();
//! let a = graph.add_reporter("a", RemoteKind::Tracker).unwrap();
//! let b = graph.add_reporter("b", RemoteKind::Tracker).unwrap();
//!
//! inbox.track_many(&mut graph, [&a, &b]).unwrap();
//! assert_eq!(inbox.iter(&graph).collect::<Vec<_>>(), vec![&"a", &"b"]);
//!
//! // Destroying either side updates the other
//! a.destroy(&mut graph);
//! assert_eq!(inbox.len(&graph), 1);
//!
//! inbox.destroy(&mut graph);
//! assert!(!b.is_bound(&graph));
//! ```
//!
//! # Failure
//!
//! Binding allocates nodes in the graph's storage. With bounded storage
//! ([`BoxedStorage`]) that can fail with [`BindError::Full`]. Every fallible
//! operation is all-or-nothing:
//!
//! ```
//! use nexus_tracker::{BindError, Graph, RemoteKind};
//!
//! // room for the tracker, three reporters and two slots
//! let mut graph: Graph<u32> = Graph::with_capacity(6);
//! let t = graph.add_tracker(0, RemoteKind::Reporter).unwrap();
//! let rs: Vec<_> = (1..=3)
//!     .map(|i| graph.add_reporter(i, RemoteKind::Tracker).unwrap())
//!     .collect();
//!
//! assert_eq!(t.track_many(&mut graph, &rs), Err(BindError::Full));
//! assert!(t.is_empty(&graph));
//! assert!(rs.iter().all(|r| !r.is_bound(&graph)));
//! ```
//!
//! # Moving Bindings
//!
//! Handles are keys, so moving a `Reporter` or `Tracker` (or the struct
//! embedding it) never touches the graph. To hand a binding to a different
//! endpoint, use `move_from` or `relocate`; peers are repointed, not rebound.
//!
//! ```
//! use nexus_tracker::{Graph, RemoteKind};
//!
//! let mut graph: Graph<&str> = Graph::with_capacity(16);
//! let left = graph.add_reporter("left", RemoteKind::Reporter).unwrap();
//! let right = graph.add_reporter("right", RemoteKind::Reporter).unwrap();
//! left.bind(&mut graph, &right).unwrap();
//!
//! let moved = left.relocate(&mut graph, "moved").unwrap();
//! assert!(!left.is_bound(&graph));
//! assert_eq!(right.remote_owner(&graph), Some(&"moved"));
//! # let _ = moved;
//! ```
//!
//! # Critical Invariant: Same Graph Instance
//!
//! Handles must only be used with the graph that created them. This is the
//! caller's responsibility (same discipline as the `slab` crate). A handle
//! from another graph panics or addresses an unrelated node; it never causes
//! undefined behavior.
//!
//! # Logging
//!
//! Bulk operations emit `tracing` events at `trace` level and rolled-back
//! binds at `debug` level. No subscriber is installed.
//!
//! # Features
//!
//! - `slab`: implements [`Storage`] for `slab::Slab` (growable, never full)

#![warn(missing_docs)]

mod error;
mod graph;
mod iter;
pub mod key;
mod node;
mod protocol;
mod reporter;
mod slot;
pub mod storage;
mod tracker;

pub use error::BindError;
pub use graph::{BoxedNodeStorage, Graph, GraphBuilder, NodeStorage};
pub use iter::{Handles, Iter, Remotes};
pub use key::Key;
pub use node::{EndpointId, Node, Order, RemoteKind};
pub use protocol::Peer;
pub use reporter::Reporter;
pub use storage::{BoxedStorage, Full, Storage};
pub use tracker::{Handle, Tracker};

#[cfg(feature = "slab")]
pub use graph::SlabNodeStorage;
