//! Iterators over a tracker's slots.
//!
//! All three walk the same chain; they differ in what they yield per slot.

use core::iter::FusedIterator;

use crate::graph::NodeStorage;
use crate::{EndpointId, Graph, Handle, Key};

/// Double-ended walk over a chain, bounded by the length at creation.
#[derive(Debug, Clone, Copy)]
struct Cursor<K> {
    front: K,
    back: K,
    remaining: usize,
}

impl<K: Key> Cursor<K> {
    fn new<O, S: NodeStorage<O, K>>(graph: &Graph<O, K, S>, tracker: K) -> Self {
        let node = graph.tracker(tracker);
        Self {
            front: node.head,
            back: node.tail,
            remaining: node.len,
        }
    }

    #[inline]
    fn next<O, S: NodeStorage<O, K>>(&mut self, graph: &Graph<O, K, S>) -> Option<K> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.front;
        self.front = graph.slot(key).next;
        self.remaining -= 1;
        Some(key)
    }

    #[inline]
    fn next_back<O, S: NodeStorage<O, K>>(&mut self, graph: &Graph<O, K, S>) -> Option<K> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.back;
        self.back = graph.slot(key).prev;
        self.remaining -= 1;
        Some(key)
    }
}

macro_rules! chain_iter {
    ($(#[$meta:meta])* $name:ident => $item:ty, |$graph:ident, $key:ident| $map:expr) => {
        $(#[$meta])*
        pub struct $name<'g, O, K: Key, S> {
            graph: &'g Graph<O, K, S>,
            cursor: Cursor<K>,
        }

        impl<'g, O, K: Key, S: NodeStorage<O, K>> $name<'g, O, K, S> {
            pub(crate) fn new(graph: &'g Graph<O, K, S>, tracker: K) -> Self {
                Self {
                    graph,
                    cursor: Cursor::new(graph, tracker),
                }
            }
        }

        impl<'g, O, K: Key, S: NodeStorage<O, K>> Iterator for $name<'g, O, K, S> {
            type Item = $item;

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                let $graph = self.graph;
                let $key = self.cursor.next($graph)?;
                Some($map)
            }

            #[inline]
            fn size_hint(&self) -> (usize, Option<usize>) {
                (self.cursor.remaining, Some(self.cursor.remaining))
            }
        }

        impl<'g, O, K: Key, S: NodeStorage<O, K>> DoubleEndedIterator for $name<'g, O, K, S> {
            #[inline]
            fn next_back(&mut self) -> Option<Self::Item> {
                let $graph = self.graph;
                let $key = self.cursor.next_back($graph)?;
                Some($map)
            }
        }

        impl<'g, O, K: Key, S: NodeStorage<O, K>> ExactSizeIterator for $name<'g, O, K, S> {}

        impl<'g, O, K: Key, S: NodeStorage<O, K>> FusedIterator for $name<'g, O, K, S> {}

        impl<O, K: Key, S> Clone for $name<'_, O, K, S> {
            fn clone(&self) -> Self {
                Self {
                    graph: self.graph,
                    cursor: self.cursor,
                }
            }
        }

        impl<O, K: Key, S> core::fmt::Debug for $name<'_, O, K, S> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("remaining", &self.cursor.remaining)
                    .finish()
            }
        }
    };
}

chain_iter!(
    /// Iterator over the owners of a tracker's peers.
    ///
    /// Created by [`Tracker::iter`](crate::Tracker::iter).
    Iter => &'g O,
    |graph, key| graph.owner_of(graph.slot_peer(key))
);

chain_iter!(
    /// Iterator over a tracker's slot handles.
    ///
    /// Created by [`Tracker::handles`](crate::Tracker::handles).
    Handles => Handle<K>,
    |_graph, key| Handle(key)
);

chain_iter!(
    /// Iterator over the identities of a tracker's peers.
    ///
    /// Created by [`Tracker::remotes`](crate::Tracker::remotes).
    Remotes => EndpointId<K>,
    |graph, key| graph.slot_peer(key)
);
