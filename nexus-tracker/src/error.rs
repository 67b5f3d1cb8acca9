//! Error types for binding operations.

use crate::RemoteKind;

/// Error returned by binding operations.
///
/// Every fallible operation has the strong guarantee: when it returns an
/// error, no binding was added, removed or moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// Storage ran out of room while registering with a remote.
    #[error("storage is full")]
    Full,
    /// The peer is not of the kind the endpoint binds to.
    #[error("endpoint binds to a {expected} but was given a {found}")]
    KindMismatch {
        /// Kind the endpoint accepts.
        expected: RemoteKind,
        /// Kind that was offered.
        found: RemoteKind,
    },
    /// A one-to-one binding cannot be duplicated by copy.
    #[error("one-to-one bindings cannot be copied")]
    Exclusive,
    /// A tracker was required to be sorted by remote but is not.
    #[error("tracker is not sorted by remote")]
    Unsorted,
    /// A position handle is not a live slot of the tracker it was used with.
    #[error("handle does not belong to this tracker")]
    ForeignHandle,
}

impl<T> From<crate::Full<T>> for BindError {
    fn from(_: crate::Full<T>) -> Self {
        BindError::Full
    }
}
