//! Key trait for storage indices.
//!
//! Every node of a [`Graph`](crate::Graph) (reporters, trackers and the slots
//! threaded through trackers) lives in storage under a [`Key`]. Links between
//! nodes are keys, with [`Key::NONE`] standing in for "no node".

/// Trait for key/index types used in storage.
///
/// Provides a sentinel value (`NONE`) and conversion to/from `usize`.
///
/// # Example
///
/// ```
/// use nexus_tracker::Key;
///
/// let key: u32 = 42;
/// assert!(key.is_some());
/// assert!(u32::NONE.is_none());
/// ```
pub trait Key: Copy + Eq + core::fmt::Debug {
    /// Sentinel value representing "no key".
    ///
    /// Used for the ends of a tracker's slot chain. For integer types this is
    /// `MAX`, which storage never hands out.
    const NONE: Self;

    /// Creates a key from a `usize` value.
    fn from_usize(val: usize) -> Self;

    /// Returns the key as a `usize`.
    ///
    /// Also used as the sort key of a remote when a tracker is kept ordered
    /// by remote.
    fn as_usize(&self) -> usize;

    /// Returns `true` if this is the sentinel value.
    #[inline]
    fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Returns `true` if this is NOT the sentinel value.
    #[inline]
    fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Converts the sentinel to `None`.
    #[inline]
    fn into_option(self) -> Option<Self> {
        if self.is_none() { None } else { Some(self) }
    }
}

macro_rules! impl_key_for_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Key for $ty {
                const NONE: Self = <$ty>::MAX;

                #[inline]
                fn from_usize(val: usize) -> Self {
                    val as Self
                }

                #[inline]
                fn as_usize(&self) -> usize {
                    *self as usize
                }
            }
        )*
    };
}

impl_key_for_unsigned!(u8, u16, u32, u64, usize);

/// Converts an optional key back to the sentinel form used in links.
#[inline]
pub(crate) fn or_none<K: Key>(key: Option<K>) -> K {
    key.unwrap_or(K::NONE)
}
