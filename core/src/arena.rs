//! The narrow surface through which a chunk talks to its enclosing
//! arena.

use crate::subpage::SubpageHead;

/// Opaque token of the thread-local cache a buffer was allocated
/// through, forwarded verbatim into descriptors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheToken(pub u64);

/// Contracts a [`Chunk`](crate::Chunk) consumes from its arena.
///
/// The arena additionally provides the coarse lock under which all
/// chunk-level mutations run; chunk methods take `&mut self`, so that
/// lock is whatever mutex the arena wraps its chunks in. The subpage
/// paths acquire the per-size head monitor while that lock is held, so
/// the lock order is chunk lock first, head monitor second;
/// implementations must never take a chunk's lock while already holding
/// a head monitor.
pub trait Arena {
    /// Stable head of the subpage pool for `elem_size`.
    fn subpage_pool_head(&self, elem_size: usize) -> &SubpageHead;

    /// Token of the calling thread's cache.
    fn thread_cache(&self) -> CacheToken {
        CacheToken::default()
    }
}
