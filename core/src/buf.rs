//! Buffer descriptors handed out to the arena.

use crate::arena::CacheToken;
use crate::handle::Handle;

/// Projection of a live [`Handle`] into an `(offset, length)` view of
/// the owning chunk's region.
///
/// Plain data: the descriptor does not borrow the region. Shells are
/// recycled through the chunk's bounded descriptor cache instead of
/// being reallocated for every buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PooledBuf {
    chunk: u32,
    handle: Handle,
    offset: usize,
    length: usize,
    max_length: usize,
    cache: CacheToken,
}

impl PooledBuf {
    pub(crate) fn init(
        &mut self,
        chunk: u32,
        handle: Handle,
        offset: usize,
        length: usize,
        max_length: usize,
        cache: CacheToken,
    ) {
        self.chunk = chunk;
        self.handle = handle;
        self.offset = offset;
        self.length = length;
        self.max_length = max_length;
        self.cache = cache;
    }

    /// Reset before the shell goes back into a descriptor cache.
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Index of the owning chunk in the arena's chunk table.
    pub fn chunk(&self) -> u32 {
        self.chunk
    }
    pub fn handle(&self) -> Handle {
        self.handle
    }
    /// Byte offset from the base of the chunk's region.
    pub fn offset(&self) -> usize {
        self.offset
    }
    /// Requested capacity.
    pub fn length(&self) -> usize {
        self.length
    }
    /// Granted capacity; the buffer may grow up to this without moving.
    pub fn max_length(&self) -> usize {
        self.max_length
    }
    /// Thread cache this buffer was allocated through.
    pub fn cache(&self) -> CacheToken {
        self.cache
    }
}
