//! Pooled byte-buffer allocator.
//!
//! A [`Chunk`] manages one contiguous memory region as a complete binary
//! buddy tree: allocations of a page and larger take whole subtrees
//! (*runs*), while smaller allocations carve a single leaf into
//! equal-sized slots tracked by a [`Subpage`] bitmap. Both paths hand out
//! a packed 64-bit [`Handle`] that names the tree node and, for slots,
//! the bitmap index.
//!
//! The enclosing arena is not part of this crate; a chunk only consumes
//! the narrow [`Arena`] surface (per-size [`SubpageHead`]s and a thread
//! cache token) and is itself protected by whatever coarse lock the
//! arena wraps its chunks in. All chunk methods therefore take
//! `&mut self`. Subpage state is additionally guarded by the per-size
//! head monitor, which the small paths acquire while that exclusive
//! borrow is already held: the lock order is chunk lock first, head
//! monitor second, and an arena must never take a chunk's lock while
//! holding a head monitor.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod arena;
pub mod buddy;
pub mod buf;
pub mod chunk;
pub mod handle;
pub mod subpage;
pub mod util;

pub use arena::{Arena, CacheToken};
pub use buddy::BuddyTree;
pub use buf::PooledBuf;
pub use chunk::{Chunk, ChunkLinks};
pub use handle::Handle;
pub use subpage::{Subpage, SubpageHead, SubpageId, SubpagePool};

/// Error codes of the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Not enough free memory to satisfy the request.
    /// The caller is expected to try the next chunk.
    Memory = 1,
    /// Invalid configuration parameters.
    Initialization = 2,
    /// The allocator state is inconsistent, or an operation was invoked
    /// on a chunk that cannot serve it.
    Corruption = 3,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Smallest supported page size.
pub const MIN_PAGE_SIZE: usize = 16;
/// Smallest subpage element size.
pub const MIN_ELEM_SIZE: usize = 16;
/// Exclusive upper bound of the tree depth, keeping node ids in 32 bit.
pub const MAX_ORDER: usize = 30;
/// Default page size of a pooled chunk.
pub const DEFAULT_PAGE_SIZE: usize = 8192;
/// Default tree depth (16 MiB chunks with the default page size).
pub const DEFAULT_MAX_ORDER: usize = 11;
/// Default bound of the per-chunk recycled descriptor cache.
pub const MAX_CACHED_BUFS: usize = 1023;
