//! Chunks: one buddy-managed memory region and its subpages.

use core::fmt;
use core::iter;

use alloc::boxed::Box;
use alloc::collections::VecDeque;

use log::error;

use crate::arena::Arena;
use crate::buddy::BuddyTree;
use crate::buf::PooledBuf;
use crate::handle::Handle;
use crate::subpage::{Subpage, SubpageId};
use crate::{Error, Result, MAX_ORDER, MIN_PAGE_SIZE};

/// Neighbours in the arena's occupancy lists. The arena maintains these;
/// the chunk just carries them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkLinks {
    pub prev: Option<u32>,
    pub next: Option<u32>,
}

/// One contiguous region of `page_size << max_order` bytes, managed by a
/// [`BuddyTree`] for page-and-larger runs and by per-leaf [`Subpage`]s
/// for smaller slots.
///
/// The chunk is generic over its backing region `M` and never reads it;
/// [`init_buf`](Self::init_buf) only projects handles into offsets. All
/// methods take `&mut self`: the enclosing arena serialises chunk
/// mutations with its own lock, while subpage state is guarded by the
/// per-size head monitors taken inside the small paths.
pub struct Chunk<M> {
    /// Index of this chunk in the arena's chunk table.
    id: u32,
    memory: M,
    /// Byte offset of the managed region within `memory`.
    offset: usize,
    page_size: usize,
    page_shifts: usize,
    max_order: usize,
    chunk_size: usize,
    free_bytes: usize,
    /// `None` for unpooled chunks.
    tree: Option<BuddyTree>,
    subpages: Box<[Option<Subpage>]>,
    /// Recycled descriptor shells, bounded by `max_cached_bufs`.
    cached_bufs: VecDeque<PooledBuf>,
    max_cached_bufs: usize,
    links: ChunkLinks,
}

impl<M> Chunk<M> {
    /// Create a fully free pooled chunk over `memory`, managing
    /// `page_size << max_order` bytes starting at `offset`.
    pub fn new(
        id: u32,
        memory: M,
        page_size: usize,
        max_order: usize,
        offset: usize,
        max_cached_bufs: usize,
    ) -> Result<Self> {
        if !page_size.is_power_of_two() || page_size < MIN_PAGE_SIZE {
            error!("invalid page size {page_size}");
            return Err(Error::Initialization);
        }
        let page_shifts = page_size.ilog2() as usize;
        if max_order >= MAX_ORDER || page_shifts + max_order >= usize::BITS as usize {
            error!("invalid tree depth {max_order}");
            return Err(Error::Initialization);
        }
        let chunk_size = page_size << max_order;
        Ok(Self {
            id,
            memory,
            offset,
            page_size,
            page_shifts,
            max_order,
            chunk_size,
            free_bytes: chunk_size,
            tree: Some(BuddyTree::new(max_order, page_shifts)),
            subpages: iter::repeat_with(|| None).take(1 << max_order).collect(),
            cached_bufs: VecDeque::new(),
            max_cached_bufs,
            links: ChunkLinks::default(),
        })
    }

    /// Wrap a caller-allocated region of arbitrary size so that oversized
    /// buffers flow through the same descriptor type. There is no tree
    /// and no accounting; only [`destroy`](Self::destroy) is meaningful
    /// and `allocate`/`free` must not be called.
    pub fn new_unpooled(id: u32, memory: M, size: usize, offset: usize) -> Self {
        Self {
            id,
            memory,
            offset,
            page_size: 0,
            page_shifts: 0,
            max_order: 0,
            chunk_size: size,
            free_bytes: 0,
            tree: None,
            subpages: Box::new([]),
            cached_bufs: VecDeque::new(),
            max_cached_bufs: 0,
            links: ChunkLinks::default(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
    pub fn offset(&self) -> usize {
        self.offset
    }
    pub fn page_size(&self) -> usize {
        self.page_size
    }
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
    pub fn free_bytes(&self) -> usize {
        self.free_bytes
    }
    pub fn is_unpooled(&self) -> bool {
        self.tree.is_none()
    }
    pub fn memory(&self) -> &M {
        &self.memory
    }
    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }
    pub fn links(&self) -> ChunkLinks {
        self.links
    }
    pub fn links_mut(&mut self) -> &mut ChunkLinks {
        &mut self.links
    }

    /// The buddy tree, for metrics and tests. `None` when unpooled.
    pub fn tree(&self) -> Option<&BuddyTree> {
        self.tree.as_ref()
    }

    /// Subpage backing the leaf `node`, if one was ever split off.
    pub fn subpage(&self, node: u32) -> Option<&Subpage> {
        self.subpages.get(self.subpage_index(node))?.as_ref()
    }

    /// Percentage of the chunk in use.
    pub fn usage(&self) -> u8 {
        if self.free_bytes == 0 {
            return 100;
        }
        let free = (self.free_bytes as u128 * 100 / self.chunk_size as u128) as u8;
        if free == 0 {
            // Not entirely full, but rounding would claim so
            99
        } else {
            100 - free
        }
    }

    /// Allocate `norm_capacity` bytes (a power of two, normalised by the
    /// arena) and initialise `buf`. Returns false without consuming
    /// anything if the chunk cannot satisfy the request.
    pub fn allocate<A: Arena>(
        &mut self,
        arena: &A,
        buf: &mut PooledBuf,
        req_capacity: usize,
        norm_capacity: usize,
    ) -> bool {
        debug_assert!(!self.is_unpooled());
        debug_assert!(norm_capacity.is_power_of_two() && norm_capacity <= self.chunk_size);
        let handle = if (norm_capacity & !(self.page_size - 1)) != 0 {
            self.allocate_run(norm_capacity)
        } else {
            self.allocate_subpage(arena, norm_capacity)
        };
        match handle {
            Ok(handle) => {
                self.init_buf(arena, buf, handle, req_capacity);
                true
            }
            Err(_) => false,
        }
    }

    /// Release a handle. The recycled descriptor shell, if any, is kept
    /// for later allocations while the cache is below its bound.
    pub fn free<A: Arena>(&mut self, arena: &A, handle: Handle, recycled: Option<PooledBuf>) {
        debug_assert!(!self.is_unpooled());
        let node = handle.node();
        if handle.is_subpage() {
            let index = self.subpage_index(node);
            let Some(subpage) = self.subpages.get_mut(index).and_then(|s| s.as_mut()) else {
                error!("Invalid handle n={node}");
                return;
            };
            debug_assert!(subpage.do_not_destroy());
            let head = arena.subpage_pool_head(subpage.elem_size());
            let mut pool = head.lock();
            if subpage.free(&mut pool, handle.slot()) {
                // The leaf still holds live slots
                return;
            }
        }
        let Some(tree) = self.tree.as_mut() else {
            error!("Free on unpooled chunk");
            return;
        };
        self.free_bytes += tree.run_length(node);
        tree.free(node);

        if let Some(mut buf) = recycled {
            if self.cached_bufs.len() < self.max_cached_bufs {
                buf.clear();
                self.cached_bufs.push_back(buf);
            }
        }
    }

    /// Project `handle` into `buf` without allocating. This is the sole
    /// point where a handle becomes an `(offset, length)` view of the
    /// region.
    pub fn init_buf<A: Arena>(
        &self,
        arena: &A,
        buf: &mut PooledBuf,
        handle: Handle,
        req_capacity: usize,
    ) {
        let Some(tree) = self.tree.as_ref() else {
            error!("Buffer init on unpooled chunk");
            return;
        };
        let node = handle.node();
        if handle.is_subpage() {
            let index = self.subpage_index(node);
            let Some(subpage) = self.subpages.get(index).and_then(|s| s.as_ref()) else {
                error!("Invalid handle n={node}");
                return;
            };
            debug_assert!(subpage.do_not_destroy());
            debug_assert!(req_capacity <= subpage.elem_size());
            let offset = tree.run_offset(node) + handle.slot() * subpage.elem_size() + self.offset;
            buf.init(
                self.id,
                handle,
                offset,
                req_capacity,
                subpage.elem_size(),
                arena.thread_cache(),
            );
        } else {
            debug_assert_eq!(tree.value(node), tree.unusable());
            debug_assert!(req_capacity <= tree.run_length(node));
            buf.init(
                self.id,
                handle,
                tree.run_offset(node) + self.offset,
                req_capacity,
                tree.run_length(node),
                arena.thread_cache(),
            );
        }
    }

    /// Take a recycled descriptor shell, if any.
    pub fn pop_cached_buf(&mut self) -> Option<PooledBuf> {
        self.cached_bufs.pop_back()
    }

    /// Hand the backing region back; the arena calls this when it drops
    /// the chunk.
    pub fn destroy(self) -> M {
        self.memory
    }

    fn allocate_run(&mut self, norm_capacity: usize) -> Result<Handle> {
        let Some(tree) = self.tree.as_mut() else {
            error!("Allocation on unpooled chunk");
            return Err(Error::Corruption);
        };
        let depth = self.max_order - (norm_capacity.ilog2() as usize - self.page_shifts);
        let id = tree.allocate(depth)?;
        self.free_bytes -= tree.run_length(id);
        Ok(Handle::run(id))
    }

    fn allocate_subpage<A: Arena>(&mut self, arena: &A, norm_capacity: usize) -> Result<Handle> {
        let head = arena.subpage_pool_head(norm_capacity);
        debug_assert_eq!(head.elem_size(), norm_capacity);
        let mut pool = head.lock();

        // A listed subpage of this chunk still has room
        let existing = pool.iter().find(|id| id.chunk == self.id).map(|id| id.node);
        if let Some(node) = existing {
            let index = self.subpage_index(node);
            let Some(subpage) = self.subpages.get_mut(index).and_then(|s| s.as_mut()) else {
                error!("Invalid pool entry n={}", node);
                return Err(Error::Corruption);
            };
            let token = subpage.allocate(&mut pool)?;
            return Ok(Handle::new().with_node(node).with_bitmap(token));
        }

        // Split off a fresh leaf
        let Some(tree) = self.tree.as_mut() else {
            error!("Allocation on unpooled chunk");
            return Err(Error::Corruption);
        };
        let id = tree.allocate(self.max_order)?;
        self.free_bytes -= self.page_size;
        let (chunk, page_size) = (self.id, self.page_size);
        let index = (id as usize) ^ (1 << self.max_order);
        let subpage = self.subpages[index]
            .get_or_insert_with(|| Subpage::new(SubpageId { chunk, node: id }, page_size));
        subpage.init(&mut pool, norm_capacity);
        let token = subpage.allocate(&mut pool)?;
        Ok(Handle::new().with_node(id).with_bitmap(token))
    }

    fn subpage_index(&self, node: u32) -> usize {
        (node as usize) ^ (1 << self.max_order)
    }
}

impl<M> fmt::Debug for Chunk<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("id", &self.id)
            .field("unpooled", &self.is_unpooled())
            .field("chunk_size", &self.chunk_size)
            .field("free_bytes", &self.free_bytes)
            .field("usage", &self.usage())
            .finish()
    }
}
