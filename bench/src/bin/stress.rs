use std::time::Instant;

use clap::Parser;
use log::warn;

use bufpool::util::{logging, WyRand};
use bufpool::{Arena, Chunk, PooledBuf, SubpageHead, MAX_CACHED_BUFS, MIN_ELEM_SIZE};

/// Randomized allocation stress over a single pooled chunk.
#[derive(Parser, Debug)]
#[command(about, version, author)]
struct Args {
    /// Number of alloc/free operations
    #[arg(short, long, default_value_t = 1_000_000)]
    ops: usize,
    /// Page size in bytes (power of two)
    #[arg(short, long, default_value_t = 8192)]
    page_size: usize,
    /// Tree depth: chunk size = page_size * 2^order
    #[arg(short = 'd', long, default_value_t = 11)]
    order: usize,
    /// Rng seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
}

struct StressArena {
    heads: Vec<SubpageHead>,
}

impl StressArena {
    fn new(page_size: usize) -> Self {
        let mut heads = Vec::new();
        let mut size = MIN_ELEM_SIZE;
        while size <= page_size / 2 {
            heads.push(SubpageHead::new(size));
            size *= 2;
        }
        Self { heads }
    }
}

impl Arena for StressArena {
    fn subpage_pool_head(&self, elem_size: usize) -> &SubpageHead {
        &self.heads[(elem_size / MIN_ELEM_SIZE).ilog2() as usize]
    }
}

fn main() {
    let Args {
        ops,
        page_size,
        order,
        seed,
    } = Args::parse();

    logging();

    let arena = StressArena::new(page_size);
    let mut chunk = Chunk::new(0, (), page_size, order, 0, MAX_CACHED_BUFS).unwrap();
    let chunk_size = chunk.chunk_size();
    let sizes = [32, 64, 512, page_size, 8 * page_size];

    warn!("stress {ops} ops over a {chunk_size} byte chunk");

    let mut rng = WyRand::new(seed);
    let mut live: Vec<PooledBuf> = Vec::new();
    let (mut allocs, mut failed) = (0, 0);
    let timer = Instant::now();

    for _ in 0..ops {
        if live.is_empty() || rng.gen() % 3 != 0 {
            let size = sizes[rng.range(0..sizes.len() as u64) as usize];
            let mut buf = chunk.pop_cached_buf().unwrap_or_default();
            if chunk.allocate(&arena, &mut buf, size, size.next_power_of_two()) {
                allocs += 1;
                live.push(buf);
            } else {
                failed += 1;
            }
        } else {
            let i = rng.range(0..live.len() as u64) as usize;
            let buf = live.swap_remove(i);
            let handle = buf.handle();
            chunk.free(&arena, handle, Some(buf));
        }
    }

    let millis = timer.elapsed().as_millis();
    warn!(
        "{allocs} allocations ({failed} failed) in {millis}ms, usage {}%",
        chunk.usage()
    );

    for buf in live {
        let handle = buf.handle();
        chunk.free(&arena, handle, Some(buf));
    }
    warn!("drained: {}/{chunk_size} bytes free", chunk.free_bytes());
}
