//! Fixed-capacity sizing and safety-rail constants.
//!
//! Every bound named in the component design lives here so the rest of
//! the crate never hard-codes a capacity inline.

/// Orders resident in one book's arena at once.
pub const MAX_ORDERS_PER_BOOK: usize = 65_536;

/// Order-map table size. Must be a power of two comfortably above
/// `MAX_ORDERS_PER_BOOK / 0.7` to keep the load factor under 0.7.
pub const ORDER_MAP_CAPACITY: usize = 131_072;

/// Price levels tracked per side, per book.
pub const MAX_PRICE_LEVELS: usize = 1024;

/// Linear-probe bound for both the order map and the symbol table.
pub const MAX_PROBE_LENGTH: usize = 32;

/// Distinct symbols one matching engine (one shard) can track.
pub const MAX_SYMBOLS: usize = 64;

/// Symbol table size, a power of two above `MAX_SYMBOLS / 0.7`.
pub const SYMBOL_TABLE_CAPACITY: usize = 128;

/// Safety rail bounding the matching loop's outer iteration count.
pub const MAX_MATCH_ITERATIONS: usize = 10_000;

/// Safety rail bounding orders walked within one price level during a match.
pub const MAX_ORDERS_AT_PRICE_LEVEL: usize = 100_000;

/// Per-call budget for the iterative Flush.
pub const FLUSH_BATCH_SIZE: usize = 256;

/// Envelopes drained from an input ring per processor loop iteration.
pub const PROCESSOR_BATCH_SIZE: usize = 32;

/// Consecutive empty batches before the processor backs off to the idle sleep.
pub const IDLE_THRESHOLD: u32 = 100;

/// Sleep duration once idle.
pub const IDLE_SLEEP_US: u64 = 100;

/// Sleep duration while still active but momentarily empty.
pub const ACTIVE_SLEEP_US: u64 = 1;

/// Bounded retries for a receiver pushing onto a full ring before dropping.
pub const MAX_RETRIES: usize = 100;

/// Capacity of the engine-wide order-key-to-symbol map, used to resolve a
/// cancel that didn't carry a symbol. Sized for realistic cross-symbol
/// order distribution, not the pathological case of every book
/// simultaneously saturating its own per-book arena; see DESIGN.md.
pub const ENGINE_ORDER_KEY_CAPACITY: usize = 262_144;

/// Client registry capacity.
pub const MAX_TCP_CLIENTS: usize = 1024;

/// Bounded drain iterations the output router performs during shutdown.
pub const SHUTDOWN_DRAIN_ITERATIONS: usize = 100;

/// Capacity of each SPSC ring in the pipeline (power of two).
pub const RING_CAPACITY: usize = 8192;
