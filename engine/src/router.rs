//! Symbol router: a static, pure mapping from symbol to shard index,
//! decided once at startup and never changing afterwards. Because each
//! symbol maps to exactly one shard, the receiver thread can enqueue
//! straight onto the shard's input ring with no cross-shard coordination.

use crate::types::Symbol;

/// Partitions symbols across a fixed number of shards.
///
/// The two-shard configuration buckets by ASCII upper-case first letter
/// (A-M -> shard 0, N-Z -> shard 1); any other shard count falls back to
/// a stable hash of the symbol bytes, so the router works whether the
/// process was started with `--single-processor` or `--dual-processor`.
#[derive(Debug, Clone, Copy)]
pub struct SymbolRouter {
    shard_count: usize,
}

impl SymbolRouter {
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count > 0, "shard_count must be at least 1");
        Self { shard_count }
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Resolves a symbol to its shard. Pure and total: every `Symbol`
    /// value, including an empty one, maps to exactly one shard.
    pub fn shard_for(&self, symbol: &Symbol) -> usize {
        if self.shard_count == 1 {
            return 0;
        }

        if self.shard_count == 2 {
            return Self::first_letter_bucket(symbol);
        }

        Self::hash_bucket(symbol, self.shard_count)
    }

    /// A-M -> 0, N-Z -> 0 or 1 depending on letter, anything non-alphabetic
    /// (digits, empty symbol) falls into shard 0 alongside A-M.
    fn first_letter_bucket(symbol: &Symbol) -> usize {
        match symbol.as_bytes().first().copied() {
            Some(b) if b.is_ascii_alphabetic() => {
                let upper = b.to_ascii_uppercase();
                if upper <= b'M' {
                    0
                } else {
                    1
                }
            }
            _ => 0,
        }
    }

    fn hash_bucket(symbol: &Symbol, shard_count: usize) -> usize {
        use rustc_hash::FxHasher;
        use std::hash::Hasher;

        let mut hasher = FxHasher::default();
        hasher.write(symbol.as_bytes());
        (hasher.finish() as usize) % shard_count
    }
}
