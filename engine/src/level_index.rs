//! Sorted array of price levels, one per book side.
//!
//! Replaces the `HashMap<Price, PriceLevel>` the example repos reach for:
//! since index 0 must always be the best price, a small sorted array with
//! binary search for lookup and a linear-scan insert (with a memmove via
//! `ArrayVec::insert`) beats a hash map's cache behaviour at the sizes a
//! single symbol's book actually reaches.

use crate::arena::ArenaPool;
use crate::constants::MAX_PRICE_LEVELS;
use crate::price_level::PriceLevel;
use arrayvec::ArrayVec;
use common::types::{Price, Side};

/// Sorted levels for one side of one book. Bids are kept strictly
/// descending by price (best bid at index 0); asks strictly ascending
/// (best ask at index 0).
pub struct PriceLevelIndex {
    side: Side,
    levels: ArrayVec<PriceLevel, MAX_PRICE_LEVELS>,
}

impl PriceLevelIndex {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: ArrayVec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn best(&self) -> Option<&PriceLevel> {
        self.levels.first()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &PriceLevel {
        &self.levels[index]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut PriceLevel {
        &mut self.levels[index]
    }

    /// True ordering comparator: for bids, higher price sorts first; for
    /// asks, lower price sorts first.
    #[inline]
    fn better(&self, a: Price, b: Price) -> bool {
        match self.side {
            Side::Buy => a > b,
            Side::Sell => a < b,
        }
    }

    /// Binary search for an existing level at `price`. O(log n).
    pub fn find(&self, price: Price) -> Option<usize> {
        let side = self.side;
        self.levels
            .binary_search_by(|level| match side {
                Side::Buy => level.price.cmp(&price).reverse(),
                Side::Sell => level.price.cmp(&price),
            })
            .ok()
    }

    /// Inserts a new, empty level at `price` if one doesn't already exist,
    /// returning its index either way. Linear scan to find the insertion
    /// point, then a memmove via `ArrayVec::insert`. O(n), bounded by
    /// `MAX_PRICE_LEVELS`.
    pub fn find_or_insert(&mut self, price: Price) -> Option<usize> {
        let mut insert_at = self.levels.len();
        for (i, level) in self.levels.iter().enumerate() {
            if level.price == price {
                return Some(i);
            }
            if self.better(price, level.price) {
                insert_at = i;
                break;
            }
        }

        if self.levels.is_full() {
            return None;
        }

        self.levels.insert(insert_at, PriceLevel::new(price));
        Some(insert_at)
    }

    /// Removes the level at `index`, freeing every order still resting at
    /// it back to `arena`. Compacts the array (memmove).
    pub fn remove_level(&mut self, arena: &ArenaPool, index: usize) {
        let mut level = self.levels.remove(index);
        while let Some(slot) = level.pop_front(arena) {
            arena.free(slot);
        }
    }

    /// Removes the level at `index` only if it has become empty. Returns
    /// true if a removal happened.
    pub fn remove_if_empty(&mut self, index: usize) -> bool {
        if self.levels[index].is_empty() {
            self.levels.remove(index);
            true
        } else {
            false
        }
    }

    /// Drops every level without touching the arena; the caller must have
    /// already freed any resting orders (used by flush, which frees orders
    /// as it walks rather than through `remove_level`).
    pub fn clear_all(&mut self) {
        self.levels.clear();
    }

    /// Iterates levels in priority order (best first).
    pub fn iter(&self) -> impl Iterator<Item = &PriceLevel> {
        self.levels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PriceLevel> {
        self.levels.iter_mut()
    }
}
