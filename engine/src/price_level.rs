//! A single price level: a FIFO of orders sharing one price, linked
//! through `prev`/`next` arena-index fields on `Order` itself.

use crate::arena::{ArenaPool, NULL_INDEX};
use common::types::{Price, Qty};

/// One active price level. `head`/`tail` are arena indices, `NULL_INDEX`
/// when the level is empty (which should never be observed - an empty
/// level is removed from the price-level index immediately).
#[derive(Debug, Clone, Copy)]
pub struct PriceLevel {
    pub price: Price,
    pub total_quantity: Qty,
    pub head: u32,
    pub tail: u32,
    pub order_count: u32,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            total_quantity: 0,
            head: NULL_INDEX,
            tail: NULL_INDEX,
            order_count: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == NULL_INDEX
    }

    /// Appends `slot` to the tail of the FIFO.
    pub fn push_back(&mut self, arena: &ArenaPool, slot: u32) {
        let qty = arena.get(slot).remaining_qty;

        arena.get_mut(slot).prev = self.tail;
        arena.get_mut(slot).next = NULL_INDEX;

        if self.tail == NULL_INDEX {
            self.head = slot;
        } else {
            arena.get_mut(self.tail).next = slot;
        }
        self.tail = slot;

        self.total_quantity += qty;
        self.order_count += 1;
    }

    /// Removes `slot` from whatever position it occupies in the FIFO.
    ///
    /// The caller is responsible for adjusting `total_quantity` for any
    /// quantity change that happened *before* calling this (this method
    /// subtracts the order's current `remaining_qty` as part of removal).
    pub fn remove(&mut self, arena: &ArenaPool, slot: u32) {
        let (prev, next, qty) = {
            let order = arena.get(slot);
            (order.prev, order.next, order.remaining_qty)
        };

        match (prev, next) {
            (NULL_INDEX, NULL_INDEX) => {
                // only node
                self.head = NULL_INDEX;
                self.tail = NULL_INDEX;
            }
            (NULL_INDEX, _) => {
                // head node
                arena.get_mut(next).prev = NULL_INDEX;
                self.head = next;
            }
            (_, NULL_INDEX) => {
                // tail node
                arena.get_mut(prev).next = NULL_INDEX;
                self.tail = prev;
            }
            (_, _) => {
                // middle node
                arena.get_mut(prev).next = next;
                arena.get_mut(next).prev = prev;
            }
        }

        arena.get_mut(slot).prev = NULL_INDEX;
        arena.get_mut(slot).next = NULL_INDEX;

        self.total_quantity = self.total_quantity.saturating_sub(qty);
        self.order_count = self.order_count.saturating_sub(1);
    }

    /// Pops the head of the FIFO, if any.
    pub fn pop_front(&mut self, arena: &ArenaPool) -> Option<u32> {
        if self.head == NULL_INDEX {
            return None;
        }
        let slot = self.head;
        self.remove(arena, slot);
        Some(slot)
    }

    /// Reduces `total_quantity` by `qty` without touching the FIFO, used
    /// when a partial fill shrinks a still-resting order's quantity.
    #[inline]
    pub fn reduce_quantity(&mut self, qty: Qty) {
        self.total_quantity = self.total_quantity.saturating_sub(qty);
    }
}
