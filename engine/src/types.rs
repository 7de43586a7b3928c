//! Core domain types: identifiers, the symbol value type, and the Order
//! record stored in the arena.

use common::time::Nanos;
use common::types::{ClientId, Price, Qty, Side};

pub const SYMBOL_MAX_LEN: usize = 15;

pub type UserId = u32;
pub type UserOrderId = u32;

/// A fixed-capacity, NUL-padded symbol buffer (up to 15 ASCII characters).
///
/// Stored by value so order books and routing tables never allocate or
/// hold a borrowed string.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    bytes: [u8; SYMBOL_MAX_LEN + 1],
}

impl Symbol {
    /// Builds a Symbol from a string slice, truncating at `SYMBOL_MAX_LEN`.
    pub fn new(s: &str) -> Self {
        let mut bytes = [0u8; SYMBOL_MAX_LEN + 1];
        let src = s.as_bytes();
        let n = src.len().min(SYMBOL_MAX_LEN);
        bytes[..n].copy_from_slice(&src[..n]);
        Self { bytes }
    }

    /// The symbol as a string slice, stopping at the first NUL.
    pub fn as_str(&self) -> &str {
        let len = self.bytes.iter().position(|&b| b == 0).unwrap_or(self.bytes.len());
        // SAFETY: bytes were built from an &str and only ASCII-truncated.
        std::str::from_utf8(&self.bytes[..len]).unwrap_or("")
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol::new("")
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order type: market orders always cross regardless of price; limit
/// orders rest on the book if not (fully) matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

/// A single resting or in-flight order.
///
/// Lives in an arena slot. `prev`/`next` are arena-index links within the
/// FIFO of the price level it currently rests at; both are `u32::MAX`
/// (see [`crate::arena::NULL_INDEX`]) when the order is not linked (either
/// not yet inserted, or in the middle of being matched).
#[derive(Debug, Clone, Copy)]
pub struct Order {
    pub side: Side,
    pub order_type: OrderType,
    pub price: Price,
    pub original_qty: Qty,
    pub remaining_qty: Qty,
    pub user_id: UserId,
    pub user_order_id: UserOrderId,
    pub client_id: ClientId,
    pub timestamp: Nanos,
    pub prev: u32,
    pub next: u32,
}

/// Composite order-map key: `(user_id << 32) | user_order_id`.
///
/// Key 0 is reserved for EMPTY slots and `u64::MAX` for TOMBSTONE, so an
/// order with `user_id == 0 && user_order_id == 0` is indistinguishable
/// from an empty slot; clients are expected to use 1-based order ids.
#[inline]
pub fn order_key(user_id: UserId, user_order_id: UserOrderId) -> u64 {
    ((user_id as u64) << 32) | (user_order_id as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_roundtrip() {
        let s = Symbol::new("IBM");
        assert_eq!(s.as_str(), "IBM");
    }

    #[test]
    fn test_symbol_truncates() {
        let s = Symbol::new("ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert_eq!(s.as_str().len(), SYMBOL_MAX_LEN);
    }

    #[test]
    fn test_symbol_equality() {
        assert_eq!(Symbol::new("AAPL"), Symbol::new("AAPL"));
        assert_ne!(Symbol::new("AAPL"), Symbol::new("GOOG"));
    }

    #[test]
    fn test_order_key_composition() {
        let k = order_key(1, 1);
        assert_eq!(k, (1u64 << 32) | 1);
        assert_ne!(order_key(1, 2), order_key(2, 1));
    }
}
