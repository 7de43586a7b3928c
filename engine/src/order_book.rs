//! The book for a single symbol: order map + bid/ask price-level indices +
//! arena, plus the top-of-book change tracker and the iterative-flush state
//! machine.

use crate::arena::{ArenaPool, NULL_INDEX};
use crate::constants::{FLUSH_BATCH_SIZE, MAX_MATCH_ITERATIONS, MAX_ORDERS_AT_PRICE_LEVEL, ORDER_MAP_CAPACITY};
use crate::level_index::PriceLevelIndex;
use crate::open_map::OpenAddressMap;
use crate::protocol::{OrderKind, OutputMessage};
use crate::types::{order_key, Order, OrderType, Symbol, UserId, UserOrderId};
use common::time::now_nanos;
use common::types::{ClientId, Price, Qty, Side};

/// Where a resting order lives: which side's index, at what price, and at
/// which arena slot. Stored in the order map so a cancel can find it
/// without scanning.
#[derive(Debug, Clone, Copy)]
pub struct OrderLocation {
    pub side: Side,
    pub price: Price,
    pub slot: u32,
}

impl Default for OrderLocation {
    fn default() -> Self {
        Self {
            side: Side::Buy,
            price: 0,
            slot: NULL_INDEX,
        }
    }
}

type OrderMap = OpenAddressMap<OrderLocation, ORDER_MAP_CAPACITY>;

/// Which side the iterative flush is currently draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushSide {
    Bids,
    Asks,
    Done,
}

/// Per-book progress marker for the budgeted, resumable flush.
struct FlushState {
    in_progress: bool,
    side: FlushSide,
    level_index: usize,
}

impl FlushState {
    fn fresh() -> Self {
        Self {
            in_progress: false,
            side: FlushSide::Bids,
            level_index: 0,
        }
    }
}

/// One symbol's book: resting orders, price-level indices for both sides,
/// and the bookkeeping needed to emit top-of-book change events.
pub struct OrderBook {
    symbol: Symbol,
    arena: ArenaPool,
    bids: PriceLevelIndex,
    asks: PriceLevelIndex,
    order_map: Box<OrderMap>,
    prev_bid_price: Price,
    prev_bid_qty: Qty,
    prev_ask_price: Price,
    prev_ask_qty: Qty,
    bid_ever_active: bool,
    ask_ever_active: bool,
    flush_state: FlushState,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            arena: ArenaPool::new(),
            bids: PriceLevelIndex::new(Side::Buy),
            asks: PriceLevelIndex::new(Side::Sell),
            order_map: Box::new(OrderMap::new()),
            prev_bid_price: 0,
            prev_bid_qty: 0,
            prev_ask_price: 0,
            prev_ask_qty: 0,
            bid_ever_active: false,
            ask_ever_active: false,
            flush_state: FlushState::fresh(),
        }
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// True if `(user_id, user_order_id)` is still resting on this book.
    pub fn is_resting(&self, user_id: UserId, user_order_id: UserOrderId) -> bool {
        self.order_map.find(order_key(user_id, user_order_id)).is_some()
    }

    /// Best bid (price, total_quantity), or `None` if the bid side is empty.
    pub fn best_bid(&self) -> Option<(Price, Qty)> {
        self.bids.best().map(|level| (level.price, level.total_quantity))
    }

    /// Best ask (price, total_quantity), or `None` if the ask side is empty.
    pub fn best_ask(&self) -> Option<(Price, Qty)> {
        self.asks.best().map(|level| (level.price, level.total_quantity))
    }

    pub fn order_count(&self) -> usize {
        self.arena.live_count()
    }

    pub fn bid_level_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_level_count(&self) -> usize {
        self.asks.len()
    }

    /// Processes one new order: allocates it, acks, crosses it against the
    /// opposite side under price-time priority, rests any remainder (limit
    /// orders only), then reports any top-of-book change.
    pub fn process_new_order(
        &mut self,
        client_id: ClientId,
        user_id: UserId,
        user_order_id: UserOrderId,
        side: Side,
        order_type: OrderKind,
        price: Price,
        quantity: Qty,
    ) -> Vec<OutputMessage> {
        let mut out = Vec::new();

        let order = Order {
            side,
            order_type: match order_type {
                OrderKind::Market => OrderType::Market,
                OrderKind::Limit => OrderType::Limit,
            },
            price: if matches!(order_type, OrderKind::Market) { 0 } else { price },
            original_qty: quantity,
            remaining_qty: quantity,
            user_id,
            user_order_id,
            client_id,
            timestamp: now_nanos(),
            prev: NULL_INDEX,
            next: NULL_INDEX,
        };

        let slot = match self.arena.alloc(order) {
            Some(slot) => slot,
            None => return out, // pool exhausted: drop silently, no ack
        };

        out.push(OutputMessage::Ack {
            symbol: self.symbol,
            user_id,
            user_order_id,
        });

        self.cross(slot, &mut out);
        self.rest_remainder(slot);
        out.extend(self.check_tob_changes());
        out
    }

    /// Crosses the aggressor at `slot` against the opposite side's FIFO,
    /// price-time priority, bounded by `MAX_MATCH_ITERATIONS` /
    /// `MAX_ORDERS_AT_PRICE_LEVEL`. Trade price always equals the resting
    /// (passive) order's price.
    fn cross(&mut self, slot: u32, out: &mut Vec<OutputMessage>) {
        let aggressor_side = self.arena.get(slot).side;
        let aggressor_type = self.arena.get(slot).order_type;
        let aggressor_price = self.arena.get(slot).price;
        let symbol = self.symbol;

        // Borrowed once for the whole crossing pass: disjoint from
        // `self.arena` and `self.order_map`, both accessed through the
        // already-bound `arena` reference below (interior mutability, so
        // `&` suffices for both reads and writes).
        let opposite: &mut PriceLevelIndex = match aggressor_side.opposite() {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let arena = &self.arena;

        let mut outer_iterations = 0;
        loop {
            if arena.get(slot).remaining_qty == 0 {
                break;
            }
            if outer_iterations >= MAX_MATCH_ITERATIONS {
                break;
            }
            outer_iterations += 1;

            if opposite.is_empty() {
                break;
            }
            let level_price = opposite.get(0).price;

            let permitted = match aggressor_type {
                OrderType::Market => true,
                OrderType::Limit => match aggressor_side {
                    Side::Buy => aggressor_price >= level_price,
                    Side::Sell => aggressor_price <= level_price,
                },
            };
            if !permitted {
                break;
            }

            let mut inner_iterations = 0;
            loop {
                if arena.get(slot).remaining_qty == 0 {
                    break;
                }
                if inner_iterations >= MAX_ORDERS_AT_PRICE_LEVEL {
                    break;
                }
                inner_iterations += 1;

                let level = opposite.get_mut(0);
                if level.is_empty() {
                    break;
                }
                let passive_slot = level.head;

                let passive_user_id = arena.get(passive_slot).user_id;
                let passive_user_order_id = arena.get(passive_slot).user_order_id;
                let passive_client_id = arena.get(passive_slot).client_id;
                let passive_price = arena.get(passive_slot).price;
                let passive_remaining = arena.get(passive_slot).remaining_qty;
                let aggressor_remaining = arena.get(slot).remaining_qty;

                let trade_qty = aggressor_remaining.min(passive_remaining);

                arena.get_mut(slot).remaining_qty -= trade_qty;
                arena.get_mut(passive_slot).remaining_qty -= trade_qty;
                level.reduce_quantity(trade_qty);

                let aggressor_user_id = arena.get(slot).user_id;
                let aggressor_user_order_id = arena.get(slot).user_order_id;
                let aggressor_client_id = arena.get(slot).client_id;

                let (buy_user_id, buy_user_order_id, buy_client_id, sell_user_id, sell_user_order_id, sell_client_id) =
                    match aggressor_side {
                        Side::Buy => (
                            aggressor_user_id,
                            aggressor_user_order_id,
                            aggressor_client_id,
                            passive_user_id,
                            passive_user_order_id,
                            passive_client_id,
                        ),
                        Side::Sell => (
                            passive_user_id,
                            passive_user_order_id,
                            passive_client_id,
                            aggressor_user_id,
                            aggressor_user_order_id,
                            aggressor_client_id,
                        ),
                    };

                out.push(OutputMessage::Trade {
                    symbol,
                    buy_user_id,
                    buy_user_order_id,
                    sell_user_id,
                    sell_user_order_id,
                    price: passive_price,
                    quantity: trade_qty,
                    buy_client_id,
                    sell_client_id,
                });

                if arena.get(passive_slot).remaining_qty == 0 {
                    level.pop_front(arena);
                    self.order_map.remove(order_key(passive_user_id, passive_user_order_id));
                    arena.free(passive_slot);
                }

                if level.is_empty() {
                    break;
                }
            }

            if !opposite.is_empty() && opposite.get(0).is_empty() {
                opposite.remove_if_empty(0);
            }
        }
    }

    /// Rests any remaining quantity of a limit order; frees the slot
    /// outright for a fully-filled order or a market order's unfilled tail.
    fn rest_remainder(&mut self, slot: u32) {
        let order = *self.arena.get(slot);
        if order.remaining_qty > 0 && order.order_type == OrderType::Limit {
            let levels = match order.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            let index = match levels.find_or_insert(order.price) {
                Some(index) => index,
                None => {
                    // price-level table full: can't rest, drop the order.
                    self.arena.free(slot);
                    return;
                }
            };
            levels.get_mut(index).push_back(&self.arena, slot);
            let _ = self.order_map.insert(
                order_key(order.user_id, order.user_order_id),
                OrderLocation {
                    side: order.side,
                    price: order.price,
                    slot,
                },
            );
        } else {
            self.arena.free(slot);
        }
    }

    /// Cancels a resting order, always emitting a `CancelAck` (idempotent:
    /// an unknown order id still acks, it just has nothing to unlink).
    pub fn cancel(&mut self, user_id: UserId, user_order_id: UserOrderId) -> Vec<OutputMessage> {
        let key = order_key(user_id, user_order_id);
        if let Some(loc) = self.order_map.remove(key) {
            let levels = match loc.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            if let Some(index) = levels.find(loc.price) {
                levels.get_mut(index).remove(&self.arena, loc.slot);
                self.arena.free(loc.slot);
                levels.remove_if_empty(index);
            }
        }

        let mut out = vec![OutputMessage::CancelAck {
            symbol: self.symbol,
            user_id,
            user_order_id,
        }];
        out.extend(self.check_tob_changes());
        out
    }

    /// Phase 1 of cancel-all-for-client: scans every resting order and
    /// collects the ones belonging to `client_id`, without mutating the
    /// book. The caller re-issues each as a normal `cancel`.
    pub fn collect_client_orders(&self, client_id: ClientId) -> Vec<(UserId, UserOrderId)> {
        let mut out = Vec::new();
        for levels in [&self.bids, &self.asks] {
            for level in levels.iter() {
                let mut slot = level.head;
                while slot != NULL_INDEX {
                    let order = self.arena.get(slot);
                    if order.client_id == client_id {
                        out.push((order.user_id, order.user_order_id));
                    }
                    slot = order.next;
                }
            }
        }
        out
    }

    /// Single-shot flush: cancels every resting order in this book and
    /// emits the final top-of-book elimination messages. Produces the same
    /// final state and the same output multiset as draining
    /// [`Self::flush_step`] to completion, just in one call instead of many.
    ///
    /// Unlike every other `OrderBook` method, flush has no single
    /// instigating client: the cancelled orders belong to whoever rested
    /// them. Each `CancelAck` is paired with its original owner's
    /// `ClientId` so the caller can route it correctly; the TOB
    /// elimination messages are paired with `INVALID_CLIENT_ID` since
    /// they're broadcast data, not unicast to any one client.
    pub fn flush_atomic(&mut self) -> Vec<(ClientId, OutputMessage)> {
        let mut out = Vec::new();
        for levels in [&mut self.bids, &mut self.asks] {
            for level in levels.iter_mut() {
                let mut slot = level.head;
                while slot != NULL_INDEX {
                    let order = *self.arena.get(slot);
                    out.push((
                        order.client_id,
                        OutputMessage::CancelAck {
                            symbol: self.symbol,
                            user_id: order.user_id,
                            user_order_id: order.user_order_id,
                        },
                    ));
                    let next = order.next;
                    self.arena.free(slot);
                    slot = next;
                }
            }
            levels.clear_all();
        }
        self.order_map.clear();
        out.extend(
            self.force_tob_eliminated()
                .into_iter()
                .map(|m| (common::types::INVALID_CLIENT_ID, m)),
        );
        self.flush_state = FlushState::fresh();
        out
    }

    /// One budgeted step of the iterative flush: cancels up to
    /// `FLUSH_BATCH_SIZE` resting orders (bids first, then asks), returning
    /// the messages emitted this call and whether the book is now fully
    /// drained. The caller keeps calling until it returns `true`. See
    /// [`Self::flush_atomic`] for the per-message client routing rule.
    pub fn flush_step(&mut self) -> (Vec<(ClientId, OutputMessage)>, bool) {
        if !self.flush_state.in_progress {
            self.flush_state = FlushState {
                in_progress: true,
                side: FlushSide::Bids,
                level_index: 0,
            };
        }

        let mut out = Vec::new();
        let mut budget = FLUSH_BATCH_SIZE;

        while budget > 0 {
            match self.flush_state.side {
                FlushSide::Bids => {
                    if !self.drain_one(Side::Buy, &mut out, &mut budget) {
                        self.flush_state.side = FlushSide::Asks;
                        self.flush_state.level_index = 0;
                    }
                }
                FlushSide::Asks => {
                    if !self.drain_one(Side::Sell, &mut out, &mut budget) {
                        self.flush_state.side = FlushSide::Done;
                        break;
                    }
                }
                FlushSide::Done => break,
            }
        }

        if self.flush_state.side == FlushSide::Done {
            self.bids.clear_all();
            self.asks.clear_all();
            self.order_map.clear();
            out.extend(
                self.force_tob_eliminated()
                    .into_iter()
                    .map(|m| (common::types::INVALID_CLIENT_ID, m)),
            );
            self.flush_state = FlushState::fresh();
            return (out, true);
        }

        (out, false)
    }

    /// Cancels one order off the head of the current side's current level.
    /// Returns `false` once that side has no more levels to advance to.
    fn drain_one(&mut self, side: Side, out: &mut Vec<(ClientId, OutputMessage)>, budget: &mut usize) -> bool {
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if self.flush_state.level_index >= levels.len() {
            return false;
        }

        let level = levels.get_mut(self.flush_state.level_index);
        match level.pop_front(&self.arena) {
            Some(slot) => {
                let order = *self.arena.get(slot);
                out.push((
                    order.client_id,
                    OutputMessage::CancelAck {
                        symbol: self.symbol,
                        user_id: order.user_id,
                        user_order_id: order.user_order_id,
                    },
                ));
                self.arena.free(slot);
                *budget -= 1;
                true
            }
            None => {
                self.flush_state.level_index += 1;
                true
            }
        }
    }

    /// Evaluates both sides' best price/quantity against the last-reported
    /// snapshot, emitting a `TopOfBook` for each side that changed. An
    /// emptied side that was previously active emits the
    /// price-0/quantity-0 elimination sentinel; one that was never active
    /// emits nothing when it goes (trivially) empty.
    fn check_tob_changes(&mut self) -> Vec<OutputMessage> {
        let mut out = Vec::new();

        let (cur_bid_price, cur_bid_qty) = match self.bids.best() {
            Some(level) => (level.price, level.total_quantity),
            None => (0, 0),
        };
        if !self.bids.is_empty() {
            self.bid_ever_active = true;
        }
        if cur_bid_price != self.prev_bid_price || cur_bid_qty != self.prev_bid_qty {
            if cur_bid_price != 0 || self.bid_ever_active {
                out.push(OutputMessage::TopOfBook {
                    symbol: self.symbol,
                    side: Side::Buy,
                    price: cur_bid_price,
                    quantity: cur_bid_qty,
                });
            }
            self.prev_bid_price = cur_bid_price;
            self.prev_bid_qty = cur_bid_qty;
        }

        let (cur_ask_price, cur_ask_qty) = match self.asks.best() {
            Some(level) => (level.price, level.total_quantity),
            None => (0, 0),
        };
        if !self.asks.is_empty() {
            self.ask_ever_active = true;
        }
        if cur_ask_price != self.prev_ask_price || cur_ask_qty != self.prev_ask_qty {
            if cur_ask_price != 0 || self.ask_ever_active {
                out.push(OutputMessage::TopOfBook {
                    symbol: self.symbol,
                    side: Side::Sell,
                    price: cur_ask_price,
                    quantity: cur_ask_qty,
                });
            }
            self.prev_ask_price = cur_ask_price;
            self.prev_ask_qty = cur_ask_qty;
        }

        out
    }

    /// Emits the side-eliminated sentinel for every side that was ever
    /// active, then resets the tracker. Used by both flush variants.
    fn force_tob_eliminated(&mut self) -> Vec<OutputMessage> {
        let mut out = Vec::new();
        if self.bid_ever_active {
            out.push(OutputMessage::TopOfBook {
                symbol: self.symbol,
                side: Side::Buy,
                price: 0,
                quantity: 0,
            });
        }
        if self.ask_ever_active {
            out.push(OutputMessage::TopOfBook {
                symbol: self.symbol,
                side: Side::Sell,
                price: 0,
                quantity: 0,
            });
        }
        self.prev_bid_price = 0;
        self.prev_bid_qty = 0;
        self.prev_ask_price = 0;
        self.prev_ask_qty = 0;
        self.bid_ever_active = false;
        self.ask_ever_active = false;
        out
    }

    #[cfg(test)]
    pub(crate) fn arena_live_count(&self) -> usize {
        self.arena.live_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(out: &mut OrderBook, client: ClientId, uid: UserId, uoid: UserOrderId, side: Side, price: Price, qty: Qty) -> Vec<OutputMessage> {
        out.process_new_order(client, uid, uoid, side, OrderKind::Limit, price, qty)
    }

    #[test]
    fn test_resting_order_emits_ack_and_tob() {
        let mut book = OrderBook::new(Symbol::new("IBM"));
        let msgs = new_order(&mut book, 1, 1, 1, Side::Buy, 100, 10);
        assert!(matches!(msgs[0], OutputMessage::Ack { .. }));
        assert!(matches!(
            msgs[1],
            OutputMessage::TopOfBook {
                side: Side::Buy,
                price: 100,
                quantity: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_crossing_order_trades_at_passive_price() {
        let mut book = OrderBook::new(Symbol::new("IBM"));
        new_order(&mut book, 1, 1, 1, Side::Sell, 100, 10);
        let msgs = new_order(&mut book, 2, 2, 1, Side::Buy, 105, 10);

        let trade = msgs
            .iter()
            .find(|m| matches!(m, OutputMessage::Trade { .. }))
            .expect("expected a trade");
        match trade {
            OutputMessage::Trade { price, quantity, .. } => {
                assert_eq!(*price, 100);
                assert_eq!(*quantity, 10);
            }
            _ => unreachable!(),
        }
        assert_eq!(book.arena_live_count(), 0);
    }

    #[test]
    fn test_market_order_crosses_regardless_of_price() {
        let mut book = OrderBook::new(Symbol::new("IBM"));
        new_order(&mut book, 1, 1, 1, Side::Sell, 50, 5);
        let msgs = book.process_new_order(2, 2, 1, Side::Buy, OrderKind::Market, 0, 5);
        assert!(msgs.iter().any(|m| matches!(m, OutputMessage::Trade { .. })));
    }

    #[test]
    fn test_partial_fill_rests_remainder() {
        let mut book = OrderBook::new(Symbol::new("IBM"));
        new_order(&mut book, 1, 1, 1, Side::Sell, 100, 4);
        new_order(&mut book, 2, 2, 1, Side::Buy, 100, 10);
        // 4 filled, 6 resting on the bid side
        assert_eq!(book.bids.best().unwrap().total_quantity, 6);
        assert!(book.asks.is_empty());
    }

    #[test]
    fn test_cancel_unlinks_and_acks() {
        let mut book = OrderBook::new(Symbol::new("IBM"));
        new_order(&mut book, 1, 1, 1, Side::Buy, 100, 10);
        let msgs = book.cancel(1, 1);
        assert!(matches!(msgs[0], OutputMessage::CancelAck { .. }));
        assert!(book.bids.is_empty());
        assert_eq!(book.arena_live_count(), 0);
    }

    #[test]
    fn test_cancel_unknown_order_still_acks() {
        let mut book = OrderBook::new(Symbol::new("IBM"));
        let msgs = book.cancel(99, 99);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], OutputMessage::CancelAck { .. }));
    }

    #[test]
    fn test_collect_client_orders() {
        let mut book = OrderBook::new(Symbol::new("IBM"));
        new_order(&mut book, 7, 1, 1, Side::Buy, 100, 10);
        new_order(&mut book, 7, 1, 2, Side::Buy, 99, 5);
        new_order(&mut book, 8, 2, 1, Side::Sell, 101, 3);

        let mut collected = book.collect_client_orders(7);
        collected.sort();
        assert_eq!(collected, vec![(1, 1), (1, 2)]);
    }

    #[test]
    fn test_flush_atomic_clears_book_and_emits_eliminated_tob() {
        let mut book = OrderBook::new(Symbol::new("IBM"));
        new_order(&mut book, 1, 1, 1, Side::Buy, 100, 10);
        new_order(&mut book, 2, 2, 1, Side::Sell, 101, 5);

        let msgs = book.flush_atomic();
        assert!(book.is_empty());
        assert_eq!(book.arena_live_count(), 0);
        assert!(msgs
            .iter()
            .any(|(_, m)| m.is_eliminated_tob() && matches!(m, OutputMessage::TopOfBook { side: Side::Buy, .. })));
        assert!(msgs
            .iter()
            .any(|(_, m)| m.is_eliminated_tob() && matches!(m, OutputMessage::TopOfBook { side: Side::Sell, .. })));
    }

    #[test]
    fn test_flush_step_matches_atomic_final_state() {
        let mut iterative = OrderBook::new(Symbol::new("IBM"));
        let mut atomic = OrderBook::new(Symbol::new("IBM"));
        for book in [&mut iterative, &mut atomic] {
            for i in 0..20u32 {
                new_order(book, 1, i + 1, 1, Side::Buy, 100 + i, 1);
                new_order(book, 1, i + 1, 2, Side::Sell, 200 + i, 1);
            }
        }

        let mut done = false;
        let mut iterative_acks = 0usize;
        while !done {
            let (msgs, d) = iterative.flush_step();
            iterative_acks += msgs.iter().filter(|(_, m)| matches!(m, OutputMessage::CancelAck { .. })).count();
            done = d;
        }
        let atomic_msgs = atomic.flush_atomic();
        let atomic_acks = atomic_msgs.iter().filter(|(_, m)| matches!(m, OutputMessage::CancelAck { .. })).count();

        assert_eq!(iterative_acks, atomic_acks);
        assert!(iterative.is_empty());
        assert_eq!(iterative.arena_live_count(), 0);
    }

    #[test]
    fn test_tob_eliminated_only_once_side_was_active() {
        let mut book = OrderBook::new(Symbol::new("IBM"));
        // ask side never active; flush should not emit an ask elimination.
        new_order(&mut book, 1, 1, 1, Side::Buy, 100, 10);
        let msgs = book.flush_atomic();
        assert!(!msgs.iter().any(|(_, m)| matches!(m, OutputMessage::TopOfBook { side: Side::Sell, .. })));
    }
}
