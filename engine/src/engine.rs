//! Multi-symbol matching engine facade: owns one [`OrderBook`] per symbol,
//! resolves which book a request belongs to, and reassembles the
//! per-client output envelopes a pipeline stage actually routes.

use crate::constants::{ENGINE_ORDER_KEY_CAPACITY, MAX_SYMBOLS, SYMBOL_TABLE_CAPACITY};
use crate::open_map::OpenAddressMap;
use crate::order_book::OrderBook;
use crate::protocol::{InputMessage, OrderKind, OutputEnvelope, OutputMessage};
use crate::symbol_table::SymbolTable;
use crate::types::{order_key, Symbol, UserId, UserOrderId};
use common::types::{ClientId, Price, Qty, Side};

/// Owns every symbol's book and the routing tables needed to resolve a
/// bare order key (no symbol attached) back to the book it lives in.
pub struct MatchingEngine {
    books: Vec<OrderBook>,
    symbol_table: SymbolTable<SYMBOL_TABLE_CAPACITY>,
    order_key_to_symbol: Box<OpenAddressMap<Symbol, ENGINE_ORDER_KEY_CAPACITY>>,
    flushing: bool,
    flush_cursor: usize,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            books: Vec::with_capacity(MAX_SYMBOLS),
            symbol_table: SymbolTable::new(),
            order_key_to_symbol: Box::new(OpenAddressMap::new()),
            flushing: false,
            flush_cursor: 0,
        }
    }

    fn wrap(client_id: ClientId, messages: Vec<OutputMessage>) -> Vec<OutputEnvelope> {
        messages.into_iter().map(|m| OutputEnvelope::new(client_id, m)).collect()
    }

    /// Finds the book for `symbol`, creating it (up to `MAX_SYMBOLS`) if
    /// this is the first time the engine has seen it. `None` means the
    /// symbol table is full.
    fn get_or_create_book(&mut self, symbol: Symbol) -> Option<usize> {
        if let Some(index) = self.symbol_table.find(&symbol) {
            return Some(index as usize);
        }
        if self.books.len() >= MAX_SYMBOLS {
            return None;
        }
        let index = self.books.len() as u32;
        self.books.push(OrderBook::new(symbol));
        self.symbol_table.insert(symbol, index).ok()?;
        Some(index as usize)
    }

    /// Top-level dispatch for one client request. Returns the envelopes
    /// the output router should deliver.
    pub fn process(&mut self, client_id: ClientId, message: InputMessage) -> Vec<OutputEnvelope> {
        match message {
            InputMessage::NewOrder {
                user_id,
                user_order_id,
                symbol,
                side,
                order_type,
                price,
                quantity,
            } => self.process_new_order(client_id, user_id, user_order_id, symbol, side, order_type, price, quantity),
            InputMessage::Cancel {
                user_id,
                user_order_id,
                symbol,
            } => self.process_cancel(client_id, user_id, user_order_id, symbol),
            InputMessage::Flush => {
                // one budgeted tick; the processor loop re-issues Flush
                // until a tick reports completion.
                let (pairs, _done) = self.flush_tick();
                pairs.into_iter().map(|(cid, m)| OutputEnvelope::new(cid, m)).collect()
            }
        }
    }

    fn process_new_order(
        &mut self,
        client_id: ClientId,
        user_id: UserId,
        user_order_id: UserOrderId,
        symbol: Symbol,
        side: Side,
        order_type: OrderKind,
        price: Price,
        quantity: Qty,
    ) -> Vec<OutputEnvelope> {
        let book_index = match self.get_or_create_book(symbol) {
            Some(index) => index,
            None => return Vec::new(), // symbol table exhausted: drop the request
        };

        let messages = self.books[book_index].process_new_order(client_id, user_id, user_order_id, side, order_type, price, quantity);

        if self.books[book_index].is_resting(user_id, user_order_id) {
            let _ = self.order_key_to_symbol.insert(order_key(user_id, user_order_id), symbol);
        }

        Self::wrap(client_id, messages)
    }

    fn process_cancel(
        &mut self,
        client_id: ClientId,
        user_id: UserId,
        user_order_id: UserOrderId,
        symbol: Option<Symbol>,
    ) -> Vec<OutputEnvelope> {
        let key = order_key(user_id, user_order_id);
        let resolved = symbol.or_else(|| self.order_key_to_symbol.find(key));

        let messages = match resolved.and_then(|s| self.symbol_table.find(&s).map(|idx| (idx, s))) {
            Some((book_index, _)) => self.books[book_index as usize].cancel(user_id, user_order_id),
            None => vec![OutputMessage::CancelAck {
                symbol: resolved.unwrap_or_default(),
                user_id,
                user_order_id,
            }],
        };

        self.order_key_to_symbol.remove(key);
        Self::wrap(client_id, messages)
    }

    /// Phase 1 of cancel-all-for-client: collects every resting order
    /// belonging to `client_id` across every book without mutating
    /// anything, then (phase 2) issues a real cancel for each. Splitting
    /// the scan from the mutation keeps the FIFO walk in phase 1 safe
    /// from the unlinking a concurrent cancel would otherwise cause.
    pub fn cancel_all_for_client(&mut self, client_id: ClientId) -> Vec<OutputEnvelope> {
        let mut targets = Vec::new();
        for book in &self.books {
            targets.extend(book.collect_client_orders(client_id).into_iter().map(|(u, o)| (book.symbol(), u, o)));
        }

        let mut out = Vec::new();
        for (symbol, user_id, user_order_id) in targets {
            if let Some(book_index) = self.symbol_table.find(&symbol) {
                let messages = self.books[book_index as usize].cancel(user_id, user_order_id);
                self.order_key_to_symbol.remove(order_key(user_id, user_order_id));
                out.extend(Self::wrap(client_id, messages));
            }
        }
        out
    }

    /// Advances the global flush by one book's worth of budgeted work,
    /// round-robining across books. Returns the messages produced this
    /// tick (paired with each message's rightful recipient - see
    /// [`OrderBook::flush_atomic`]) and whether every book has now fully
    /// drained.
    pub fn flush_tick(&mut self) -> (Vec<(ClientId, OutputMessage)>, bool) {
        if !self.flushing {
            self.flushing = true;
            self.flush_cursor = 0;
        }

        if self.books.is_empty() {
            self.flushing = false;
            self.order_key_to_symbol.clear();
            return (Vec::new(), true);
        }

        let (messages, book_done) = self.books[self.flush_cursor].flush_step();
        if book_done {
            self.flush_cursor += 1;
        }

        if self.flush_cursor >= self.books.len() {
            self.flushing = false;
            self.flush_cursor = 0;
            self.order_key_to_symbol.clear();
            return (messages, true);
        }

        (messages, false)
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}
