//! Message tagged unions carried between pipeline stages.
//!
//! These are the in-process shapes described in the external-interfaces
//! section: a wire codec would serialize/deserialize them, but framing
//! and encoding are not this crate's concern - it only defines and
//! dispatches on the variants.

use crate::types::{Symbol, UserId, UserOrderId};
use common::types::{ClientId, Price, Qty, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit,
}

/// One request arriving from a client.
#[derive(Debug, Clone, Copy)]
pub enum InputMessage {
    NewOrder {
        user_id: UserId,
        user_order_id: UserOrderId,
        symbol: Symbol,
        side: Side,
        order_type: OrderKind,
        /// ignored (treated as 0) when `order_type == Market`
        price: Price,
        quantity: Qty,
    },
    Cancel {
        user_id: UserId,
        user_order_id: UserOrderId,
        /// `None` when the client's cancel request didn't carry a symbol;
        /// the engine resolves it via the order-key-to-symbol map.
        symbol: Option<Symbol>,
    },
    Flush,
}

/// A request plus the identity of the client that issued it.
#[derive(Debug, Clone, Copy)]
pub struct InputEnvelope {
    pub client_id: ClientId,
    pub message: InputMessage,
}

/// One message produced by the matching engine.
#[derive(Debug, Clone, Copy)]
pub enum OutputMessage {
    Ack {
        symbol: Symbol,
        user_id: UserId,
        user_order_id: UserOrderId,
    },
    CancelAck {
        symbol: Symbol,
        user_id: UserId,
        user_order_id: UserOrderId,
    },
    Trade {
        symbol: Symbol,
        buy_user_id: UserId,
        buy_user_order_id: UserOrderId,
        sell_user_id: UserId,
        sell_user_order_id: UserOrderId,
        price: Price,
        quantity: Qty,
        buy_client_id: ClientId,
        sell_client_id: ClientId,
    },
    TopOfBook {
        symbol: Symbol,
        side: Side,
        /// `price == 0 && quantity == 0` is the "side eliminated" sentinel
        /// (only emitted for a side that was previously active).
        price: Price,
        quantity: Qty,
    },
}

impl OutputMessage {
    /// True for the TOB elimination sentinel.
    pub fn is_eliminated_tob(&self) -> bool {
        matches!(
            self,
            OutputMessage::TopOfBook {
                price: 0,
                quantity: 0,
                ..
            }
        )
    }
}

/// An output message plus routing identity.
///
/// For `Ack` and a targeted `CancelAck`, `client_id` names the single
/// recipient: the client whose request triggered this message. For
/// `Trade`, the router ignores this field and instead delivers to both
/// `buy_client_id` and `sell_client_id` carried inside the message, since
/// a trade always has two interested parties. `TopOfBook` is market data
/// broadcast to every connected client; the router ignores `client_id`
/// for it too. A `CancelAck` produced by Flush is the one exception to
/// "client_id is the requester": Flush has no single instigating client,
/// so the engine stamps each flush-generated `CancelAck`'s envelope with
/// the cancelled order's own owner instead.
#[derive(Debug, Clone, Copy)]
pub struct OutputEnvelope {
    pub client_id: ClientId,
    pub message: OutputMessage,
}

impl OutputEnvelope {
    pub fn new(client_id: ClientId, message: OutputMessage) -> Self {
        Self { client_id, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eliminated_tob_sentinel() {
        let msg = OutputMessage::TopOfBook {
            symbol: Symbol::new("IBM"),
            side: Side::Buy,
            price: 0,
            quantity: 0,
        };
        assert!(msg.is_eliminated_tob());

        let msg = OutputMessage::TopOfBook {
            symbol: Symbol::new("IBM"),
            side: Side::Buy,
            price: 100,
            quantity: 10,
        };
        assert!(!msg.is_eliminated_tob());
    }
}
