//! Multi-symbol limit order matching engine: arena-backed order storage,
//! a sorted price-level index per book side, and a fixed-capacity
//! open-addressed order map, wired into a pipeline of sharded processor
//! threads behind a symbol router.

pub mod arena;
pub mod constants;
pub mod engine;
pub mod error;
pub mod level_index;
pub mod open_map;
pub mod order_book;
pub mod pipeline;
pub mod price_level;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod symbol_table;
pub mod types;

pub use engine::MatchingEngine;
pub use error::EngineError;
pub use protocol::{InputEnvelope, InputMessage, OrderKind, OutputEnvelope, OutputMessage};
pub use types::{Symbol, UserId, UserOrderId};
