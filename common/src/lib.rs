//! Ambient infrastructure shared by the matching engine crate: typed pools,
//! a lock-free SPSC ring, a background-thread logger, and monotonic timing.
//!
//! Nothing in this crate knows about orders, symbols, or prices - it is the
//! low-level substrate the engine crate builds its domain types on top of.

pub mod lf_queue;
pub mod logging;
pub mod mem_pool;
pub mod time;
pub mod types;

pub use types::{ClientId, Price, Priority, Qty, Side};
