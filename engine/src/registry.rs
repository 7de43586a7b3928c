//! Client registry: the fixed table of connected clients and their
//! per-client output rings.
//!
//! Slot allocation (`register`/`unregister`) is the only place that takes
//! a lock; once a caller has looked up a slot's `Arc<ClientSlot>`, pushing
//! to or draining its ring is lock-free because the ring is SPSC (the
//! output router is the one producer, the per-client writer is the one
//! consumer).

use crate::constants::{MAX_TCP_CLIENTS, RING_CAPACITY};
use crate::error::EngineError;
use crate::protocol::OutputMessage;
use common::lf_queue::LFQueue;
use common::types::ClientId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Per-client state: an output ring plus an activity flag. Socket state
/// and wire framing belong to the I/O layer, not this table - the
/// registry's job ends at handing the writer thread a ring to drain.
pub struct ClientSlot {
    client_id: ClientId,
    active: AtomicBool,
    output_ring: LFQueue<OutputMessage, RING_CAPACITY>,
}

impl ClientSlot {
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Enqueues a message for this client's writer to drain. Returns
    /// `Err` (dropped, counted by the caller) if the ring is full.
    pub fn push(&self, message: OutputMessage) -> Result<(), OutputMessage> {
        self.output_ring.push(message)
    }

    pub fn pop(&self) -> Option<OutputMessage> {
        self.output_ring.pop()
    }

    pub fn pop_batch(&self, out: &mut Vec<OutputMessage>, max: usize) -> usize {
        self.output_ring.pop_batch(out, max)
    }
}

/// Fixed-capacity table of up to `MAX_TCP_CLIENTS` connected clients.
pub struct ClientRegistry {
    slots: Mutex<Box<[Option<Arc<ClientSlot>>; MAX_TCP_CLIENTS]>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Box::new(std::array::from_fn(|_| None))),
        }
    }

    /// Registers a new client at `client_id`, replacing whatever (if
    /// anything) previously occupied that slot index. Fails if another
    /// active client is already sitting in the same slot (slot index is
    /// `client_id % MAX_TCP_CLIENTS`, so two live client_ids can collide).
    pub fn register(&self, client_id: ClientId) -> Result<Arc<ClientSlot>, EngineError> {
        let mut slots = self.slots.lock().expect("registry mutex poisoned");
        let index = (client_id as usize) % MAX_TCP_CLIENTS;

        if slots[index].as_ref().is_some_and(|s| s.is_active()) {
            return Err(EngineError::RegistrySlotOccupied(client_id));
        }

        let slot = Arc::new(ClientSlot {
            client_id,
            active: AtomicBool::new(true),
            output_ring: LFQueue::new(),
        });
        slots[index] = Some(Arc::clone(&slot));
        Ok(slot)
    }

    /// Looks up the slot for `client_id`. Cloning the `Arc` is the only
    /// cost; the returned handle is safe to use without the registry lock.
    pub fn lookup(&self, client_id: ClientId) -> Option<Arc<ClientSlot>> {
        let slots = self.slots.lock().expect("registry mutex poisoned");
        let index = (client_id as usize) % MAX_TCP_CLIENTS;
        slots[index].as_ref().filter(|s| s.client_id == client_id && s.is_active()).cloned()
    }

    /// Marks `client_id`'s slot inactive. The `Arc` may still be held by
    /// in-flight writers/routers; they'll observe `is_active() == false`
    /// and stop draining on their own schedule.
    pub fn unregister(&self, client_id: ClientId) {
        let slots = self.slots.lock().expect("registry mutex poisoned");
        let index = (client_id as usize) % MAX_TCP_CLIENTS;
        if let Some(slot) = slots[index].as_ref() {
            if slot.client_id == client_id {
                slot.active.store(false, Ordering::Release);
            }
        }
    }

    /// Marks every active slot inactive and returns the client_ids that
    /// were active, so the caller (shutdown) can cancel their outstanding
    /// orders via `MatchingEngine::cancel_all_for_client`.
    pub fn disconnect_all(&self) -> Vec<ClientId> {
        let slots = self.slots.lock().expect("registry mutex poisoned");
        let mut disconnected = Vec::new();
        for slot in slots.iter().flatten() {
            if slot.is_active() {
                slot.active.store(false, Ordering::Release);
                disconnected.push(slot.client_id);
            }
        }
        disconnected
    }

    pub fn active_count(&self) -> usize {
        let slots = self.slots.lock().expect("registry mutex poisoned");
        slots.iter().flatten().filter(|s| s.is_active()).count()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_lookup() {
        let registry = ClientRegistry::new();
        let slot = registry.register(1).expect("should register");
        assert_eq!(slot.client_id(), 1);
        assert!(registry.lookup(1).is_some());
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_unregister_marks_inactive() {
        let registry = ClientRegistry::new();
        registry.register(1).unwrap();
        registry.unregister(1);
        assert!(registry.lookup(1).is_none());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_push_and_drain_ring() {
        let registry = ClientRegistry::new();
        let slot = registry.register(1).unwrap();
        slot.push(OutputMessage::Ack {
            symbol: crate::types::Symbol::new("IBM"),
            user_id: 1,
            user_order_id: 1,
        })
        .unwrap();
        assert!(slot.pop().is_some());
        assert!(slot.pop().is_none());
    }

    #[test]
    fn test_disconnect_all_returns_active_clients() {
        let registry = ClientRegistry::new();
        registry.register(1).unwrap();
        registry.register(2).unwrap();
        let mut disconnected = registry.disconnect_all();
        disconnected.sort();
        assert_eq!(disconnected, vec![1, 2]);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_reregister_reuses_slot_after_unregister() {
        let registry = ClientRegistry::new();
        registry.register(1).unwrap();
        registry.unregister(1);
        let slot = registry.register(1).expect("slot should be reusable");
        assert_eq!(slot.client_id(), 1);
    }
}
