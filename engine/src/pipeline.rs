//! Thread topology: processor threads drive one matching engine each,
//! an output router thread fans results back out to clients, and a
//! shutdown coordinator drains everything cooperatively.
//!
//! Sockets, framing, and the wire codec are external collaborators (see
//! the purpose/scope note at the crate root); this module only deals in
//! rings, the registry, and the engine.

use crate::constants::{ACTIVE_SLEEP_US, IDLE_SLEEP_US, IDLE_THRESHOLD, PROCESSOR_BATCH_SIZE, RING_CAPACITY, SHUTDOWN_DRAIN_ITERATIONS};
use crate::engine::MatchingEngine;
use crate::protocol::{InputEnvelope, OutputEnvelope, OutputMessage};
use crate::registry::ClientRegistry;
use common::lf_queue::LFQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One shared flag, set once, observed by every long-running thread.
/// No thread ever blocks while holding a lock across the point where it
/// would need to observe this flag.
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    flag: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn signal(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Best-effort broadcast of every output message to a market-data group.
/// The wire format and the socket are external collaborators; a real
/// deployment supplies an impl that formats and `sendto`s. The default
/// (`NullMarketDataSink`) is what a single-processor, unicast-only
/// configuration uses.
pub trait MarketDataSink: Send + Sync {
    fn broadcast(&self, message: &OutputMessage);
}

#[derive(Default)]
pub struct NullMarketDataSink;

impl MarketDataSink for NullMarketDataSink {
    fn broadcast(&self, _message: &OutputMessage) {}
}

/// Drains one input ring into one matching engine and pushes results to
/// one output ring. One shard, one thread, no cross-shard coordination.
pub struct ProcessorThread {
    engine: MatchingEngine,
    input_ring: Arc<LFQueue<InputEnvelope, RING_CAPACITY>>,
    output_ring: Arc<LFQueue<OutputEnvelope, RING_CAPACITY>>,
    shutdown: ShutdownCoordinator,
}

impl ProcessorThread {
    pub fn new(input_ring: Arc<LFQueue<InputEnvelope, RING_CAPACITY>>, output_ring: Arc<LFQueue<OutputEnvelope, RING_CAPACITY>>, shutdown: ShutdownCoordinator) -> Self {
        Self {
            engine: MatchingEngine::new(),
            input_ring,
            output_ring,
            shutdown,
        }
    }

    /// Runs the adaptive batch-drain loop until shutdown is signalled,
    /// then drains whatever remains in the input ring before returning.
    /// Intended to be the body of `thread::spawn`.
    pub fn run(mut self) {
        let mut idle_streak: u32 = 0;
        let mut batch = Vec::with_capacity(PROCESSOR_BATCH_SIZE);

        loop {
            batch.clear();
            let drained = self.input_ring.pop_batch(&mut batch, PROCESSOR_BATCH_SIZE);
            self.process_batch(&batch);

            if self.shutdown.is_shutdown() {
                break;
            }

            if drained == 0 {
                idle_streak = idle_streak.saturating_add(1);
                let sleep_us = if idle_streak >= IDLE_THRESHOLD { IDLE_SLEEP_US } else { ACTIVE_SLEEP_US };
                thread::sleep(Duration::from_micros(sleep_us));
            } else {
                idle_streak = 0;
            }
        }

        self.drain_to_completion();
    }

    fn process_batch(&mut self, batch: &[InputEnvelope]) {
        for envelope in batch {
            let outputs = self.engine.process(envelope.client_id, envelope.message);
            for envelope in outputs {
                // Output ring is sized generously (RING_CAPACITY); a full
                // ring here means the output router has fallen far behind.
                // Drop rather than block, consistent with the transient
                // backpressure policy used on the input side.
                let _ = self.output_ring.push(envelope);
            }
        }
    }

    fn drain_to_completion(&mut self) {
        let mut batch = Vec::with_capacity(PROCESSOR_BATCH_SIZE);
        loop {
            batch.clear();
            let drained = self.input_ring.pop_batch(&mut batch, PROCESSOR_BATCH_SIZE);
            if drained == 0 {
                break;
            }
            self.process_batch(&batch);
        }
    }
}

/// Per-source-queue counters the router keeps purely for fairness
/// observability; nothing downstream depends on their exact values.
#[derive(Debug, Default, Clone, Copy)]
pub struct RouterStats {
    pub messages_routed: u64,
    pub messages_broadcast: u64,
    pub messages_dropped: u64,
}

/// Drains one or more processor output rings round-robin and delivers
/// each envelope to its destination(s): the originating client's
/// per-client ring (unicast) and, if a sink is configured, the
/// market-data broadcast.
pub struct OutputRouterThread {
    output_rings: Vec<Arc<LFQueue<OutputEnvelope, RING_CAPACITY>>>,
    registry: Arc<ClientRegistry>,
    sink: Arc<dyn MarketDataSink>,
    shutdown: ShutdownCoordinator,
    stats: RouterStats,
}

impl OutputRouterThread {
    pub fn new(output_rings: Vec<Arc<LFQueue<OutputEnvelope, RING_CAPACITY>>>, registry: Arc<ClientRegistry>, sink: Arc<dyn MarketDataSink>, shutdown: ShutdownCoordinator) -> Self {
        Self {
            output_rings,
            registry,
            sink,
            shutdown,
            stats: RouterStats::default(),
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn run(mut self) -> RouterStats {
        let mut idle_streak: u32 = 0;

        loop {
            let drained = self.drain_round_robin(PROCESSOR_BATCH_SIZE);

            if self.shutdown.is_shutdown() {
                break;
            }

            if drained == 0 {
                idle_streak = idle_streak.saturating_add(1);
                let sleep_us = if idle_streak >= IDLE_THRESHOLD { IDLE_SLEEP_US } else { ACTIVE_SLEEP_US };
                thread::sleep(Duration::from_micros(sleep_us));
            } else {
                idle_streak = 0;
            }
        }

        for _ in 0..SHUTDOWN_DRAIN_ITERATIONS {
            if self.drain_round_robin(PROCESSOR_BATCH_SIZE) == 0 {
                break;
            }
        }

        self.stats
    }

    fn drain_round_robin(&mut self, max_per_queue: usize) -> usize {
        let mut total = 0;
        let mut batch = Vec::with_capacity(max_per_queue);
        for ring in &self.output_rings {
            batch.clear();
            let n = ring.pop_batch(&mut batch, max_per_queue);
            total += n;
            for envelope in batch.drain(..) {
                self.route_one(envelope);
            }
        }
        total
    }

    fn route_one(&mut self, envelope: OutputEnvelope) {
        match envelope.message {
            OutputMessage::Trade {
                buy_client_id,
                sell_client_id,
                ..
            } => {
                self.unicast(buy_client_id, envelope.message);
                self.unicast(sell_client_id, envelope.message);
            }
            OutputMessage::TopOfBook { .. } | OutputMessage::Ack { .. } | OutputMessage::CancelAck { .. } => {
                self.unicast(envelope.client_id, envelope.message);
            }
        }

        // Broadcast is best-effort and independent of unicast routing: every
        // envelope reaches the sink regardless of whether its unicast leg
        // was delivered, dropped, or (for Trade) fanned out to two clients.
        self.stats.messages_broadcast += 1;
        self.sink.broadcast(&envelope.message);
    }

    fn unicast(&mut self, client_id: common::types::ClientId, message: OutputMessage) {
        if client_id == common::types::INVALID_CLIENT_ID {
            return;
        }
        match self.registry.lookup(client_id) {
            Some(slot) => match slot.push(message) {
                Ok(()) => self.stats.messages_routed += 1,
                Err(_) => self.stats.messages_dropped += 1,
            },
            None => self.stats.messages_dropped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{InputMessage, OrderKind};
    use crate::types::Symbol;
    use common::types::Side;
    use std::sync::Mutex;

    /// Records every message handed to it, so tests can assert broadcast
    /// happens regardless of message type or unicast outcome.
    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<OutputMessage>>,
    }

    impl MarketDataSink for RecordingSink {
        fn broadcast(&self, message: &OutputMessage) {
            self.received.lock().unwrap().push(*message);
        }
    }

    fn rings() -> (Arc<LFQueue<InputEnvelope, RING_CAPACITY>>, Arc<LFQueue<OutputEnvelope, RING_CAPACITY>>) {
        (Arc::new(LFQueue::new()), Arc::new(LFQueue::new()))
    }

    #[test]
    fn test_processor_thread_processes_new_order() {
        let (input, output) = rings();
        input
            .push(InputEnvelope {
                client_id: 1,
                message: InputMessage::NewOrder {
                    user_id: 1,
                    user_order_id: 1,
                    symbol: Symbol::new("IBM"),
                    side: Side::Buy,
                    order_type: OrderKind::Limit,
                    price: 100,
                    quantity: 10,
                },
            })
            .unwrap();

        let shutdown = ShutdownCoordinator::new();
        shutdown.signal();
        let processor = ProcessorThread::new(Arc::clone(&input), Arc::clone(&output), shutdown);
        processor.run();

        let mut seen_ack = false;
        while let Some(envelope) = output.pop() {
            if matches!(envelope.message, OutputMessage::Ack { .. }) {
                seen_ack = true;
            }
        }
        assert!(seen_ack);
    }

    #[test]
    fn test_output_router_unicasts_ack_to_registered_client() {
        let registry = Arc::new(ClientRegistry::new());
        let slot = registry.register(1).unwrap();
        let (_input, output) = rings();
        output
            .push(OutputEnvelope::new(
                1,
                OutputMessage::Ack {
                    symbol: Symbol::new("IBM"),
                    user_id: 1,
                    user_order_id: 1,
                },
            ))
            .unwrap();

        let shutdown = ShutdownCoordinator::new();
        shutdown.signal();
        let router = OutputRouterThread::new(vec![output], registry, Arc::new(NullMarketDataSink), shutdown);
        let stats = router.run();

        assert_eq!(stats.messages_routed, 1);
        assert!(slot.pop().is_some());
    }

    #[test]
    fn test_output_router_drops_for_unknown_client() {
        let registry = Arc::new(ClientRegistry::new());
        let (_input, output) = rings();
        output
            .push(OutputEnvelope::new(
                42,
                OutputMessage::CancelAck {
                    symbol: Symbol::new("IBM"),
                    user_id: 1,
                    user_order_id: 1,
                },
            ))
            .unwrap();

        let shutdown = ShutdownCoordinator::new();
        shutdown.signal();
        let router = OutputRouterThread::new(vec![output], registry, Arc::new(NullMarketDataSink), shutdown);
        let stats = router.run();

        assert_eq!(stats.messages_dropped, 1);
    }

    #[test]
    fn test_output_router_delivers_trade_to_both_sides() {
        let registry = Arc::new(ClientRegistry::new());
        let buy_slot = registry.register(1).unwrap();
        let sell_slot = registry.register(2).unwrap();
        let (_input, output) = rings();
        output
            .push(OutputEnvelope::new(
                999, // ignored by the router for Trade
                OutputMessage::Trade {
                    symbol: Symbol::new("IBM"),
                    buy_user_id: 1,
                    buy_user_order_id: 1,
                    sell_user_id: 2,
                    sell_user_order_id: 1,
                    price: 100,
                    quantity: 5,
                    buy_client_id: 1,
                    sell_client_id: 2,
                },
            ))
            .unwrap();

        let shutdown = ShutdownCoordinator::new();
        shutdown.signal();
        let router = OutputRouterThread::new(vec![output], registry, Arc::new(NullMarketDataSink), shutdown);
        let stats = router.run();

        assert_eq!(stats.messages_routed, 2);
        assert!(buy_slot.pop().is_some());
        assert!(sell_slot.pop().is_some());
    }

    #[test]
    fn test_output_router_broadcasts_every_message_type() {
        let registry = Arc::new(ClientRegistry::new());
        let buy_slot = registry.register(1).unwrap();
        let sell_slot = registry.register(2).unwrap();
        let (_input, output) = rings();

        output
            .push(OutputEnvelope::new(
                1,
                OutputMessage::Ack {
                    symbol: Symbol::new("IBM"),
                    user_id: 1,
                    user_order_id: 1,
                },
            ))
            .unwrap();
        output
            .push(OutputEnvelope::new(
                1,
                OutputMessage::CancelAck {
                    symbol: Symbol::new("IBM"),
                    user_id: 1,
                    user_order_id: 1,
                },
            ))
            .unwrap();
        output
            .push(OutputEnvelope::new(
                999,
                OutputMessage::Trade {
                    symbol: Symbol::new("IBM"),
                    buy_user_id: 1,
                    buy_user_order_id: 1,
                    sell_user_id: 2,
                    sell_user_order_id: 1,
                    price: 100,
                    quantity: 5,
                    buy_client_id: 1,
                    sell_client_id: 2,
                },
            ))
            .unwrap();

        let shutdown = ShutdownCoordinator::new();
        shutdown.signal();
        let sink = Arc::new(RecordingSink::default());
        let router = OutputRouterThread::new(vec![output], registry, Arc::clone(&sink) as Arc<dyn MarketDataSink>, shutdown);
        let stats = router.run();

        assert_eq!(stats.messages_broadcast, 3);
        let received = sink.received.lock().unwrap();
        assert!(received.iter().any(|m| matches!(m, OutputMessage::Ack { .. })));
        assert!(received.iter().any(|m| matches!(m, OutputMessage::CancelAck { .. })));
        assert!(received.iter().any(|m| matches!(m, OutputMessage::Trade { .. })));

        // unicast still happened independently of the broadcast.
        assert!(buy_slot.pop().is_some());
        assert!(sell_slot.pop().is_some());
    }

    #[test]
    fn test_shutdown_coordinator_starts_false() {
        let shutdown = ShutdownCoordinator::new();
        assert!(!shutdown.is_shutdown());
        shutdown.signal();
        assert!(shutdown.is_shutdown());
    }
}
