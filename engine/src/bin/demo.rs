//! Standalone demo driver for the matching engine.
//!
//! The real process reads orders off a TCP or UDP socket and writes a CSV
//! or binary wire format back out; both are external collaborators this
//! crate doesn't implement (see the crate's scope note). This binary
//! substitutes an in-process generator for the socket side so the pipeline
//! - router, processor thread(s), output router, registry, shutdown - can
//! be exercised end to end without a wire codec.

use clap::Parser;
use engine::constants::RING_CAPACITY;
use engine::error::EngineError;
use engine::pipeline::{NullMarketDataSink, OutputRouterThread, ProcessorThread, ShutdownCoordinator};
use engine::protocol::{InputEnvelope, InputMessage, OrderKind};
use engine::registry::ClientRegistry;
use engine::router::SymbolRouter;
use engine::types::Symbol;
use common::lf_queue::LFQueue;
use common::types::Side;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "engine-demo")]
#[command(about = "In-process demo of the matching engine pipeline")]
struct Args {
    /// Use a single processor shard instead of two.
    #[arg(long, conflicts_with = "dual_processor")]
    single_processor: bool,

    /// Use two processor shards, split A-M / N-Z (default).
    #[arg(long)]
    dual_processor: bool,

    /// Number of synthetic orders to generate before shutting down.
    #[arg(short = 'n', long, default_value_t = 2_000)]
    order_count: usize,
}

fn shard_count(args: &Args) -> usize {
    if args.single_processor {
        1
    } else {
        2
    }
}

/// Generates a small, deterministic spread of orders across a handful of
/// symbols so both shards (in dual mode) see traffic.
fn synthetic_orders(count: usize) -> Vec<InputEnvelope> {
    const SYMBOLS: &[&str] = &["IBM", "AAPL", "MSFT", "NFLX", "ZNGA"];
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let symbol = SYMBOLS[i % SYMBOLS.len()];
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let price = 100 + (i % 10) as u32;
        out.push(InputEnvelope {
            client_id: (i % 8) as u32 + 1,
            message: InputMessage::NewOrder {
                user_id: (i % 8) as u32 + 1,
                user_order_id: i as u32 + 1,
                symbol: Symbol::new(symbol),
                side,
                order_type: OrderKind::Limit,
                price,
                quantity: 10,
            },
        });
    }
    out
}

fn run(args: Args) -> Result<(), EngineError> {
    use engine::protocol::OutputEnvelope;

    let shards = shard_count(&args);
    println!("engine-demo: {} shard(s), {} synthetic orders", shards, args.order_count);

    let registry = Arc::new(ClientRegistry::new());
    for client_id in 1..=8u32 {
        registry.register(client_id)?;
    }

    let router = SymbolRouter::new(shards);
    let shutdown = ShutdownCoordinator::new();

    let input_rings: Vec<_> = (0..shards).map(|_| Arc::new(LFQueue::<InputEnvelope, RING_CAPACITY>::new())).collect();
    let output_rings: Vec<_> = (0..shards).map(|_| Arc::new(LFQueue::<OutputEnvelope, RING_CAPACITY>::new())).collect();

    let mut processor_handles = Vec::new();
    for (shard_id, (input_ring, output_ring)) in input_rings.iter().cloned().zip(output_rings.iter().cloned()).enumerate() {
        let processor = ProcessorThread::new(input_ring, output_ring, shutdown.clone());
        let handle = thread::Builder::new()
            .name(format!("processor-{shard_id}"))
            .spawn(move || processor.run())
            .map_err(|e| EngineError::ThreadSpawnFailed("processor", e))?;
        processor_handles.push(handle);
    }

    let router_registry = Arc::clone(&registry);
    let router_shutdown = shutdown.clone();
    let router_output_rings = output_rings.clone();
    let output_router_handle = thread::Builder::new()
        .name("output-router".to_string())
        .spawn(move || OutputRouterThread::new(router_output_rings, router_registry, Arc::new(NullMarketDataSink), router_shutdown).run())
        .map_err(|e| EngineError::ThreadSpawnFailed("output router", e))?;

    let ctrlc_shutdown = shutdown.clone();
    let _ = ctrlc::set_handler(move || {
        println!("\nShutdown signal received...");
        ctrlc_shutdown.signal();
    });

    for envelope in synthetic_orders(args.order_count) {
        let shard = router.shard_for(&match envelope.message {
            InputMessage::NewOrder { symbol, .. } => symbol,
            _ => Symbol::new(""),
        });
        while input_rings[shard].push(envelope).is_err() {
            thread::yield_now();
        }
    }

    thread::sleep(Duration::from_millis(200));
    shutdown.signal();

    for handle in processor_handles {
        let _ = handle.join();
    }
    let stats = output_router_handle.join().expect("output router thread panicked");

    println!(
        "demo complete: routed={} broadcast={} dropped={}",
        stats.messages_routed, stats.messages_broadcast, stats.messages_dropped
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("engine-demo: startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}
