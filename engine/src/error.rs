//! Fatal, process-level error conditions.
//!
//! Per-message failures (arena exhaustion, unknown cancel, probe-limit
//! exceeded) are not represented here: the matcher never throws upward,
//! it reports them as output messages or drops them and increments a
//! counter. `EngineError` is reserved for conditions the spec calls out
//! as causing a non-zero exit: thread creation failure, and the registry
//! slot collision that a caller needs to decide how to handle (retry a
//! different client_id, reject the connection, etc).

use common::types::ClientId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("client registry slot for client {0} is already occupied by an active client")]
    RegistrySlotOccupied(ClientId),

    #[error("failed to spawn {0} thread")]
    ThreadSpawnFailed(&'static str, #[source] std::io::Error),
}
