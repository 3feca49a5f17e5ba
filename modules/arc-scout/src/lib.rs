//! Scraping-side upload pipeline: dedup ledger, batch queue, session reset gate,
//! relay transport, and the lifecycle controller that wires them together.

pub mod config;
pub mod dedup;
pub mod error;
pub mod lifecycle;
pub mod queue;
pub mod reset_gate;
pub mod scorer;
pub mod storage;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::PipelineConfig;
pub use dedup::DedupLedger;
pub use error::{Result, ScoutError, TransportError};
pub use lifecycle::{
    Controller, LifecycleState, Observation, PageSignal, ScoutDeps, ToggleCommand, ToggleStatus,
};
pub use queue::{Batch, BatchQueue, QueueSettings};
pub use reset_gate::{ResetGate, ResetOutcome};
pub use scorer::{RelayScorer, Scorer};
pub use storage::{JsonFileStore, MemoryStore, SessionStore, SettingsStore};
pub use transport::{HttpRelayChannel, RelayChannel, RelayTransport, UploadReceipt, UploadTransport};
