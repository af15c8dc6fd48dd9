//! Core types and service wiring for the EcoEarn recycling admin console.

/// Bin activation and release with compare-and-swap occupancy updates.
pub mod activation;
/// Bundle of storage ports handed to the service.
pub mod backend;
/// Admin funds ledger.
pub mod ledger;
/// In-memory backend used by tests and offline runs.
pub mod memory;
/// Domain models and identifiers shared by all backends.
pub mod model;
/// Traits describing the storage interfaces.
pub mod ports;
/// Bin creation, QR payloads and fill levels.
pub mod registry;
/// Report browsing.
pub mod reports;
/// Scanner session state machine.
pub mod scanner;
/// High-level service facade used by clients.
pub mod service;
/// Dashboard statistics and yearly summary.
pub mod stats;
/// QR activation token codec.
pub mod token;

pub use activation::*;
pub use backend::*;
pub use memory::*;
pub use model::*;
pub use ports::*;
pub use registry::*;
pub use scanner::*;
pub use service::*;
