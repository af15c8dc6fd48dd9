//! Bundle of the store ports backing one storage service.

use std::fmt;
use std::sync::Arc;

use crate::ports::{BinStore, LedgerStore, OccupancyLog, ReportStore, StatsSource};

/// Collection of ports implementing storage for the whole admin console.
///
/// Every component receives the ports it needs from here instead of reaching
/// for a shared global client, so tests can hand in the in-memory backend.
#[derive(Clone)]
pub struct Backend {
    /// Short human-readable name, e.g. `memory` or `firestore:<project>`.
    pub name: String,
    /// Bin registry.
    pub bins: Arc<dyn BinStore>,
    /// Occupancy audit trail.
    pub occupancy_log: Arc<dyn OccupancyLog>,
    /// User reports.
    pub reports: Arc<dyn ReportStore>,
    /// Admin funds ledger.
    pub ledger: Arc<dyn LedgerStore>,
    /// Dashboard statistics inputs.
    pub stats: Arc<dyn StatsSource>,
}

impl fmt::Debug for Backend {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Backend")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
