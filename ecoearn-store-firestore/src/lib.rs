//! EcoEarn storage backend over the Cloud Firestore REST API.
//!
//! Every collection of the admin console is read and written through plain
//! document endpoints. Occupancy changes use the document's `updateTime` as a
//! write precondition so two scanners cannot both claim the same bin.

mod client;
mod mapping;
mod stores;
mod value;

use std::sync::Arc;

use ecoearn_core::backend::Backend;
use reqwest::Client;

pub use client::{DEFAULT_BASE_URL, FirestoreConfig};
pub use stores::{
    FirestoreBinStore, FirestoreLedgerStore, FirestoreOccupancyLog, FirestoreReportStore,
    FirestoreStatsSource,
};

use crate::client::FirestoreClient;

/// Build the backend bundle for the given database.
#[must_use]
pub fn backend(http: Client, config: FirestoreConfig) -> Backend {
    let client = FirestoreClient::new(http, config);

    Backend {
        name: format!("firestore:{}", client.project_id()),
        bins: Arc::new(FirestoreBinStore::new(client.clone())),
        occupancy_log: Arc::new(FirestoreOccupancyLog::new(client.clone())),
        reports: Arc::new(FirestoreReportStore::new(client.clone())),
        ledger: Arc::new(FirestoreLedgerStore::new(client.clone())),
        stats: Arc::new(FirestoreStatsSource::new(client)),
    }
}
