//! Harvest pass DTOs

use serde::{Deserialize, Serialize};

/// Counters from one harvest pass, returned by `GET /loot`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSummary {
    pub status: String,
    /// Jobs persisted and deleted
    pub harvested: usize,
    /// Jobs whose processing failed and were left for a later pass
    pub failed: usize,
    /// Jobs not yet eligible (still running or only failed-conditioned)
    pub skipped: usize,
}
