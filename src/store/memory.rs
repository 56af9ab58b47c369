//! In-memory observation store.
//!
//! Useful for tests and for callers that already hold observations in memory.
//! Connections are cheap clones sharing the same immutable data.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::{Observation, UnitId, UnitSummary};
use crate::store::{ObservationStore, StoreConnection, StoreError};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    units: Arc<BTreeMap<UnitId, Vec<Observation>>>,
}

impl MemoryStore {
    pub fn new(observations: Vec<Observation>) -> Self {
        let mut units: BTreeMap<UnitId, Vec<Observation>> = BTreeMap::new();
        for obs in observations {
            units.entry(obs.unit_id.clone()).or_default().push(obs);
        }
        Self {
            units: Arc::new(units),
        }
    }

    /// Register a unit that is enumerated but has no observations.
    pub fn with_empty_unit(self, unit: UnitId) -> Self {
        let mut units = Arc::unwrap_or_clone(self.units);
        units.entry(unit).or_default();
        Self {
            units: Arc::new(units),
        }
    }
}

impl ObservationStore for MemoryStore {
    type Connection = MemoryStore;

    fn connect(&self) -> Result<MemoryStore, StoreError> {
        Ok(self.clone())
    }
}

impl StoreConnection for MemoryStore {
    fn list_units(&self) -> Result<Vec<UnitSummary>, StoreError> {
        Ok(self
            .units
            .iter()
            .map(|(unit_id, obs)| UnitSummary {
                unit_id: unit_id.clone(),
                min_date: obs.iter().filter_map(|o| o.date).min(),
                max_date: obs.iter().filter_map(|o| o.date).max(),
                count: obs.len() as u64,
            })
            .collect())
    }

    fn observations(&self, unit: &UnitId) -> Result<Vec<Observation>, StoreError> {
        Ok(self.units.get(unit).cloned().unwrap_or_default())
    }
}
