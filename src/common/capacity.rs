use aws_sdk_dynamodb::types;
use std::{collections, sync};

/// Capacity units consumed by one or more requests.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsumedCapacity {
    /// Total capacity units.
    pub total: f64,
    /// Read capacity units.
    pub read: f64,
    /// Write capacity units.
    pub write: f64,
    /// Units consumed by the base table.
    pub table: f64,
    /// Units consumed per global secondary index.
    pub global_secondary_indexes: collections::HashMap<String, f64>,
    /// Units consumed per local secondary index.
    pub local_secondary_indexes: collections::HashMap<String, f64>,
    /// The last table reported.
    pub table_name: Option<String>,
}

impl ConsumedCapacity {
    pub(crate) fn add(&mut self, capacity: &types::ConsumedCapacity) {
        self.total += capacity.capacity_units.unwrap_or(0.0);
        self.read += capacity.read_capacity_units.unwrap_or(0.0);
        self.write += capacity.write_capacity_units.unwrap_or(0.0);
        if let Some(table) = &capacity.table {
            self.table += table.capacity_units.unwrap_or(0.0);
        }
        for (name, index) in capacity.global_secondary_indexes.iter().flatten() {
            *self
                .global_secondary_indexes
                .entry(name.clone())
                .or_default() += index.capacity_units.unwrap_or(0.0);
        }
        for (name, index) in capacity.local_secondary_indexes.iter().flatten() {
            *self
                .local_secondary_indexes
                .entry(name.clone())
                .or_default() += index.capacity_units.unwrap_or(0.0);
        }
        if capacity.table_name.is_some() {
            self.table_name.clone_from(&capacity.table_name);
        }
    }
}

/// A shared handle requests add their consumed capacity to.
///
/// ```rust
/// use dynamodb_fluent::common::capacity::CapacityTracker;
///
/// let tracker = CapacityTracker::default();
/// assert_eq!(tracker.snapshot().total, 0.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CapacityTracker(sync::Arc<sync::Mutex<ConsumedCapacity>>);

impl CapacityTracker {
    /// The capacity recorded so far.
    pub fn snapshot(&self) -> ConsumedCapacity {
        self.lock().clone()
    }

    /// Forgets the capacity recorded so far.
    pub fn reset(&self) {
        *self.lock() = ConsumedCapacity::default();
    }

    pub(crate) fn record<'a>(
        &self,
        capacities: impl IntoIterator<Item = &'a types::ConsumedCapacity>,
    ) {
        let mut consumed = self.lock();
        for capacity in capacities {
            consumed.add(capacity);
        }
    }

    fn lock(&self) -> sync::MutexGuard<'_, ConsumedCapacity> {
        self.0.lock().unwrap_or_else(sync::PoisonError::into_inner)
    }
}

/// Records `capacities` into an optional tracker.
pub(crate) fn record<'a>(
    tracker: Option<&CapacityTracker>,
    capacities: impl IntoIterator<Item = &'a types::ConsumedCapacity>,
) {
    if let Some(tracker) = tracker {
        tracker.record(capacities);
    }
}

/// `Indexes` when a tracker is attached.
pub(crate) fn return_consumed_capacity(
    tracker: Option<&CapacityTracker>,
) -> Option<types::ReturnConsumedCapacity> {
    tracker.map(|_| types::ReturnConsumedCapacity::Indexes)
}
