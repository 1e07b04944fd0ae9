//! Read operations: single items, queries, scans, batches and read transactions.

/// Batch get item operation for retrieving many items by key.
pub mod batch_get_item;

/// Common utilities and types for read operations.
pub mod common;

/// Get item operation for retrieving a single item by primary key.
pub mod get_item;

/// Paged iteration over query and scan results.
pub mod iter;

/// Query operation for retrieving items with key conditions.
pub mod query;

/// Scan operation for retrieving all items from a table.
pub mod scan;

/// Atomic multi-item reads.
pub mod transact_get_items;
