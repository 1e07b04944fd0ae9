//! Write operations: puts, updates, deletes, batches and write transactions.

/// Batch write item operation for putting and deleting many items.
pub mod batch_write_item;

/// Common utilities and types for write operations.
pub mod common;

/// Condition checks on items, for write transactions.
pub mod condition_check;

/// Delete item operation for removing items from tables.
pub mod delete_item;

/// Put item operation for creating or replacing items.
pub mod put_item;

/// Atomic multi-item writes.
pub mod transact_write_items;

/// Update item operation for modifying existing items.
pub mod update_item;
