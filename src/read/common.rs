use crate::{attribute::Item, config::Config};

use aws_sdk_dynamodb::types;
use std::collections;

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SingleReadInput {
    pub(crate) consistent_read: Option<bool>,
    pub(crate) expression_attribute_names: Option<collections::HashMap<String, String>>,
    pub(crate) projection_expression: Option<String>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) table_name: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct MultipleReadInput {
    pub(crate) consistent_read: Option<bool>,
    pub(crate) exclusive_start_key: Option<Item>,
    pub(crate) expression_attribute_names: Option<collections::HashMap<String, String>>,
    pub(crate) expression_attribute_values:
        Option<collections::HashMap<String, types::AttributeValue>>,
    pub(crate) filter_expression: Option<String>,
    pub(crate) index_name: Option<String>,
    pub(crate) limit: Option<i32>,
    pub(crate) projection_expression: Option<String>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) select: Option<types::Select>,
    pub(crate) table_name: String,
}

/// The consistency of a read: explicit, else the configured default.
pub(crate) fn consistent_read(requested: Option<bool>, config: &Config) -> Option<bool> {
    requested.or_else(|| config.consistent_reads().then_some(true))
}

/// An opaque position in a query or scan, used to resume it later.
#[derive(Clone, Debug, PartialEq)]
pub struct PagingKey(pub(crate) Item);

impl PagingKey {
    /// The key attributes of the position.
    pub fn as_item(&self) -> &Item {
        &self.0
    }
}

impl From<Item> for PagingKey {
    fn from(item: Item) -> Self {
        Self(item)
    }
}

impl From<PagingKey> for Item {
    fn from(key: PagingKey) -> Self {
        key.0
    }
}

/// apply common single read operation settings to a builder
macro_rules! apply_single_read_operation {
    ($builder:expr, $single_read_operation:expr) => {
        $builder
            .set_consistent_read($single_read_operation.consistent_read)
            .set_expression_attribute_names($single_read_operation.expression_attribute_names)
            .set_projection_expression($single_read_operation.projection_expression)
            .set_return_consumed_capacity($single_read_operation.return_consumed_capacity)
            .table_name($single_read_operation.table_name)
    };
}

/// apply common multiple read operation settings to a builder
macro_rules! apply_multiple_read_operation {
    ($builder:expr, $multiple_read_operation:expr) => {
        $builder
            .set_consistent_read($multiple_read_operation.consistent_read)
            .set_exclusive_start_key($multiple_read_operation.exclusive_start_key)
            .set_expression_attribute_names($multiple_read_operation.expression_attribute_names)
            .set_expression_attribute_values($multiple_read_operation.expression_attribute_values)
            .set_filter_expression($multiple_read_operation.filter_expression)
            .set_index_name($multiple_read_operation.index_name)
            .set_limit($multiple_read_operation.limit)
            .set_projection_expression($multiple_read_operation.projection_expression)
            .set_return_consumed_capacity($multiple_read_operation.return_consumed_capacity)
            .set_select($multiple_read_operation.select)
            .table_name($multiple_read_operation.table_name)
    };
}

pub(crate) use {apply_multiple_read_operation, apply_single_read_operation};

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::default_eventual(None, false, None)]
    #[case::default_strong(None, true, Some(true))]
    #[case::explicit_overrides(Some(false), true, Some(false))]
    #[case::explicit_strong(Some(true), false, Some(true))]
    fn test_consistent_read(
        #[case] requested: Option<bool>,
        #[case] configured: bool,
        #[case] expected: Option<bool>,
    ) {
        let config = Config::default().with_consistent_reads(configured);
        assert_eq!(consistent_read(requested, &config), expected);
    }

    #[test]
    fn test_paging_key_round_trip() {
        let item = Item::from([("ID".to_string(), types::AttributeValue::N("1".to_string()))]);
        let key = PagingKey::from(item.clone());
        assert_eq!(key.as_item(), &item);
        assert_eq!(Item::from(key), item);
    }
}
