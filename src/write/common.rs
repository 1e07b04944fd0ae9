use crate::{
    common::capacity::{self, CapacityTracker},
    db::Table,
    expr::{Conjunction, Subber},
};

use aws_sdk_dynamodb::types;
use std::collections;

/// Settings shared by put, update, delete and condition check requests.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct WriteInput {
    pub(crate) condition_expression: Option<String>,
    pub(crate) expression_attribute_names: Option<collections::HashMap<String, String>>,
    pub(crate) expression_attribute_values:
        Option<collections::HashMap<String, types::AttributeValue>>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) return_values: Option<types::ReturnValue>,
    pub(crate) return_values_on_condition_check_failure:
        Option<types::ReturnValuesOnConditionCheckFailure>,
    pub(crate) table_name: String,
}

impl WriteInput {
    /// Collects what every write builder holds. Expression names and values
    /// are read last, once every fragment has been compiled.
    pub(crate) fn new(
        table: &Table,
        sub: &Subber,
        conditions: &Conjunction,
        on_condition_failure: bool,
        tracker: Option<&CapacityTracker>,
    ) -> Self {
        Self {
            condition_expression: conditions.render(),
            expression_attribute_names: sub.names(),
            expression_attribute_values: sub.values(),
            return_consumed_capacity: capacity::return_consumed_capacity(tracker),
            return_values: None,
            return_values_on_condition_check_failure: on_condition_failure
                .then_some(types::ReturnValuesOnConditionCheckFailure::AllOld),
            table_name: table.name().to_string(),
        }
    }
}

/// apply common write operation settings to a builder
macro_rules! apply_write_operation {
    ($builder:expr, $write_operation:expr) => {
        $builder
            .set_condition_expression($write_operation.condition_expression)
            .set_expression_attribute_names($write_operation.expression_attribute_names)
            .set_expression_attribute_values($write_operation.expression_attribute_values)
            .set_return_consumed_capacity($write_operation.return_consumed_capacity)
            .set_return_values($write_operation.return_values)
            .set_return_values_on_condition_check_failure(
                $write_operation.return_values_on_condition_check_failure,
            )
            .table_name($write_operation.table_name)
    };
}

/// apply the settings a transaction element accepts to its builder
macro_rules! apply_transact_write_operation {
    ($builder:expr, $write_operation:expr) => {
        $builder
            .set_condition_expression($write_operation.condition_expression)
            .set_expression_attribute_names($write_operation.expression_attribute_names)
            .set_expression_attribute_values($write_operation.expression_attribute_values)
            .set_return_values_on_condition_check_failure(
                $write_operation.return_values_on_condition_check_failure,
            )
            .table_name($write_operation.table_name)
    };
}

pub(crate) use {apply_transact_write_operation, apply_write_operation};
