use crate::{
    Error, Result,
    attribute::Item,
    codec::{self, ItemUnmarshal, Marshal},
    common::{
        self,
        capacity::{self, CapacityTracker},
        key::Keys,
    },
    db::Table,
    expr::{Conjunction, Subber},
    write::common::{WriteInput, apply_transact_write_operation, apply_write_operation},
};

use aws_sdk_dynamodb::types;

/// delete item operation
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct DeleteItemInput {
    pub(crate) keys: Item,
    pub(crate) write_operation: WriteInput,
}

impl DeleteItemInput {
    /// The same write as one element of a write transaction.
    pub(crate) fn into_transact_item(self) -> Result<types::TransactWriteItem> {
        let builder = types::Delete::builder().set_key(Some(self.keys));
        let delete = apply_transact_write_operation!(builder, self.write_operation).build()?;
        Ok(types::TransactWriteItem::builder().delete(delete).build())
    }
}

/// Delete item request, built fluently.
///
/// ```rust,no_run
/// use dynamodb_fluent::{codec::Value, db::Db};
///
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// let deleted: Value = db
///     .table("Messages")
///     .delete_item("UserID", 613)
///     .range("Date", "2019-01-01")
///     .old_value()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeleteItem {
    table: Table,
    sub: Subber,
    keys: Keys,
    conditions: Conjunction,
    on_condition_failure: bool,
    capacity: Option<CapacityTracker>,
}

impl DeleteItem {
    pub(crate) fn new<T: Marshal + ?Sized>(table: Table, hash: &str, value: &T) -> Self {
        let mut sub = Subber::new();
        let mut keys = Keys::default();
        sub.sticky(|_| {
            keys = Keys::partition(hash, value)?;
            Ok(())
        });
        Self {
            table,
            sub,
            keys,
            conditions: Conjunction::default(),
            on_condition_failure: false,
            capacity: None,
        }
    }

    /// Sets the sort key `name` to `value`.
    pub fn range(mut self, name: &str, value: impl Marshal) -> Self {
        let keys = &mut self.keys;
        self.sub.sticky(|_| keys.set_sort(name, &value));
        self
    }

    /// Only deletes when `fragment` holds; repeated calls are ANDed.
    pub fn condition(mut self, fragment: &str, args: &[&dyn Marshal]) -> Self {
        let conditions = &mut self.conditions;
        self.sub.sticky(|sub| {
            conditions.push(sub.compile(fragment, args)?);
            Ok(())
        });
        self
    }

    /// Attaches the current item to [`Error::ConditionCheckFailed`] when the
    /// condition fails.
    pub fn include_item_on_condition_failure(mut self) -> Self {
        self.on_condition_failure = true;
        self
    }

    /// Adds the consumed capacity to `tracker`.
    pub fn consumed(mut self, tracker: &CapacityTracker) -> Self {
        self.capacity = Some(tracker.clone());
        self
    }

    pub(crate) fn input(&mut self) -> Result<DeleteItemInput> {
        self.sub.check()?;
        let keys: Item = std::mem::take(&mut self.keys).try_into()?;
        Ok(DeleteItemInput {
            keys,
            write_operation: WriteInput::new(
                &self.table,
                &self.sub,
                &self.conditions,
                self.on_condition_failure,
                self.capacity.as_ref(),
            ),
        })
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.delete_item",
            skip_all,
            fields(table = %self.table.name()),
            err
        )
    )]
    async fn send(mut self, return_values: Option<types::ReturnValue>) -> Result<Option<Item>> {
        let mut input = self.input()?;
        input.write_operation.return_values = return_values;
        let db = self.table.db();
        let builder = db.client().delete_item().set_key(Some(input.keys));
        let builder = apply_write_operation!(builder, input.write_operation);
        let output = common::send_with_retry!(db, builder)?;
        capacity::record(self.capacity.as_ref(), output.consumed_capacity());
        Ok(output.attributes)
    }

    /// Deletes the item. Deleting a missing item is not an error.
    pub async fn run(self) -> Result<()> {
        self.send(None).await?;
        Ok(())
    }

    /// Deletes the item and decodes it, or [`Error::NotFound`] when there was
    /// nothing to delete.
    pub async fn old_value<T: ItemUnmarshal>(self) -> Result<T> {
        let old = self
            .send(Some(types::ReturnValue::AllOld))
            .await?
            .filter(|item| !item.is_empty())
            .ok_or(Error::NotFound)?;
        codec::unmarshal_item(&old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::db;

    use rstest::rstest;
    use std::collections;

    #[rstest]
    #[case::empty(
        db().table("a").delete_item("ID", "x"),
        DeleteItemInput {
            keys: Item::from([("ID".to_string(), types::AttributeValue::S("x".to_string()))]),
            write_operation: WriteInput {
                table_name: "a".to_string(),
                ..Default::default()
            },
        }
    )]
    #[case::full(
        db().table("a")
            .delete_item("ID", "x")
            .range("Seq", 2)
            .condition("$ = ?", &[&"State", &"done"])
            .include_item_on_condition_failure()
            .consumed(&CapacityTracker::default()),
        DeleteItemInput {
            keys: Item::from([
                ("ID".to_string(), types::AttributeValue::S("x".to_string())),
                ("Seq".to_string(), types::AttributeValue::N("2".to_string())),
            ]),
            write_operation: WriteInput {
                condition_expression: Some("(#n0 = :v0)".to_string()),
                expression_attribute_names: Some(collections::HashMap::from([
                    ("#n0".to_string(), "State".to_string()),
                ])),
                expression_attribute_values: Some(collections::HashMap::from([
                    (":v0".to_string(), types::AttributeValue::S("done".to_string())),
                ])),
                return_consumed_capacity: Some(types::ReturnConsumedCapacity::Indexes),
                return_values_on_condition_check_failure: Some(
                    types::ReturnValuesOnConditionCheckFailure::AllOld
                ),
                table_name: "a".to_string(),
                ..Default::default()
            },
        }
    )]
    fn test_delete_item(#[case] mut delete_item: DeleteItem, #[case] expected: DeleteItemInput) {
        let actual = delete_item.input().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_delete_item_null_range() {
        let mut delete_item = db().table("a").delete_item("ID", "x").range("Seq", "");
        let err = delete_item.input().unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), " Seq");
    }

    #[test]
    fn test_into_transact_item() {
        let input = db().table("a").delete_item("ID", "x").input().unwrap();
        let item = input.into_transact_item().unwrap();
        let delete = item.delete().unwrap();
        assert_eq!(delete.table_name(), "a");
        assert_eq!(delete.condition_expression(), None);
    }
}
