use crate::{
    Error, Result,
    attribute::Item,
    codec::{self, ItemMarshal, ItemUnmarshal, Marshal},
    common::{
        self,
        capacity::{self, CapacityTracker},
    },
    db::Table,
    expr::{Conjunction, Subber},
    write::common::{WriteInput, apply_transact_write_operation, apply_write_operation},
};

use aws_sdk_dynamodb::types;

/// put item operation
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct PutItemInput {
    pub(crate) item: Item,
    pub(crate) write_operation: WriteInput,
}

impl PutItemInput {
    /// The same write as one element of a write transaction.
    pub(crate) fn into_transact_item(self) -> Result<types::TransactWriteItem> {
        let builder = types::Put::builder().set_item(Some(self.item));
        let put = apply_transact_write_operation!(builder, self.write_operation).build()?;
        Ok(types::TransactWriteItem::builder().put(put).build())
    }
}

/// Put item request, built fluently. Replaces any item with the same key.
///
/// ```rust,no_run
/// use dynamodb_fluent::{codec::Value, db::Db};
///
/// # async fn example(db: Db, message: Value) -> dynamodb_fluent::Result<()> {
/// db.table("Messages")
///     .put_item(&message)
///     .condition("attribute_not_exists($)", &[&"UserID"])
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PutItem {
    table: Table,
    sub: Subber,
    item: Item,
    conditions: Conjunction,
    on_condition_failure: bool,
    capacity: Option<CapacityTracker>,
}

impl PutItem {
    pub(crate) fn new<T: ItemMarshal + ?Sized>(table: Table, item: &T) -> Self {
        let mut sub = Subber::new();
        let mut marshaled = Item::new();
        sub.sticky(|_| {
            marshaled = codec::marshal_item(item)?;
            Ok(())
        });
        Self {
            table,
            sub,
            item: marshaled,
            conditions: Conjunction::default(),
            on_condition_failure: false,
            capacity: None,
        }
    }

    /// Only writes when `fragment` holds; repeated calls are ANDed.
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

    pub(crate) fn input(&mut self) -> Result<PutItemInput> {
        self.sub.check()?;
        Ok(PutItemInput {
            item: std::mem::take(&mut self.item),
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
            name = "dynamodb_fluent.put_item",
            skip_all,
            fields(table = %self.table.name()),
            err
        )
    )]
    async fn send(mut self, return_values: Option<types::ReturnValue>) -> Result<Option<Item>> {
        let mut input = self.input()?;
        input.write_operation.return_values = return_values;
        let db = self.table.db();
        let builder = db.client().put_item().set_item(Some(input.item));
        let builder = apply_write_operation!(builder, input.write_operation);
        let output = common::send_with_retry!(db, builder)?;
        capacity::record(self.capacity.as_ref(), output.consumed_capacity());
        Ok(output.attributes)
    }

    /// Writes the item.
    pub async fn run(self) -> Result<()> {
        self.send(None).await?;
        Ok(())
    }

    /// Writes the item and decodes the one it replaced, or
    /// [`Error::NotFound`] when there was none.
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
    use crate::{codec::Value, db::tests::db};

    use rstest::rstest;
    use std::collections;

    fn message() -> Value {
        Value::Map(collections::HashMap::from([
            ("UserID".to_string(), Value::from(613.0)),
            ("Msg".to_string(), Value::from("hello")),
        ]))
    }

    #[rstest]
    #[case::empty(
        db().table("a").put_item(&message()),
        PutItemInput {
            item: Item::from([
                ("UserID".to_string(), types::AttributeValue::N("613".to_string())),
                ("Msg".to_string(), types::AttributeValue::S("hello".to_string())),
            ]),
            write_operation: WriteInput {
                table_name: "a".to_string(),
                ..Default::default()
            },
        }
    )]
    #[case::conditional(
        db().table("a")
            .put_item(&message())
            .condition("attribute_not_exists($)", &[&"UserID"])
            .condition("'Count' < ?", &[&3])
            .include_item_on_condition_failure(),
        PutItemInput {
            item: Item::from([
                ("UserID".to_string(), types::AttributeValue::N("613".to_string())),
                ("Msg".to_string(), types::AttributeValue::S("hello".to_string())),
            ]),
            write_operation: WriteInput {
                condition_expression: Some(
                    "(attribute_not_exists(#n0)) AND (#n1 < :v0)".to_string()
                ),
                expression_attribute_names: Some(collections::HashMap::from([
                    ("#n0".to_string(), "UserID".to_string()),
                    ("#n1".to_string(), "Count".to_string()),
                ])),
                expression_attribute_values: Some(collections::HashMap::from([
                    (":v0".to_string(), types::AttributeValue::N("3".to_string())),
                ])),
                return_values_on_condition_check_failure: Some(
                    types::ReturnValuesOnConditionCheckFailure::AllOld
                ),
                table_name: "a".to_string(),
                ..Default::default()
            },
        }
    )]
    fn test_put_item(#[case] mut put_item: PutItem, #[case] expected: PutItemInput) {
        let actual = put_item.input().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_put_item_bad_condition() {
        let mut put_item = db()
            .table("a")
            .put_item(&message())
            .condition("$ = ?", &[&"UserID"]);
        assert!(matches!(put_item.input(), Err(Error::Expression(_))));
    }

    #[test]
    fn test_into_transact_item() {
        let input = db()
            .table("a")
            .put_item(&message())
            .condition("attribute_not_exists($)", &[&"UserID"])
            .input()
            .unwrap();
        let item = input.into_transact_item().unwrap();
        let put = item.put().unwrap();
        assert_eq!(put.table_name(), "a");
        assert_eq!(put.condition_expression(), Some("(attribute_not_exists(#n0))"));
        assert_eq!(put.item().len(), 2);
    }
}
