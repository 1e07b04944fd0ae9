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
    expr::Subber,
    read::common::{SingleReadInput, apply_single_read_operation, consistent_read},
};

use aws_sdk_dynamodb::types;

/// get item operation
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct GetItemInput {
    pub(crate) keys: Item,
    pub(crate) single_read_operation: SingleReadInput,
}

impl GetItemInput {
    /// The same read as one element of a read transaction.
    pub(crate) fn into_transact_item(self) -> Result<types::TransactGetItem> {
        let get = types::Get::builder()
            .set_key(Some(self.keys))
            .set_expression_attribute_names(self.single_read_operation.expression_attribute_names)
            .set_projection_expression(self.single_read_operation.projection_expression)
            .table_name(self.single_read_operation.table_name)
            .build()?;
        Ok(types::TransactGetItem::builder().get(get).build())
    }
}

/// Get item request, built fluently.
///
/// ```rust,no_run
/// use dynamodb_fluent::{codec::Value, db::Db};
///
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// let message: Value = db
///     .table("Messages")
///     .get_item("UserID", 613)
///     .range("Date", "2019-01-01T00:00:00Z")
///     .one()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GetItem {
    table: Table,
    sub: Subber,
    keys: Keys,
    projection: Option<String>,
    consistent: Option<bool>,
    capacity: Option<CapacityTracker>,
}

impl GetItem {
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
            projection: None,
            consistent: None,
            capacity: None,
        }
    }

    /// Sets the sort key `name` to `value`.
    pub fn range(mut self, name: &str, value: impl Marshal) -> Self {
        let keys = &mut self.keys;
        self.sub.sticky(|_| keys.set_sort(name, &value));
        self
    }

    /// Returns only the attributes at `paths`.
    pub fn project(mut self, paths: &[&str]) -> Self {
        let mut projection = None;
        self.sub.sticky(|sub| {
            projection = Some(common::projection(sub, paths)?);
            Ok(())
        });
        if projection.is_some() {
            self.projection = projection;
        }
        self
    }

    /// Uses a strongly consistent read.
    pub fn consistent(mut self, consistent: bool) -> Self {
        self.consistent = Some(consistent);
        self
    }

    /// Adds the consumed capacity to `tracker`.
    pub fn consumed(mut self, tracker: &CapacityTracker) -> Self {
        self.capacity = Some(tracker.clone());
        self
    }

    pub(crate) fn input(&mut self) -> Result<GetItemInput> {
        self.sub.check()?;
        let keys: Item = std::mem::take(&mut self.keys).try_into()?;
        let config = self.table.db().config();
        Ok(GetItemInput {
            keys,
            single_read_operation: SingleReadInput {
                consistent_read: consistent_read(self.consistent, config),
                expression_attribute_names: self.sub.names(),
                projection_expression: self.projection.take(),
                return_consumed_capacity: capacity::return_consumed_capacity(
                    self.capacity.as_ref(),
                ),
                table_name: self.table.name().to_string(),
            },
        })
    }

    /// The item as returned by the service, or [`Error::NotFound`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.get_item",
            skip_all,
            fields(table = %self.table.name()),
            err
        )
    )]
    pub async fn raw(mut self) -> Result<Item> {
        let input = self.input()?;
        let db = self.table.db();
        let builder = db.client().get_item().set_key(Some(input.keys));
        let builder = apply_single_read_operation!(builder, input.single_read_operation);
        let output = common::send_with_retry!(db, builder)?;
        capacity::record(self.capacity.as_ref(), output.consumed_capacity());
        output.item.ok_or(Error::NotFound)
    }

    /// The item decoded into `T`, or [`Error::NotFound`].
    pub async fn one<T: ItemUnmarshal>(self) -> Result<T> {
        let item = self.raw().await?;
        codec::unmarshal_item(&item)
    }

    /// Decodes the item into `out`, zeroing fields it lacks.
    pub async fn one_into<T: ItemUnmarshal>(self, out: &mut T) -> Result<()> {
        let item = self.raw().await?;
        codec::unmarshal_item_into(&item, out)
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
        db().table("c").get_item("a", "b"),
        GetItemInput {
            keys: Item::from([("a".to_string(), types::AttributeValue::S("b".to_string()))]),
            single_read_operation: SingleReadInput {
                table_name: "c".to_string(),
                ..Default::default()
            },
        }
    )]
    #[case::full(
        db().table("g")
            .get_item("a", "b")
            .range("c", 4)
            .project(&["e", "f"])
            .consistent(false)
            .consumed(&CapacityTracker::default()),
        GetItemInput {
            keys: Item::from([
                ("a".to_string(), types::AttributeValue::S("b".to_string())),
                ("c".to_string(), types::AttributeValue::N("4".to_string())),
            ]),
            single_read_operation: SingleReadInput {
                consistent_read: Some(false),
                expression_attribute_names: Some(collections::HashMap::from([
                    ("#n0".to_string(), "e".to_string()),
                    ("#n1".to_string(), "f".to_string()),
                ])),
                projection_expression: Some("#n0, #n1".to_string()),
                return_consumed_capacity: Some(types::ReturnConsumedCapacity::Indexes),
                table_name: "g".to_string(),
            },
        }
    )]
    fn test_get_item(#[case] mut get_item: GetItem, #[case] expected: GetItemInput) {
        let actual = get_item.input().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_get_item_bad_key() {
        let mut get_item = db().table("a").get_item("ID", Vec::<String>::new());
        let err = get_item.input().unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), " ID");
    }

    #[test]
    fn test_into_transact_item() {
        let input = db().table("a").get_item("ID", 1).input().unwrap();
        let item = input.into_transact_item().unwrap();
        let get = item.get().unwrap();
        assert_eq!(get.table_name(), "a");
        assert_eq!(get.key()["ID"], types::AttributeValue::N("1".to_string()));
    }
}
