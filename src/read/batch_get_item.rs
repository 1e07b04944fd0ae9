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
    read::common::{SingleReadInput, consistent_read},
    retry,
};

use aws_sdk_dynamodb::types;
use std::collections;

/// Most keys the service accepts in one request.
pub(crate) const MAX_GET_KEYS: usize = 100;

/// batch get item operation
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct BatchGetItemInput {
    pub(crate) keys: Vec<Item>,
    pub(crate) single_read_operation: SingleReadInput,
}

impl BatchGetItemInput {
    fn keys_and_attributes(&self, keys: Vec<Item>) -> Result<types::KeysAndAttributes> {
        let operation = &self.single_read_operation;
        let keys_and_attributes = types::KeysAndAttributes::builder()
            .set_keys(Some(keys))
            .set_consistent_read(operation.consistent_read)
            .set_expression_attribute_names(operation.expression_attribute_names.clone())
            .set_projection_expression(operation.projection_expression.clone())
            .build()?;
        Ok(keys_and_attributes)
    }
}

/// Batch get item request, built fluently.
///
/// Keys are sent in chunks of 100; keys the service leaves unprocessed are
/// resent following the retry policy.
///
/// ```rust,no_run
/// use dynamodb_fluent::{codec::Value, db::Db};
///
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// let messages: Vec<Value> = db
///     .table("Messages")
///     .batch_get("UserID", Some("Date"))
///     .key_with_range(613, "2019-01-01")
///     .key_with_range(613, "2019-01-02")
///     .all()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchGetItem {
    table: Table,
    sub: Subber,
    hash: String,
    range: Option<String>,
    keys: Vec<Item>,
    projection: Option<String>,
    consistent: Option<bool>,
    capacity: Option<CapacityTracker>,
}

impl BatchGetItem {
    pub(crate) fn new(table: Table, hash: &str, range: Option<&str>) -> Self {
        Self {
            table,
            sub: Subber::new(),
            hash: hash.to_string(),
            range: range.map(str::to_string),
            keys: Vec::new(),
            projection: None,
            consistent: None,
            capacity: None,
        }
    }

    /// Adds the item whose partition key is `hash`.
    pub fn key(mut self, hash: impl Marshal) -> Self {
        let (keys, range) = (&mut self.keys, &self.range);
        let name = &self.hash;
        self.sub.sticky(|_| {
            if let Some(range) = range {
                return Err(Error::marshal(format!("missing value for range key {range}")));
            }
            keys.push(Keys::partition(name, &hash)?.try_into()?);
            Ok(())
        });
        self
    }

    /// Adds the item whose partition key is `hash` and sort key is `range`.
    pub fn key_with_range(mut self, hash: impl Marshal, range: impl Marshal) -> Self {
        let (keys, range_name) = (&mut self.keys, &self.range);
        let name = &self.hash;
        self.sub.sticky(|_| {
            let range_name = range_name
                .as_deref()
                .ok_or_else(|| Error::marshal("table handle has no range key"))?;
            let mut key = Keys::partition(name, &hash)?;
            key.set_sort(range_name, &range)?;
            keys.push(key.try_into()?);
            Ok(())
        });
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

    /// Uses strongly consistent reads.
    pub fn consistent(mut self, consistent: bool) -> Self {
        self.consistent = Some(consistent);
        self
    }

    /// Adds the consumed capacity of every request to `tracker`.
    pub fn consumed(mut self, tracker: &CapacityTracker) -> Self {
        self.capacity = Some(tracker.clone());
        self
    }

    fn input(&mut self) -> Result<BatchGetItemInput> {
        self.sub.check()?;
        let config = self.table.db().config();
        Ok(BatchGetItemInput {
            keys: std::mem::take(&mut self.keys),
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

    /// Every item found, as returned by the service.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.batch_get_item",
            skip_all,
            fields(table = %self.table.name()),
            err
        )
    )]
    pub async fn all_raw(mut self) -> Result<Vec<Item>> {
        let input = self.input()?;
        let db = self.table.db();
        let table_name = &input.single_read_operation.table_name;
        let mut items = Vec::with_capacity(input.keys.len());
        for chunk in input.keys.chunks(MAX_GET_KEYS) {
            let mut pending = chunk.to_vec();
            let mut attempt = 0;
            loop {
                let request_items = collections::HashMap::from([(
                    table_name.clone(),
                    input.keys_and_attributes(pending)?,
                )]);
                let builder = db
                    .client()
                    .batch_get_item()
                    .set_request_items(Some(request_items))
                    .set_return_consumed_capacity(
                        input.single_read_operation.return_consumed_capacity.clone(),
                    );
                let output = common::send_with_retry!(db, builder)?;
                capacity::record(self.capacity.as_ref(), output.consumed_capacity());
                if let Some(mut responses) = output.responses {
                    items.extend(responses.remove(table_name).unwrap_or_default());
                }
                pending = output
                    .unprocessed_keys
                    .and_then(|mut unprocessed| unprocessed.remove(table_name))
                    .map(|keys_and_attributes| keys_and_attributes.keys)
                    .unwrap_or_default();
                if pending.is_empty() {
                    break;
                }
                retry::wait_unprocessed(db.config().retry_policy(), attempt, pending.len())
                    .await?;
                attempt += 1;
            }
        }
        Ok(items)
    }

    /// Every item found, decoded into `T`.
    pub async fn all<T: ItemUnmarshal>(self) -> Result<Vec<T>> {
        self.all_raw()
            .await?
            .iter()
            .map(codec::unmarshal_item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::db;

    use rstest::rstest;

    fn key(hash: i64, range: Option<&str>) -> Item {
        let mut item = Item::from([(
            "UserID".to_string(),
            types::AttributeValue::N(hash.to_string()),
        )]);
        if let Some(range) = range {
            item.insert("Date".to_string(), types::AttributeValue::S(range.to_string()));
        }
        item
    }

    #[rstest]
    #[case::hash_only(
        db().table("a").batch_get("UserID", None).key(1).key(2),
        BatchGetItemInput {
            keys: vec![key(1, None), key(2, None)],
            single_read_operation: SingleReadInput {
                table_name: "a".to_string(),
                ..Default::default()
            },
        }
    )]
    #[case::with_range(
        db().table("a")
            .batch_get("UserID", Some("Date"))
            .key_with_range(1, "x")
            .project(&["Msg"])
            .consistent(true),
        BatchGetItemInput {
            keys: vec![key(1, Some("x"))],
            single_read_operation: SingleReadInput {
                consistent_read: Some(true),
                expression_attribute_names: Some(collections::HashMap::from([
                    ("#n0".to_string(), "Msg".to_string()),
                ])),
                projection_expression: Some("#n0".to_string()),
                table_name: "a".to_string(),
                ..Default::default()
            },
        }
    )]
    fn test_batch_get_item(#[case] mut batch: BatchGetItem, #[case] expected: BatchGetItemInput) {
        let actual = batch.input().unwrap();
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case::missing_range(db().table("a").batch_get("UserID", Some("Date")).key(1))]
    #[case::unexpected_range(db().table("a").batch_get("UserID", None).key_with_range(1, "x"))]
    fn test_batch_get_item_key_errors(#[case] mut batch: BatchGetItem) {
        assert!(batch.input().is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let items = db()
            .table("a")
            .batch_get("UserID", None)
            .all_raw()
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_keys_and_attributes() {
        let input = db()
            .table("a")
            .batch_get("UserID", None)
            .key(1)
            .input()
            .unwrap();
        let keys_and_attributes = input.keys_and_attributes(input.keys.clone()).unwrap();
        assert_eq!(keys_and_attributes.keys(), &[key(1, None)]);
        assert_eq!(keys_and_attributes.projection_expression(), None);
    }
}
