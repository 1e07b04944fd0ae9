use crate::{
    Error, Result,
    attribute::Item,
    codec::{self, ItemMarshal, Marshal},
    common::{
        self,
        capacity::{self, CapacityTracker},
        key::Keys,
    },
    db::Table,
    expr::Subber,
    retry,
};

use aws_sdk_dynamodb::types;
use std::collections;

/// Most writes the service accepts in one request.
pub(crate) const MAX_WRITE_REQUESTS: usize = 25;

/// A single request within a batch write operation.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum BatchWriteItemRequest {
    /// Creates or replaces an item.
    PutItem(Item),
    /// Removes an item by its primary key.
    DeleteItem(Item),
}

impl TryFrom<BatchWriteItemRequest> for types::WriteRequest {
    type Error = Error;

    fn try_from(write_request: BatchWriteItemRequest) -> Result<Self> {
        let builder = match write_request {
            BatchWriteItemRequest::PutItem(item) => {
                let put_request = types::PutRequest::builder().set_item(Some(item)).build()?;
                Self::builder().set_put_request(Some(put_request))
            }
            BatchWriteItemRequest::DeleteItem(keys) => {
                let delete_request = types::DeleteRequest::builder().set_key(Some(keys)).build()?;
                Self::builder().set_delete_request(Some(delete_request))
            }
        };
        Ok(builder.build())
    }
}

/// batch write item operation
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct BatchWriteItemInput {
    pub(crate) requests: Vec<BatchWriteItemRequest>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) table_name: String,
}

/// Batch write request mixing puts and deletes on one table, built fluently.
///
/// Writes are sent in chunks of 25; writes the service leaves unprocessed
/// are resent following the retry policy. Batch writes cannot be
/// conditional.
///
/// ```rust,no_run
/// use dynamodb_fluent::{codec::Value, db::Db};
///
/// # async fn example(db: Db, messages: Vec<Value>) -> dynamodb_fluent::Result<()> {
/// let written = db
///     .table("Messages")
///     .batch_write("UserID", Some("Date"))
///     .put_all(&messages)
///     .delete_with_range(613, "2019-01-01")
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchWriteItem {
    table: Table,
    sub: Subber,
    hash: String,
    range: Option<String>,
    requests: Vec<BatchWriteItemRequest>,
    capacity: Option<CapacityTracker>,
}

impl BatchWriteItem {
    pub(crate) fn new(table: Table, hash: &str, range: Option<&str>) -> Self {
        Self {
            table,
            sub: Subber::new(),
            hash: hash.to_string(),
            range: range.map(str::to_string),
            requests: Vec::new(),
            capacity: None,
        }
    }

    /// Adds a put of `item`.
    pub fn put(mut self, item: &(impl ItemMarshal + ?Sized)) -> Self {
        let requests = &mut self.requests;
        self.sub.sticky(|_| {
            requests.push(BatchWriteItemRequest::PutItem(codec::marshal_item(item)?));
            Ok(())
        });
        self
    }

    /// Adds a put of every item of `items`.
    pub fn put_all<'a, T: ItemMarshal + 'a>(self, items: impl IntoIterator<Item = &'a T>) -> Self {
        items.into_iter().fold(self, |batch, item| batch.put(item))
    }

    /// Adds a delete of the item whose partition key is `hash`.
    pub fn delete(mut self, hash: impl Marshal) -> Self {
        let (requests, range) = (&mut self.requests, &self.range);
        let name = &self.hash;
        self.sub.sticky(|_| {
            if let Some(range) = range {
                return Err(Error::marshal(format!("missing value for range key {range}")));
            }
            let keys = Keys::partition(name, &hash)?.try_into()?;
            requests.push(BatchWriteItemRequest::DeleteItem(keys));
            Ok(())
        });
        self
    }

    /// Adds a delete of the item whose partition key is `hash` and sort key
    /// is `range`.
    pub fn delete_with_range(mut self, hash: impl Marshal, range: impl Marshal) -> Self {
        let (requests, range_name) = (&mut self.requests, &self.range);
        let name = &self.hash;
        self.sub.sticky(|_| {
            let range_name = range_name
                .as_deref()
                .ok_or_else(|| Error::marshal("table handle has no range key"))?;
            let mut keys = Keys::partition(name, &hash)?;
            keys.set_sort(range_name, &range)?;
            requests.push(BatchWriteItemRequest::DeleteItem(keys.try_into()?));
            Ok(())
        });
        self
    }

    /// Adds the consumed capacity of every request to `tracker`.
    pub fn consumed(mut self, tracker: &CapacityTracker) -> Self {
        self.capacity = Some(tracker.clone());
        self
    }

    fn input(&mut self) -> Result<BatchWriteItemInput> {
        self.sub.check()?;
        Ok(BatchWriteItemInput {
            requests: std::mem::take(&mut self.requests),
            return_consumed_capacity: capacity::return_consumed_capacity(self.capacity.as_ref()),
            table_name: self.table.name().to_string(),
        })
    }

    /// Sends every write, returning how many were processed.
    ///
    /// When the retry policy gives up on unprocessed writes, the error is
    /// [`Error::Unprocessed`] and earlier chunks stay written.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.batch_write_item",
            skip_all,
            fields(table = %self.table.name()),
            err
        )
    )]
    pub async fn run(mut self) -> Result<usize> {
        let input = self.input()?;
        let db = self.table.db();
        let mut written = 0;
        let mut requests = input.requests.into_iter().peekable();
        while requests.peek().is_some() {
            let mut pending = requests
                .by_ref()
                .take(MAX_WRITE_REQUESTS)
                .map(types::WriteRequest::try_from)
                .collect::<Result<Vec<_>>>()?;
            let mut attempt = 0;
            loop {
                let sent = pending.len();
                let request_items =
                    collections::HashMap::from([(input.table_name.clone(), pending)]);
                let builder = db
                    .client()
                    .batch_write_item()
                    .set_request_items(Some(request_items))
                    .set_return_consumed_capacity(input.return_consumed_capacity.clone());
                let output = common::send_with_retry!(db, builder)?;
                capacity::record(self.capacity.as_ref(), output.consumed_capacity());
                pending = output
                    .unprocessed_items
                    .and_then(|mut unprocessed| unprocessed.remove(&input.table_name))
                    .unwrap_or_default();
                written += sent - pending.len();
                if pending.is_empty() {
                    break;
                }
                retry::wait_unprocessed(db.config().retry_policy(), attempt, pending.len())
                    .await?;
                attempt += 1;
            }
        }
        Ok(written)
    }
}
