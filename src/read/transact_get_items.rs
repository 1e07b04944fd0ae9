use crate::{
    Result,
    attribute::Item,
    codec::{self, ItemUnmarshal},
    common::{
        self,
        capacity::{self, CapacityTracker},
    },
    db::Db,
    read::get_item::GetItem,
};

use aws_sdk_dynamodb::types;

/// Most items one read transaction may hold.
pub(crate) const MAX_TRANSACT_ITEMS: usize = 100;

/// Reads up to 100 items atomically.
///
/// Results come back in the order the reads were added; an item that does not
/// exist is `None`.
#[derive(Debug)]
pub struct TransactGetItems {
    db: Db,
    items: Vec<types::TransactGetItem>,
    err: Option<crate::Error>,
    capacity: Option<CapacityTracker>,
}

impl TransactGetItems {
    pub(crate) fn new(db: Db) -> Self {
        Self {
            db,
            items: Vec::new(),
            err: None,
            capacity: None,
        }
    }

    /// Adds `get` to the transaction. Consistency and capacity settings of
    /// `get` are ignored.
    pub fn get(mut self, mut get: GetItem) -> Self {
        if self.err.is_none() {
            match get.input().and_then(|input| input.into_transact_item()) {
                Ok(item) => self.items.push(item),
                Err(err) => self.err = Some(err),
            }
        }
        self
    }

    /// Adds the consumed capacity to `tracker`.
    pub fn consumed(mut self, tracker: &CapacityTracker) -> Self {
        self.capacity = Some(tracker.clone());
        self
    }

    /// How many reads were added.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no read was added.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn check(&mut self) -> Result<()> {
        if let Some(err) = self.err.take() {
            return Err(err);
        }
        if self.items.len() > MAX_TRANSACT_ITEMS {
            return Err(crate::Error::expression(format!(
                "transaction holds {} items, at most {MAX_TRANSACT_ITEMS} allowed",
                self.items.len()
            )));
        }
        Ok(())
    }

    /// Runs the transaction, returning the items in request order.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.transact_get_items",
            skip_all,
            fields(items = self.items.len()),
            err
        )
    )]
    pub async fn run(mut self) -> Result<Vec<Option<Item>>> {
        self.check()?;
        if self.items.is_empty() {
            return Ok(Vec::new());
        }
        let builder = self
            .db
            .client()
            .transact_get_items()
            .set_transact_items(Some(std::mem::take(&mut self.items)))
            .set_return_consumed_capacity(capacity::return_consumed_capacity(
                self.capacity.as_ref(),
            ));
        let output = common::send_with_retry!(self.db, builder)?;
        capacity::record(self.capacity.as_ref(), output.consumed_capacity());
        let responses = output.responses.unwrap_or_default();
        Ok(responses
            .into_iter()
            .map(|response| response.item)
            .collect())
    }

    /// Runs the transaction, decoding every item found into `T`.
    pub async fn all<T: ItemUnmarshal>(self) -> Result<Vec<T>> {
        self.run()
            .await?
            .iter()
            .flatten()
            .map(codec::unmarshal_item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::db;

    #[test]
    fn test_collects_reads_in_order() {
        let db = db();
        let mut tx = db
            .get_tx()
            .get(db.table("a").get_item("ID", 1))
            .get(db.table("b").get_item("ID", 2).project(&["Name"]));
        tx.check().unwrap();
        assert_eq!(tx.len(), 2);
        let tables: Vec<_> = tx
            .items
            .iter()
            .filter_map(|item| item.get())
            .map(|get| get.table_name().to_string())
            .collect();
        assert_eq!(tables, vec!["a", "b"]);
        assert_eq!(tx.items[1].get().unwrap().projection_expression(), Some("#n0"));
    }

    #[test]
    fn test_first_error_is_kept() {
        let db = db();
        let mut tx = db
            .get_tx()
            .get(db.table("a").get_item("ID", Vec::<String>::new()))
            .get(db.table("a").get_item("ID", 1));
        assert!(tx.is_empty());
        let err = tx.check().unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), " ID");
    }

    #[test]
    fn test_too_many_items() {
        let db = db();
        let table = db.table("a");
        let mut tx = (0..=MAX_TRANSACT_ITEMS).fold(db.get_tx(), |tx, id| {
            tx.get(table.get_item("ID", id as i64))
        });
        assert!(matches!(tx.check(), Err(crate::Error::Expression(_))));
    }

    #[tokio::test]
    async fn test_empty_transaction_sends_nothing() {
        assert!(db().get_tx().run().await.unwrap().is_empty());
    }
}
