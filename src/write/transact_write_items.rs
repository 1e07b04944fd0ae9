use crate::{
    Error, Result,
    common::{
        self,
        capacity::{self, CapacityTracker},
    },
    db::Db,
    read::transact_get_items::MAX_TRANSACT_ITEMS,
    write::{
        condition_check::ConditionCheck, delete_item::DeleteItem, put_item::PutItem,
        update_item::UpdateItem,
    },
};

use aws_sdk_dynamodb::types;

/// A fresh client request token: 16 random bytes, hex encoded.
pub(crate) fn idempotency_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Writes up to 100 items atomically: either every write and check
/// succeeds, or none is applied.
///
/// A condition that fails surfaces as [`Error::ConditionCheckFailed`],
/// carrying the current items of the writes that asked for them.
///
/// ```rust,no_run
/// use dynamodb_fluent::db::Db;
///
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// let accounts = db.table("Accounts");
/// db.write_tx()
///     .update(accounts.update_item("ID", "alice").decrement("Balance", 10)
///         .condition("$ >= ?", &[&"Balance", &10]))
///     .update(accounts.update_item("ID", "bob").increment("Balance", 10))
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TransactWriteItems {
    db: Db,
    items: Vec<types::TransactWriteItem>,
    err: Option<Error>,
    token: String,
    capacity: Option<CapacityTracker>,
}

impl TransactWriteItems {
    pub(crate) fn new(db: Db) -> Self {
        Self {
            db,
            items: Vec::new(),
            err: None,
            token: idempotency_token(),
            capacity: None,
        }
    }

    fn push(mut self, item: Result<types::TransactWriteItem>) -> Self {
        if self.err.is_none() {
            match item {
                Ok(item) => self.items.push(item),
                Err(err) => self.err = Some(err),
            }
        }
        self
    }

    /// Adds `put` to the transaction.
    pub fn put(self, mut put: PutItem) -> Self {
        let item = put.input().and_then(|input| input.into_transact_item());
        self.push(item)
    }

    /// Adds `update` to the transaction.
    pub fn update(self, mut update: UpdateItem) -> Self {
        let item = update.input().and_then(|input| input.into_transact_item());
        self.push(item)
    }

    /// Adds `delete` to the transaction.
    pub fn delete(self, mut delete: DeleteItem) -> Self {
        let item = delete.input().and_then(|input| input.into_transact_item());
        self.push(item)
    }

    /// Adds `check` to the transaction.
    pub fn check(self, mut check: ConditionCheck) -> Self {
        let item = check.input().and_then(|input| input.into_transact_item());
        self.push(item)
    }

    /// Replaces the generated client request token. Resending a transaction
    /// with the same token within ten minutes does not apply it twice.
    pub fn idempotency_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// The client request token sent with the transaction.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Adds the consumed capacity to `tracker`.
    pub fn consumed(mut self, tracker: &CapacityTracker) -> Self {
        self.capacity = Some(tracker.clone());
        self
    }

    /// How many writes and checks were added.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was added.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn check_items(&mut self) -> Result<()> {
        if let Some(err) = self.err.take() {
            return Err(err);
        }
        if self.items.is_empty() {
            return Err(Error::expression("write transaction without any write"));
        }
        if self.items.len() > MAX_TRANSACT_ITEMS {
            return Err(Error::expression(format!(
                "transaction holds {} items, at most {MAX_TRANSACT_ITEMS} allowed",
                self.items.len()
            )));
        }
        Ok(())
    }

    /// Runs the transaction. Retries reuse the same token.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.transact_write_items",
            skip_all,
            fields(items = self.items.len(), token = %self.token),
            err
        )
    )]
    pub async fn run(mut self) -> Result<()> {
        self.check_items()?;
        let builder = self
            .db
            .client()
            .transact_write_items()
            .set_transact_items(Some(std::mem::take(&mut self.items)))
            .client_request_token(self.token.clone())
            .set_return_consumed_capacity(capacity::return_consumed_capacity(
                self.capacity.as_ref(),
            ));
        let output = common::send_with_retry!(self.db, builder)?;
        capacity::record(self.capacity.as_ref(), output.consumed_capacity());
        Ok(())
    }
}
