use crate::{
    codec::{ItemMarshal, Marshal},
    config::Config,
    plan::Record,
    read, table, write,
};

use aws_sdk_dynamodb::Client;

/// Entry point: a client plus the settings applied to its requests.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_fluent::db::Db;
///
/// # async fn example(client: Client) -> dynamodb_fluent::Result<()> {
/// let db = Db::new(client);
/// let messages = db.table("Messages");
/// let count = messages.query("UserID", 613).count().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Db {
    client: Client,
    config: Config,
}

impl Db {
    /// Wraps `client` with the default [`Config`].
    pub fn new(client: Client) -> Self {
        Self::with_config(client, Config::default())
    }

    /// Wraps `client` with `config`.
    pub fn with_config(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    /// The underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The settings applied to every request.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A handle on the table called `name`.
    pub fn table(&self, name: impl Into<String>) -> Table {
        Table {
            db: self.clone(),
            name: name.into(),
        }
    }

    /// Lists the names of every table.
    pub fn list_tables(&self) -> table::ListTables {
        table::ListTables::new(self.clone())
    }

    /// Creates a table whose key schema comes from the `hash` and `range`
    /// fields of `R`.
    pub fn create_table<R: Record>(&self, name: impl Into<String>) -> table::CreateTable {
        table::CreateTable::new::<R>(self.clone(), name.into())
    }

    /// Starts a write transaction.
    pub fn write_tx(&self) -> write::transact_write_items::TransactWriteItems {
        write::transact_write_items::TransactWriteItems::new(self.clone())
    }

    /// Starts a read transaction.
    pub fn get_tx(&self) -> read::transact_get_items::TransactGetItems {
        read::transact_get_items::TransactGetItems::new(self.clone())
    }
}

/// A handle on one table.
#[derive(Clone, Debug)]
pub struct Table {
    db: Db,
    name: String,
}

impl Table {
    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database handle this table came from.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Reads the item whose partition key `hash` equals `value`.
    pub fn get_item(&self, hash: &str, value: impl Marshal) -> read::get_item::GetItem {
        read::get_item::GetItem::new(self.clone(), hash, &value)
    }

    /// Creates or replaces `item`.
    pub fn put_item(&self, item: &(impl ItemMarshal + ?Sized)) -> write::put_item::PutItem {
        write::put_item::PutItem::new(self.clone(), item)
    }

    /// Updates the item whose partition key `hash` equals `value`.
    pub fn update_item(&self, hash: &str, value: impl Marshal) -> write::update_item::UpdateItem {
        write::update_item::UpdateItem::new(self.clone(), hash, &value)
    }

    /// Deletes the item whose partition key `hash` equals `value`.
    pub fn delete_item(&self, hash: &str, value: impl Marshal) -> write::delete_item::DeleteItem {
        write::delete_item::DeleteItem::new(self.clone(), hash, &value)
    }

    /// Queries the items whose partition key `hash` equals `value`.
    pub fn query(&self, hash: &str, value: impl Marshal) -> read::query::Query {
        read::query::Query::new(self.clone(), hash, &value)
    }

    /// Scans the whole table.
    pub fn scan(&self) -> read::scan::Scan {
        read::scan::Scan::new(self.clone())
    }

    /// Reads many items by key, keys being named `hash` and `range`.
    pub fn batch_get(&self, hash: &str, range: Option<&str>) -> read::batch_get_item::BatchGetItem {
        read::batch_get_item::BatchGetItem::new(self.clone(), hash, range)
    }

    /// Writes and deletes many items, keys being named `hash` and `range`.
    pub fn batch_write(
        &self,
        hash: &str,
        range: Option<&str>,
    ) -> write::batch_write_item::BatchWriteItem {
        write::batch_write_item::BatchWriteItem::new(self.clone(), hash, range)
    }

    /// A condition on the item whose partition key `hash` equals `value`,
    /// checked as part of a write transaction.
    pub fn check(&self, hash: &str, value: impl Marshal) -> write::condition_check::ConditionCheck {
        write::condition_check::ConditionCheck::new(self.clone(), hash, &value)
    }

    /// Describes the table.
    pub fn describe(&self) -> table::DescribeTable {
        table::DescribeTable::new(self.clone())
    }

    /// Deletes the table.
    pub fn delete_table(&self) -> table::DeleteTable {
        table::DeleteTable::new(self.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use aws_sdk_dynamodb::config;

    /// A client that is never sent anything.
    pub(crate) fn db() -> Db {
        let config = config::Config::builder()
            .behavior_version(config::BehaviorVersion::latest())
            .region(config::Region::new("us-east-1"))
            .build();
        Db::new(Client::from_conf(config))
    }

    #[test]
    fn test_table_handle() {
        let table = db().table("Messages");
        assert_eq!(table.name(), "Messages");
        assert!(!table.db().config().consistent_reads());
    }
}
