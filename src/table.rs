//! Table management: create, describe, list and delete tables.

use crate::{
    Error, Result,
    common,
    db::{Db, Table},
    plan::{self, FieldPlan, Record},
};

use aws_sdk_dynamodb::types;
use std::time;

/// How often [`Table::wait_active`] polls the table status.
const WAIT_INTERVAL: time::Duration = time::Duration::from_millis(500);

/// create table operation
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct CreateTableInput {
    pub(crate) attribute_definitions: Vec<types::AttributeDefinition>,
    pub(crate) billing_mode: Option<types::BillingMode>,
    pub(crate) key_schema: Vec<types::KeySchemaElement>,
    pub(crate) provisioned_throughput: Option<types::ProvisionedThroughput>,
    pub(crate) stream_specification: Option<types::StreamSpecification>,
    pub(crate) table_name: String,
}

fn key_attribute<S>(
    field: &FieldPlan<S>,
    key_type: types::KeyType,
    input: &mut CreateTableInput,
) -> Result<()> {
    let attribute_type = field.key_type().ok_or_else(|| {
        Error::marshal(format!(
            "field {} cannot be a key: it does not encode to a string, number or binary",
            field.ident()
        ))
    })?;
    input.attribute_definitions.push(
        types::AttributeDefinition::builder()
            .attribute_name(field.name())
            .attribute_type(attribute_type)
            .build()?,
    );
    input.key_schema.push(
        types::KeySchemaElement::builder()
            .attribute_name(field.name())
            .key_type(key_type)
            .build()?,
    );
    Ok(())
}

fn key_schema<R: Record>(input: &mut CreateTableInput) -> Result<()> {
    let plan = plan::plan_for::<R>();
    let hash = plan.hash_key().ok_or_else(|| {
        Error::marshal(format!(
            "{} has no field tagged hash",
            std::any::type_name::<R>()
        ))
    })?;
    key_attribute(hash, types::KeyType::Hash, input)?;
    if let Some(range) = plan.range_key() {
        key_attribute(range, types::KeyType::Range, input)?;
    }
    Ok(())
}

/// Creates a table whose key schema comes from the fields of a record
/// tagged `hash` and `range`. Billing is on demand unless
/// [`provision`](Self::provision) is called.
///
/// ```rust,no_run
/// use dynamodb_fluent::db::Db;
///
/// #[derive(Default)]
/// struct Message {
///     user_id: i64,
///     date: String,
///     msg: String,
/// }
///
/// dynamodb_fluent::record! {
///     Message {
///         user_id: "UserID,hash",
///         date: "Date,range",
///         msg: "Msg",
///     }
/// }
///
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// db.create_table::<Message>("Messages").run().await?;
/// db.table("Messages").wait_active().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CreateTable {
    db: Db,
    input: Result<CreateTableInput>,
}

impl CreateTable {
    pub(crate) fn new<R: Record>(db: Db, name: String) -> Self {
        let mut input = CreateTableInput {
            table_name: name,
            ..Default::default()
        };
        let input = key_schema::<R>(&mut input).map(|()| input);
        Self { db, input }
    }

    /// Uses provisioned billing with `read` and `write` capacity units.
    pub fn provision(mut self, read: i64, write: i64) -> Self {
        let throughput = types::ProvisionedThroughput::builder()
            .read_capacity_units(read)
            .write_capacity_units(write)
            .build();
        self.input = self.input.and_then(|mut input| {
            input.billing_mode = Some(types::BillingMode::Provisioned);
            input.provisioned_throughput = Some(throughput?);
            Ok(input)
        });
        self
    }

    /// Uses on-demand billing.
    pub fn on_demand(mut self) -> Self {
        self.input = self.input.map(|mut input| {
            input.billing_mode = Some(types::BillingMode::PayPerRequest);
            input.provisioned_throughput = None;
            input
        });
        self
    }

    /// Enables the table's change stream with `view`.
    pub fn stream(mut self, view: types::StreamViewType) -> Self {
        let stream = types::StreamSpecification::builder()
            .stream_enabled(true)
            .stream_view_type(view)
            .build();
        self.input = self.input.and_then(|mut input| {
            input.stream_specification = Some(stream?);
            Ok(input)
        });
        self
    }

    fn input(self) -> Result<CreateTableInput> {
        let mut input = self.input?;
        if input.billing_mode.is_none() {
            input.billing_mode = Some(types::BillingMode::PayPerRequest);
        }
        Ok(input)
    }

    /// Creates the table. It is usable once [`Table::wait_active`] returns.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_fluent.create_table", skip_all, err)
    )]
    pub async fn run(self) -> Result<types::TableDescription> {
        let db = self.db.clone();
        let input = self.input()?;
        let builder = db
            .client()
            .create_table()
            .set_attribute_definitions(Some(input.attribute_definitions))
            .set_billing_mode(input.billing_mode)
            .set_key_schema(Some(input.key_schema))
            .set_provisioned_throughput(input.provisioned_throughput)
            .set_stream_specification(input.stream_specification)
            .table_name(input.table_name);
        let output = common::send_with_retry!(db, builder)?;
        output.table_description.ok_or(Error::NotFound)
    }
}

/// Describes a table.
#[derive(Debug)]
pub struct DescribeTable {
    table: Table,
}

impl DescribeTable {
    pub(crate) fn new(table: Table) -> Self {
        Self { table }
    }

    /// The table description, as returned by the service.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.describe_table",
            skip_all,
            fields(table = %self.table.name()),
            err
        )
    )]
    pub async fn run(self) -> Result<types::TableDescription> {
        let db = self.table.db();
        let builder = db.client().describe_table().table_name(self.table.name());
        let output = common::send_with_retry!(db, builder)?;
        output.table.ok_or(Error::NotFound)
    }
}

/// Lists the names of every table, following pagination.
#[derive(Debug)]
pub struct ListTables {
    db: Db,
}

impl ListTables {
    pub(crate) fn new(db: Db) -> Self {
        Self { db }
    }

    /// Every table name.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_fluent.list_tables", skip_all, err)
    )]
    pub async fn run(self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut start = None;
        loop {
            let builder = self
                .db
                .client()
                .list_tables()
                .set_exclusive_start_table_name(start.take());
            let output = common::send_with_retry!(self.db, builder)?;
            names.extend(output.table_names.unwrap_or_default());
            start = output.last_evaluated_table_name;
            if start.is_none() {
                return Ok(names);
            }
        }
    }
}

/// Deletes a table.
#[derive(Debug)]
pub struct DeleteTable {
    table: Table,
}

impl DeleteTable {
    pub(crate) fn new(table: Table) -> Self {
        Self { table }
    }

    /// Deletes the table and everything in it.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.delete_table",
            skip_all,
            fields(table = %self.table.name()),
            err
        )
    )]
    pub async fn run(self) -> Result<()> {
        let db = self.table.db();
        let builder = db.client().delete_table().table_name(self.table.name());
        common::send_with_retry!(db, builder)?;
        Ok(())
    }
}

impl Table {
    /// Polls the table until its status is `ACTIVE`, returning its
    /// description.
    pub async fn wait_active(&self) -> Result<types::TableDescription> {
        loop {
            let description = self.describe().run().await?;
            if description.table_status() == Some(&types::TableStatus::Active) {
                return Ok(description);
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(table = %self.name(), status = ?description.table_status(), "waiting for table");
            tokio::time::sleep(WAIT_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::db;

    #[derive(Debug, Default)]
    struct Message {
        user_id: i64,
        date: String,
        msg: String,
    }

    crate::record! {
        Message {
            user_id: "UserID,hash",
            date: "Date,range",
            msg: "Msg",
        }
    }

    #[derive(Debug, Default)]
    struct Session {
        token: Vec<u8>,
    }

    crate::record! {
        Session {
            token: "Token,hash",
        }
    }

    #[derive(Debug, Default)]
    struct Keyless {
        name: String,
    }

    crate::record! {
        Keyless {
            name,
        }
    }

    #[derive(Debug, Default)]
    struct BadKey {
        tags: Vec<String>,
    }

    crate::record! {
        BadKey {
            tags: "Tags,hash",
        }
    }

    fn definition(name: &str, attribute_type: types::ScalarAttributeType) -> types::AttributeDefinition {
        types::AttributeDefinition::builder()
            .attribute_name(name)
            .attribute_type(attribute_type)
            .build()
            .unwrap()
    }

    fn key(name: &str, key_type: types::KeyType) -> types::KeySchemaElement {
        types::KeySchemaElement::builder()
            .attribute_name(name)
            .key_type(key_type)
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_table_from_record() {
        let input = db().create_table::<Message>("Messages").input().unwrap();
        assert_eq!(
            input,
            CreateTableInput {
                attribute_definitions: vec![
                    definition("UserID", types::ScalarAttributeType::N),
                    definition("Date", types::ScalarAttributeType::S),
                ],
                billing_mode: Some(types::BillingMode::PayPerRequest),
                key_schema: vec![
                    key("UserID", types::KeyType::Hash),
                    key("Date", types::KeyType::Range),
                ],
                table_name: "Messages".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_create_table_provisioned() {
        let input = db()
            .create_table::<Session>("Sessions")
            .provision(5, 2)
            .stream(types::StreamViewType::NewImage)
            .input()
            .unwrap();
        assert_eq!(
            input.attribute_definitions,
            vec![definition("Token", types::ScalarAttributeType::B)]
        );
        assert_eq!(input.billing_mode, Some(types::BillingMode::Provisioned));
        let throughput = input.provisioned_throughput.unwrap();
        assert_eq!(throughput.read_capacity_units(), 5);
        assert_eq!(throughput.write_capacity_units(), 2);
        let stream = input.stream_specification.unwrap();
        assert!(stream.stream_enabled());
    }

    #[test]
    fn test_on_demand_clears_throughput() {
        let input = db()
            .create_table::<Session>("Sessions")
            .provision(5, 2)
            .on_demand()
            .input()
            .unwrap();
        assert_eq!(input.billing_mode, Some(types::BillingMode::PayPerRequest));
        assert!(input.provisioned_throughput.is_none());
    }

    #[test]
    fn test_create_table_without_hash_key() {
        let err = db().create_table::<Keyless>("Keyless").input().unwrap_err();
        assert!(err.to_string().contains("no field tagged hash"));
    }

    #[test]
    fn test_create_table_with_unkeyable_field() {
        let err = db().create_table::<BadKey>("Bad").input().unwrap_err();
        assert!(err.to_string().contains("cannot be a key"));
    }
}
