use crate::{
    Error, Result,
    attribute::Item,
    codec::{ItemUnmarshal, Marshal},
    common::{
        self,
        capacity::{self, CapacityTracker},
        condition::KeyCondition,
    },
    db::{Db, Table},
    expr::{Conjunction, Subber},
    read::{
        common::{MultipleReadInput, PagingKey, apply_multiple_read_operation, consistent_read},
        iter::{self, ItemIter, Page, Paging, Source},
    },
};

use aws_sdk_dynamodb::types;
use std::sync;

/// Sort order of query results, by sort key.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Order {
    /// Lowest sort key first.
    #[default]
    Ascending,
    /// Highest sort key first.
    Descending,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct QueryInput {
    pub(crate) key_condition_expression: String,
    pub(crate) scan_index_forward: Option<bool>,
    pub(crate) multiple_read_operation: MultipleReadInput,
}

impl QueryInput {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.query",
            skip_all,
            fields(table = %self.multiple_read_operation.table_name),
            err
        )
    )]
    pub(crate) async fn fetch(
        &self,
        db: &Db,
        start: Option<Item>,
        limit: Option<i32>,
        tracker: Option<&CapacityTracker>,
    ) -> Result<Page> {
        let mut operation = self.multiple_read_operation.clone();
        operation.exclusive_start_key = start;
        operation.limit = limit;
        let builder = db
            .client()
            .query()
            .key_condition_expression(&self.key_condition_expression)
            .set_scan_index_forward(self.scan_index_forward);
        let builder = apply_multiple_read_operation!(builder, operation);
        let output = common::send_with_retry!(db, builder)?;
        capacity::record(tracker, output.consumed_capacity());
        Ok(Page {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
            count: output.count,
        })
    }
}

/// Query request, built fluently.
///
/// ```rust,no_run
/// use dynamodb_fluent::{codec::Value, common::condition::KeyCondition, db::Db, read::query::Order};
///
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// let messages: Vec<Value> = db
///     .table("Messages")
///     .query("UserID", 613)
///     .range("Date", KeyCondition::Between, &[&"2019-01-01", &"2019-12-31"])
///     .filter("'Count' > ?", &[&0])
///     .order(Order::Descending)
///     .all()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Query {
    table: Table,
    sub: Subber,
    key_condition: Option<String>,
    range_condition: Option<String>,
    filters: Conjunction,
    projection: Option<String>,
    index: Option<String>,
    limit: Option<usize>,
    search_limit: Option<i32>,
    order: Option<Order>,
    consistent: Option<bool>,
    start: Option<PagingKey>,
    capacity: Option<CapacityTracker>,
    cancel: Option<sync::Arc<sync::atomic::AtomicBool>>,
}

impl Query {
    pub(crate) fn new<T: Marshal + ?Sized>(table: Table, hash: &str, value: &T) -> Self {
        let mut sub = Subber::new();
        let mut key_condition = None;
        sub.sticky(|sub| {
            key_condition = Some(sub.compile("$ = ?", &[&hash, &value])?);
            Ok(())
        });
        Self {
            table,
            sub,
            key_condition,
            range_condition: None,
            filters: Conjunction::default(),
            projection: None,
            index: None,
            limit: None,
            search_limit: None,
            order: None,
            consistent: None,
            start: None,
            capacity: None,
            cancel: None,
        }
    }

    /// Restricts the sort key `name` with `condition` over `values`.
    pub fn range(mut self, name: &str, condition: KeyCondition, values: &[&dyn Marshal]) -> Self {
        let mut args: Vec<&dyn Marshal> = Vec::with_capacity(values.len() + 1);
        args.push(&name);
        args.extend_from_slice(values);
        let mut range_condition = None;
        self.sub.sticky(|sub| {
            range_condition = Some(sub.compile(condition.fragment(), &args)?);
            Ok(())
        });
        if range_condition.is_some() {
            self.range_condition = range_condition;
        }
        self
    }

    /// Queries the index `name` instead of the table.
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    /// Keeps only items matching `fragment`; repeated calls are ANDed.
    pub fn filter(mut self, fragment: &str, args: &[&dyn Marshal]) -> Self {
        let filters = &mut self.filters;
        self.sub.sticky(|sub| {
            filters.push(sub.compile(fragment, args)?);
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

    /// Returns at most `limit` items in total.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluates at most `limit` items per request, before filtering.
    pub fn search_limit(mut self, limit: i32) -> Self {
        self.search_limit = Some(limit);
        self
    }

    /// Orders results by sort key.
    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    /// Uses strongly consistent reads.
    pub fn consistent(mut self, consistent: bool) -> Self {
        self.consistent = Some(consistent);
        self
    }

    /// Resumes a previous query from `key`.
    pub fn start_from(mut self, key: PagingKey) -> Self {
        self.start = Some(key);
        self
    }

    /// Adds the consumed capacity of every page to `tracker`.
    pub fn consumed(mut self, tracker: &CapacityTracker) -> Self {
        self.capacity = Some(tracker.clone());
        self
    }

    /// Stops iteration with [`Error::Cancelled`] at the next page boundary
    /// once `flag` is set.
    pub fn cancel_on(mut self, flag: sync::Arc<sync::atomic::AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn input(&mut self) -> Result<QueryInput> {
        self.sub.check()?;
        let hash_condition = self
            .key_condition
            .take()
            .ok_or_else(|| Error::expression("query without a partition key condition"))?;
        let key_condition_expression = match self.range_condition.take() {
            Some(range_condition) => format!("{hash_condition} AND {range_condition}"),
            None => hash_condition,
        };
        let config = self.table.db().config();
        Ok(QueryInput {
            key_condition_expression,
            scan_index_forward: self.order.map(|order| order == Order::Ascending),
            multiple_read_operation: MultipleReadInput {
                consistent_read: consistent_read(self.consistent, config),
                exclusive_start_key: self.start.take().map(Item::from),
                expression_attribute_names: self.sub.names(),
                expression_attribute_values: self.sub.values(),
                filter_expression: self.filters.render(),
                index_name: self.index.take(),
                limit: self.search_limit,
                projection_expression: self.projection.take(),
                return_consumed_capacity: capacity::return_consumed_capacity(
                    self.capacity.as_ref(),
                ),
                select: None,
                table_name: self.table.name().to_string(),
            },
        })
    }

    fn paging(&self) -> Paging {
        Paging {
            limit: self.limit,
            capacity: self.capacity.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Iterates over the results.
    pub fn iter(mut self) -> ItemIter {
        let source = self.input().map(Source::Query);
        ItemIter::new(self.table.db().clone(), source, self.paging())
    }

    /// The first result, or [`Error::NotFound`].
    pub async fn one<T: ItemUnmarshal>(self) -> Result<T> {
        let mut iter = self.limit(1).iter();
        iter.next_item().await.unwrap_or(Err(Error::NotFound))
    }

    /// Every result.
    pub async fn all<T: ItemUnmarshal>(self) -> Result<Vec<T>> {
        let mut iter = self.iter();
        let mut items = Vec::new();
        while let Some(item) = iter.next_item().await {
            items.push(item?);
        }
        Ok(items)
    }

    /// Every result, and where to resume when a limit stopped the query early.
    pub async fn all_with_last_key<T: ItemUnmarshal>(
        self,
    ) -> Result<(Vec<T>, Option<PagingKey>)> {
        let mut iter = self.iter();
        let mut items = Vec::new();
        while let Some(item) = iter.next_item().await {
            items.push(item?);
        }
        let key = iter.last_evaluated_key().await?;
        Ok((items, key))
    }

    /// How many items match, without returning them.
    pub async fn count(mut self) -> Result<i64> {
        let paging = self.paging();
        let source = self.input().map(|mut input| {
            input.multiple_read_operation.select = Some(types::Select::Count);
            input.multiple_read_operation.projection_expression = None;
            Source::Query(input)
        });
        iter::count(self.table.db(), source, &paging).await
    }
}
