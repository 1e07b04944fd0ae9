use crate::{
    Error, Result,
    attribute::Item,
    codec::{self, ItemUnmarshal},
    common::capacity::CapacityTracker,
    db::Db,
    read::{common::PagingKey, query::QueryInput, scan::ScanInput},
};

use aws_sdk_dynamodb::types;
use std::{collections, sync};

/// One page of a query or scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Page {
    pub(crate) items: Vec<Item>,
    pub(crate) last_evaluated_key: Option<Item>,
    pub(crate) count: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Source {
    Query(QueryInput),
    Scan(ScanInput),
}

impl Source {
    async fn fetch(
        &self,
        db: &Db,
        start: Option<Item>,
        limit: Option<i32>,
        capacity: Option<&CapacityTracker>,
    ) -> Result<Page> {
        match self {
            Self::Query(input) => input.fetch(db, start, limit, capacity).await,
            Self::Scan(input) => input.fetch(db, start, limit, capacity).await,
        }
    }

    fn start_key(&self) -> Option<Item> {
        let operation = match self {
            Self::Query(input) => &input.multiple_read_operation,
            Self::Scan(input) => &input.multiple_read_operation,
        };
        operation.exclusive_start_key.clone()
    }

    fn filtered(&self) -> bool {
        let operation = match self {
            Self::Query(input) => &input.multiple_read_operation,
            Self::Scan(input) => &input.multiple_read_operation,
        };
        operation.filter_expression.is_some()
    }

    fn search_limit(&self) -> Option<i32> {
        match self {
            Self::Query(input) => input.multiple_read_operation.limit,
            Self::Scan(input) => input.multiple_read_operation.limit,
        }
    }

    fn table_and_index(&self) -> (&str, Option<&str>) {
        let operation = match self {
            Self::Query(input) => &input.multiple_read_operation,
            Self::Scan(input) => &input.multiple_read_operation,
        };
        (&operation.table_name, operation.index_name.as_deref())
    }
}

/// Names of the attributes a paging key holds: the table's key, plus the
/// index's key when reading an index.
pub(crate) fn key_names(description: &types::TableDescription, index: Option<&str>) -> Vec<String> {
    let mut schemas = vec![description.key_schema()];
    if let Some(index) = index {
        let global = description
            .global_secondary_indexes()
            .iter()
            .filter(|found| found.index_name() == Some(index))
            .map(|found| found.key_schema());
        let local = description
            .local_secondary_indexes()
            .iter()
            .filter(|found| found.index_name() == Some(index))
            .map(|found| found.key_schema());
        schemas.extend(global.chain(local));
    }
    let mut names: Vec<String> = Vec::new();
    for element in schemas.into_iter().flatten() {
        let name = element.attribute_name();
        if !names.iter().any(|known| known == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// The paging key that resumes right after `item`.
pub(crate) fn key_of(item: &Item, names: &[String]) -> Result<Item> {
    names
        .iter()
        .map(|name| match item.get(name) {
            Some(value) => Ok((name.clone(), value.clone())),
            None => Err(Error::expression(format!(
                "cannot resume after an item without its key attribute {name:?}; \
                 project the key attributes"
            ))),
        })
        .collect()
}

/// Settings shared by query and scan iteration.
#[derive(Clone, Debug, Default)]
pub(crate) struct Paging {
    pub(crate) limit: Option<usize>,
    pub(crate) capacity: Option<CapacityTracker>,
    pub(crate) cancel: Option<sync::Arc<sync::atomic::AtomicBool>>,
}

impl Paging {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|cancel| cancel.load(sync::atomic::Ordering::Relaxed))
    }
}

/// Iterates over the results of a query or scan, a page at a time.
///
/// ```rust,no_run
/// # use dynamodb_fluent::{db::Db, codec::Value};
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// let mut iter = db.table("Messages").scan().iter();
/// while let Some(item) = iter.next_item::<Value>().await {
///     println!("{:?}", item?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ItemIter {
    db: Db,
    source: Option<Source>,
    err: Option<Error>,
    paging: Paging,
    buffer: collections::VecDeque<Item>,
    next_key: Option<Item>,
    last: Option<Item>,
    key_names: Option<Vec<String>>,
    started: bool,
    done: bool,
    yielded: usize,
}

impl ItemIter {
    pub(crate) fn new(db: Db, source: Result<Source>, paging: Paging) -> Self {
        let (source, err) = match source {
            Ok(source) => (Some(source), None),
            Err(err) => (None, Some(err)),
        };
        let next_key = source.as_ref().and_then(Source::start_key);
        Self {
            db,
            source,
            err,
            paging,
            buffer: collections::VecDeque::new(),
            next_key,
            last: None,
            key_names: None,
            started: false,
            done: false,
            yielded: 0,
        }
    }

    /// The next item decoded into `T`, or `None` once exhausted.
    ///
    /// Iteration stops after the first error.
    pub async fn next_item<T: ItemUnmarshal>(&mut self) -> Option<Result<T>> {
        let item = self.next_raw().await?;
        Some(item.and_then(|item| codec::unmarshal_item(&item)))
    }

    /// The next item as returned by the service.
    pub async fn next_raw(&mut self) -> Option<Result<Item>> {
        match self.advance().await {
            Ok(item) => item.map(Ok),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    /// Where to resume from to continue this iteration, `None` when every
    /// item has been read.
    ///
    /// When a limit stopped the iteration inside a page, the key is built from
    /// the last item returned, so resuming picks up the rest of that page.
    /// Building it describes the table once to learn its key attributes.
    pub async fn last_evaluated_key(&mut self) -> Result<Option<PagingKey>> {
        if self.buffer.is_empty() {
            return Ok(self.next_key.clone().map(PagingKey));
        }
        let Some(last) = &self.last else {
            return Ok(self.next_key.clone().map(PagingKey));
        };
        if self.key_names.is_none() {
            let Some(source) = &self.source else {
                return Ok(None);
            };
            let (table, index) = source.table_and_index();
            let description = self.db.table(table).describe().run().await?;
            self.key_names = Some(key_names(&description, index));
        }
        let names = self.key_names.as_deref().unwrap_or_default();
        key_of(last, names).map(|key| Some(PagingKey(key)))
    }

    fn remaining(&self) -> Option<usize> {
        self.paging
            .limit
            .map(|limit| limit.saturating_sub(self.yielded))
    }

    async fn advance(&mut self) -> Result<Option<Item>> {
        loop {
            if self.done || self.remaining() == Some(0) {
                return Ok(None);
            }
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                self.last = Some(item.clone());
                return Ok(Some(item));
            }
            if self.started && self.next_key.is_none() {
                self.done = true;
                return Ok(None);
            }
            if self.paging.cancelled() {
                return Err(Error::Cancelled);
            }
            if let Some(err) = self.err.take() {
                return Err(err);
            }
            let Some(source) = &self.source else {
                return Ok(None);
            };
            let limit = match (source.search_limit(), self.remaining()) {
                (Some(limit), _) => Some(limit),
                (None, Some(remaining)) if !source.filtered() => {
                    Some(i32::try_from(remaining).unwrap_or(i32::MAX))
                }
                _ => None,
            };
            let page = source
                .fetch(
                    &self.db,
                    self.next_key.take(),
                    limit,
                    self.paging.capacity.as_ref(),
                )
                .await?;
            self.started = true;
            self.buffer.extend(page.items);
            self.next_key = page.last_evaluated_key;
        }
    }
}

/// Counts the matching items of every page.
pub(crate) async fn count(db: &Db, source: Result<Source>, paging: &Paging) -> Result<i64> {
    let source = source?;
    let mut next_key = source.start_key();
    let mut total = 0;
    loop {
        if paging.cancelled() {
            return Err(Error::Cancelled);
        }
        let page = source
            .fetch(db, next_key.take(), source.search_limit(), paging.capacity.as_ref())
            .await?;
        total += i64::from(page.count);
        next_key = page.last_evaluated_key;
        if next_key.is_none() {
            return Ok(total);
        }
    }
}
