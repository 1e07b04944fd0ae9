use crate::{
    Result,
    attribute::Item,
    codec::{ItemUnmarshal, Marshal},
    common::{
        self,
        capacity::{self, CapacityTracker},
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

/// scan operation
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ScanInput {
    pub(crate) multiple_read_operation: MultipleReadInput,
    pub(crate) segment: Option<i32>,
    pub(crate) total_segments: Option<i32>,
}

impl ScanInput {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.scan",
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
            .scan()
            .set_segment(self.segment)
            .set_total_segments(self.total_segments);
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

/// Scan request, built fluently.
///
/// ```rust,no_run
/// use dynamodb_fluent::{codec::Value, db::Db};
///
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// let expired: Vec<Value> = db
///     .table("Sessions")
///     .scan()
///     .filter("$ < ?", &[&"Expires", &1546300800])
///     .all()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Scan {
    table: Table,
    sub: Subber,
    filters: Conjunction,
    projection: Option<String>,
    index: Option<String>,
    limit: Option<usize>,
    search_limit: Option<i32>,
    segment: Option<(i32, i32)>,
    consistent: Option<bool>,
    start: Option<PagingKey>,
    capacity: Option<CapacityTracker>,
    cancel: Option<sync::Arc<sync::atomic::AtomicBool>>,
}

impl Scan {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            table,
            sub: Subber::new(),
            filters: Conjunction::default(),
            projection: None,
            index: None,
            limit: None,
            search_limit: None,
            segment: None,
            consistent: None,
            start: None,
            capacity: None,
            cancel: None,
        }
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

    /// Scans the index `name` instead of the table.
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
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

    /// Scans only `segment` of `total` segments, for parallel scans.
    pub fn segment(mut self, segment: i32, total: i32) -> Self {
        self.segment = Some((segment, total));
        self
    }

    /// Uses strongly consistent reads.
    pub fn consistent(mut self, consistent: bool) -> Self {
        self.consistent = Some(consistent);
        self
    }

    /// Resumes a previous scan from `key`.
    pub fn start_from(mut self, key: PagingKey) -> Self {
        self.start = Some(key);
        self
    }

    /// Adds the consumed capacity of every page to `tracker`.
    pub fn consumed(mut self, tracker: &CapacityTracker) -> Self {
        self.capacity = Some(tracker.clone());
        self
    }

    /// Stops iteration with [`Error::Cancelled`](crate::Error::Cancelled) at
    /// the next page boundary once `flag` is set.
    pub fn cancel_on(mut self, flag: sync::Arc<sync::atomic::AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn input(&mut self) -> Result<ScanInput> {
        self.sub.check()?;
        let config = self.table.db().config();
        Ok(ScanInput {
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
            segment: self.segment.map(|(segment, _)| segment),
            total_segments: self.segment.map(|(_, total)| total),
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
        let source = self.input().map(Source::Scan);
        ItemIter::new(self.table.db().clone(), source, self.paging())
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

    /// Every result, and where to resume when a limit stopped the scan early.
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
            Source::Scan(input)
        });
        iter::count(self.table.db(), source, &paging).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Db, tests::db};

    use rstest::rstest;
    use std::collections;

    #[rstest]
    #[case::empty(
        db().table("a").scan(),
        ScanInput {
            multiple_read_operation: MultipleReadInput {
                table_name: "a".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    )]
    #[case::full(
        db().table("a")
            .scan()
            .filter("$ = ?", &[&"b", &true])
            .project(&["c"])
            .index("d")
            .search_limit(5)
            .segment(1, 4)
            .consistent(false),
        ScanInput {
            multiple_read_operation: MultipleReadInput {
                consistent_read: Some(false),
                expression_attribute_names: Some(collections::HashMap::from([
                    ("#n0".to_string(), "b".to_string()),
                    ("#n1".to_string(), "c".to_string()),
                ])),
                expression_attribute_values: Some(collections::HashMap::from([
                    (":v0".to_string(), types::AttributeValue::Bool(true)),
                ])),
                filter_expression: Some("(#n0 = :v0)".to_string()),
                index_name: Some("d".to_string()),
                limit: Some(5),
                projection_expression: Some("#n1".to_string()),
                table_name: "a".to_string(),
                ..Default::default()
            },
            segment: Some(1),
            total_segments: Some(4),
        }
    )]
    fn test_scan(#[case] mut scan: Scan, #[case] expected: ScanInput) {
        let actual = scan.input().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_scan_uses_configured_consistency() {
        let base = db();
        let config = base.config().clone().with_consistent_reads(true);
        let db = Db::with_config(base.client().clone(), config);
        let input = db.table("a").scan().input().unwrap();
        assert_eq!(input.multiple_read_operation.consistent_read, Some(true));
    }

    #[tokio::test]
    async fn test_count_surfaces_builder_error() {
        let err = db()
            .table("a")
            .scan()
            .filter("$ = ?", &[&1, &2])
            .count()
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Expression(_)));
    }
}
