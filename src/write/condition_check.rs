use crate::{
    Error, Result,
    attribute::Item,
    codec::Marshal,
    common::key::Keys,
    db::Table,
    expr::{Conjunction, Subber},
    write::common::{WriteInput, apply_transact_write_operation},
};

use aws_sdk_dynamodb::types;

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ConditionCheckInput {
    pub(crate) keys: Item,
    pub(crate) write_operation: WriteInput,
}

impl ConditionCheckInput {
    pub(crate) fn into_transact_item(self) -> Result<types::TransactWriteItem> {
        if self.write_operation.condition_expression.is_none() {
            return Err(Error::expression("condition check without a condition"));
        }
        let builder = types::ConditionCheck::builder().set_key(Some(self.keys));
        let check = apply_transact_write_operation!(builder, self.write_operation).build()?;
        Ok(types::TransactWriteItem::builder()
            .condition_check(check)
            .build())
    }
}

/// A condition on an item that a write transaction requires, without
/// writing the item.
///
/// ```rust,no_run
/// use dynamodb_fluent::db::Db;
///
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// let users = db.table("Users");
/// db.write_tx()
///     .check(users.check("UserID", 613).if_exists())
///     .delete(db.table("Messages").delete_item("UserID", 613).range("Date", "2019"))
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConditionCheck {
    table: Table,
    sub: Subber,
    hash: String,
    keys: Keys,
    conditions: Conjunction,
    on_condition_failure: bool,
}

impl ConditionCheck {
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
            hash: hash.to_string(),
            keys,
            conditions: Conjunction::default(),
            on_condition_failure: false,
        }
    }

    /// Sets the sort key `name` to `value`.
    pub fn range(mut self, name: &str, value: impl Marshal) -> Self {
        let keys = &mut self.keys;
        self.sub.sticky(|_| keys.set_sort(name, &value));
        self
    }

    /// Requires `fragment` to hold; repeated calls are ANDed.
    pub fn condition(mut self, fragment: &str, args: &[&dyn Marshal]) -> Self {
        let conditions = &mut self.conditions;
        self.sub.sticky(|sub| {
            conditions.push(sub.compile(fragment, args)?);
            Ok(())
        });
        self
    }

    /// Requires the item to exist.
    pub fn if_exists(self) -> Self {
        let hash = self.hash.clone();
        self.condition("attribute_exists($)", &[&hash])
    }

    /// Requires the item not to exist.
    pub fn if_not_exists(self) -> Self {
        let hash = self.hash.clone();
        self.condition("attribute_not_exists($)", &[&hash])
    }

    /// Attaches the current item to [`Error::ConditionCheckFailed`] when the
    /// check fails.
    pub fn include_item_on_condition_failure(mut self) -> Self {
        self.on_condition_failure = true;
        self
    }

    pub(crate) fn input(&mut self) -> Result<ConditionCheckInput> {
        self.sub.check()?;
        let keys: Item = std::mem::take(&mut self.keys).try_into()?;
        Ok(ConditionCheckInput {
            keys,
            write_operation: WriteInput::new(
                &self.table,
                &self.sub,
                &self.conditions,
                self.on_condition_failure,
                None,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::db;

    use rstest::rstest;

    #[rstest]
    #[case::exists(db().table("a").check("ID", 1).if_exists(), "(attribute_exists(#n0))")]
    #[case::not_exists(
        db().table("a").check("ID", 1).if_not_exists(),
        "(attribute_not_exists(#n0))"
    )]
    #[case::combined(
        db().table("a").check("ID", 1).if_exists().condition("$ > ?", &[&"Balance", &10]),
        "(attribute_exists(#n0)) AND (#n1 > :v0)"
    )]
    fn test_condition_check(#[case] mut check: ConditionCheck, #[case] expected: &str) {
        let input = check.input().unwrap();
        assert_eq!(
            input.write_operation.condition_expression.as_deref(),
            Some(expected)
        );
        let item = input.into_transact_item().unwrap();
        let check = item.condition_check().unwrap();
        assert_eq!(check.condition_expression(), expected);
        assert_eq!(check.table_name(), "a");
    }

    #[test]
    fn test_condition_check_needs_condition() {
        let input = db().table("a").check("ID", 1).input().unwrap();
        assert!(matches!(
            input.into_transact_item(),
            Err(Error::Expression(_))
        ));
    }
}
