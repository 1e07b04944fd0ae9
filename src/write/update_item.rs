use crate::{
    Error, Result,
    attribute::{Flags, Item},
    codec::{self, ItemUnmarshal, Marshal},
    common::{
        self,
        capacity::{self, CapacityTracker},
        key::Keys,
    },
    db::Table,
    expr::{
        Conjunction, Subber,
        update::{Clause, UpdateClauses},
    },
    write::common::{WriteInput, apply_transact_write_operation, apply_write_operation},
};

use aws_sdk_dynamodb::types;

/// How a SET action combines the path with its value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SetInput {
    Assign,
    IfNotExists,
    Increment,
    Decrement,
    ListAppend,
    ListPrepend,
}

impl SetInput {
    fn get_set_expression(self, path: &str, value_placeholder: &str) -> String {
        match self {
            Self::Assign => format!("{path} = {value_placeholder}"),
            Self::IfNotExists => format!("{path} = if_not_exists({path}, {value_placeholder})"),
            Self::Increment => format!("{path} = {path} + {value_placeholder}"),
            Self::Decrement => format!("{path} = {path} - {value_placeholder}"),
            Self::ListAppend => format!("{path} = list_append({path}, {value_placeholder})"),
            Self::ListPrepend => format!("{path} = list_append({value_placeholder}, {path})"),
        }
    }

    /// Whether a value that encodes to nothing removes the attribute.
    fn removes_when_empty(self) -> bool {
        self == Self::Assign
    }
}

/// update item operation
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct UpdateItemInput {
    pub(crate) keys: Item,
    pub(crate) update_expression: Option<String>,
    pub(crate) write_operation: WriteInput,
}

impl UpdateItemInput {
    /// The same write as one element of a write transaction.
    pub(crate) fn into_transact_item(self) -> Result<types::TransactWriteItem> {
        let update_expression = self
            .update_expression
            .ok_or_else(|| Error::expression("update in a transaction needs at least one action"))?;
        let builder = types::Update::builder()
            .set_key(Some(self.keys))
            .update_expression(update_expression);
        let update = apply_transact_write_operation!(builder, self.write_operation).build()?;
        Ok(types::TransactWriteItem::builder().update(update).build())
    }
}

/// Update item request, built fluently.
///
/// Actions are grouped into `SET`, `ADD`, `DELETE` and `REMOVE` sections,
/// each keeping the order in which they were added.
///
/// ```rust,no_run
/// use dynamodb_fluent::{codec::Value, db::Db};
///
/// # async fn example(db: Db) -> dynamodb_fluent::Result<()> {
/// let updated: Value = db
///     .table("Messages")
///     .update_item("UserID", 613)
///     .range("Date", "2019-01-01")
///     .set("Msg", "hello")
///     .increment("Count", 1)
///     .remove(&["Draft"])
///     .condition("attribute_exists($)", &[&"UserID"])
///     .value()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct UpdateItem {
    table: Table,
    sub: Subber,
    keys: Keys,
    clauses: UpdateClauses,
    conditions: Conjunction,
    on_condition_failure: bool,
    capacity: Option<CapacityTracker>,
}

impl UpdateItem {
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
            keys,
            clauses: UpdateClauses::default(),
            conditions: Conjunction::default(),
            on_condition_failure: false,
            capacity: None,
        }
    }

    /// Sets the sort key `name` to `value`.
    pub fn range(mut self, name: &str, value: impl Marshal) -> Self {
        let keys = &mut self.keys;
        self.sub.sticky(|_| keys.set_sort(name, &value));
        self
    }

    fn set_action(mut self, input: SetInput, path: &str, value: &dyn Marshal, flags: Flags) -> Self {
        let clauses = &mut self.clauses;
        self.sub.sticky(|sub| {
            let path_alias = sub.escape_path(path)?;
            match value.marshal(flags).map_err(|err| err.in_attribute(path))? {
                Some(value) => {
                    let value_placeholder = sub.value_alias(value);
                    clauses.push(
                        Clause::Set,
                        input.get_set_expression(&path_alias, &value_placeholder),
                    );
                }
                None if input.removes_when_empty() => clauses.push(Clause::Remove, path_alias),
                None => {
                    return Err(Error::marshal("update value encodes to nothing").in_attribute(path));
                }
            }
            Ok(())
        });
        self
    }

    fn add_or_delete_action(
        mut self,
        clause: Clause,
        path: &str,
        value: &dyn Marshal,
        flags: Flags,
    ) -> Self {
        let clauses = &mut self.clauses;
        self.sub.sticky(|sub| {
            let Some(value) = value.marshal(flags).map_err(|err| err.in_attribute(path))? else {
                return Ok(());
            };
            let path_alias = sub.escape_path(path)?;
            let value_placeholder = sub.value_alias(value);
            clauses.push(clause, format!("{path_alias} {value_placeholder}"));
            Ok(())
        });
        self
    }

    /// Sets `path` to `value`; a value that encodes to nothing removes it.
    pub fn set(self, path: &str, value: impl Marshal) -> Self {
        self.set_action(SetInput::Assign, path, &value, Flags::NONE)
    }

    /// Sets `path` to `value` unless it already holds something.
    pub fn set_if_not_exists(self, path: &str, value: impl Marshal) -> Self {
        self.set_action(SetInput::IfNotExists, path, &value, Flags::NONE)
    }

    /// Sets `path` to `value` encoded as a set; an empty set removes it.
    pub fn set_set(self, path: &str, value: impl Marshal) -> Self {
        self.set_action(SetInput::Assign, path, &value, Flags::SET)
    }

    /// Adds a hand-written `SET` action, compiled like any fragment.
    pub fn set_expr(mut self, fragment: &str, args: &[&dyn Marshal]) -> Self {
        let clauses = &mut self.clauses;
        self.sub.sticky(|sub| {
            clauses.push(Clause::Set, sub.compile(fragment, args)?);
            Ok(())
        });
        self
    }

    /// Adds `delta` to the number at `path`, which must exist.
    pub fn increment(self, path: &str, delta: impl Marshal) -> Self {
        self.set_action(SetInput::Increment, path, &delta, Flags::NONE)
    }

    /// Subtracts `delta` from the number at `path`, which must exist.
    pub fn decrement(self, path: &str, delta: impl Marshal) -> Self {
        self.set_action(SetInput::Decrement, path, &delta, Flags::NONE)
    }

    /// Appends the elements of the list `values` to the list at `path`.
    pub fn append(self, path: &str, values: impl Marshal) -> Self {
        self.set_action(SetInput::ListAppend, path, &values, Flags::NONE)
    }

    /// Prepends the elements of the list `values` to the list at `path`.
    pub fn prepend(self, path: &str, values: impl Marshal) -> Self {
        self.set_action(SetInput::ListPrepend, path, &values, Flags::NONE)
    }

    /// `ADD`: adds a number to `path`, creating it when missing, or adds
    /// set members to it.
    pub fn add(self, path: &str, value: impl Marshal) -> Self {
        self.add_or_delete_action(Clause::Add, path, &value, Flags::NONE)
    }

    /// Adds the members of `values` to the set at `path`. Nothing happens
    /// when `values` is empty.
    pub fn add_to_set(self, path: &str, values: impl Marshal) -> Self {
        self.add_or_delete_action(Clause::Add, path, &values, Flags::SET)
    }

    /// Removes the members of `values` from the set at `path`. Nothing
    /// happens when `values` is empty.
    pub fn delete_from_set(self, path: &str, values: impl Marshal) -> Self {
        self.add_or_delete_action(Clause::Delete, path, &values, Flags::SET)
    }

    /// Removes the attributes at `paths`.
    pub fn remove(mut self, paths: &[&str]) -> Self {
        let clauses = &mut self.clauses;
        self.sub.sticky(|sub| {
            for path in paths {
                clauses.push(Clause::Remove, sub.escape_path(path)?);
            }
            Ok(())
        });
        self
    }

    /// Adds a hand-written `REMOVE` action, compiled like any fragment.
    pub fn remove_expr(mut self, fragment: &str, args: &[&dyn Marshal]) -> Self {
        let clauses = &mut self.clauses;
        self.sub.sticky(|sub| {
            clauses.push(Clause::Remove, sub.compile(fragment, args)?);
            Ok(())
        });
        self
    }

    /// Only updates when `fragment` holds; repeated calls are ANDed.
    pub fn condition(mut self, fragment: &str, args: &[&dyn Marshal]) -> Self {
        let conditions = &mut self.conditions;
        self.sub.sticky(|sub| {
            conditions.push(sub.compile(fragment, args)?);
            Ok(())
        });
        self
    }

    /// Attaches the current item to [`Error::ConditionCheckFailed`] when the
    /// condition fails.
    pub fn include_item_on_condition_failure(mut self) -> Self {
        self.on_condition_failure = true;
        self
    }

    /// Adds the consumed capacity to `tracker`.
    pub fn consumed(mut self, tracker: &CapacityTracker) -> Self {
        self.capacity = Some(tracker.clone());
        self
    }

    pub(crate) fn input(&mut self) -> Result<UpdateItemInput> {
        self.sub.check()?;
        let keys: Item = std::mem::take(&mut self.keys).try_into()?;
        Ok(UpdateItemInput {
            keys,
            update_expression: self.clauses.render(),
            write_operation: WriteInput::new(
                &self.table,
                &self.sub,
                &self.conditions,
                self.on_condition_failure,
                self.capacity.as_ref(),
            ),
        })
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_fluent.update_item",
            skip_all,
            fields(table = %self.table.name()),
            err
        )
    )]
    async fn send(mut self, return_values: Option<types::ReturnValue>) -> Result<Option<Item>> {
        let mut input = self.input()?;
        input.write_operation.return_values = return_values;
        let db = self.table.db();
        let builder = db
            .client()
            .update_item()
            .set_key(Some(input.keys))
            .set_update_expression(input.update_expression);
        let builder = apply_write_operation!(builder, input.write_operation);
        let output = common::send_with_retry!(db, builder)?;
        capacity::record(self.capacity.as_ref(), output.consumed_capacity());
        Ok(output.attributes)
    }

    /// Applies the update.
    pub async fn run(self) -> Result<()> {
        self.send(None).await?;
        Ok(())
    }

    /// Applies the update and decodes the item as it is afterwards.
    pub async fn value<T: ItemUnmarshal>(self) -> Result<T> {
        let item = self
            .send(Some(types::ReturnValue::AllNew))
            .await?
            .unwrap_or_default();
        codec::unmarshal_item(&item)
    }

    /// Applies the update and decodes the item as it was before, or
    /// [`Error::NotFound`] when it did not exist.
    pub async fn old_value<T: ItemUnmarshal>(self) -> Result<T> {
        let old = self
            .send(Some(types::ReturnValue::AllOld))
            .await?
            .filter(|item| !item.is_empty())
            .ok_or(Error::NotFound)?;
        codec::unmarshal_item(&old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::db;

    use rstest::rstest;
    use std::collections;

    fn n(number: &str) -> types::AttributeValue {
        types::AttributeValue::N(number.to_string())
    }

    fn s(string: &str) -> types::AttributeValue {
        types::AttributeValue::S(string.to_string())
    }

    fn names(names: &[(&str, &str)]) -> Option<collections::HashMap<String, String>> {
        Some(
            names
                .iter()
                .map(|(alias, name)| (alias.to_string(), name.to_string()))
                .collect(),
        )
    }

    fn values(
        values: &[(&str, types::AttributeValue)],
    ) -> Option<collections::HashMap<String, types::AttributeValue>> {
        Some(
            values
                .iter()
                .map(|(alias, value)| (alias.to_string(), value.clone()))
                .collect(),
        )
    }

    #[rstest]
    #[case::assign(
        db().table("t").update_item("ID", 1).set("Msg", "hi"),
        Some("SET #n0 = :v0"),
        names(&[("#n0", "Msg")]),
        values(&[(":v0", s("hi"))])
    )]
    #[case::empty_assign_removes(
        db().table("t").update_item("ID", 1).set("Msg", ""),
        Some("REMOVE #n0"),
        names(&[("#n0", "Msg")]),
        None
    )]
    #[case::arithmetic(
        db().table("t").update_item("ID", 1).increment("Count", 2).decrement("Left", 1),
        Some("SET #n0 = #n0 + :v0, #n1 = #n1 - :v1"),
        names(&[("#n0", "Count"), ("#n1", "Left")]),
        values(&[(":v0", n("2")), (":v1", n("1"))])
    )]
    #[case::lists(
        db().table("t")
            .update_item("ID", 1)
            .append("Log", vec!["b"])
            .prepend("Log", vec!["a"]),
        Some("SET #n0 = list_append(#n0, :v0), #n0 = list_append(:v1, #n0)"),
        names(&[("#n0", "Log")]),
        values(&[
            (":v0", types::AttributeValue::L(vec![s("b")])),
            (":v1", types::AttributeValue::L(vec![s("a")])),
        ])
    )]
    #[case::if_not_exists(
        db().table("t").update_item("ID", 1).set_if_not_exists("Seen", 0),
        Some("SET #n0 = if_not_exists(#n0, :v0)"),
        names(&[("#n0", "Seen")]),
        values(&[(":v0", n("0"))])
    )]
    #[case::sets(
        db().table("t")
            .update_item("ID", 1)
            .set_set("Tags", vec!["a"])
            .add_to_set("Tags", vec!["b"])
            .delete_from_set("Tags", vec!["c"])
            .add_to_set("Tags", Vec::<String>::new()),
        Some("SET #n0 = :v0 ADD #n0 :v1 DELETE #n0 :v2"),
        names(&[("#n0", "Tags")]),
        values(&[
            (":v0", types::AttributeValue::Ss(vec!["a".to_string()])),
            (":v1", types::AttributeValue::Ss(vec!["b".to_string()])),
            (":v2", types::AttributeValue::Ss(vec!["c".to_string()])),
        ])
    )]
    #[case::all_sections(
        db().table("t")
            .update_item("ID", 1)
            .remove(&["Old", "Nested.Field"])
            .add("Visits", 1)
            .set_expr("$ = $ * ?", &[&"Score", &"Score", &2]),
        Some("SET #n4 = #n4 * :v1 ADD #n3 :v0 REMOVE #n0, #n1.#n2"),
        names(&[
            ("#n0", "Old"),
            ("#n1", "Nested"),
            ("#n2", "Field"),
            ("#n3", "Visits"),
            ("#n4", "Score"),
        ]),
        values(&[(":v0", n("1")), (":v1", n("2"))])
    )]
    #[case::remove_expr(
        db().table("t").update_item("ID", 1).remove_expr("$[0]", &[&"Items"]),
        Some("REMOVE #n0[0]"),
        names(&[("#n0", "Items")]),
        None
    )]
    fn test_update_expression(
        #[case] mut update_item: UpdateItem,
        #[case] expected_expression: Option<&str>,
        #[case] expected_names: Option<collections::HashMap<String, String>>,
        #[case] expected_values: Option<collections::HashMap<String, types::AttributeValue>>,
    ) {
        let input = update_item.input().unwrap();
        assert_eq!(input.update_expression.as_deref(), expected_expression);
        assert_eq!(input.write_operation.expression_attribute_names, expected_names);
        assert_eq!(input.write_operation.expression_attribute_values, expected_values);
    }

    #[test]
    fn test_update_item_input() {
        let mut update_item = db()
            .table("t")
            .update_item("ID", 1)
            .range("Date", "2019")
            .set("Msg", "hi")
            .condition("attribute_exists($)", &[&"ID"])
            .consumed(&CapacityTracker::default());
        let input = update_item.input().unwrap();
        assert_eq!(
            input,
            UpdateItemInput {
                keys: Item::from([
                    ("ID".to_string(), n("1")),
                    ("Date".to_string(), s("2019")),
                ]),
                update_expression: Some("SET #n0 = :v0".to_string()),
                write_operation: WriteInput {
                    condition_expression: Some("(attribute_exists(#n1))".to_string()),
                    expression_attribute_names: names(&[("#n0", "Msg"), ("#n1", "ID")]),
                    expression_attribute_values: values(&[(":v0", s("hi"))]),
                    return_consumed_capacity: Some(types::ReturnConsumedCapacity::Indexes),
                    table_name: "t".to_string(),
                    ..Default::default()
                },
            }
        );
    }

    #[test]
    fn test_empty_increment_fails() {
        let mut update_item = db().table("t").update_item("ID", 1).increment("Count", "");
        let err = update_item.input().unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), " Count");
    }

    #[test]
    fn test_transact_item_needs_an_action() {
        let input = db().table("t").update_item("ID", 1).input().unwrap();
        assert!(matches!(
            input.into_transact_item(),
            Err(Error::Expression(_))
        ));
    }

    #[test]
    fn test_into_transact_item() {
        let input = db()
            .table("t")
            .update_item("ID", 1)
            .set("Msg", "hi")
            .input()
            .unwrap();
        let item = input.into_transact_item().unwrap();
        let update = item.update().unwrap();
        assert_eq!(update.update_expression(), "SET #n0 = :v0");
        assert_eq!(update.table_name(), "t");
    }
}
