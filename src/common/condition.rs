/// Comparison applied to a sort key in a query.
///
/// ```rust
/// use dynamodb_fluent::common::condition::KeyCondition;
///
/// assert_eq!(KeyCondition::Between.arity(), 2);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyCondition {
    /// `key = value`
    Equal,
    /// `key <> value`
    NotEqual,
    /// `key < value`
    Less,
    /// `key <= value`
    LessOrEqual,
    /// `key > value`
    Greater,
    /// `key >= value`
    GreaterOrEqual,
    /// `begins_with(key, prefix)`
    BeginsWith,
    /// `key BETWEEN low AND high`
    Between,
}

impl KeyCondition {
    /// How many values the condition takes.
    pub fn arity(self) -> usize {
        match self {
            Self::Between => 2,
            _ => 1,
        }
    }

    /// The condition as a fragment over `$` (the key) and `?` (the values).
    pub(crate) fn fragment(self) -> &'static str {
        match self {
            Self::Equal => "$ = ?",
            Self::NotEqual => "$ <> ?",
            Self::Less => "$ < ?",
            Self::LessOrEqual => "$ <= ?",
            Self::Greater => "$ > ?",
            Self::GreaterOrEqual => "$ >= ?",
            Self::BeginsWith => "begins_with($, ?)",
            Self::Between => "$ BETWEEN ? AND ?",
        }
    }
}
