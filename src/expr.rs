//! Expression compilation.
//!
//! Fragments are written in the service's expression language with a few
//! placeholders that the [`Subber`] replaces by aliases:
//!
//! * `'name'` is a literal attribute name, aliased when it is a reserved word
//!   or not a plain identifier;
//! * `$` takes the next argument as an attribute name or dotted path;
//! * `?` takes the next argument as a value;
//! * `🝕` takes the next argument as an alias generated earlier.
//!
//! ```
//! use dynamodb_fluent::{codec::Marshal, expr::Subber};
//!
//! let mut sub = Subber::new();
//! let args: [&dyn Marshal; 3] = [&0, &"Message", &"hello"];
//! let expression = sub.compile("'Count' = ? AND $ = ?", &args).unwrap();
//! assert_eq!(expression, "#n0 = :v0 AND #n1 = :v1");
//! ```

pub(crate) mod lexer;
mod reserved;
pub(crate) mod update;

use crate::{Error, Result, attribute::Flags, codec::Marshal};

use aws_sdk_dynamodb::types;
use lexer::{Lexer, Token};
use std::collections;

#[allow(unused_imports)]
pub(crate) use lexer::MAGIC_SLOT;
pub(crate) use reserved::is_reserved;

/// Per-request alias tables and fragment compiler.
///
/// Aliases are numbered per instance, so expressions compiled by one
/// `Subber` never collide with each other.
#[derive(Debug, Default)]
pub struct Subber {
    names: collections::HashMap<String, String>,
    aliases: collections::HashMap<String, String>,
    values: collections::HashMap<String, types::AttributeValue>,
    err: Option<Error>,
}

impl Subber {
    /// Empty alias tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// The alias of an attribute name, reused when the name was seen before.
    pub fn name_alias(&mut self, name: &str) -> String {
        if let Some(alias) = self.aliases.get(name) {
            return alias.clone();
        }
        let alias = format!("#n{}", self.names.len());
        self.names.insert(alias.clone(), name.to_string());
        self.aliases.insert(name.to_string(), alias.clone());
        alias
    }

    /// A fresh alias bound to `value`.
    pub fn value_alias(&mut self, value: types::AttributeValue) -> String {
        let alias = format!(":v{}", self.values.len());
        self.values.insert(alias.clone(), value);
        alias
    }

    /// `name` as written, or its alias when the service would not accept it.
    pub fn escape_name(&mut self, name: &str) -> String {
        if is_plain_identifier(name) && !is_reserved(name) {
            name.to_string()
        } else {
            self.name_alias(name)
        }
    }

    /// Aliases every segment of a dotted path, keeping list indexes.
    ///
    /// `Friends[2].Name` becomes `#n0[2].#n1`.
    pub fn escape_path(&mut self, path: &str) -> Result<String> {
        let mut escaped = Vec::new();
        for segment in path.split('.') {
            let (name, indexes) = split_indexes(segment);
            if name.is_empty() {
                return Err(Error::expression(format!("invalid attribute path {path:?}")));
            }
            escaped.push(format!("{}{indexes}", self.name_alias(name)));
        }
        Ok(escaped.join("."))
    }

    /// Compiles `fragment`, marshaling `?` arguments with no flags.
    ///
    /// An argument that encodes to nothing is an error.
    pub fn compile(&mut self, fragment: &str, args: &[&dyn Marshal]) -> Result<String> {
        self.compile_with(fragment, args, false)
    }

    /// Like [`compile`](Self::compile), but empty values become `NULL`.
    pub fn compile_nullable(&mut self, fragment: &str, args: &[&dyn Marshal]) -> Result<String> {
        self.compile_with(fragment, args, true)
    }

    fn compile_with(
        &mut self,
        fragment: &str,
        args: &[&dyn Marshal],
        nullable: bool,
    ) -> Result<String> {
        let mut output = String::with_capacity(fragment.len());
        let mut args = args.iter().enumerate();
        let mut next_arg = |token: &str| {
            args.next().ok_or_else(|| {
                Error::expression(format!("not enough arguments for {token} in {fragment:?}"))
            })
        };
        for token in Lexer::new(fragment) {
            match token? {
                Token::Text(text) => output.push_str(text),
                Token::QuotedName(name) => {
                    let escaped = self.escape_name(name);
                    output.push_str(&escaped);
                }
                Token::NamePlaceholder => {
                    let (index, arg) = next_arg("$")?;
                    let name = string_argument(index, *arg)?;
                    let escaped = self.escape_path(&name)?;
                    output.push_str(&escaped);
                }
                Token::ValuePlaceholder => {
                    let (index, arg) = next_arg("?")?;
                    let value = self.value_argument(index, *arg, nullable)?;
                    let alias = self.value_alias(value);
                    output.push_str(&alias);
                }
                Token::MagicSlot => {
                    let (index, arg) = next_arg("alias slot")?;
                    let alias = string_argument(index, *arg)?;
                    if !self.names.contains_key(&alias) {
                        return Err(Error::expression(format!(
                            "argument {index}: {alias:?} is not a name alias"
                        )));
                    }
                    output.push_str(&alias);
                }
            }
        }
        if let Some((index, _)) = args.next() {
            return Err(Error::expression(format!(
                "too many arguments for {fragment:?}: argument {index} is unused"
            )));
        }
        Ok(output)
    }

    fn value_argument(
        &self,
        index: usize,
        arg: &dyn Marshal,
        nullable: bool,
    ) -> Result<types::AttributeValue> {
        let flags = if nullable { Flags::NULL } else { Flags::NONE };
        match arg.marshal(flags).map_err(|err| err.at_index(index))? {
            Some(value) => Ok(value),
            None if nullable => Ok(types::AttributeValue::Null(true)),
            None => Err(Error::expression(format!(
                "argument {index}: value encodes to nothing"
            ))),
        }
    }

    /// The name alias table, `None` when empty.
    pub fn names(&self) -> Option<collections::HashMap<String, String>> {
        (!self.names.is_empty()).then(|| self.names.clone())
    }

    /// The value alias table, `None` when empty.
    pub fn values(&self) -> Option<collections::HashMap<String, types::AttributeValue>> {
        (!self.values.is_empty()).then(|| self.values.clone())
    }

    /// Runs `step` unless an earlier step failed, keeping the first error.
    pub(crate) fn sticky(&mut self, step: impl FnOnce(&mut Self) -> Result<()>) {
        if self.err.is_some() {
            return;
        }
        if let Err(err) = step(self) {
            self.err = Some(err);
        }
    }

    /// The first error recorded by [`sticky`](Self::sticky).
    pub(crate) fn check(&mut self) -> Result<()> {
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn string_argument(index: usize, arg: &dyn Marshal) -> Result<String> {
    match arg.marshal(Flags::NONE).map_err(|err| err.at_index(index))? {
        Some(types::AttributeValue::S(name)) => Ok(name),
        _ => Err(Error::expression(format!(
            "argument {index}: expected a string attribute name"
        ))),
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits `Name[1][2]` into `Name` and `[1][2]`; anything else is all name.
fn split_indexes(segment: &str) -> (&str, &str) {
    let Some(start) = segment.find('[') else {
        return (segment, "");
    };
    let indexes = &segment[start..];
    let well_formed = indexes
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .is_some_and(|inner| {
            inner
                .split("][")
                .all(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
        });
    if well_formed {
        (&segment[..start], indexes)
    } else {
        (segment, "")
    }
}

/// Condition fragments joined with `AND`, each wrapped in parentheses.
#[derive(Clone, Debug, Default)]
pub(crate) struct Conjunction(Vec<String>);

impl Conjunction {
    pub(crate) fn push(&mut self, expression: String) {
        self.0.push(format!("({expression})"));
    }

    pub(crate) fn render(&self) -> Option<String> {
        (!self.0.is_empty()).then(|| self.0.join(" AND "))
    }
}
