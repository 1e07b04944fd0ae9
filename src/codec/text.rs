use super::{Marshal, Unmarshal, scalar};
use crate::{
    Error, Result,
    attribute::{Flags, SetMember},
};

use aws_sdk_dynamodb::types;
use std::{fmt, str};

/// Encodes the wrapped value as a string through `Display` and `FromStr`.
///
/// `Text<T>` also works as a map key, and as a set member. It starts out
/// empty so that `T` needs no `Default`; an empty `Text` encodes like an
/// empty string.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Text<T>(Option<T>);

impl<T> Text<T> {
    /// Wraps `value`.
    pub fn new(value: T) -> Self {
        Self(Some(value))
    }

    /// The wrapped value, unless nothing was decoded yet.
    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Unwraps the value.
    pub fn into_inner(self) -> Option<T> {
        self.0
    }
}

impl<T> Default for Text<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> From<T> for Text<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Display> Text<T> {
    pub(super) fn text(&self) -> String {
        self.0.as_ref().map(ToString::to_string).unwrap_or_default()
    }
}

pub(super) fn parse<T>(text: &str) -> Result<T>
where
    T: str::FromStr,
    T::Err: fmt::Display,
{
    text.parse().map_err(|err| {
        Error::unmarshal(format!(
            "cannot parse {text:?} as {}: {err}",
            std::any::type_name::<T>()
        ))
    })
}

impl<T: fmt::Display> Marshal for Text<T> {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        Ok(scalar::marshal_string(&self.text(), flags))
    }

    fn is_empty_value(&self) -> bool {
        self.text().is_empty()
    }

    fn marshal_set_member(&self, _flags: Flags) -> Result<Option<SetMember>> {
        Ok(self.0.as_ref().map(|value| SetMember::String(value.to_string())))
    }

    fn key_type() -> Option<types::ScalarAttributeType> {
        Some(types::ScalarAttributeType::S)
    }
}

impl<T> Unmarshal for Text<T>
where
    T: str::FromStr,
    T::Err: fmt::Display,
{
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::S(text) => self.0 = Some(parse(text)?),
            types::AttributeValue::Null(_) => self.zero(),
            _ => return Err(Error::cannot_unmarshal::<Self>(value)),
        }
        Ok(())
    }
}
