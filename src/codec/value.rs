use super::{
    ItemMarshal, ItemUnmarshal, Marshal, Unmarshal,
    collection::{marshal_map, marshal_sequence},
    scalar::{format_float, marshal_string},
};
use crate::{
    Error, Result,
    attribute::{self, Flags, Item, SetMember},
};

use aws_sdk_dynamodb::{primitives::Blob, types};
use std::collections;

/// A dynamically typed attribute value, for data whose shape is not known
/// ahead of time.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// NULL.
    #[default]
    Null,
    /// BOOL.
    Bool(bool),
    /// N.
    Number(f64),
    /// S.
    String(String),
    /// B.
    Bytes(Vec<u8>),
    /// L.
    List(Vec<Value>),
    /// M.
    Map(collections::HashMap<String, Value>),
    /// SS.
    StringSet(Vec<String>),
    /// NS.
    NumberSet(Vec<f64>),
    /// BS.
    BinarySet(Vec<Vec<u8>>),
}

impl Marshal for Value {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        match self {
            Self::Null => Ok(flags.empty_value()),
            Self::Bool(flag) => flag.marshal(flags),
            Self::Number(number) => number.marshal(flags),
            Self::String(string) => Ok(marshal_string(string, flags)),
            Self::Bytes(bytes) => marshal_sequence(bytes, flags),
            Self::List(list) => marshal_sequence(list, flags.without(Flags::SET)),
            Self::Map(map) => marshal_map(map.iter(), flags.without(Flags::SET)),
            Self::StringSet(strings) => attribute::collect_set(
                strings.iter().cloned().map(SetMember::String),
                flags,
            ),
            Self::NumberSet(numbers) => attribute::collect_set(
                numbers
                    .iter()
                    .map(|number| format_float(*number).map(SetMember::Number))
                    .collect::<Result<Vec<_>>>()?,
                flags,
            ),
            Self::BinarySet(blobs) => attribute::collect_set(
                blobs.iter().cloned().map(SetMember::Binary),
                flags,
            ),
        }
    }

    fn is_empty_value(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(_) | Self::Number(_) => false,
            Self::String(string) => string.is_empty(),
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::List(list) => list.is_empty(),
            Self::Map(map) => map.is_empty(),
            Self::StringSet(strings) => strings.is_empty(),
            Self::NumberSet(numbers) => numbers.is_empty(),
            Self::BinarySet(blobs) => blobs.is_empty(),
        }
    }

    fn marshal_set_member(&self, flags: Flags) -> Result<Option<SetMember>> {
        match self {
            Self::Number(number) => number.marshal_set_member(flags),
            Self::String(string) => string.marshal_set_member(flags),
            Self::Bytes(bytes) => bytes.marshal_set_member(flags),
            _ => Err(Error::marshal("only numbers, strings and bytes can be set members")),
        }
    }

    fn set_flag(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            Self::Null => Some(true),
            _ => None,
        }
    }
}

impl Unmarshal for Value {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        *self = match value {
            types::AttributeValue::Null(_) => Self::Null,
            types::AttributeValue::Bool(flag) => Self::Bool(*flag),
            types::AttributeValue::N(number) => Self::Number(super::unmarshal(value).map_err(
                |_| Error::unmarshal(format!("cannot unmarshal N {number:?} into a number")),
            )?),
            types::AttributeValue::S(string) => Self::String(string.clone()),
            types::AttributeValue::B(blob) => Self::Bytes(blob.as_ref().to_vec()),
            types::AttributeValue::L(_) => Self::List(super::unmarshal(value)?),
            types::AttributeValue::M(_) => Self::Map(super::unmarshal(value)?),
            types::AttributeValue::Ss(strings) => Self::StringSet(strings.clone()),
            types::AttributeValue::Ns(_) => Self::NumberSet(super::unmarshal(value)?),
            types::AttributeValue::Bs(blobs) => {
                Self::BinarySet(blobs.iter().map(|blob| blob.as_ref().to_vec()).collect())
            }
            _ => return Err(Error::cannot_unmarshal::<Self>(value)),
        };
        Ok(())
    }
}

impl ItemMarshal for Value {
    fn marshal_item(&self) -> Result<Item> {
        match self.marshal(Flags::NONE)? {
            Some(types::AttributeValue::M(item)) => Ok(item),
            None if self.is_empty_value() => Ok(Item::new()),
            _ => Err(Error::cannot_marshal::<Self>("an item")),
        }
    }
}

impl ItemUnmarshal for Value {
    fn unmarshal_item(&mut self, item: &Item) -> Result<()> {
        self.unmarshal(&types::AttributeValue::M(item.clone()))
    }
}

impl From<&str> for Value {
    fn from(string: &str) -> Self {
        Self::String(string.to_string())
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Self::Number(number)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<Blob> for Value {
    fn from(blob: Blob) -> Self {
        Self::Bytes(blob.into_inner())
    }
}
