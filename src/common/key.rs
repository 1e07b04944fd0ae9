use crate::{
    Error, Result,
    attribute::Item,
    codec::{self, Marshal},
};

use aws_sdk_dynamodb::types;

/// A named primary key component.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Key {
    pub(crate) name: String,
    pub(crate) value: types::AttributeValue,
}

impl Key {
    pub(crate) fn new<T: Marshal + ?Sized>(name: &str, value: &T) -> Result<Self> {
        let value = codec::marshal_key(name, value)?;
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

/// Primary key (partition key and optional sort key).
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Keys {
    pub(crate) partition_key: Option<Key>,
    pub(crate) sort_key: Option<Key>,
}

impl Keys {
    pub(crate) fn partition<T: Marshal + ?Sized>(name: &str, value: &T) -> Result<Self> {
        Ok(Self {
            partition_key: Some(Key::new(name, value)?),
            sort_key: None,
        })
    }

    pub(crate) fn set_sort<T: Marshal + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        self.sort_key = Some(Key::new(name, value)?);
        Ok(())
    }
}

impl TryFrom<Keys> for Item {
    type Error = Error;

    fn try_from(keys: Keys) -> Result<Self> {
        let partition_key = keys
            .partition_key
            .ok_or_else(|| Error::marshal("missing partition key"))?;
        let mut item = Self::from([(partition_key.name, partition_key.value)]);
        if let Some(sort_key) = keys.sort_key {
            item.insert(sort_key.name, sort_key.value);
        }
        Ok(item)
    }
}
