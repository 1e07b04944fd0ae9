use super::{ItemMarshal, ItemUnmarshal, Marshal, Unmarshal};
use crate::{
    Error, Result,
    attribute::{Flags, Item},
};

use aws_sdk_dynamodb::types;
use serde::{Serialize, de::DeserializeOwned};

/// Encodes the wrapped value with `serde_dynamo` instead of this crate's codec.
///
/// Use it for types that already derive `Serialize`/`Deserialize`; field tags
/// and flags do not apply inside.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Serde<T>(pub T);

impl<T: Serialize> Marshal for Serde<T> {
    fn marshal(&self, _flags: Flags) -> Result<Option<types::AttributeValue>> {
        serde_dynamo::to_attribute_value(&self.0)
            .map(Some)
            .map_err(Error::serde)
    }
}

impl<T: DeserializeOwned + Default> Unmarshal for Serde<T> {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        self.0 = serde_dynamo::from_attribute_value(value.clone()).map_err(Error::serde)?;
        Ok(())
    }
}

impl<T: Serialize> ItemMarshal for Serde<T> {
    fn marshal_item(&self) -> Result<Item> {
        serde_dynamo::to_item(&self.0).map_err(Error::serde)
    }
}

impl<T: DeserializeOwned + Default> ItemUnmarshal for Serde<T> {
    fn unmarshal_item(&mut self, item: &Item) -> Result<()> {
        self.0 = serde_dynamo::from_item(item.clone()).map_err(Error::serde)?;
        Ok(())
    }
}
