use super::{Marshal, Unmarshal};
use crate::{
    Result,
    attribute::{Flags, SetMember},
};

use aws_sdk_dynamodb::types;
use std::sync;

macro_rules! forward_marshal {
    () => {
        fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
            (**self).marshal(flags)
        }

        fn is_empty_value(&self) -> bool {
            (**self).is_empty_value()
        }

        fn marshal_set_member(&self, flags: Flags) -> Result<Option<SetMember>> {
            (**self).marshal_set_member(flags)
        }

        fn set_flag(&self) -> Option<bool> {
            (**self).set_flag()
        }
    };
}

impl<T: Marshal + ?Sized> Marshal for &T {
    forward_marshal!();
}

impl<T: Marshal + ?Sized> Marshal for Box<T> {
    forward_marshal!();
}

impl<T: Marshal + ?Sized> Marshal for sync::Arc<T> {
    forward_marshal!();
}

impl<T: Unmarshal> Unmarshal for Box<T> {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        (**self).unmarshal(value)
    }
}

impl<T: Unmarshal + Clone> Unmarshal for sync::Arc<T> {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        sync::Arc::make_mut(self).unmarshal(value)
    }
}

// an absent value is empty; a present one is not, whatever it holds
impl<T: Marshal> Marshal for Option<T> {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        match self {
            Some(value) => value.marshal(flags),
            None => Ok(flags.empty_value()),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.is_none()
    }

    fn marshal_set_member(&self, flags: Flags) -> Result<Option<SetMember>> {
        match self {
            Some(value) => value.marshal_set_member(flags),
            None => Ok(None),
        }
    }

    fn set_flag(&self) -> Option<bool> {
        match self {
            Some(value) => value.set_flag(),
            None => Some(false),
        }
    }

    fn key_type() -> Option<types::ScalarAttributeType> {
        T::key_type()
    }
}

impl<T: Unmarshal> Unmarshal for Option<T> {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::Null(_) => {
                *self = None;
                Ok(())
            }
            _ => self.get_or_insert_with(T::default).unmarshal(value),
        }
    }
}
