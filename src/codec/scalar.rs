use super::{Marshal, Unmarshal};
use crate::{
    Error, Result,
    attribute::{Flags, SetMember},
};

use aws_sdk_dynamodb::types;
use std::{fmt, str};

fn parse_number<T>(number: &str) -> Result<T>
where
    T: str::FromStr,
    T::Err: fmt::Display,
{
    number.parse().map_err(|err| {
        Error::unmarshal(format!(
            "cannot unmarshal N {number:?} into {}: {err}",
            std::any::type_name::<T>()
        ))
    })
}

/// Renders a float as the shortest decimal text that reads back to it.
pub(super) fn format_float<T>(value: T) -> Result<String>
where
    T: Copy + Into<f64> + fmt::Display + fmt::LowerExp,
{
    let magnitude = value.into().abs();
    if !magnitude.is_finite() {
        return Err(Error::marshal(format!("cannot marshal {value} as a number")));
    }
    if magnitude != 0.0 && !(1e-7..1e21).contains(&magnitude) {
        Ok(format!("{value:e}"))
    } else {
        Ok(value.to_string())
    }
}

pub(super) fn marshal_string(value: &str, flags: Flags) -> Option<types::AttributeValue> {
    if value.is_empty() && !flags.contains(Flags::ALLOW_EMPTY) {
        return flags.empty_value();
    }
    Some(types::AttributeValue::S(value.to_string()))
}

macro_rules! integer_marshal {
    ($ty:ty) => {
        fn marshal(&self, _flags: Flags) -> Result<Option<types::AttributeValue>> {
            Ok(Some(types::AttributeValue::N(self.to_string())))
        }

        fn is_empty_value(&self) -> bool {
            *self == 0
        }

        fn marshal_set_member(&self, _flags: Flags) -> Result<Option<SetMember>> {
            Ok(Some(SetMember::Number(self.to_string())))
        }

        fn key_type() -> Option<types::ScalarAttributeType> {
            Some(types::ScalarAttributeType::N)
        }
    };
}

macro_rules! integer_unmarshal {
    ($ty:ty) => {
        fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
            match value {
                types::AttributeValue::N(number) => {
                    *self = parse_number(number)?;
                    Ok(())
                }
                types::AttributeValue::Null(_) => {
                    self.zero();
                    Ok(())
                }
                _ => Err(Error::cannot_unmarshal::<$ty>(value)),
            }
        }
    };
}

macro_rules! integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Marshal for $ty {
                integer_marshal!($ty);
            }

            impl Unmarshal for $ty {
                integer_unmarshal!($ty);
            }
        )*
    };
}

integer!(i8, i16, i32, i64, i128, isize, u16, u32, u64, u128, usize);

// bytes: a `Vec<u8>` or `[u8; N]` is one binary attribute, not a list
impl Marshal for u8 {
    integer_marshal!(u8);

    fn byte_slice(values: &[Self]) -> Option<&[u8]> {
        Some(values)
    }
}

impl Unmarshal for u8 {
    integer_unmarshal!(u8);

    fn vec_from_bytes(bytes: &[u8]) -> Option<Vec<Self>> {
        Some(bytes.to_vec())
    }
}

macro_rules! float {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Marshal for $ty {
                fn marshal(&self, _flags: Flags) -> Result<Option<types::AttributeValue>> {
                    Ok(Some(types::AttributeValue::N(format_float(*self)?)))
                }

                fn is_empty_value(&self) -> bool {
                    *self == 0.0
                }

                fn marshal_set_member(&self, _flags: Flags) -> Result<Option<SetMember>> {
                    Ok(Some(SetMember::Number(format_float(*self)?)))
                }

                fn key_type() -> Option<types::ScalarAttributeType> {
                    Some(types::ScalarAttributeType::N)
                }
            }

            impl Unmarshal for $ty {
                fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
                    match value {
                        types::AttributeValue::N(number) => {
                            *self = parse_number(number)?;
                            Ok(())
                        }
                        types::AttributeValue::Null(_) => {
                            self.zero();
                            Ok(())
                        }
                        _ => Err(Error::cannot_unmarshal::<$ty>(value)),
                    }
                }
            }
        )*
    };
}

float!(f32, f64);

impl Marshal for bool {
    fn marshal(&self, _flags: Flags) -> Result<Option<types::AttributeValue>> {
        Ok(Some(types::AttributeValue::Bool(*self)))
    }

    fn is_empty_value(&self) -> bool {
        !*self
    }

    fn set_flag(&self) -> Option<bool> {
        Some(*self)
    }
}

impl Unmarshal for bool {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::Bool(flag) => *self = *flag,
            types::AttributeValue::Null(_) => self.zero(),
            _ => return Err(Error::cannot_unmarshal::<Self>(value)),
        }
        Ok(())
    }

    fn set_flag_value() -> Option<Self> {
        Some(true)
    }
}

// unit marks presence in `map<K, ()>` sets
impl Marshal for () {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        Ok(flags.empty_value())
    }

    fn is_empty_value(&self) -> bool {
        true
    }

    fn set_flag(&self) -> Option<bool> {
        Some(true)
    }
}

impl Unmarshal for () {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::Null(_) => Ok(()),
            _ => Err(Error::cannot_unmarshal::<Self>(value)),
        }
    }

    fn set_flag_value() -> Option<Self> {
        Some(())
    }
}

impl Marshal for str {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        Ok(marshal_string(self, flags))
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }

    fn marshal_set_member(&self, _flags: Flags) -> Result<Option<SetMember>> {
        Ok(Some(SetMember::String(self.to_string())))
    }
}

impl Marshal for String {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        self.as_str().marshal(flags)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }

    fn marshal_set_member(&self, flags: Flags) -> Result<Option<SetMember>> {
        self.as_str().marshal_set_member(flags)
    }

    fn key_type() -> Option<types::ScalarAttributeType> {
        Some(types::ScalarAttributeType::S)
    }
}

impl Unmarshal for String {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::S(string) | types::AttributeValue::N(string) => {
                self.clone_from(string);
            }
            types::AttributeValue::Null(_) => self.zero(),
            _ => return Err(Error::cannot_unmarshal::<Self>(value)),
        }
        Ok(())
    }
}

impl Marshal for char {
    fn marshal(&self, _flags: Flags) -> Result<Option<types::AttributeValue>> {
        Ok(Some(types::AttributeValue::S(self.to_string())))
    }

    fn is_empty_value(&self) -> bool {
        *self == char::default()
    }

    fn marshal_set_member(&self, _flags: Flags) -> Result<Option<SetMember>> {
        Ok(Some(SetMember::String(self.to_string())))
    }
}

impl Unmarshal for char {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::S(string) => {
                let mut chars = string.chars();
                match (chars.next(), chars.next()) {
                    (Some(single), None) => *self = single,
                    _ => {
                        return Err(Error::unmarshal(format!(
                            "cannot unmarshal S {string:?} into char"
                        )));
                    }
                }
            }
            types::AttributeValue::Null(_) => self.zero(),
            _ => return Err(Error::cannot_unmarshal::<Self>(value)),
        }
        Ok(())
    }
}

impl Marshal for types::AttributeValue {
    fn marshal(&self, _flags: Flags) -> Result<Option<types::AttributeValue>> {
        Ok(Some(self.clone()))
    }

    fn is_empty_value(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::S(string) => string.is_empty(),
            Self::B(blob) => blob.as_ref().is_empty(),
            Self::L(list) => list.is_empty(),
            Self::M(map) => map.is_empty(),
            _ => false,
        }
    }

    fn marshal_set_member(&self, _flags: Flags) -> Result<Option<SetMember>> {
        let member = match self {
            Self::N(number) => SetMember::Number(number.clone()),
            Self::S(string) => SetMember::String(string.clone()),
            Self::B(blob) => SetMember::Binary(blob.as_ref().to_vec()),
            _ => return Err(Error::cannot_marshal::<Self>("a set member")),
        };
        Ok(Some(member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::zero(0.0, "0")]
    #[case::fraction(0.1, "0.1")]
    #[case::negative(-2.5, "-2.5")]
    #[case::large(1e21, "1e21")]
    #[case::tiny(1.5e-9, "1.5e-9")]
    #[case::below_threshold(123456789.0, "123456789")]
    fn test_format_float(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_float(value).unwrap(), expected);
    }

    #[test]
    fn test_unit_marks_presence() {
        assert_eq!(().marshal(Flags::NONE).unwrap(), None);
        assert_eq!(().set_flag(), Some(true));
    }

    #[test]
    fn test_char_rejects_long_strings() {
        let mut value = 'a';
        let err = value
            .unmarshal(&types::AttributeValue::S("ab".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("into char"));
    }
}
