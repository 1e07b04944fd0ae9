//! Attribute value codec.
//!
//! [`Marshal`] encodes a value into an attribute value under a set of
//! [`Flags`]; [`Unmarshal`] decodes an attribute value into an existing
//! destination, overwriting or zeroing whatever it held. Records (see
//! [`crate::record!`]) implement both through their cached [`crate::plan::Plan`].
//!
//! Which implementation a type carries decides how it is encoded:
//!
//! 1. [`Serde`] hands the value to `serde_dynamo`.
//! 2. [`ItemMarshal`]/[`ItemUnmarshal`] written by hand, exposed as an
//!    attribute with [`crate::item_attribute!`].
//! 3. A hand-written [`Marshal`]/[`Unmarshal`].
//! 4. [`Text`] goes through `Display`/`FromStr`.
//! 5. Timestamps honour [`Flags::UNIX_TIME`]; [`UnixTime`] always does.
//! 6. The built-in mappings of this module.

mod bypass;
mod collection;
mod pointer;
mod scalar;
mod text;
mod time;
mod value;

pub use bypass::Serde;
pub use collection::MapKey;
pub use text::Text;
pub use time::UnixTime;
pub use value::Value;

use crate::{
    Error, Result,
    attribute::{Flags, Item, SetMember},
};

use aws_sdk_dynamodb::types;
use std::{collections, hash};

/// Encodes a value into an attribute value.
pub trait Marshal {
    /// Encodes `self`. `Ok(None)` means the attribute is left out.
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>>;

    /// Whether `self` counts as empty for `omitempty`.
    fn is_empty_value(&self) -> bool {
        false
    }

    /// Encodes `self` as a member of a set attribute.
    ///
    /// `Ok(None)` skips the member.
    fn marshal_set_member(&self, flags: Flags) -> Result<Option<SetMember>> {
        let _ = flags;
        Err(Error::cannot_marshal::<Self>("a set member"))
    }

    /// Truthiness of `self` when it is the value of a map encoded as a set.
    fn set_flag(&self) -> Option<bool> {
        None
    }

    /// Views a slice of `Self` as bytes; only `u8` does.
    fn byte_slice(values: &[Self]) -> Option<&[u8]>
    where
        Self: Sized,
    {
        let _ = values;
        None
    }

    /// The key attribute type of `Self`, for table definitions.
    fn key_type() -> Option<types::ScalarAttributeType>
    where
        Self: Sized,
    {
        None
    }
}

/// Decodes an attribute value into an existing destination.
pub trait Unmarshal: Default {
    /// Overwrites `self` with `value`. `NULL` resets `self` to its zero value.
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()>;

    /// Resets `self` to its zero value.
    fn zero(&mut self) {
        *self = Self::default();
    }

    /// Builds a `Vec<Self>` out of raw bytes; only `u8` does.
    fn vec_from_bytes(bytes: &[u8]) -> Option<Vec<Self>> {
        let _ = bytes;
        None
    }

    /// The value stored for each member when a set decodes into a map.
    fn set_flag_value() -> Option<Self> {
        None
    }
}

/// Encodes a whole item.
pub trait ItemMarshal {
    /// Encodes `self` into an item.
    fn marshal_item(&self) -> Result<Item>;
}

/// Decodes a whole item.
pub trait ItemUnmarshal: Default {
    /// Overwrites `self` with `item`; attributes missing from `item` are zeroed.
    fn unmarshal_item(&mut self, item: &Item) -> Result<()>;
}

/// Encodes `value` with no flags.
pub fn marshal<T: Marshal + ?Sized>(value: &T) -> Result<Option<types::AttributeValue>> {
    value.marshal(Flags::NONE)
}

/// Encodes `value` with `flags`.
pub fn marshal_with<T: Marshal + ?Sized>(
    value: &T,
    flags: Flags,
) -> Result<Option<types::AttributeValue>> {
    value.marshal(flags)
}

/// Decodes `value` into a fresh `T`.
pub fn unmarshal<T: Unmarshal>(value: &types::AttributeValue) -> Result<T> {
    let mut out = T::default();
    out.unmarshal(value)?;
    Ok(out)
}

/// Encodes `item` into an item.
pub fn marshal_item<T: ItemMarshal + ?Sized>(item: &T) -> Result<Item> {
    item.marshal_item()
}

/// Decodes `item` into a fresh `T`.
pub fn unmarshal_item<T: ItemUnmarshal>(item: &Item) -> Result<T> {
    let mut out = T::default();
    out.unmarshal_item(item)?;
    Ok(out)
}

/// Decodes `item` into `out`, zeroing whatever `item` lacks.
pub fn unmarshal_item_into<T: ItemUnmarshal>(item: &Item, out: &mut T) -> Result<()> {
    out.unmarshal_item(item)
}

/// Encodes an [`ItemMarshal`] type as a map attribute. Used by
/// [`crate::item_attribute!`].
#[doc(hidden)]
pub fn marshal_item_attribute<T: ItemMarshal + ?Sized>(
    value: &T,
    flags: Flags,
) -> Result<Option<types::AttributeValue>> {
    let item = value.marshal_item()?;
    if item.is_empty() && !flags.contains(Flags::ALLOW_EMPTY) {
        return Ok(flags.empty_value());
    }
    Ok(Some(types::AttributeValue::M(item)))
}

/// Decodes a map attribute into an [`ItemUnmarshal`] type. Used by
/// [`crate::item_attribute!`].
#[doc(hidden)]
pub fn unmarshal_item_attribute<T: ItemUnmarshal>(
    out: &mut T,
    value: &types::AttributeValue,
) -> Result<()> {
    match value {
        types::AttributeValue::M(item) => out.unmarshal_item(item),
        types::AttributeValue::Null(_) => {
            *out = T::default();
            Ok(())
        }
        _ => Err(Error::cannot_unmarshal::<T>(value)),
    }
}

/// Encodes a key value: keys cannot be dropped or null.
pub(crate) fn marshal_key<T: Marshal + ?Sized>(
    name: &str,
    value: &T,
) -> Result<types::AttributeValue> {
    match value.marshal(Flags::NONE) {
        Ok(Some(types::AttributeValue::Null(_))) | Ok(None) => Err(Error::marshal(
            "key attribute encodes to nothing",
        )
        .in_attribute(name)),
        Ok(Some(value)) => Ok(value),
        Err(err) => Err(err.in_attribute(name)),
    }
}

fn marshal_entries<'a, V>(
    entries: impl Iterator<Item = (&'a String, &'a V)>,
) -> Result<Item>
where
    V: Marshal + 'a,
{
    let mut item = Item::new();
    for (name, value) in entries {
        let value = value
            .marshal(Flags::NONE)
            .map_err(|err| err.in_attribute(name))?;
        if let Some(value) = value {
            item.insert(name.clone(), value);
        }
    }
    Ok(item)
}

fn unmarshal_entries<V, M>(item: &Item) -> Result<M>
where
    V: Unmarshal,
    M: FromIterator<(String, V)>,
{
    item.iter()
        .map(|(name, value)| {
            let mut decoded = V::default();
            decoded
                .unmarshal(value)
                .map_err(|err| err.in_attribute(name))?;
            Ok((name.clone(), decoded))
        })
        .collect()
}

impl<V: Marshal, S> ItemMarshal for collections::HashMap<String, V, S> {
    fn marshal_item(&self) -> Result<Item> {
        marshal_entries(self.iter())
    }
}

impl<V: Marshal> ItemMarshal for collections::BTreeMap<String, V> {
    fn marshal_item(&self) -> Result<Item> {
        marshal_entries(self.iter())
    }
}

impl<V: Marshal, S> ItemMarshal for indexmap::IndexMap<String, V, S> {
    fn marshal_item(&self) -> Result<Item> {
        marshal_entries(self.iter())
    }
}

impl<V, S> ItemUnmarshal for collections::HashMap<String, V, S>
where
    V: Unmarshal,
    S: hash::BuildHasher + Default,
{
    fn unmarshal_item(&mut self, item: &Item) -> Result<()> {
        *self = unmarshal_entries(item)?;
        Ok(())
    }
}

impl<V: Unmarshal> ItemUnmarshal for collections::BTreeMap<String, V> {
    fn unmarshal_item(&mut self, item: &Item) -> Result<()> {
        *self = unmarshal_entries(item)?;
        Ok(())
    }
}

impl<V, S> ItemUnmarshal for indexmap::IndexMap<String, V, S>
where
    V: Unmarshal,
    S: hash::BuildHasher + Default,
{
    fn unmarshal_item(&mut self, item: &Item) -> Result<()> {
        *self = unmarshal_entries(item)?;
        Ok(())
    }
}

impl<T: ItemMarshal + ?Sized> ItemMarshal for &T {
    fn marshal_item(&self) -> Result<Item> {
        (**self).marshal_item()
    }
}

impl<T: ItemMarshal + ?Sized> ItemMarshal for Box<T> {
    fn marshal_item(&self) -> Result<Item> {
        (**self).marshal_item()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_sdk_dynamodb::primitives::Blob;
    use proptest::prelude::*;
    use rstest::rstest;

    fn s(value: &str) -> types::AttributeValue {
        types::AttributeValue::S(value.to_string())
    }

    fn n(value: &str) -> types::AttributeValue {
        types::AttributeValue::N(value.to_string())
    }

    #[rstest]
    #[case::bool_true(marshal(&true), Some(types::AttributeValue::Bool(true)))]
    #[case::int(marshal(&-42i64), Some(n("-42")))]
    #[case::u128(marshal(&u128::MAX), Some(n("340282366920938463463374607431768211455")))]
    #[case::float(marshal(&1.5f64), Some(n("1.5")))]
    #[case::float_integral(marshal(&3.0f64), Some(n("3")))]
    #[case::float_huge(marshal(&1e300f64), Some(n("1e300")))]
    #[case::string(marshal("hello"), Some(s("hello")))]
    #[case::empty_string(marshal(""), None)]
    #[case::empty_string_allowed(marshal_with("", Flags::ALLOW_EMPTY), Some(s("")))]
    #[case::empty_string_null(marshal_with("", Flags::NULL), Some(types::AttributeValue::Null(true)))]
    #[case::bytes(marshal(&vec![1u8, 2]), Some(types::AttributeValue::B(Blob::new(vec![1, 2]))))]
    #[case::empty_bytes(marshal(&Vec::<u8>::new()), None)]
    #[case::byte_array(marshal(&[7u8; 2]), Some(types::AttributeValue::B(Blob::new(vec![7, 7]))))]
    #[case::list(
        marshal(&vec![1, 2]),
        Some(types::AttributeValue::L(vec![n("1"), n("2")]))
    )]
    #[case::list_keeps_null(
        marshal(&vec![String::new(), "a".to_string()]),
        Some(types::AttributeValue::L(vec![types::AttributeValue::Null(true), s("a")]))
    )]
    #[case::list_omit_empty_elem(
        marshal_with(&vec![String::new(), "a".to_string()], Flags::OMIT_EMPTY_ELEM),
        Some(types::AttributeValue::L(vec![s("a")]))
    )]
    #[case::list_allow_empty_elem(
        marshal_with(&vec![String::new()], Flags::ALLOW_EMPTY_ELEM),
        Some(types::AttributeValue::L(vec![s("")]))
    )]
    #[case::allow_empty_elem_stops_at_grandchildren(
        marshal_with(&vec![vec![String::new()], Vec::new()], Flags::ALLOW_EMPTY_ELEM),
        Some(types::AttributeValue::L(vec![
            types::AttributeValue::L(vec![types::AttributeValue::Null(true)]),
            types::AttributeValue::L(Vec::new()),
        ]))
    )]
    #[case::allow_empty_elem_nested_map(
        marshal_with(
            &collections::BTreeMap::from([(
                "inner".to_string(),
                collections::BTreeMap::from([("blank".to_string(), String::new())]),
            )]),
            Flags::ALLOW_EMPTY_ELEM,
        ),
        Some(types::AttributeValue::M(collections::HashMap::from([(
            "inner".to_string(),
            types::AttributeValue::M(collections::HashMap::new()),
        )])))
    )]
    #[case::empty_list(marshal(&Vec::<i32>::new()), None)]
    #[case::empty_list_allowed(
        marshal_with(&Vec::<i32>::new(), Flags::ALLOW_EMPTY),
        Some(types::AttributeValue::L(Vec::new()))
    )]
    #[case::list_as_set(
        marshal_with(&vec!["a", "b", "a"], Flags::SET),
        Some(types::AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]))
    )]
    #[case::empty_list_as_set(marshal_with(&Vec::<String>::new(), Flags::SET), None)]
    #[case::int_list_as_set(
        marshal_with(&vec![3, 1, 3], Flags::SET),
        Some(types::AttributeValue::Ns(vec!["3".to_string(), "1".to_string()]))
    )]
    #[case::bytes_list_as_set(
        marshal_with(&vec![vec![1u8], vec![2u8]], Flags::SET),
        Some(types::AttributeValue::Bs(vec![Blob::new(vec![1]), Blob::new(vec![2])]))
    )]
    #[case::none(marshal(&None::<i32>), None)]
    #[case::none_null(marshal_with(&None::<i32>, Flags::NULL), Some(types::AttributeValue::Null(true)))]
    #[case::some(marshal(&Some(5u8)), Some(n("5")))]
    fn test_marshal(
        #[case] actual: Result<Option<types::AttributeValue>>,
        #[case] expected: Option<types::AttributeValue>,
    ) {
        assert_eq!(actual.unwrap(), expected);
    }

    #[test]
    fn test_marshal_map() {
        let map = collections::HashMap::from([
            ("a".to_string(), 1),
            ("b".to_string(), 0),
        ]);
        let actual = marshal(&map).unwrap();
        let expected = types::AttributeValue::M(collections::HashMap::from([
            ("a".to_string(), n("1")),
            ("b".to_string(), n("0")),
        ]));
        assert_eq!(actual, Some(expected));

        let actual = marshal_with(&map, Flags::OMIT_EMPTY_ELEM).unwrap();
        let expected =
            types::AttributeValue::M(collections::HashMap::from([("a".to_string(), n("1"))]));
        assert_eq!(actual, Some(expected));
    }

    #[test]
    fn test_marshal_map_as_set() {
        let map = collections::BTreeMap::from([
            ("a".to_string(), true),
            ("b".to_string(), false),
            ("c".to_string(), true),
        ]);
        let actual = marshal_with(&map, Flags::SET).unwrap();
        let expected = types::AttributeValue::Ss(vec!["a".to_string(), "c".to_string()]);
        assert_eq!(actual, Some(expected));

        let map = collections::BTreeMap::from([("a".to_string(), false)]);
        assert_eq!(marshal_with(&map, Flags::SET).unwrap(), None);
        assert_eq!(
            marshal_with(&map, Flags::SET | Flags::NULL).unwrap(),
            Some(types::AttributeValue::Null(true))
        );
    }

    #[test]
    fn test_marshal_map_as_set_requires_flag_values() {
        let map = collections::BTreeMap::from([("a".to_string(), 1)]);
        assert!(marshal_with(&map, Flags::SET).is_err());
    }

    #[test]
    fn test_marshal_hash_set() {
        let set = collections::BTreeSet::from([2u32, 1]);
        let actual = marshal(&set).unwrap();
        let expected = types::AttributeValue::Ns(vec!["1".to_string(), "2".to_string()]);
        assert_eq!(actual, Some(expected));
        assert_eq!(marshal(&collections::BTreeSet::<u32>::new()).unwrap(), None);
    }

    #[test]
    fn test_marshal_rejects_non_finite() {
        let err = marshal(&f64::NAN).unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_marshal_list_error_path() {
        let values = vec![1.0, f64::INFINITY];
        let err = marshal(&values).unwrap_err();
        assert_eq!(
            err.path().unwrap().segments(),
            &[crate::error::PathSegment::Index(1)]
        );
    }

    #[rstest]
    #[case::number_into_string(n("5"), "5".to_string())]
    #[case::string(s("x"), "x".to_string())]
    #[case::null(types::AttributeValue::Null(true), String::new())]
    fn test_unmarshal_string(#[case] value: types::AttributeValue, #[case] expected: String) {
        let mut actual = "previous".to_string();
        actual.unmarshal(&value).unwrap();
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case::overflow(n("300"))]
    #[case::negative(n("-1"))]
    #[case::fraction(n("1.5"))]
    #[case::wrong_shape(s("1"))]
    fn test_unmarshal_u8_fails(#[case] value: types::AttributeValue) {
        assert!(unmarshal::<u8>(&value).is_err());
    }

    #[test]
    fn test_unmarshal_error_message() {
        let err = unmarshal::<bool>(&n("1")).unwrap_err();
        assert_eq!(err.to_string(), "dynamo: unmarshal: cannot unmarshal N into bool");
    }

    #[test]
    fn test_unmarshal_list_replaces_contents() {
        let mut values = vec![9, 9, 9];
        values
            .unmarshal(&types::AttributeValue::L(vec![n("1")]))
            .unwrap();
        assert_eq!(values, vec![1]);
    }

    #[test]
    fn test_unmarshal_set_into_list() {
        let value = types::AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            unmarshal::<Vec<String>>(&value).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_unmarshal_array() {
        let value = types::AttributeValue::L(vec![n("1"), n("2")]);
        let mut array = [7, 7, 7];
        array.unmarshal(&value).unwrap();
        assert_eq!(array, [1, 2, 0]);

        let value = types::AttributeValue::L(vec![n("1"), n("2"), n("3")]);
        let mut array = [0; 2];
        assert!(array.unmarshal(&value).is_err());

        let value = types::AttributeValue::B(Blob::new(vec![1, 2]));
        let mut array = [0u8; 4];
        array.unmarshal(&value).unwrap();
        assert_eq!(array, [1, 2, 0, 0]);
    }

    #[test]
    fn test_unmarshal_set_into_flag_map() {
        let value = types::AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]);
        let actual: collections::HashMap<String, bool> = unmarshal(&value).unwrap();
        assert_eq!(
            actual,
            collections::HashMap::from([("a".to_string(), true), ("b".to_string(), true)])
        );
        let actual: collections::BTreeMap<String, ()> = unmarshal(&value).unwrap();
        assert_eq!(actual.len(), 2);
        assert!(unmarshal::<collections::HashMap<String, i32>>(&value).is_err());
    }

    #[test]
    fn test_unmarshal_map_replaces_entries() {
        let mut map = collections::HashMap::from([("stale".to_string(), 1)]);
        let value =
            types::AttributeValue::M(collections::HashMap::from([("fresh".to_string(), n("2"))]));
        map.unmarshal(&value).unwrap();
        assert_eq!(map, collections::HashMap::from([("fresh".to_string(), 2)]));
    }

    #[test]
    fn test_unmarshal_map_error_path() {
        let value =
            types::AttributeValue::M(collections::HashMap::from([("bad".to_string(), s("x"))]));
        let err = unmarshal::<collections::HashMap<String, i32>>(&value).unwrap_err();
        assert_eq!(
            err.to_string(),
            "dynamo: unmarshal bad: cannot unmarshal S into i32"
        );
    }

    #[test]
    fn test_unmarshal_option() {
        let mut value = Some(3);
        value.unmarshal(&types::AttributeValue::Null(true)).unwrap();
        assert_eq!(value, None);
        value.unmarshal(&n("4")).unwrap();
        assert_eq!(value, Some(4));
    }

    #[test]
    fn test_item_maps() {
        let item = collections::BTreeMap::from([
            ("a".to_string(), "x".to_string()),
            ("b".to_string(), String::new()),
        ]);
        let encoded = marshal_item(&item).unwrap();
        assert_eq!(encoded, Item::from([("a".to_string(), s("x"))]));
        let decoded: collections::BTreeMap<String, String> = unmarshal_item(&encoded).unwrap();
        assert_eq!(
            decoded,
            collections::BTreeMap::from([("a".to_string(), "x".to_string())])
        );
    }

    #[derive(Debug, Default, PartialEq)]
    struct Coordinates {
        lat: f64,
        lng: f64,
    }

    impl ItemMarshal for Coordinates {
        fn marshal_item(&self) -> Result<Item> {
            Ok(Item::from([
                ("pos".to_string(), s(&format!("{},{}", self.lat, self.lng))),
            ]))
        }
    }

    impl ItemUnmarshal for Coordinates {
        fn unmarshal_item(&mut self, item: &Item) -> Result<()> {
            let Some(types::AttributeValue::S(pos)) = item.get("pos") else {
                return Err(Error::unmarshal("missing pos"));
            };
            let (lat, lng) = pos
                .split_once(',')
                .ok_or_else(|| Error::unmarshal("malformed pos"))?;
            self.lat = lat.parse().map_err(Error::custom)?;
            self.lng = lng.parse().map_err(Error::custom)?;
            Ok(())
        }
    }

    crate::item_attribute!(Coordinates);

    #[test]
    fn test_item_attribute() {
        let coordinates = Coordinates {
            lat: 1.5,
            lng: -2.0,
        };
        let encoded = marshal(&coordinates).unwrap().unwrap();
        assert_eq!(
            encoded,
            types::AttributeValue::M(Item::from([("pos".to_string(), s("1.5,-2"))]))
        );
        assert_eq!(unmarshal::<Coordinates>(&encoded).unwrap(), coordinates);
        assert!(unmarshal::<Coordinates>(&s("1,2")).is_err());
    }

    #[test]
    fn test_marshal_key_rejects_empty() {
        assert!(marshal_key("ID", "").is_err());
        assert_eq!(marshal_key("ID", &1).unwrap(), n("1"));
    }

    proptest! {
        #[test]
        fn prop_integers_round_trip(value in any::<i64>()) {
            let encoded = marshal(&value).unwrap().unwrap();
            prop_assert_eq!(unmarshal::<i64>(&encoded).unwrap(), value);
        }

        #[test]
        fn prop_floats_round_trip(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let encoded = marshal(&value).unwrap().unwrap();
            prop_assert_eq!(unmarshal::<f64>(&encoded).unwrap(), value);
        }

        #[test]
        fn prop_string_lists_round_trip(values in prop::collection::vec("[a-z]{0,6}", 0..8)) {
            let decoded = match marshal(&values).unwrap() {
                Some(encoded) => unmarshal::<Vec<String>>(&encoded).unwrap(),
                None => Vec::new(),
            };
            prop_assert_eq!(decoded, values);
        }

        #[test]
        fn prop_sets_never_empty(values in prop::collection::vec("[a-z]{0,3}", 0..6)) {
            for flags in [Flags::SET, Flags::SET | Flags::NULL] {
                match marshal_with(&values, flags).unwrap() {
                    Some(types::AttributeValue::Ss(members)) => {
                        prop_assert!(!members.is_empty());
                        let unique: collections::HashSet<_> = members.iter().collect();
                        prop_assert_eq!(unique.len(), members.len());
                    }
                    Some(types::AttributeValue::Null(_)) => {
                        prop_assert!(flags.contains(Flags::NULL));
                        prop_assert!(values.iter().all(String::is_empty));
                    }
                    None => prop_assert!(values.iter().all(String::is_empty)),
                    Some(other) => prop_assert!(false, "unexpected {:?}", other),
                }
            }
        }

        #[test]
        fn prop_string_maps_round_trip(
            values in prop::collection::btree_map("[a-z]{1,4}", any::<i32>(), 0..6)
        ) {
            let decoded = match marshal(&values).unwrap() {
                Some(encoded) => unmarshal::<collections::BTreeMap<String, i32>>(&encoded).unwrap(),
                None => collections::BTreeMap::new(),
            };
            prop_assert_eq!(decoded, values);
        }
    }
}
