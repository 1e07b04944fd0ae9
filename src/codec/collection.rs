use super::{Marshal, Text, Unmarshal};
use crate::{
    Error, Result,
    attribute::{self, Flags, SetMember},
};

use aws_sdk_dynamodb::{primitives::Blob, types};
use std::{collections, fmt, hash, str};

/// Types usable as map keys: they must encode to and from attribute names.
pub trait MapKey: Sized {
    /// The attribute name for `self`.
    fn to_key(&self) -> Result<String>;

    /// Parses an attribute name back into a key.
    fn from_key(key: &str) -> Result<Self>;

    /// Decodes a set member into a key, for maps decoded from sets.
    fn from_member(member: SetMember) -> Result<Self> {
        match member {
            SetMember::String(key) | SetMember::Number(key) => Self::from_key(&key),
            SetMember::Binary(_) => Err(Error::unmarshal(format!(
                "cannot unmarshal a binary set member into map key {}",
                std::any::type_name::<Self>()
            ))),
        }
    }
}

impl MapKey for String {
    fn to_key(&self) -> Result<String> {
        Ok(self.clone())
    }

    fn from_key(key: &str) -> Result<Self> {
        Ok(key.to_string())
    }
}

impl<T> MapKey for Text<T>
where
    T: fmt::Display + str::FromStr,
    T::Err: fmt::Display,
{
    fn to_key(&self) -> Result<String> {
        match self.get() {
            Some(value) => Ok(value.to_string()),
            None => Err(Error::marshal("an empty Text cannot be a map key")),
        }
    }

    fn from_key(key: &str) -> Result<Self> {
        super::text::parse(key).map(Text::new)
    }
}

fn marshal_bytes(bytes: &[u8], flags: Flags) -> Option<types::AttributeValue> {
    if bytes.is_empty() && !flags.contains(Flags::ALLOW_EMPTY) {
        return flags.empty_value();
    }
    Some(types::AttributeValue::B(Blob::new(bytes.to_vec())))
}

fn marshal_members<'a, T>(
    members: impl Iterator<Item = &'a T>,
    flags: Flags,
) -> Result<Option<types::AttributeValue>>
where
    T: Marshal + ?Sized + 'a,
{
    let mut collected = Vec::new();
    for (index, member) in members.enumerate() {
        let member = member
            .marshal_set_member(flags)
            .map_err(|err| err.at_index(index))?;
        collected.extend(member);
    }
    attribute::collect_set(collected, flags)
}

pub(super) fn marshal_sequence<T: Marshal>(
    items: &[T],
    flags: Flags,
) -> Result<Option<types::AttributeValue>> {
    if let Some(bytes) = T::byte_slice(items) {
        return Ok(marshal_bytes(bytes, flags));
    }
    if flags.contains(Flags::SET) {
        return marshal_members(items.iter(), flags);
    }
    if items.is_empty() && !flags.contains(Flags::ALLOW_EMPTY) {
        return Ok(flags.empty_value());
    }
    let omit_empty = flags.contains(Flags::OMIT_EMPTY_ELEM);
    let child_flags = flags.for_elements();
    let mut list = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if omit_empty && item.is_empty_value() {
            continue;
        }
        match item
            .marshal(child_flags)
            .map_err(|err| err.at_index(index))?
        {
            Some(value) => list.push(value),
            None if omit_empty => {}
            None => list.push(types::AttributeValue::Null(true)),
        }
    }
    Ok(Some(types::AttributeValue::L(list)))
}

pub(super) fn marshal_map<'a, K, V>(
    entries: impl ExactSizeIterator<Item = (&'a K, &'a V)>,
    flags: Flags,
) -> Result<Option<types::AttributeValue>>
where
    K: MapKey + 'a,
    V: Marshal + ?Sized + 'a,
{
    if flags.contains(Flags::SET) {
        let mut members = Vec::new();
        for (key, value) in entries {
            match value.set_flag() {
                Some(true) => members.push(SetMember::String(key.to_key()?)),
                Some(false) => {}
                None => return Err(Error::cannot_marshal::<V>("a set flag")),
            }
        }
        return attribute::collect_set(members, flags);
    }
    if entries.len() == 0 && !flags.contains(Flags::ALLOW_EMPTY) {
        return Ok(flags.empty_value());
    }
    let omit_empty = flags.contains(Flags::OMIT_EMPTY_ELEM);
    let child_flags = flags.for_elements();
    let mut map = collections::HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        let key = key.to_key()?;
        if omit_empty && value.is_empty_value() {
            continue;
        }
        let value = value
            .marshal(child_flags)
            .map_err(|err| err.in_attribute(&key))?;
        if let Some(value) = value {
            map.insert(key, value);
        }
    }
    Ok(Some(types::AttributeValue::M(map)))
}

fn unmarshal_element<T: Unmarshal>(index: usize, value: &types::AttributeValue) -> Result<T> {
    let mut element = T::default();
    element
        .unmarshal(value)
        .map_err(|err| err.at_index(index))?;
    Ok(element)
}

/// Decodes a list, a set, or (for byte containers) a binary into elements.
pub(super) fn unmarshal_elements<T, C>(value: &types::AttributeValue) -> Result<C>
where
    T: Unmarshal,
    C: FromIterator<T>,
{
    match value {
        types::AttributeValue::L(list) => list
            .iter()
            .enumerate()
            .map(|(index, value)| unmarshal_element(index, value))
            .collect(),
        types::AttributeValue::B(blob) => match T::vec_from_bytes(blob.as_ref()) {
            Some(bytes) => Ok(bytes.into_iter().collect()),
            None => Err(Error::cannot_unmarshal::<C>(value)),
        },
        _ => match SetMember::members_of(value) {
            Some(members) => members
                .into_iter()
                .enumerate()
                .map(|(index, member)| unmarshal_element(index, &member.into_attribute_value()))
                .collect(),
            None => Err(Error::cannot_unmarshal::<C>(value)),
        },
    }
}

fn unmarshal_entries<K, V, M>(value: &types::AttributeValue) -> Result<M>
where
    K: MapKey,
    V: Unmarshal,
    M: FromIterator<(K, V)>,
{
    if let types::AttributeValue::M(map) = value {
        return map
            .iter()
            .map(|(key, value)| {
                let mut decoded = V::default();
                decoded
                    .unmarshal(value)
                    .map_err(|err| err.in_attribute(key))?;
                Ok((K::from_key(key).map_err(|err| err.in_attribute(key))?, decoded))
            })
            .collect();
    }
    let members = SetMember::members_of(value).ok_or_else(|| Error::cannot_unmarshal::<M>(value))?;
    if V::set_flag_value().is_none() {
        return Err(Error::cannot_unmarshal::<M>(value));
    }
    members
        .into_iter()
        .map(|member| {
            let flag = V::set_flag_value().ok_or_else(|| Error::cannot_unmarshal::<M>(value))?;
            Ok((K::from_member(member)?, flag))
        })
        .collect()
}

impl<T: Marshal> Marshal for Vec<T> {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        marshal_sequence(self, flags)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }

    fn marshal_set_member(&self, _flags: Flags) -> Result<Option<SetMember>> {
        match T::byte_slice(self) {
            Some(bytes) => Ok(Some(SetMember::Binary(bytes.to_vec()))),
            None => Err(Error::cannot_marshal::<Self>("a set member")),
        }
    }

    fn key_type() -> Option<types::ScalarAttributeType> {
        T::byte_slice(&[]).map(|_| types::ScalarAttributeType::B)
    }
}

impl<T: Unmarshal> Unmarshal for Vec<T> {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::Null(_) => self.zero(),
            _ => *self = unmarshal_elements(value)?,
        }
        Ok(())
    }
}

impl<T: Marshal, const N: usize> Marshal for [T; N] {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        marshal_sequence(self, flags)
    }

    fn is_empty_value(&self) -> bool {
        self.iter().all(Marshal::is_empty_value)
    }

    fn marshal_set_member(&self, _flags: Flags) -> Result<Option<SetMember>> {
        match T::byte_slice(self) {
            Some(bytes) => Ok(Some(SetMember::Binary(bytes.to_vec()))),
            None => Err(Error::cannot_marshal::<Self>("a set member")),
        }
    }

    fn key_type() -> Option<types::ScalarAttributeType> {
        T::byte_slice(&[]).map(|_| types::ScalarAttributeType::B)
    }
}

impl<T: Unmarshal, const N: usize> Unmarshal for [T; N]
where
    [T; N]: Default,
{
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        if let types::AttributeValue::Null(_) = value {
            self.zero();
            return Ok(());
        }
        let elements: Vec<T> = unmarshal_elements(value)?;
        if elements.len() > N {
            return Err(Error::unmarshal(format!(
                "cannot unmarshal {} elements into an array of length {N}",
                elements.len()
            )));
        }
        self.zero();
        for (slot, element) in self.iter_mut().zip(elements) {
            *slot = element;
        }
        Ok(())
    }
}

impl<T, S> Marshal for collections::HashSet<T, S>
where
    T: Marshal,
{
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        marshal_members(self.iter(), flags)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T, S> Unmarshal for collections::HashSet<T, S>
where
    T: Unmarshal + Eq + hash::Hash,
    S: hash::BuildHasher + Default,
{
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::Null(_) => self.zero(),
            _ => *self = unmarshal_elements(value)?,
        }
        Ok(())
    }
}

impl<T: Marshal> Marshal for collections::BTreeSet<T> {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        marshal_members(self.iter(), flags)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Unmarshal + Ord> Unmarshal for collections::BTreeSet<T> {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::Null(_) => self.zero(),
            _ => *self = unmarshal_elements(value)?,
        }
        Ok(())
    }
}

impl<K: MapKey, V: Marshal, S> Marshal for collections::HashMap<K, V, S> {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        marshal_map(self.iter(), flags)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> Unmarshal for collections::HashMap<K, V, S>
where
    K: MapKey + Eq + hash::Hash,
    V: Unmarshal,
    S: hash::BuildHasher + Default,
{
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::Null(_) => self.zero(),
            _ => *self = unmarshal_entries(value)?,
        }
        Ok(())
    }
}

impl<K: MapKey, V: Marshal> Marshal for collections::BTreeMap<K, V> {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        marshal_map(self.iter(), flags)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K: MapKey + Ord, V: Unmarshal> Unmarshal for collections::BTreeMap<K, V> {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::Null(_) => self.zero(),
            _ => *self = unmarshal_entries(value)?,
        }
        Ok(())
    }
}

impl<K: MapKey, V: Marshal, S> Marshal for indexmap::IndexMap<K, V, S> {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        marshal_map(self.iter(), flags)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> Unmarshal for indexmap::IndexMap<K, V, S>
where
    K: MapKey + Eq + hash::Hash,
    V: Unmarshal,
    S: hash::BuildHasher + Default,
{
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::Null(_) => self.zero(),
            _ => *self = unmarshal_entries(value)?,
        }
        Ok(())
    }
}
