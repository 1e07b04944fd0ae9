//! Attribute value shapes, encoding flags and set members.

use aws_sdk_dynamodb::{primitives::Blob, types};
use std::{collections, fmt, ops};

pub use types::AttributeValue;

/// An item: attribute names mapped to attribute values.
pub type Item = collections::HashMap<String, types::AttributeValue>;

/// The tag of an attribute value's active variant.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Shape {
    /// Binary.
    B,
    /// String.
    S,
    /// Number.
    N,
    /// Boolean.
    Bool,
    /// List.
    L,
    /// Map.
    M,
    /// Number set.
    Ns,
    /// String set.
    Ss,
    /// Binary set.
    Bs,
    /// Explicit null.
    Null,
    /// Wildcard used as a decoder table fallback. Never produced by [`Shape::of`].
    Any,
}

impl Shape {
    /// The shape of `value`, or `None` for variants unknown to this crate.
    pub fn of(value: &types::AttributeValue) -> Option<Self> {
        let shape = match value {
            types::AttributeValue::B(_) => Self::B,
            types::AttributeValue::S(_) => Self::S,
            types::AttributeValue::N(_) => Self::N,
            types::AttributeValue::Bool(_) => Self::Bool,
            types::AttributeValue::L(_) => Self::L,
            types::AttributeValue::M(_) => Self::M,
            types::AttributeValue::Ns(_) => Self::Ns,
            types::AttributeValue::Ss(_) => Self::Ss,
            types::AttributeValue::Bs(_) => Self::Bs,
            types::AttributeValue::Null(_) => Self::Null,
            _ => return None,
        };
        Some(shape)
    }

    /// The wire name of the shape.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::S => "S",
            Self::N => "N",
            Self::Bool => "BOOL",
            Self::L => "L",
            Self::M => "M",
            Self::Ns => "NS",
            Self::Ss => "SS",
            Self::Bs => "BS",
            Self::Null => "NULL",
            Self::Any => "_",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding flags, set per field through tags or per call.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Flags(u16);

impl Flags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Encode lists and `map<K, bool>` as sets.
    pub const SET: Self = Self(1);
    /// Drop the field when its value is empty.
    pub const OMIT_EMPTY: Self = Self(1 << 1);
    /// Drop empty elements of lists and maps.
    pub const OMIT_EMPTY_ELEM: Self = Self(1 << 2);
    /// Emit empty strings, binaries and containers instead of dropping them.
    pub const ALLOW_EMPTY: Self = Self(1 << 3);
    /// Like `ALLOW_EMPTY`, for the direct children of lists and maps.
    pub const ALLOW_EMPTY_ELEM: Self = Self(1 << 4);
    /// Emit NULL instead of dropping absent or empty values.
    pub const NULL: Self = Self(1 << 5);
    /// Encode timestamps as seconds since the epoch.
    pub const UNIX_TIME: Self = Self(1 << 6);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::SET, "set"),
        (Self::OMIT_EMPTY, "omitempty"),
        (Self::OMIT_EMPTY_ELEM, "omitemptyelem"),
        (Self::ALLOW_EMPTY, "allowempty"),
        (Self::ALLOW_EMPTY_ELEM, "allowemptyelem"),
        (Self::NULL, "null"),
        (Self::UNIX_TIME, "unixtime"),
    ];

    /// Whether every flag of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `self` with the flags of `other` cleared.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// The flag named `name` in tag syntax.
    pub fn from_tag_option(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, option)| *option == name)
            .map(|(flag, _)| *flag)
    }

    /// Flags passed down to the direct children of a list, set or map.
    ///
    /// `ALLOW_EMPTY_ELEM` turns into `ALLOW_EMPTY` for the children and stops
    /// there; `UNIX_TIME` is inherited as-is.
    #[must_use]
    pub const fn for_elements(self) -> Self {
        let mut flags = Self::NONE;
        if self.contains(Self::ALLOW_EMPTY_ELEM) {
            flags.0 |= Self::ALLOW_EMPTY.0;
        }
        if self.contains(Self::UNIX_TIME) {
            flags.0 |= Self::UNIX_TIME.0;
        }
        flags
    }

    /// What an empty value turns into under these flags.
    pub(crate) fn empty_value(self) -> Option<types::AttributeValue> {
        if self.contains(Self::NULL) {
            Some(types::AttributeValue::Null(true))
        } else {
            None
        }
    }
}

impl ops::BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "Flags({})", names.join("|"))
    }
}

/// A single member of a set attribute.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum SetMember {
    /// Member of a number set, in canonical decimal text.
    Number(String),
    /// Member of a string set.
    String(String),
    /// Member of a binary set.
    Binary(Vec<u8>),
}

impl SetMember {
    fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "NS",
            Self::String(_) => "SS",
            Self::Binary(_) => "BS",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::String(string) => string.is_empty(),
            Self::Binary(bytes) => bytes.is_empty(),
        }
    }

    /// The member as a scalar attribute value.
    pub fn into_attribute_value(self) -> types::AttributeValue {
        match self {
            Self::Number(number) => types::AttributeValue::N(number),
            Self::String(string) => types::AttributeValue::S(string),
            Self::Binary(bytes) => types::AttributeValue::B(Blob::new(bytes)),
        }
    }

    /// Splits a set attribute value into its members.
    pub fn members_of(value: &types::AttributeValue) -> Option<Vec<Self>> {
        let members = match value {
            types::AttributeValue::Ns(numbers) => {
                numbers.iter().cloned().map(Self::Number).collect()
            }
            types::AttributeValue::Ss(strings) => {
                strings.iter().cloned().map(Self::String).collect()
            }
            types::AttributeValue::Bs(blobs) => blobs
                .iter()
                .map(|blob| Self::Binary(blob.as_ref().to_vec()))
                .collect(),
            _ => return None,
        };
        Some(members)
    }
}

/// Builds a set attribute value out of members.
///
/// Empty members are skipped, duplicates collapse keeping the first
/// occurrence, and an empty result follows [`Flags::NULL`].
pub(crate) fn collect_set(
    members: impl IntoIterator<Item = SetMember>,
    flags: Flags,
) -> crate::Result<Option<types::AttributeValue>> {
    let mut seen = collections::HashSet::new();
    let mut unique = Vec::new();
    for member in members {
        if member.is_empty() {
            continue;
        }
        if let Some(first) = unique.first() {
            if SetMember::kind(first) != member.kind() {
                return Err(crate::Error::marshal(format!(
                    "set mixes {} and {} members",
                    SetMember::kind(first),
                    member.kind()
                )));
            }
        }
        if seen.insert(member.clone()) {
            unique.push(member);
        }
    }
    let Some(first) = unique.first() else {
        return Ok(flags.empty_value());
    };
    let value = match first {
        SetMember::Number(_) => types::AttributeValue::Ns(
            unique
                .into_iter()
                .filter_map(|member| match member {
                    SetMember::Number(number) => Some(number),
                    _ => None,
                })
                .collect(),
        ),
        SetMember::String(_) => types::AttributeValue::Ss(
            unique
                .into_iter()
                .filter_map(|member| match member {
                    SetMember::String(string) => Some(string),
                    _ => None,
                })
                .collect(),
        ),
        SetMember::Binary(_) => types::AttributeValue::Bs(
            unique
                .into_iter()
                .filter_map(|member| match member {
                    SetMember::Binary(bytes) => Some(Blob::new(bytes)),
                    _ => None,
                })
                .collect(),
        ),
    };
    Ok(Some(value))
}
