use super::{Marshal, Unmarshal};
use crate::{
    Error, Result,
    attribute::{Flags, SetMember},
};

use aws_sdk_dynamodb::types;
use chrono::{DateTime, SecondsFormat, Utc};

/// A timestamp that always encodes as seconds since the epoch, as DynamoDB TTL
/// attributes require.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UnixTime(pub DateTime<Utc>);

impl UnixTime {
    /// The timestamp `seconds` after the epoch, if representable.
    pub fn from_secs(seconds: i64) -> Option<Self> {
        DateTime::from_timestamp(seconds, 0).map(Self)
    }

    /// Seconds since the epoch.
    pub fn secs(self) -> i64 {
        self.0.timestamp()
    }
}

impl From<DateTime<Utc>> for UnixTime {
    fn from(time: DateTime<Utc>) -> Self {
        Self(time)
    }
}

fn rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_seconds(number: &str) -> Result<DateTime<Utc>> {
    let seconds: f64 = number.parse().map_err(|err| {
        Error::unmarshal(format!("cannot unmarshal N {number:?} into a timestamp: {err}"))
    })?;
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        .ok_or_else(|| Error::unmarshal(format!("timestamp {number} is out of range")))
}

impl Marshal for DateTime<Utc> {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        if !flags.contains(Flags::UNIX_TIME) {
            return Ok(Some(types::AttributeValue::S(rfc3339(self))));
        }
        if self.is_empty_value() {
            return Ok(flags.empty_value());
        }
        Ok(Some(types::AttributeValue::N(self.timestamp().to_string())))
    }

    fn is_empty_value(&self) -> bool {
        *self == DateTime::<Utc>::default()
    }

    fn marshal_set_member(&self, flags: Flags) -> Result<Option<SetMember>> {
        let member = if flags.contains(Flags::UNIX_TIME) {
            SetMember::Number(self.timestamp().to_string())
        } else {
            SetMember::String(rfc3339(self))
        };
        Ok(Some(member))
    }
}

impl Unmarshal for DateTime<Utc> {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        match value {
            types::AttributeValue::S(string) => {
                *self = DateTime::parse_from_rfc3339(string)
                    .map_err(|err| {
                        Error::unmarshal(format!(
                            "cannot unmarshal S {string:?} into a timestamp: {err}"
                        ))
                    })?
                    .with_timezone(&Utc);
            }
            types::AttributeValue::N(number) => *self = parse_seconds(number)?,
            types::AttributeValue::Null(_) => self.zero(),
            _ => return Err(Error::cannot_unmarshal::<Self>(value)),
        }
        Ok(())
    }
}

impl Marshal for UnixTime {
    fn marshal(&self, flags: Flags) -> Result<Option<types::AttributeValue>> {
        self.0.marshal(flags | Flags::UNIX_TIME)
    }

    fn is_empty_value(&self) -> bool {
        self.0.is_empty_value()
    }

    fn marshal_set_member(&self, flags: Flags) -> Result<Option<SetMember>> {
        self.0.marshal_set_member(flags | Flags::UNIX_TIME)
    }

    fn key_type() -> Option<types::ScalarAttributeType> {
        Some(types::ScalarAttributeType::N)
    }
}

impl Unmarshal for UnixTime {
    fn unmarshal(&mut self, value: &types::AttributeValue) -> Result<()> {
        self.0.unmarshal(value)
    }
}
