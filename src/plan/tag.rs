use crate::attribute::Flags;

/// The role a field plays in the table's primary key.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyRole {
    /// Partition key, tagged `hash`.
    Hash,
    /// Sort key, tagged `range`.
    Range,
}

/// A parsed field tag: `name[,flag...]`, or `-`.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct Tag {
    pub(crate) name: String,
    pub(crate) flags: Flags,
    pub(crate) key: Option<KeyRole>,
}

impl Tag {
    /// Parses the tag of the field `ident`. `None` means the field is skipped.
    pub(crate) fn parse(ident: &str, tag: &str) -> Option<Self> {
        let mut options = tag.split(',');
        let name = options.next().unwrap_or_default().trim();
        if name == "-" {
            return None;
        }
        let name = if name.is_empty() {
            ident.trim_start_matches("r#").to_string()
        } else {
            name.to_string()
        };
        let mut flags = Flags::NONE;
        let mut key = None;
        for option in options.map(str::trim) {
            match option {
                "hash" => key = Some(KeyRole::Hash),
                "range" => key = Some(KeyRole::Range),
                option => {
                    if let Some(flag) = Flags::from_tag_option(option) {
                        flags |= flag;
                    }
                }
            }
        }
        Some(Self { name, flags, key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::identifier("msg", "", Some(("msg", Flags::NONE, None)))]
    #[case::raw_identifier("r#type", "", Some(("type", Flags::NONE, None)))]
    #[case::renamed("user_id", "UserID,hash", Some(("UserID", Flags::NONE, Some(KeyRole::Hash))))]
    #[case::flags_only(
        "count",
        ",omitempty,null",
        Some(("count", Flags::OMIT_EMPTY | Flags::NULL, None))
    )]
    #[case::range_with_flags(
        "time",
        "Time,range,unixtime",
        Some(("Time", Flags::UNIX_TIME, Some(KeyRole::Range)))
    )]
    #[case::unknown_flag_ignored("tags", ",set,bogus", Some(("tags", Flags::SET, None)))]
    #[case::skipped("secret", "-", None)]
    #[case::skipped_with_flags("secret", "-,omitempty", None)]
    fn test_parse(
        #[case] ident: &str,
        #[case] tag: &str,
        #[case] expected: Option<(&str, Flags, Option<KeyRole>)>,
    ) {
        let actual = Tag::parse(ident, tag);
        let expected = expected.map(|(name, flags, key)| Tag {
            name: name.to_string(),
            flags,
            key,
        });
        assert_eq!(actual, expected);
    }
}
