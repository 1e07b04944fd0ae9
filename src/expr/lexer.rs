use crate::{Error, Result};

/// Stands in for a name alias generated earlier, passed as an argument.
pub(crate) const MAGIC_SLOT: char = '\u{1F755}';

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Token<'a> {
    /// Verbatim expression text.
    Text(&'a str),
    /// `'name'`, without the quotes.
    QuotedName(&'a str),
    /// `$`
    NamePlaceholder,
    /// `?`
    ValuePlaceholder,
    /// The magic slot character.
    MagicSlot,
}

/// Splits a fragment into tokens in one left-to-right pass.
///
/// Yields an error and stops on an unterminated or empty quoted name.
pub(crate) struct Lexer<'a> {
    input: &'a str,
    position: usize,
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            failed: false,
        }
    }

    fn quoted_name(&mut self, start: usize) -> Result<Token<'a>> {
        let body = &self.input[start + 1..];
        let Some(length) = body.find('\'') else {
            return Err(Error::expression(format!(
                "unterminated quoted name at byte {start} of {:?}",
                self.input
            )));
        };
        if length == 0 {
            return Err(Error::expression(format!(
                "empty quoted name at byte {start} of {:?}",
                self.input
            )));
        }
        self.position = start + 1 + length + 1;
        Ok(Token::QuotedName(&body[..length]))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let start = self.position;
        let rest = &self.input[start..];
        let first = rest.chars().next()?;
        let token = match first {
            '\'' => match self.quoted_name(start) {
                Ok(token) => token,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            },
            '$' | '?' | MAGIC_SLOT => {
                self.position += first.len_utf8();
                match first {
                    '$' => Token::NamePlaceholder,
                    '?' => Token::ValuePlaceholder,
                    _ => Token::MagicSlot,
                }
            }
            _ => {
                let length = rest
                    .find(['\'', '$', '?', MAGIC_SLOT])
                    .unwrap_or(rest.len());
                self.position += length;
                Token::Text(&rest[..length])
            }
        };
        Some(Ok(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::plain("Count > 1", vec![Token::Text("Count > 1")])]
    #[case::placeholders(
        "'Count' = ? AND $ = ?",
        vec![
            Token::QuotedName("Count"),
            Token::Text(" = "),
            Token::ValuePlaceholder,
            Token::Text(" AND "),
            Token::NamePlaceholder,
            Token::Text(" = "),
            Token::ValuePlaceholder,
        ]
    )]
    #[case::nested_path("Meta.$ = ?", vec![
        Token::Text("Meta."),
        Token::NamePlaceholder,
        Token::Text(" = "),
        Token::ValuePlaceholder,
    ])]
    #[case::magic_slot("\u{1F755} = ?", vec![
        Token::MagicSlot,
        Token::Text(" = "),
        Token::ValuePlaceholder,
    ])]
    #[case::empty("", Vec::new())]
    fn test_lexer(#[case] input: &str, #[case] expected: Vec<Token<'_>>) {
        let actual: Vec<_> = Lexer::new(input).collect::<Result<_>>().unwrap();
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case::unterminated("'Count = ?")]
    #[case::empty_name("'' = ?")]
    fn test_lexer_errors(#[case] input: &str) {
        let tokens: Vec<_> = Lexer::new(input).collect();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_err());
    }
}
