//! Street parsing on top of the lexer.
//!
//! The name is everything before a number-like token ending the input.
//! Anything the lexer does not recognise stays in the name since registry
//! sources are inconsistent.

use super::lexer::{tokenize, Token, TokenKind};
use super::street::{HouseNumber, Street, StreetNumber, StreetNumberRange, StreetNumberSuffixRange};

pub fn parse_street(input: &str) -> Street {
    let tokens = tokenize(input);
    let (number, name_end) = terminal_number(input, &tokens);

    // A lone leading 0 is noise from some exports
    let name_start = match tokens.first() {
        Some(first) if first.kind == TokenKind::Number(0) && first.start < name_end => first.end,
        _ => 0,
    };

    Street::new(clean_name(&input[name_start..name_end]), number.and_then(drop_zero))
}

/// Parse a house number column on its own.
pub fn parse_house_number(input: &str) -> Option<HouseNumber> {
    let tokens = tokenize(input);
    let (number, name_end) = terminal_number(input, &tokens);
    if clean_name(&input[..name_end]).is_some() {
        return None;
    }
    number.and_then(drop_zero)
}

/// Collapse whitespace and trim trailing separators.
pub fn clean_name(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, ',' | ';' | ':' | '/' | '-')
    });
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// House number ending the input, and the byte offset where the name ends.
fn terminal_number(input: &str, tokens: &[Token]) -> (Option<HouseNumber>, usize) {
    let Some(last) = tokens.last() else {
        return (None, input.len());
    };

    let number = match &last.kind {
        TokenKind::Number(n) => {
            let len = tokens.len();
            let dot_before = len >= 2 && tokens[len - 2].kind == TokenKind::Dot;
            if dot_before {
                // "5 .2" -> 5.2, "Via Roma .2" -> 2
                if let Some(Token {
                    kind: TokenKind::Number(base),
                    start,
                    ..
                }) = len.checked_sub(3).and_then(|i| tokens.get(i))
                {
                    let suffix = format!(".{}", last.text(input));
                    return (Some(HouseNumber::Single(StreetNumber::new(*base, Some(suffix.as_str())))), *start);
                }
                return (Some(HouseNumber::Single(StreetNumber::plain(*n))), tokens[len - 2].start);
            }
            HouseNumber::Single(StreetNumber::plain(*n))
        }
        TokenKind::HouseNumber { number, suffix } => HouseNumber::Single(StreetNumber::new(*number, Some(suffix.as_str()))),
        TokenKind::NumberRange { from, to } => HouseNumber::Range(StreetNumberRange { from: *from, to: *to }),
        TokenKind::SuffixRange { number, from, to } => HouseNumber::SuffixRange(StreetNumberSuffixRange {
            number: *number,
            from: *from,
            to: *to,
        }),
        _ => return (None, input.len()),
    };

    (Some(number), last.start)
}

/// A terminal zero without suffix means no number.
fn drop_zero(number: HouseNumber) -> Option<HouseNumber> {
    match &number {
        HouseNumber::Single(StreetNumber { number: 0, suffix: None }) => None,
        _ => Some(number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(number: u32, suffix: Option<&str>) -> Option<HouseNumber> {
        Some(HouseNumber::Single(StreetNumber::new(number, suffix)))
    }

    #[test]
    fn test_name_and_suffixed_number() {
        let street = parse_street("Hauptstrasse 12a");
        assert_eq!(street.name(), Some("Hauptstrasse"));
        assert_eq!(street.number, single(12, Some("a")));
    }

    #[test]
    fn test_range_only() {
        let street = parse_street("12-15");
        assert_eq!(street.name, None);
        assert_eq!(street.number, Some(HouseNumber::Range(StreetNumberRange { from: 12, to: 15 })));
    }

    #[test]
    fn test_space_before_suffix_is_same_number() {
        assert_eq!(parse_street("9 a"), parse_street("9a"));
        assert_eq!(parse_street("Bahnhofweg 9 a"), parse_street("Bahnhofweg 9a"));
    }

    #[test]
    fn test_zero_is_no_number() {
        let street = parse_street("Foo 0");
        assert_eq!(street.name(), Some("Foo"));
        assert_eq!(street.number, None);
    }

    #[test]
    fn test_leading_zero_dropped() {
        let street = parse_street("0 Chemin des Vignes 4");
        assert_eq!(street.name(), Some("Chemin des Vignes"));
        assert_eq!(street.number, single(4, None));
    }

    #[test]
    fn test_trailing_dot_number() {
        let street = parse_street("Via Roma .2");
        assert_eq!(street.name(), Some("Via Roma"));
        assert_eq!(street.number, single(2, None));

        let street = parse_street("Via Roma 5 .2");
        assert_eq!(street.name(), Some("Via Roma"));
        assert_eq!(street.number, single(5, Some(".2")));
    }

    #[test]
    fn test_number_not_at_end_stays_in_name() {
        let street = parse_street("Route 9 Ouest");
        assert_eq!(street.name(), Some("Route 9 Ouest"));
        assert_eq!(street.number, None);
    }

    #[test]
    fn test_unknown_tokens_fold_into_name() {
        let street = parse_street("Rue   de l'Église, 3");
        assert_eq!(street.name(), Some("Rue de l'Église"));
        assert_eq!(street.number, single(3, None));

        let street = parse_street("Platz #1 & Co 7b");
        assert_eq!(street.name(), Some("Platz #1 & Co"));
        assert_eq!(street.number, single(7, Some("b")));
    }

    #[test]
    fn test_suffix_range() {
        let street = parse_street("Seestrasse 12a-c");
        assert_eq!(
            street.number,
            Some(HouseNumber::SuffixRange(StreetNumberSuffixRange {
                number: 12,
                from: 'a',
                to: 'c'
            }))
        );
    }

    #[test]
    fn test_parse_house_number_column() {
        assert_eq!(parse_house_number("12 B"), single(12, Some("b")));
        assert_eq!(parse_house_number("0"), None);
        assert_eq!(parse_house_number(""), None);
        assert_eq!(parse_house_number("bis"), None);
    }
}
