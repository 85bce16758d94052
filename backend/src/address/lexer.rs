//! Tokenizer for free-text street strings.

use unicode_normalization::char::is_combining_mark;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of letters and marks (`Hauptstrasse`, `l'Église`, `Saint-Jean`).
    Word,
    Number(u32),
    /// Number with a single letter or `.digits` suffix (`12a`, `9 a`, `5.2`).
    HouseNumber { number: u32, suffix: String },
    /// `12-15`
    NumberRange { from: u32, to: u32 },
    /// `12a-c`
    SuffixRange { number: u32, from: char, to: char },
    Dot,
    Other,
}

impl TokenKind {
    /// Number, house number or range.
    pub fn is_number_like(&self) -> bool {
        matches!(
            self,
            TokenKind::Number(_)
                | TokenKind::HouseNumber { .. }
                | TokenKind::NumberRange { .. }
                | TokenKind::SuffixRange { .. }
        )
    }
}

/// Token with its byte span in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.start..self.end]
    }
}

fn is_letter(c: char) -> bool {
    c.is_alphabetic() || is_combining_mark(c)
}

fn is_joiner(c: char) -> bool {
    matches!(c, '\'' | '’' | '-')
}

struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek_at(&self, pos: usize) -> Option<char> {
        self.chars.get(pos).map(|(_, c)| *c)
    }

    fn offset(&self, pos: usize) -> usize {
        self.chars.get(pos).map(|(i, _)| *i).unwrap_or(self.input.len())
    }

    fn skip_spaces_from(&self, mut pos: usize) -> usize {
        while self.peek_at(pos).is_some_and(char::is_whitespace) {
            pos += 1;
        }
        pos
    }

    /// End of a digit run starting at `pos`.
    fn digits_end(&self, mut pos: usize) -> usize {
        while self.peek_at(pos).is_some_and(|c| c.is_ascii_digit()) {
            pos += 1;
        }
        pos
    }

    fn number_between(&self, start: usize, end: usize) -> Option<u32> {
        self.input[self.offset(start)..self.offset(end)].parse().ok()
    }

    /// A lone letter at `pos`, i.e. not followed by another letter.
    fn lone_letter(&self, pos: usize) -> Option<char> {
        let c = self.peek_at(pos).filter(|c| c.is_alphabetic())?;
        if self.peek_at(pos + 1).is_some_and(is_letter) {
            return None;
        }
        Some(c)
    }

    fn next_token(&mut self) -> Option<Token> {
        self.pos = self.skip_spaces_from(self.pos);
        let start = self.pos;
        let c = self.peek_at(start)?;

        let kind = if is_letter(c) {
            self.pos = self.word_end(start);
            TokenKind::Word
        } else if c.is_ascii_digit() {
            self.number(start)
        } else if c == '.' {
            self.pos = start + 1;
            TokenKind::Dot
        } else {
            self.pos = start + 1;
            TokenKind::Other
        };

        Some(Token {
            kind,
            start: self.offset(start),
            end: self.offset(self.pos),
        })
    }

    fn word_end(&self, start: usize) -> usize {
        let mut pos = start;
        loop {
            match self.peek_at(pos) {
                Some(c) if is_letter(c) => pos += 1,
                Some(c) if is_joiner(c) && self.peek_at(pos + 1).is_some_and(is_letter) => pos += 1,
                _ => return pos,
            }
        }
    }

    fn number(&mut self, start: usize) -> TokenKind {
        let digits_end = self.digits_end(start);
        let Some(number) = self.number_between(start, digits_end) else {
            self.pos = digits_end;
            return TokenKind::Other;
        };
        self.pos = digits_end;

        // 12-15
        let dash = self.skip_spaces_from(digits_end);
        if self.peek_at(dash) == Some('-') {
            let other = self.skip_spaces_from(dash + 1);
            let other_end = self.digits_end(other);
            if other_end > other {
                if let Some(to) = self.number_between(other, other_end) {
                    self.pos = other_end;
                    return TokenKind::NumberRange { from: number, to };
                }
            }
        }

        // 5.2
        if self.peek_at(digits_end) == Some('.') {
            let decimals_end = self.digits_end(digits_end + 1);
            if decimals_end > digits_end + 1 {
                self.pos = decimals_end;
                let suffix = self.input[self.offset(digits_end)..self.offset(decimals_end)].to_string();
                return TokenKind::HouseNumber { number, suffix };
            }
        }

        // 12a, 9 a, 12a-c
        let letter_pos = self.skip_spaces_from(digits_end);
        if let Some(letter) = self.lone_letter(letter_pos) {
            let after = letter_pos + 1;
            if self.peek_at(after) == Some('-') {
                if let Some(to) = self.lone_letter(after + 1) {
                    self.pos = after + 2;
                    return TokenKind::SuffixRange {
                        number,
                        from: lower(letter),
                        to: lower(to),
                    };
                }
            }
            self.pos = after;
            return TokenKind::HouseNumber {
                number,
                suffix: letter.to_lowercase().collect(),
            };
        }

        TokenKind::Number(number)
    }
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    std::iter::from_fn(|| lexer.next_token()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_words_and_house_number() {
        assert_eq!(
            kinds("Hauptstrasse 12a"),
            vec![
                TokenKind::Word,
                TokenKind::HouseNumber {
                    number: 12,
                    suffix: "a".into()
                }
            ]
        );
    }

    #[test]
    fn test_space_before_suffix() {
        assert_eq!(kinds("9 a"), kinds("9a"));
        assert_eq!(kinds("9 A"), kinds("9a"));
    }

    #[test]
    fn test_suffix_not_followed_by_letter() {
        // "12 Bahnhofstrasse" is a number then a word
        assert_eq!(kinds("12 Bahnhofstrasse"), vec![TokenKind::Number(12), TokenKind::Word]);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(kinds("12-15"), vec![TokenKind::NumberRange { from: 12, to: 15 }]);
        assert_eq!(kinds("12 - 15"), vec![TokenKind::NumberRange { from: 12, to: 15 }]);
        assert_eq!(
            kinds("12a-c"),
            vec![TokenKind::SuffixRange {
                number: 12,
                from: 'a',
                to: 'c'
            }]
        );
    }

    #[test]
    fn test_dotted_suffix_and_dot() {
        assert_eq!(
            kinds("5.2"),
            vec![TokenKind::HouseNumber {
                number: 5,
                suffix: ".2".into()
            }]
        );
        assert_eq!(
            kinds("Via Roma .2"),
            vec![TokenKind::Word, TokenKind::Word, TokenKind::Dot, TokenKind::Number(2)]
        );
    }

    #[test]
    fn test_joined_words_and_spans() {
        let input = "Rue de l'Église, 3";
        let tokens = tokenize(input);
        assert_eq!(tokens[2].text(input), "l'Église");
        assert_eq!(tokens[3].kind, TokenKind::Other);
        assert_eq!(tokens[4].text(input), "3");
    }

    #[test]
    fn test_overflowing_number_is_other() {
        assert_eq!(kinds("99999999999"), vec![TokenKind::Other]);
    }
}
