//! Street value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number with an optional lower-case suffix (`12a`, `5.2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreetNumber {
    pub number: u32,
    pub suffix: Option<String>,
}

impl StreetNumber {
    pub fn new(number: u32, suffix: Option<&str>) -> Self {
        Self {
            number,
            suffix: suffix
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
        }
    }

    pub fn plain(number: u32) -> Self {
        Self::new(number, None)
    }

    /// Single letter suffix, if any.
    pub fn letter(&self) -> Option<char> {
        let mut chars = self.suffix.as_deref()?.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_alphabetic() => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for StreetNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.suffix.as_deref().unwrap_or(""))
    }
}

/// Inclusive numeric range (`12-15`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreetNumberRange {
    pub from: u32,
    pub to: u32,
}

impl fmt::Display for StreetNumberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Inclusive suffix range on one number (`12a-c`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreetNumberSuffixRange {
    pub number: u32,
    pub from: char,
    pub to: char,
}

impl fmt::Display for StreetNumberSuffixRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", self.number, self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HouseNumber {
    Single(StreetNumber),
    Range(StreetNumberRange),
    SuffixRange(StreetNumberSuffixRange),
}

impl HouseNumber {
    /// Numeric part used for distance comparisons.
    pub fn base_number(&self) -> u32 {
        match self {
            HouseNumber::Single(n) => n.number,
            HouseNumber::Range(r) => r.from.min(r.to),
            HouseNumber::SuffixRange(r) => r.number,
        }
    }

    /// Whether a concrete number falls within this value.
    pub fn covers(&self, candidate: &StreetNumber) -> bool {
        match self {
            HouseNumber::Single(n) => n == candidate,
            HouseNumber::Range(r) => {
                candidate.suffix.is_none()
                    && (r.from.min(r.to)..=r.from.max(r.to)).contains(&candidate.number)
            }
            HouseNumber::SuffixRange(r) => {
                candidate.number == r.number
                    && candidate.letter().is_some_and(|c| {
                        let (lo, hi) = if r.from <= r.to { (r.from, r.to) } else { (r.to, r.from) };
                        (lo..=hi).contains(&c)
                    })
            }
        }
    }

    pub fn as_single(&self) -> Option<&StreetNumber> {
        match self {
            HouseNumber::Single(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for HouseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HouseNumber::Single(n) => n.fmt(f),
            HouseNumber::Range(r) => r.fmt(f),
            HouseNumber::SuffixRange(r) => r.fmt(f),
        }
    }
}

/// Street name plus optional house number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Street {
    pub name: Option<String>,
    pub number: Option<HouseNumber>,
}

impl Street {
    pub fn new(name: Option<String>, number: Option<HouseNumber>) -> Self {
        Self { name, number }
    }

    /// Build from separate name and number columns.
    pub fn from_separated(name: &str, number: &str) -> Self {
        let name = super::parser::clean_name(name);
        Self {
            name,
            number: super::parser::parse_house_number(number),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for Street {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.number) {
            (Some(name), Some(number)) => write!(f, "{} {}", name, number),
            (Some(name), None) => f.write_str(name),
            (None, Some(number)) => number.fmt(f),
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_lowercased() {
        assert_eq!(StreetNumber::new(12, Some("A")), StreetNumber::new(12, Some("a")));
        assert_eq!(StreetNumber::new(12, Some(" ")), StreetNumber::plain(12));
    }

    #[test]
    fn test_range_covers() {
        let range = HouseNumber::Range(StreetNumberRange { from: 12, to: 15 });
        assert!(range.covers(&StreetNumber::plain(13)));
        assert!(!range.covers(&StreetNumber::plain(16)));
        assert!(!range.covers(&StreetNumber::new(13, Some("a"))));

        let suffixes = HouseNumber::SuffixRange(StreetNumberSuffixRange { number: 12, from: 'a', to: 'c' });
        assert!(suffixes.covers(&StreetNumber::new(12, Some("b"))));
        assert!(!suffixes.covers(&StreetNumber::new(12, Some("d"))));
        assert!(!suffixes.covers(&StreetNumber::plain(12)));
    }

    #[test]
    fn test_from_separated() {
        let street = Street::from_separated("  Hauptstrasse ", "12 A");
        assert_eq!(street.name(), Some("Hauptstrasse"));
        assert_eq!(street.number, Some(HouseNumber::Single(StreetNumber::new(12, Some("a")))));
        assert_eq!(street.to_string(), "Hauptstrasse 12a");

        assert_eq!(Street::from_separated("Foo", "").number, None);
        assert_eq!(Street::from_separated("", "3").name, None);
    }
}
