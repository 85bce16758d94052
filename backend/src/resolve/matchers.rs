//! Layered street matchers for address search.
//!
//! Layers run from strictest to loosest and the first one with a match
//! wins. Each compares the parsed query street with the parsed street of
//! every candidate entrance.

use crate::address::normalize::{expand_abbreviations, fold, normalize};
use crate::address::{parse_house_number, parse_street, HouseNumber, Street};
use crate::models::{BuildingEntrance, Confidence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLayer {
    /// Same name ignoring case and spacing, same number.
    Exact,
    /// Same name once accents and punctuation are dropped.
    Normalized,
    /// Same name once street types are expanded (`str` -> `strasse`).
    Abbreviated,
    /// One side's number range covers the other's number.
    Range,
    /// Nearest house number on the same street.
    Closest,
}

impl MatchLayer {
    pub const ORDER: [MatchLayer; 5] = [
        MatchLayer::Exact,
        MatchLayer::Normalized,
        MatchLayer::Abbreviated,
        MatchLayer::Range,
        MatchLayer::Closest,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            MatchLayer::Exact => "exact",
            MatchLayer::Normalized => "normalized",
            MatchLayer::Abbreviated => "abbreviated",
            MatchLayer::Range => "range",
            MatchLayer::Closest => "closest",
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            MatchLayer::Exact => Confidence::percent(100),
            MatchLayer::Normalized => Confidence::percent(98),
            MatchLayer::Abbreviated => Confidence::percent(95),
            MatchLayer::Range => Confidence::percent(90),
            MatchLayer::Closest => Confidence::percent(70),
        }
    }
}

/// Tag of the full-text fallback, which has no layer of its own.
pub const FULLTEXT_TAG: &str = "fulltext";

/// Full-text scores are scaled by this factor.
pub const FULLTEXT_WEIGHT: f64 = 0.6;

/// Comparison keys of one street, computed once.
#[derive(Debug, Clone)]
pub struct StreetKeys {
    pub street: Street,
    folded: String,
    normalized: String,
    expanded: String,
}

impl StreetKeys {
    pub fn new(street: Street) -> Self {
        let name = street.name().unwrap_or_default();
        Self {
            folded: fold(name),
            normalized: normalize(name),
            expanded: expand_abbreviations(name),
            street,
        }
    }

    /// Keys of a free-text `"<name> <number>"` line.
    pub fn parse(line: &str) -> Self {
        Self::new(parse_street(line))
    }

    fn has_name(&self) -> bool {
        !self.expanded.is_empty()
    }

    fn number(&self) -> Option<&HouseNumber> {
        self.street.number.as_ref()
    }
}

/// A registry entrance with its street keys.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub entrance: &'a BuildingEntrance,
    keys: StreetKeys,
}

impl<'a> Candidate<'a> {
    pub fn new(entrance: &'a BuildingEntrance) -> Self {
        let name = crate::address::parser::clean_name(&entrance.street_name);
        let number = parse_house_number(&entrance.house_number);
        Self {
            entrance,
            keys: StreetKeys::new(Street::new(name, number)),
        }
    }
}

/// Run the layers in order; the first layer with matches wins.
pub fn match_street<'a>(
    query: &StreetKeys,
    candidates: &[Candidate<'a>],
) -> Option<(MatchLayer, Vec<&'a BuildingEntrance>)> {
    if !query.has_name() {
        return None;
    }
    MatchLayer::ORDER.into_iter().find_map(|layer| {
        let matched = match layer {
            MatchLayer::Closest => closest(query, candidates),
            _ => candidates
                .iter()
                .filter(|c| accepts(layer, query, &c.keys))
                .map(|c| c.entrance)
                .collect(),
        };
        (!matched.is_empty()).then_some((layer, matched))
    })
}

fn accepts(layer: MatchLayer, query: &StreetKeys, candidate: &StreetKeys) -> bool {
    match layer {
        MatchLayer::Exact => query.folded == candidate.folded && query.number() == candidate.number(),
        MatchLayer::Normalized => {
            query.normalized == candidate.normalized && query.number() == candidate.number()
        }
        MatchLayer::Abbreviated => {
            query.expanded == candidate.expanded && query.number() == candidate.number()
        }
        MatchLayer::Range => query.expanded == candidate.expanded && ranges_overlap(query, candidate),
        MatchLayer::Closest => false,
    }
}

fn ranges_overlap(query: &StreetKeys, candidate: &StreetKeys) -> bool {
    match (query.number(), candidate.number()) {
        (Some(q), Some(c)) => {
            c.as_single().is_some_and(|n| q.covers(n)) || q.as_single().is_some_and(|n| c.covers(n))
        }
        _ => false,
    }
}

/// Candidates on the same street at the smallest house number distance.
fn closest<'a>(query: &StreetKeys, candidates: &[Candidate<'a>]) -> Vec<&'a BuildingEntrance> {
    let Some(wanted) = query.number().map(HouseNumber::base_number) else {
        return Vec::new();
    };
    let on_street: Vec<(u32, &'a BuildingEntrance)> = candidates
        .iter()
        .filter(|c| c.keys.expanded == query.expanded)
        .filter_map(|c| {
            c.keys
                .number()
                .map(|n| (n.base_number().abs_diff(wanted), c.entrance))
        })
        .collect();

    let Some(best) = on_street.iter().map(|(distance, _)| *distance).min() else {
        return Vec::new();
    };
    on_street
        .into_iter()
        .filter(|(distance, _)| *distance == best)
        .map(|(_, entrance)| entrance)
        .collect()
}
