//! Caller supplied columns carried from input rows to results.
//!
//! Stored as the list of contributing rows; the merged view is computed on
//! first access and dropped whenever a row is added.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Joins distinct values of the same key on merge.
pub const LIST_SEPARATOR: &str = "||";

pub const KEY_STREET: &str = "_street";
pub const KEY_POSTAL_CODE: &str = "_postal_code";
pub const KEY_LOCALITY: &str = "_locality";
pub const KEY_BUILDING_ID: &str = "_building_id";
pub const KEY_MUNICIPALITY_CODE: &str = "_municipality_code";

/// Keys kept for internal enrichment and hidden from the public view.
const INTERNAL_KEYS: &[&str] = &[
    KEY_STREET,
    KEY_POSTAL_CODE,
    KEY_LOCALITY,
    KEY_BUILDING_ID,
    KEY_MUNICIPALITY_CODE,
];

/// Internal address keys; the first contributed value wins.
const FIRST_SEEN_KEYS: &[&str] = &[KEY_STREET, KEY_POSTAL_CODE, KEY_LOCALITY];

pub type DataRow = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdditionalData {
    sources: Vec<DataRow>,
    #[serde(skip)]
    merged: OnceCell<DataRow>,
}

impl AdditionalData {
    /// Data contributed by a single source row.
    pub fn create(row: DataRow) -> Self {
        Self {
            sources: vec![row],
            merged: OnceCell::new(),
        }
    }

    pub fn is_internal_key(key: &str) -> bool {
        INTERNAL_KEYS.contains(&key)
    }

    pub fn sources(&self) -> &[DataRow] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.iter().all(|s| s.is_empty())
    }

    /// Add a contributing row. A row already present is ignored so that
    /// re-running a resolver does not change the merged view.
    pub fn add_source(&mut self, row: DataRow) {
        if self.sources.contains(&row) {
            return;
        }
        self.sources.push(row);
        self.merged = OnceCell::new();
    }

    pub fn merge(&mut self, other: &AdditionalData) {
        for row in &other.sources {
            self.add_source(row.clone());
        }
    }

    /// Merged view including internal keys.
    pub fn merged(&self) -> &DataRow {
        self.merged.get_or_init(|| merge_rows(&self.sources))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.merged().get(key).map(String::as_str)
    }

    /// Merged view without internal keys.
    pub fn public_view(&self) -> BTreeMap<&str, &str> {
        self.merged()
            .iter()
            .filter(|(k, _)| !Self::is_internal_key(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl PartialEq for AdditionalData {
    fn eq(&self, other: &Self) -> bool {
        self.sources == other.sources
    }
}

fn merge_rows(rows: &[DataRow]) -> DataRow {
    let mut values: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut first_seen: BTreeMap<&str, &str> = BTreeMap::new();

    for row in rows {
        for (key, value) in row {
            if FIRST_SEEN_KEYS.contains(&key.as_str()) {
                first_seen.entry(key.as_str()).or_insert(value.as_str());
            } else {
                values.entry(key.as_str()).or_default().insert(value.as_str());
            }
        }
    }

    let mut merged: DataRow = values
        .into_iter()
        .map(|(key, set)| {
            let non_empty: Vec<&str> = set.into_iter().filter(|v| !v.is_empty()).collect();
            (key.to_string(), non_empty.join(LIST_SEPARATOR))
        })
        .collect();
    merged.extend(
        first_seen
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    merged
}
