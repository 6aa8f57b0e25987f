// Data shapes that flow out of the fetcher.
//
// Tabular payloads (interest over time, interest by region) use `Table`,
// which serializes as a list-of-columns object so the on-disk cache and
// the live result reconstruct to the same value. Nested per-keyword
// payloads (related queries and topics) always carry explicit `top` and
// `rising` lists, empty when the upstream had nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Index column name for time-indexed interest tables.
pub const DATE_INDEX: &str = "date";

/// Index column name for regional interest tables.
pub const REGION_INDEX: &str = "geoName";

/// Default resolution for regional breakdowns.
pub const DEFAULT_RESOLUTION: &str = "COUNTRY";

/// Shape errors when rebuilding a table from its columns.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("column {column:?} has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("partial-period flags have {actual} rows, expected {expected}")]
    RaggedPartialFlags { expected: usize, actual: usize },
}

/// A row-indexed numeric table: one index column plus one numeric column
/// per keyword.
///
/// `partial` holds the upstream's per-row "period still in progress" flag
/// for time series, and is empty for tables that have no such flag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "TableColumns", into = "TableColumns")]
pub struct Table {
    pub index_name: String,
    pub index: Vec<String>,
    pub columns: BTreeMap<String, Vec<f64>>,
    pub partial: Vec<bool>,
}

/// The list-of-columns form written to the cache.
///
/// Non-finite values are written as `null` and read back as 0.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableColumns {
    pub index_name: String,
    pub index: Vec<String>,
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
    #[serde(default, rename = "isPartial")]
    pub partial: Vec<bool>,
}

impl Table {
    /// An empty table with the given index name.
    pub fn new(index_name: &str) -> Self {
        Self {
            index_name: index_name.to_string(),
            ..Self::default()
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The values for one keyword, if the table has that column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Convert to the serializable list-of-columns form.
    pub fn to_columns(&self) -> TableColumns {
        TableColumns {
            index_name: self.index_name.clone(),
            index: self.index.clone(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| {
                    let values = values
                        .iter()
                        .map(|v| if v.is_finite() { Some(*v) } else { None })
                        .collect();
                    (name.clone(), values)
                })
                .collect(),
            partial: self.partial.clone(),
        }
    }

    /// Round-trip through the columnar form so a freshly fetched table is
    /// indistinguishable from one read back out of the cache.
    pub fn normalized(&self) -> Result<Self, TableError> {
        Self::try_from(self.to_columns())
    }

    /// Copy `other`'s keyword columns into this table, aligned by row position.
    ///
    /// Used when stitching batches together. The first non-empty table
    /// provides the index; the partial-period flags are not carried over.
    /// Empty columns (keywords the upstream had no series for) are skipped.
    /// Columns of a different length are padded with zeros or truncated to
    /// the merged index, so the result always has one value per row.
    pub fn merge_columns(&mut self, other: &Table) {
        if self.index.is_empty() {
            self.index = other.index.clone();
            if self.index_name.is_empty() {
                self.index_name = other.index_name.clone();
            }
        }

        let rows = self.index.len();
        for (name, values) in &other.columns {
            if values.is_empty() {
                continue;
            }
            let mut values = values.clone();
            if values.len() != rows {
                warn!(
                    column = name.as_str(),
                    expected = rows,
                    actual = values.len(),
                    "Batch row count differs from merged table, aligning column"
                );
                values.resize(rows, 0.0);
            }
            self.columns.insert(name.clone(), values);
        }
    }
}

impl TryFrom<TableColumns> for Table {
    type Error = TableError;

    fn try_from(raw: TableColumns) -> Result<Self, Self::Error> {
        let expected = raw.index.len();

        let mut columns = BTreeMap::new();
        for (name, values) in raw.columns {
            if values.len() != expected {
                return Err(TableError::RaggedColumn {
                    column: name,
                    expected,
                    actual: values.len(),
                });
            }
            let values = values.into_iter().map(|v| v.unwrap_or(0.0)).collect();
            columns.insert(name, values);
        }

        if !raw.partial.is_empty() && raw.partial.len() != expected {
            return Err(TableError::RaggedPartialFlags {
                expected,
                actual: raw.partial.len(),
            });
        }

        Ok(Self {
            index_name: raw.index_name,
            index: raw.index,
            columns,
            partial: raw.partial,
        })
    }
}

impl From<Table> for TableColumns {
    fn from(table: Table) -> Self {
        table.to_columns()
    }
}

/// One related search query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelatedQuery {
    pub query: String,
    /// Relative score (top list) or percentage growth (rising list).
    pub value: i64,
    pub formatted_value: String,
    /// Explicit surge marker; set when the upstream labels the query "Breakout".
    pub breakout: bool,
}

/// One related topic (a knowledge-graph entity rather than a raw query).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelatedTopic {
    pub mid: String,
    pub title: String,
    pub topic_type: String,
    pub value: i64,
    pub formatted_value: String,
    pub breakout: bool,
}

/// The `top` and `rising` lists for one keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedLists<T> {
    #[serde(default)]
    pub top: Vec<T>,
    #[serde(default)]
    pub rising: Vec<T>,
}

impl<T> Default for RelatedLists<T> {
    fn default() -> Self {
        Self {
            top: Vec::new(),
            rising: Vec::new(),
        }
    }
}

pub type RelatedQueries = BTreeMap<String, RelatedLists<RelatedQuery>>;
pub type RelatedTopics = BTreeMap<String, RelatedLists<RelatedTopic>>;

/// A term from the daily trending-searches feed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendingTerm {
    pub query: String,
    /// Approximate search volume label, e.g. "200K+".
    pub traffic: Option<String>,
}

/// A story from the realtime trends feed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeTrend {
    pub title: String,
    pub entity_names: Vec<String>,
}

/// Timeframe, region and category for one upstream query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub timeframe: String,
    pub geo: String,
    pub category: u32,
}

impl QueryParams {
    pub fn new(timeframe: &str, geo: &str, category: u32) -> Self {
        Self {
            timeframe: timeframe.to_string(),
            geo: geo.to_string(),
            category,
        }
    }

    /// Defaults from configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            &config.default_timeframe,
            &config.default_geo,
            config.default_category,
        )
    }

    /// The parameter components of a cache key, in a fixed order.
    pub fn key_parts(&self) -> Vec<String> {
        vec![
            self.timeframe.clone(),
            self.geo.clone(),
            self.category.to_string(),
        ]
    }
}
