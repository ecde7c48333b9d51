//! Restaurant lookup against a loosely-schematized table.
//!
//! Deployments of the backing store disagree on identifier casing, so the
//! lookup walks an ordered list of `(table, column)` candidates and advances
//! past any candidate the backend reports as schema-mismatched. Callers only
//! ever see typed errors; free-text error messages stay inside this module.

use maitre_core::VenueContact;
use serde_json::{Map, Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use thiserror::Error;
use tracing::{debug, warn};

use crate::DbPool;

const ROW_LIMIT: i64 = 5;

const NAME_KEYS: [&str; 5] = ["name", "venue_name", "Name", "VenueName", "Venue Name"];
const PHONE_KEYS: [&str; 4] = ["phone", "venue_phone", "Phone", "Venue Phone"];

/// The backend's schema does not match what a lookup candidate assumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaMismatch {
    MissingTable,
    MissingColumn,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("restaurant lookup failed: {0}")]
    Backend(#[source] sqlx::Error),
}

/// One `(table, column)` naming convention to try.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupCandidate {
    pub table: String,
    pub column: String,
}

impl LookupCandidate {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self { table: table.into(), column: column.into() }
    }

    fn defaults() -> Vec<Self> {
        vec![
            Self::new("restaurants", "cuisine"),
            Self::new("restaurants", "Cuisine"),
            Self::new("Restaurants", "Cuisine"),
        ]
    }
}

/// A matched row, kept loosely typed: all columns are captured as JSON and
/// the venue name/phone are normalized on demand.
#[derive(Clone, Debug, PartialEq)]
pub struct RestaurantRecord {
    columns: Map<String, Value>,
}

impl RestaurantRecord {
    pub fn as_json(&self) -> Value {
        Value::Object(self.columns.clone())
    }

    /// Normalize the row into a contact by probing known key spellings in
    /// order and taking the first present, non-empty value.
    pub fn contact(&self) -> VenueContact {
        VenueContact {
            venue_name: self.first_string(&NAME_KEYS),
            venue_phone: self.first_string(&PHONE_KEYS),
        }
    }

    fn first_string(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.columns.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }
}

pub struct RestaurantRepository {
    pool: DbPool,
    candidates: Vec<LookupCandidate>,
}

impl RestaurantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, candidates: LookupCandidate::defaults() }
    }

    pub fn with_candidates(pool: DbPool, candidates: Vec<LookupCandidate>) -> Self {
        Self { pool, candidates }
    }

    /// Find up to five restaurants whose cuisine contains `cuisine`
    /// (case-insensitive). An empty result is not an error.
    ///
    /// Candidates failing with a schema mismatch are skipped; exhausting all
    /// of them yields an empty result. Any other backend failure surfaces
    /// as [`LookupError::Backend`] and is the caller's to retry.
    pub async fn by_cuisine(&self, cuisine: &str) -> Result<Vec<RestaurantRecord>, LookupError> {
        let pattern = format!("%{}%", cuisine.trim());

        for candidate in &self.candidates {
            match self.query_candidate(candidate, &pattern).await {
                Ok(rows) => {
                    debug!(
                        event_name = "db.restaurants.lookup",
                        table = %candidate.table,
                        column = %candidate.column,
                        row_count = rows.len(),
                        "restaurant lookup succeeded"
                    );
                    return Ok(rows);
                }
                Err(error) => match classify_schema_mismatch(&error) {
                    Some(kind) => {
                        warn!(
                            event_name = "db.restaurants.schema_retry",
                            table = %candidate.table,
                            column = %candidate.column,
                            mismatch = ?kind,
                            "schema candidate mismatched, trying next naming convention"
                        );
                    }
                    None => return Err(LookupError::Backend(error)),
                },
            }
        }

        warn!(
            event_name = "db.restaurants.candidates_exhausted",
            "no schema candidate matched, returning empty result"
        );
        Ok(Vec::new())
    }

    async fn query_candidate(
        &self,
        candidate: &LookupCandidate,
        pattern: &str,
    ) -> Result<Vec<RestaurantRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} LIKE ?1 LIMIT {ROW_LIMIT}",
            quote_ident(&candidate.table),
            quote_ident(&candidate.column),
        );

        let rows = sqlx::query(&sql).bind(pattern).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(record_from_row).collect())
    }
}

fn quote_ident(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}

/// Map the backend's schema complaints to a typed kind. SQLite reports both
/// through the generic SQLITE_ERROR code, so the message text is inspected
/// here and nowhere else.
fn classify_schema_mismatch(error: &sqlx::Error) -> Option<SchemaMismatch> {
    let sqlx::Error::Database(db_error) = error else {
        return None;
    };
    let message = db_error.message();
    if message.contains("no such table") {
        Some(SchemaMismatch::MissingTable)
    } else if message.contains("no such column") {
        Some(SchemaMismatch::MissingColumn)
    } else {
        None
    }
}

fn record_from_row(row: &SqliteRow) -> RestaurantRecord {
    let mut columns = Map::new();
    for column in row.columns() {
        columns.insert(column.name().to_string(), column_value(row, column.ordinal()));
    }
    RestaurantRecord { columns }
}

fn column_value(row: &SqliteRow, ordinal: usize) -> Value {
    let type_name = match row.try_get_raw(ordinal) {
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "NULL" => Value::Null,
        "INTEGER" => row.try_get::<i64, _>(ordinal).map(Value::from).unwrap_or(Value::Null),
        "REAL" => row
            .try_get::<f64, _>(ordinal)
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => row.try_get::<String, _>(ordinal).map(Value::String).unwrap_or(Value::Null),
    }
}
