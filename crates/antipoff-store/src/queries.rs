//! Query tracking tables: [`Query`] and [`History`].

use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

use crate::error::{Result, StoreError};
use crate::models::{History, HistoryWithQuery, NewHistory, NewQuery, Query};
use crate::repository::{timestamp_at, Entity, Filter, Repository};

impl Entity for Query {
    const TABLE: &'static str = "queries";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "cadastral_number",
        "latitude",
        "longitude",
        "create_ts",
        "update_ts",
    ];
    const SEARCHABLE: &'static [&'static str] = &["cadastral_number"];
    const SORTABLE: &'static [&'static str] = &["id", "cadastral_number"];

    type New = NewQuery;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Query {
            id: row.get(0)?,
            cadastral_number: row.get(1)?,
            latitude: row.get(2)?,
            longitude: row.get(3)?,
            create_ts: timestamp_at(row, 4)?,
            update_ts: timestamp_at(row, 5)?,
        })
    }

    fn insert_values(new: &NewQuery) -> Vec<(&'static str, Value)> {
        vec![
            ("cadastral_number", Value::Text(new.cadastral_number.as_str().to_string())),
            ("latitude", Value::Real(new.latitude)),
            ("longitude", Value::Real(new.longitude)),
        ]
    }
}

impl Entity for History {
    const TABLE: &'static str = "histories";
    const COLUMNS: &'static [&'static str] = &["id", "query_id", "history", "create_ts", "update_ts"];
    const SEARCHABLE: &'static [&'static str] = &["query_id"];
    const SORTABLE: &'static [&'static str] = &["id", "query_id"];

    type New = NewHistory;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(History {
            id: row.get(0)?,
            query_id: row.get(1)?,
            history: row.get(2)?,
            create_ts: timestamp_at(row, 3)?,
            update_ts: timestamp_at(row, 4)?,
        })
    }

    fn insert_values(new: &NewHistory) -> Vec<(&'static str, Value)> {
        vec![
            ("query_id", Value::Integer(new.query_id)),
            ("history", Value::from(new.history)),
        ]
    }
}

impl Repository<History> {
    /// All histories whose query carries `cadastral_number`, each with its
    /// query attached, oldest first.
    pub fn find_by_cadastral_number(
        conn: &Connection,
        cadastral_number: &str,
    ) -> Result<Vec<HistoryWithQuery>> {
        let mut stmt = conn.prepare(
            "SELECT h.id, h.query_id, h.history, h.create_ts, h.update_ts,
                    q.id, q.cadastral_number, q.latitude, q.longitude, q.create_ts, q.update_ts
             FROM histories h
             JOIN queries q ON q.id = h.query_id
             WHERE q.cadastral_number = ?1
             ORDER BY h.id ASC",
        )?;

        let rows = stmt.query_map(params![cadastral_number], row_to_history_with_query)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// The first history recorded for `query_id`.
    pub fn find_by_query_id(conn: &Connection, query_id: i64) -> Result<Option<History>> {
        Ok(Self::find_all(conn, &Filter::new().eq("query_id", query_id))?
            .into_iter()
            .next())
    }
}

fn row_to_history_with_query(row: &Row<'_>) -> rusqlite::Result<HistoryWithQuery> {
    Ok(HistoryWithQuery {
        history: History {
            id: row.get(0)?,
            query_id: row.get(1)?,
            history: row.get(2)?,
            create_ts: timestamp_at(row, 3)?,
            update_ts: timestamp_at(row, 4)?,
        },
        query: Query {
            id: row.get(5)?,
            cadastral_number: row.get(6)?,
            latitude: row.get(7)?,
            longitude: row.get(8)?,
            create_ts: timestamp_at(row, 9)?,
            update_ts: timestamp_at(row, 10)?,
        },
    })
}
