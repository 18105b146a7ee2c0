//! Generic repository over every persisted table.
//!
//! An [`Entity`] describes its table: the columns read back, how a row maps
//! to the struct, and which columns a `New*` value writes. [`Repository`]
//! turns that description plus a [`Filter`] into SQL, so each table gets the
//! same find / add / update / delete surface without hand-written statements.
//!
//! Column names in filters, updates and list queries are checked against the
//! entity's declared columns before they are spliced into SQL; values are
//! always bound as parameters.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use crate::error::{Result, StoreError};

/// SQL expression producing the current time in the stored timestamp format.
pub(crate) const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Columns managed by the storage layer; never written by callers.
const MANAGED_COLUMNS: [&str; 3] = ["id", "create_ts", "update_ts"];

pub trait Entity: Sized {
    const TABLE: &'static str;
    /// Every column read back, in the order `from_row` expects them.
    const COLUMNS: &'static [&'static str];
    /// Columns matched by [`ListQuery::search`].
    const SEARCHABLE: &'static [&'static str];
    /// Columns accepted by [`ListQuery::sort`].
    const SORTABLE: &'static [&'static str];

    type New: Send + 'static;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Column/value pairs written by an insert.
    fn insert_values(new: &Self::New) -> Vec<(&'static str, Value)>;
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Conjunction of `column = value` clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(&'static str, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: i64) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push((column, value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Render ` WHERE a = ?n AND ...`, numbering placeholders from `first`.
    fn where_sql<E: Entity>(&self, first: usize) -> Result<String> {
        if self.clauses.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(self.clauses.len());
        for (i, (column, _)) in self.clauses.iter().enumerate() {
            check_column::<E>(column, E::COLUMNS)?;
            parts.push(format!("{column} = ?{}", first + i));
        }
        Ok(format!(" WHERE {}", parts.join(" AND ")))
    }

    fn values(&self) -> impl Iterator<Item = &Value> {
        self.clauses.iter().map(|(_, v)| v)
    }
}

// ---------------------------------------------------------------------------
// List query (admin views)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Case-insensitive substring matched against every searchable column.
    pub search: Option<String>,
    /// Sort column; must be one of the entity's sortable columns. Defaults to `id`.
    pub sort: Option<String>,
    pub order: SortOrder,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Typed operations on the table behind `E`.
///
/// All functions take a `&Connection`, so they work equally on a plain
/// connection and inside a [`rusqlite::Transaction`].
pub struct Repository<E>(PhantomData<E>);

impl<E: Entity> Repository<E> {
    fn select_sql() -> String {
        format!("SELECT {} FROM {}", E::COLUMNS.join(", "), E::TABLE)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<E>> {
        let sql = format!("{} WHERE id = ?1", Self::select_sql());
        conn.query_row(&sql, [id], E::from_row)
            .optional()
            .map_err(StoreError::from_sqlite)
    }

    /// At most one row matching `filter`; more than one is an error.
    pub fn find_one_or_none(conn: &Connection, filter: &Filter) -> Result<Option<E>> {
        let sql = format!("{}{} LIMIT 2", Self::select_sql(), filter.where_sql::<E>(1)?);
        let mut rows = query_all::<E>(conn, &sql, filter.values())?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            _ => Err(StoreError::MultipleRows { table: E::TABLE }),
        }
    }

    /// Every row matching `filter`, in insertion order.
    pub fn find_all(conn: &Connection, filter: &Filter) -> Result<Vec<E>> {
        let sql = format!("{}{} ORDER BY id ASC", Self::select_sql(), filter.where_sql::<E>(1)?);
        query_all::<E>(conn, &sql, filter.values())
    }

    pub fn count(conn: &Connection, filter: &Filter) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}{}", E::TABLE, filter.where_sql::<E>(1)?);
        let n: i64 = conn
            .query_row(&sql, params_from_iter(filter.values()), |row| row.get(0))
            .map_err(StoreError::from_sqlite)?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Insert one row and read it back with its storage-assigned id and
    /// timestamps.
    pub fn add(conn: &Connection, new: &E::New) -> Result<E> {
        let values = E::insert_values(new);
        for (column, _) in &values {
            check_writable::<E>(column)?;
        }

        let columns: Vec<&str> = values.iter().map(|(c, _)| *c).collect();
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::TABLE,
            columns.join(", "),
            placeholders.join(", ")
        );

        conn.execute(&sql, params_from_iter(values.iter().map(|(_, v)| v)))
            .map_err(StoreError::from_sqlite)?;

        let id = conn.last_insert_rowid();
        Self::find_by_id(conn, id)?.ok_or(StoreError::NotFound)
    }

    /// Insert several rows; either all of them land or none do.
    pub fn add_many(conn: &Connection, news: &[E::New]) -> Result<Vec<E>> {
        conn.execute_batch("SAVEPOINT add_many")?;

        let inserted: Result<Vec<E>> = news.iter().map(|new| Self::add(conn, new)).collect();
        match inserted {
            Ok(rows) => {
                conn.execute_batch("RELEASE add_many")?;
                Ok(rows)
            }
            Err(e) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK TO add_many; RELEASE add_many") {
                    tracing::warn!(table = E::TABLE, error = %rollback, "add_many rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Set `changes` on every row matching `filter`, refreshing `update_ts`.
    /// Returns the number of rows updated.
    pub fn update(
        conn: &Connection,
        filter: &Filter,
        changes: &[(&'static str, Value)],
    ) -> Result<usize> {
        if filter.is_empty() {
            return Err(StoreError::EmptyFilter { table: E::TABLE });
        }
        if changes.is_empty() {
            return Ok(0);
        }

        let mut sets = Vec::with_capacity(changes.len() + 1);
        for (i, (column, _)) in changes.iter().enumerate() {
            check_writable::<E>(column)?;
            sets.push(format!("{column} = ?{}", i + 1));
        }
        sets.push(format!("update_ts = {NOW_SQL}"));

        let sql = format!(
            "UPDATE {} SET {}{}",
            E::TABLE,
            sets.join(", "),
            filter.where_sql::<E>(changes.len() + 1)?
        );
        let params = changes.iter().map(|(_, v)| v).chain(filter.values());
        conn.execute(&sql, params_from_iter(params))
            .map_err(StoreError::from_sqlite)
    }

    /// Delete rows matching `filter`. An empty filter deletes nothing unless
    /// `delete_all` is set. Returns the number of rows deleted.
    pub fn delete(conn: &Connection, filter: &Filter, delete_all: bool) -> Result<usize> {
        if filter.is_empty() && !delete_all {
            return Err(StoreError::EmptyFilter { table: E::TABLE });
        }
        let sql = format!("DELETE FROM {}{}", E::TABLE, filter.where_sql::<E>(1)?);
        conn.execute(&sql, params_from_iter(filter.values()))
            .map_err(StoreError::from_sqlite)
    }

    /// Search, sort and page through the table.
    pub fn list(conn: &Connection, query: &ListQuery) -> Result<Vec<E>> {
        let mut sql = Self::select_sql();
        let mut params: Vec<Value> = Vec::new();

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", escape_like(term));
            let matches: Vec<String> = E::SEARCHABLE
                .iter()
                .map(|c| format!("CAST({c} AS TEXT) LIKE ?1 ESCAPE '\\'"))
                .collect();
            if !matches.is_empty() {
                sql.push_str(&format!(" WHERE ({})", matches.join(" OR ")));
                params.push(Value::Text(pattern));
            }
        }

        let sort = match query.sort.as_deref() {
            Some(column) => {
                check_column::<E>(column, E::SORTABLE)?;
                column
            }
            None => "id",
        };
        sql.push_str(&format!(" ORDER BY {sort} {}", query.order.as_sql()));
        if sort != "id" {
            sql.push_str(", id ASC");
        }

        let next = params.len() + 1;
        sql.push_str(&format!(" LIMIT ?{next} OFFSET ?{}", next + 1));
        params.push(Value::Integer(query.limit.map_or(-1, i64::from)));
        params.push(Value::Integer(query.offset.map_or(0, i64::from)));

        query_all::<E>(conn, &sql, params.iter())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn query_all<'a, E: Entity>(
    conn: &Connection,
    sql: &str,
    params: impl Iterator<Item = &'a Value>,
) -> Result<Vec<E>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), E::from_row)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::Sqlite)
}

fn check_column<E: Entity>(column: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&column) {
        Ok(())
    } else {
        Err(StoreError::UnknownColumn {
            table: E::TABLE,
            column: column.to_string(),
        })
    }
}

fn check_writable<E: Entity>(column: &str) -> Result<()> {
    check_column::<E>(column, E::COLUMNS)?;
    if MANAGED_COLUMNS.contains(&column) {
        return Err(StoreError::UnknownColumn {
            table: E::TABLE,
            column: column.to_string(),
        });
    }
    Ok(())
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Read an RFC-3339 timestamp column.
pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::{NewQuery, NewRole, Query, Role};
    use antipoff_shared::CadastralNumber;

    fn new_query(cn: &str, lat: f64) -> NewQuery {
        NewQuery {
            cadastral_number: CadastralNumber::parse(cn).unwrap(),
            latitude: lat,
            longitude: 37.6173,
        }
    }

    #[test]
    fn add_assigns_id_and_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let q = Repository::<Query>::add(db.conn(), &new_query("1234567890123", 55.7558)).unwrap();

        assert!(q.id > 0);
        assert_eq!(q.cadastral_number, "1234567890123");
        assert_eq!(q.create_ts, q.update_ts);
        assert!((Utc::now() - q.create_ts).num_seconds() < 60);
    }

    #[test]
    fn find_all_with_filter() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        Repository::<Query>::add(conn, &new_query("1234567890123", 1.0)).unwrap();
        Repository::<Query>::add(conn, &new_query("9876543210123", 2.0)).unwrap();
        Repository::<Query>::add(conn, &new_query("1234567890123", 3.0)).unwrap();

        let all = Repository::<Query>::find_all(conn, &Filter::new()).unwrap();
        assert_eq!(all.len(), 3);

        let filtered = Repository::<Query>::find_all(
            conn,
            &Filter::new().eq("cadastral_number", "1234567890123".to_string()),
        )
        .unwrap();
        assert_eq!(
            filtered.iter().map(|q| q.latitude).collect::<Vec<_>>(),
            vec![1.0, 3.0]
        );
    }

    #[test]
    fn find_one_or_none_rejects_ambiguous_filter() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        Repository::<Query>::add(conn, &new_query("1234567890123", 1.0)).unwrap();
        Repository::<Query>::add(conn, &new_query("1234567890123", 2.0)).unwrap();

        let filter = Filter::new().eq("cadastral_number", "1234567890123".to_string());
        assert!(matches!(
            Repository::<Query>::find_one_or_none(conn, &filter),
            Err(StoreError::MultipleRows { table: "queries" })
        ));

        let none = Repository::<Query>::find_one_or_none(
            conn,
            &Filter::new().eq("cadastral_number", "0000000000000".to_string()),
        )
        .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn unknown_filter_column_rejected() {
        let db = Database::open_in_memory().unwrap();
        let filter = Filter::new().eq("1=1 OR name", "x".to_string());
        assert!(matches!(
            Repository::<Role>::find_all(db.conn(), &filter),
            Err(StoreError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn add_duplicate_maps_to_conflict() {
        let db = Database::open_in_memory().unwrap();
        let err = Repository::<Role>::add(db.conn(), &NewRole { name: "admin".into() }).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn add_many_is_all_or_nothing() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();

        let err = Repository::<Role>::add_many(
            conn,
            &[NewRole { name: "auditor".into() }, NewRole { name: "user".into() }],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(Repository::<Role>::count(conn, &Filter::new()).unwrap(), 2);

        let added = Repository::<Role>::add_many(
            conn,
            &[NewRole { name: "auditor".into() }, NewRole { name: "operator".into() }],
        )
        .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(Repository::<Role>::count(conn, &Filter::new()).unwrap(), 4);
    }

    #[test]
    fn update_refreshes_update_ts() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        let role = Repository::<Role>::add(conn, &NewRole { name: "auditor".into() }).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let n = Repository::<Role>::update(
            conn,
            &Filter::by_id(role.id),
            &[("name", Value::Text("reviewer".into()))],
        )
        .unwrap();
        assert_eq!(n, 1);

        let updated = Repository::<Role>::find_by_id(conn, role.id).unwrap().unwrap();
        assert_eq!(updated.name, "reviewer");
        assert_eq!(updated.create_ts, role.create_ts);
        assert!(updated.update_ts > role.update_ts);
    }

    #[test]
    fn update_rejects_managed_columns_and_empty_filter() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();

        assert!(matches!(
            Repository::<Role>::update(conn, &Filter::by_id(1), &[("id", Value::Integer(9))]),
            Err(StoreError::UnknownColumn { .. })
        ));
        assert!(matches!(
            Repository::<Role>::update(conn, &Filter::new(), &[("name", Value::Text("x".into()))]),
            Err(StoreError::EmptyFilter { .. })
        ));
    }

    #[test]
    fn delete_requires_filter_or_delete_all() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        Repository::<Query>::add(conn, &new_query("1234567890123", 1.0)).unwrap();
        Repository::<Query>::add(conn, &new_query("9876543210123", 2.0)).unwrap();

        assert!(matches!(
            Repository::<Query>::delete(conn, &Filter::new(), false),
            Err(StoreError::EmptyFilter { .. })
        ));
        assert_eq!(
            Repository::<Query>::delete(
                conn,
                &Filter::new().eq("cadastral_number", "9876543210123".to_string()),
                false
            )
            .unwrap(),
            1
        );
        assert_eq!(Repository::<Query>::delete(conn, &Filter::new(), true).unwrap(), 1);
        assert_eq!(Repository::<Query>::count(conn, &Filter::new()).unwrap(), 0);
    }

    #[test]
    fn list_search_sort_and_page() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        Repository::<Query>::add(conn, &new_query("1234567890123", 1.0)).unwrap();
        Repository::<Query>::add(conn, &new_query("9876543210123", 2.0)).unwrap();
        Repository::<Query>::add(conn, &new_query("1234500000000", 3.0)).unwrap();

        let found = Repository::<Query>::list(
            conn,
            &ListQuery {
                search: Some("12345".into()),
                sort: Some("cadastral_number".into()),
                order: SortOrder::Desc,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            found.iter().map(|q| q.cadastral_number.as_str()).collect::<Vec<_>>(),
            vec!["1234567890123", "1234500000000"]
        );

        let page = Repository::<Query>::list(
            conn,
            &ListQuery {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].cadastral_number, "9876543210123");
    }

    #[test]
    fn list_rejects_unsortable_column() {
        let db = Database::open_in_memory().unwrap();
        let result = Repository::<Query>::list(
            db.conn(),
            &ListQuery {
                sort: Some("latitude; DROP TABLE queries".into()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(StoreError::UnknownColumn { .. })));
    }

    #[test]
    fn list_search_escapes_wildcards() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        Repository::<Role>::add(conn, &NewRole { name: "read_only".into() }).unwrap();
        Repository::<Role>::add(conn, &NewRole { name: "readXonly".into() }).unwrap();

        let found = Repository::<Role>::list(
            conn,
            &ListQuery {
                search: Some("read_".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "read_only");
    }
}
