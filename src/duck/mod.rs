use duckdb::{params, Connection, ToSql, Transaction};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

use crate::schema::{RecordSchema, CSVNUM_COLUMN, ROWNUM_COLUMN};
use crate::store::{Record, RideStore, StoreError};

/// Catalog name the PostgreSQL database is attached under.
const PG_CATALOG: &str = "pg";

/// `RideStore` over a DuckDB connection: either a local database file or a
/// PostgreSQL database attached through DuckDB's `postgres` extension.
pub struct DuckStore {
    conn: Connection,
    table: String,
}

impl DuckStore {
    /// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self::with_connection(conn, table))
    }

    /// Open a DuckDB in‐memory database
    pub fn open_in_memory(table: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::with_connection(conn, table))
    }

    /// Attach the PostgreSQL database behind `url` and make it the default
    /// catalog, so every statement and transaction runs against it.
    pub fn attach_postgres(url: &Url, table: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let target = url.as_str().replace('\'', "''"); // escape any quotes
        conn.execute_batch(&format!(
            "INSTALL postgres; LOAD postgres; \
             ATTACH '{target}' AS {PG_CATALOG} (TYPE postgres); \
             USE {PG_CATALOG};"
        ))?;
        info!(
            host = url.host_str().unwrap_or_default(),
            database = url.path().trim_start_matches('/'),
            "attached postgres"
        );
        Ok(Self::with_connection(conn, table))
    }

    fn with_connection(conn: Connection, table: &str) -> Self {
        Self {
            conn,
            table: quote_ident(table),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: &str, schema: &RecordSchema) -> String {
    let mut cols = vec![
        format!("{} BIGINT NOT NULL", quote_ident(CSVNUM_COLUMN)),
        format!("{} BIGINT NOT NULL", quote_ident(ROWNUM_COLUMN)),
    ];
    cols.extend(
        schema
            .fields
            .iter()
            .map(|f| format!("{} {}", quote_ident(f.name), f.kind.sql_type())),
    );
    let key = schema
        .key
        .iter()
        .map(|k| quote_ident(k))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    {},\n    PRIMARY KEY ({key})\n)",
        cols.join(",\n    ")
    )
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    let names = [CSVNUM_COLUMN, ROWNUM_COLUMN]
        .into_iter()
        .chain(columns.iter().map(String::as_str))
        .map(quote_ident)
        .collect::<Vec<_>>();
    let placeholders = vec!["?"; names.len()].join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        names.join(", ")
    )
}

fn insert_all(
    tx: &Transaction<'_>,
    sql: &str,
    columns: &[String],
    records: &[Record],
) -> Result<u64, StoreError> {
    let mut stmt = tx.prepare(sql)?;
    let mut written = 0u64;
    for rec in records {
        if rec.values.len() != columns.len() {
            return Err(StoreError::Arity {
                rownum: rec.rownum,
                got: rec.values.len(),
                expected: columns.len(),
            });
        }
        let mut row: Vec<&dyn ToSql> = Vec::with_capacity(columns.len() + 2);
        row.push(&rec.csvnum);
        row.push(&rec.rownum);
        row.extend(rec.values.iter().map(|v| v as &dyn ToSql));
        written += stmt.execute(&row[..])? as u64;
    }
    Ok(written)
}

impl RideStore for DuckStore {
    fn ensure_table(&mut self, schema: &RecordSchema) -> Result<(), StoreError> {
        let sql = create_table_sql(&self.table, schema);
        debug!(%sql, "ensure table");
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    fn existing_row_numbers(
        &mut self,
        csvnum: i64,
        lo: i64,
        hi: i64,
    ) -> Result<HashSet<i64>, StoreError> {
        let sql = format!(
            "SELECT rownum FROM {} WHERE csvnum = ? AND rownum >= ? AND rownum < ?",
            self.table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![csvnum, lo, hi], |row| row.get::<_, i64>(0))?;
        let found = rows.collect::<Result<HashSet<i64>, _>>()?;
        Ok(found)
    }

    fn insert_records(
        &mut self,
        columns: &[String],
        records: &[Record],
    ) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        let sql = insert_sql(&self.table, columns);
        let tx = self.conn.transaction()?;
        match insert_all(&tx, &sql, columns, records) {
            Ok(written) => {
                tx.commit()?;
                Ok(written)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    warn!(error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }

    fn count_from(&mut self, csvnum: i64, from: i64) -> Result<u64, StoreError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE csvnum = ? AND rownum >= ?",
            self.table
        );
        let n: i64 = self
            .conn
            .query_row(&sql, params![csvnum, from], |r| r.get(0))?;
        Ok(n as u64)
    }

    fn delete_below(&mut self, csvnum: i64, bound: i64) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE csvnum = ? AND rownum < ?",
            self.table
        );
        let tx = self.conn.transaction()?;
        let deleted = tx.execute(&sql, params![csvnum, bound])?;
        tx.commit()?;
        Ok(deleted as u64)
    }
}
