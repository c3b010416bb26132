//! Database schema migrations.
//!
//! Uses a simple version table to track applied migrations. Optional columns are
//! added separately by inspecting the live table, so files written by older
//! builds keep working and read those columns as NULL.

use std::collections::HashSet;
use std::num::ParseIntError;

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Migration list: (version, SQL).
///
/// All migrations are idempotent using CREATE IF NOT EXISTS.
const MIGRATIONS: &[(&str, &str)] = &[("1", include_str!("../../migrations/001_transcripts.sql"))];

/// Nullable columns added after the base schema: (name, SQL type).
const OPTIONAL_COLUMNS: &[(&str, &str)] = &[
    ("segments_json", "TEXT"),
    ("metadata_json", "TEXT"),
    ("is_auto_generated", "INTEGER"),
];

/// Run any pending migrations and add missing optional columns.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(Error::from)?;

        let current: i64 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
                row.get(0)
            })
            .map_err(Error::from)?;

        for (version, sql) in MIGRATIONS {
            let version_num: i64 = version
                .parse()
                .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
            if version_num > current {
                conn.execute_batch(sql)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version_num, chrono::Utc::now().to_rfc3339()],
                )
                .map_err(Error::from)?;
            }
        }

        ensure_optional_columns(conn)
    })
    .await
    .map_err(Error::from)
}

fn ensure_optional_columns(conn: &rusqlite::Connection) -> Result<(), Error> {
    let existing = {
        let mut stmt = conn.prepare("PRAGMA table_info(transcripts)")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        names.collect::<Result<HashSet<String>, _>>()?
    };

    for (column, sql_type) in OPTIONAL_COLUMNS {
        if !existing.contains(*column) {
            tracing::info!(column, "adding optional column to transcripts");
            conn.execute_batch(&format!("ALTER TABLE transcripts ADD COLUMN {column} {sql_type}"))?;
        }
    }

    Ok(())
}
