use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Highlight, HighlightColor, Progress, Stats};

use super::schema::SCHEMA;
use super::{Record, Table};

const HIGHLIGHT_COLUMNS: &str = "id, article_id, text, color, position, created_at";

/// Embedded SQL engine backend.
pub struct RelationalStore {
    conn: Connection,
}

impl RelationalStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).await?;
        Self::with_schema(conn).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_schema(conn).await
    }

    async fn with_schema(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn put(&self, record: Record) -> Result<()> {
        match record {
            Record::Highlight(h) => {
                let position = serde_json::to_string(&h.position)?;
                self.conn
                    .call(move |conn| {
                        conn.execute(
                            "INSERT INTO highlights (id, article_id, text, color, position, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                            params![h.id, h.article_id, h.text, h.color.as_str(), position, h.created_at],
                        )?;
                        Ok(())
                    })
                    .await?;
            }
            Record::Progress(p) => {
                self.conn
                    .call(move |conn| {
                        conn.execute(
                            r#"INSERT INTO progress (article_id, scroll_position, percentage, last_read)
                               VALUES (?1, ?2, ?3, ?4)
                               ON CONFLICT(article_id) DO UPDATE SET
                                   scroll_position = excluded.scroll_position,
                                   percentage = excluded.percentage,
                                   last_read = excluded.last_read"#,
                            params![p.article_id, p.scroll_position, p.percentage, p.last_read],
                        )?;
                        Ok(())
                    })
                    .await?;
            }
            Record::Stats(s) => {
                self.conn
                    .call(move |conn| {
                        conn.execute(
                            r#"INSERT INTO stats (article_id, total_time_spent, percentage, last_visit, completed)
                               VALUES (?1, ?2, ?3, ?4, ?5)
                               ON CONFLICT(article_id) DO UPDATE SET
                                   total_time_spent = excluded.total_time_spent,
                                   percentage = excluded.percentage,
                                   last_visit = excluded.last_visit,
                                   completed = excluded.completed"#,
                            params![s.article_id, s.total_time_spent as i64, s.percentage, s.last_visit, s.completed],
                        )?;
                        Ok(())
                    })
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn get_all(&self, table: Table, article_id: &str) -> Result<Vec<Record>> {
        let article_id = article_id.to_string();
        let records = self
            .conn
            .call(move |conn| {
                let records: Vec<Record> = match table {
                    Table::Highlights => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {HIGHLIGHT_COLUMNS} FROM highlights WHERE article_id = ?1 ORDER BY created_at, id"
                        ))?;
                        let rows = stmt
                            .query_map(params![article_id], highlight_from_row)?
                            .collect::<std::result::Result<Vec<_>, _>>()?;
                        rows.into_iter().map(Record::Highlight).collect()
                    }
                    Table::Progress => select_progress(conn, &article_id)?
                        .map(Record::Progress)
                        .into_iter()
                        .collect(),
                    Table::Stats => select_stats(conn, &article_id)?
                        .map(Record::Stats)
                        .into_iter()
                        .collect(),
                };
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    pub async fn get_one(&self, table: Table, article_id: &str) -> Result<Option<Record>> {
        if table == Table::Highlights {
            return Ok(self.get_all(table, article_id).await?.into_iter().next());
        }
        let article_id = article_id.to_string();
        let record = self
            .conn
            .call(move |conn| {
                let record = match table {
                    Table::Progress => select_progress(conn, &article_id)?.map(Record::Progress),
                    _ => select_stats(conn, &article_id)?.map(Record::Stats),
                };
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    pub async fn delete(&self, table: Table, article_id: &str, key: &str) -> Result<()> {
        let article_id = article_id.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                match table {
                    Table::Highlights => conn.execute(
                        "DELETE FROM highlights WHERE id = ?1 AND article_id = ?2",
                        params![key, article_id],
                    )?,
                    Table::Progress => conn.execute(
                        "DELETE FROM progress WHERE article_id = ?1",
                        params![article_id],
                    )?,
                    Table::Stats => conn.execute(
                        "DELETE FROM stats WHERE article_id = ?1",
                        params![article_id],
                    )?,
                };
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn select_progress(conn: &rusqlite::Connection, article_id: &str) -> rusqlite::Result<Option<Progress>> {
    conn.query_row(
        "SELECT article_id, scroll_position, percentage, last_read FROM progress WHERE article_id = ?1",
        params![article_id],
        |row| {
            Ok(Progress {
                article_id: row.get(0)?,
                scroll_position: row.get(1)?,
                percentage: row.get(2)?,
                last_read: row.get(3)?,
            })
        },
    )
    .optional()
}

fn select_stats(conn: &rusqlite::Connection, article_id: &str) -> rusqlite::Result<Option<Stats>> {
    conn.query_row(
        "SELECT article_id, total_time_spent, percentage, last_visit, completed FROM stats WHERE article_id = ?1",
        params![article_id],
        |row| {
            Ok(Stats {
                article_id: row.get(0)?,
                total_time_spent: row.get::<_, i64>(1)?.max(0) as u64,
                percentage: row.get(2)?,
                last_visit: row.get(3)?,
                completed: row.get::<_, i64>(4)? != 0,
            })
        },
    )
    .optional()
}

fn highlight_from_row(row: &Row) -> rusqlite::Result<Highlight> {
    let color: String = row.get(3)?;
    let position: String = row.get(4)?;
    Ok(Highlight {
        id: row.get(0)?,
        article_id: row.get(1)?,
        text: row.get(2)?,
        color: HighlightColor::parse(&color).unwrap_or_default(),
        position: serde_json::from_str(&position)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        created_at: row.get(5)?,
    })
}
