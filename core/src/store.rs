//! SQLite page store.
//!
//! Two tables keyed by page index: `PageMetadata` maps an index to the file it
//! is served from, `PageStatus` holds the submitted greeting and whether the
//! page is in use. Every write runs in an immediate transaction so that the
//! caller can attach a side effect (writing the derived HTML file) that must
//! succeed before the row is committed.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};

use crate::page::{Greeting, PageIndex, PageMeta, PageStatus, PageSummary};
use crate::{PageError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS PageMetadata (
        pageIndex INTEGER PRIMARY KEY,
        filename  TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS PageStatus (
        pageIndex INTEGER PRIMARY KEY REFERENCES PageMetadata(pageIndex),
        sender    TEXT NOT NULL DEFAULT '',
        receiver  TEXT NOT NULL DEFAULT '',
        content   TEXT NOT NULL DEFAULT '',
        status    INTEGER NOT NULL DEFAULT 0
    );
";

pub struct PageStore {
    conn: Connection,
}

impl PageStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(PageStore { conn })
    }

    pub fn get_filename(&self, index: PageIndex) -> Result<String> {
        Ok(get_meta(&self.conn, index)?.filename)
    }

    pub fn get_meta(&self, index: PageIndex) -> Result<PageMeta> {
        get_meta(&self.conn, index)
    }

    pub fn get_status(&self, index: PageIndex) -> Result<PageStatus> {
        self.conn
            .query_row(
                "SELECT m.pageIndex, COALESCE(s.sender, ''), COALESCE(s.receiver, ''),
                        COALESCE(s.content, ''), COALESCE(s.status, 0)
                 FROM PageMetadata m LEFT JOIN PageStatus s ON s.pageIndex = m.pageIndex
                 WHERE m.pageIndex = ?1",
                params![index],
                |row| {
                    Ok(PageStatus {
                        page_index: row.get(0)?,
                        sender: row.get(1)?,
                        receiver: row.get(2)?,
                        content: row.get(3)?,
                        status: row.get(4)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| not_found(index))
    }

    /// One entry per metadata row, in index order.
    pub fn list_all(&self) -> Result<Vec<PageSummary>> {
        list_all(&self.conn)
    }

    pub fn list_statuses(&self) -> Result<Vec<(PageMeta, PageStatus)>> {
        let mut stmt = self.conn.prepare(
            "SELECT m.pageIndex, m.filename, COALESCE(s.sender, ''), COALESCE(s.receiver, ''),
                    COALESCE(s.content, ''), COALESCE(s.status, 0)
             FROM PageMetadata m LEFT JOIN PageStatus s ON s.pageIndex = m.pageIndex
             ORDER BY m.pageIndex",
        )?;
        let rows = stmt.query_map([], |row| {
            let page_index = row.get(0)?;
            Ok((
                PageMeta { page_index, filename: row.get(1)? },
                PageStatus {
                    page_index,
                    sender: row.get(2)?,
                    receiver: row.get(3)?,
                    content: row.get(4)?,
                    status: row.get(5)?,
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn next_index(&self) -> Result<PageIndex> {
        Ok(self.conn.query_row("SELECT COALESCE(MAX(pageIndex), 0) + 1 FROM PageMetadata", [], |row| row.get(0))?)
    }

    pub fn update_status(&mut self, index: PageIndex, greeting: &Greeting) -> Result<PageMeta> {
        self.update_status_then(index, greeting, |_| Ok(()))
    }

    /// Marks the page used with the given greeting. `publish` runs after the row
    /// is written but before it is committed; an error from it rolls the row back.
    pub fn update_status_then<F>(&mut self, index: PageIndex, greeting: &Greeting, publish: F) -> Result<PageMeta>
    where
        F: FnOnce(&PageMeta) -> Result<()>,
    {
        self.write(|tx| {
            let meta = get_meta(tx, index)?;
            tx.execute(
                "INSERT INTO PageStatus (pageIndex, sender, receiver, content, status)
                 VALUES (?1, ?2, ?3, ?4, 1)
                 ON CONFLICT(pageIndex) DO UPDATE SET
                    sender = excluded.sender,
                    receiver = excluded.receiver,
                    content = excluded.content,
                    status = 1",
                params![index, greeting.sender, greeting.receiver, greeting.content],
            )?;
            publish(&meta)?;
            Ok(meta)
        })
    }

    pub fn reset_all(&mut self) -> Result<usize> {
        self.reset_all_then(|_| Ok(()))
    }

    /// Sets every status to unused and hands the page list to `publish` before committing.
    pub fn reset_all_then<F>(&mut self, publish: F) -> Result<usize>
    where
        F: FnOnce(&[PageSummary]) -> Result<()>,
    {
        self.write(|tx| {
            let changed = tx.execute("UPDATE PageStatus SET status = 0", [])?;
            let pages = list_all(tx)?;
            publish(&pages)?;
            Ok(changed)
        })
    }

    pub fn provision(&mut self, meta: &PageMeta) -> Result<()> {
        self.provision_then(meta, |_| Ok(()))
    }

    pub fn provision_then<F>(&mut self, meta: &PageMeta, publish: F) -> Result<()>
    where
        F: FnOnce(&PageMeta) -> Result<()>,
    {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO PageMetadata (pageIndex, filename) VALUES (?1, ?2)",
                params![meta.page_index, meta.filename],
            )
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => PageError::AlreadyExists(format!(
                    "page {} or file {:?}",
                    meta.page_index, meta.filename
                )),
                _ => e.into(),
            })?;
            tx.execute("INSERT OR IGNORE INTO PageStatus (pageIndex) VALUES (?1)", params![meta.page_index])?;
            publish(meta)
        })
    }

    fn write<T>(&mut self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

fn not_found(index: PageIndex) -> PageError {
    PageError::NotFound(format!("Page {} does not exist", index))
}

fn get_meta(conn: &Connection, index: PageIndex) -> Result<PageMeta> {
    conn.query_row(
        "SELECT pageIndex, filename FROM PageMetadata WHERE pageIndex = ?1",
        params![index],
        |row| Ok(PageMeta { page_index: row.get(0)?, filename: row.get(1)? }),
    )
    .optional()?
    .ok_or_else(|| not_found(index))
}

fn list_all(conn: &Connection) -> Result<Vec<PageSummary>> {
    let mut stmt = conn.prepare(
        "SELECT m.pageIndex, m.filename, COALESCE(s.status, 0)
         FROM PageMetadata m LEFT JOIN PageStatus s ON s.pageIndex = m.pageIndex
         ORDER BY m.pageIndex",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(PageSummary { page_index: row.get(0)?, filename: row.get(1)?, status: row.get(2)? })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
