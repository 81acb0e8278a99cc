use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row, params};

/// Participant value that selects every play of a season.
pub const AVERAGE: &str = "Average";

/// One offensive play as stored in `play_by_play`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Play {
    pub season: i32,
    pub passer: Option<String>,
    pub rusher: Option<String>,
    /// Missing EPA counts as zero in every sum.
    pub epa: Option<f64>,
    pub interception: bool,
    pub sack: bool,
    pub qb_scramble: bool,
    pub rush: bool,
    pub air_yards: Option<f64>,
}

impl Play {
    pub fn epa_or_zero(&self) -> f64 {
        self.epa.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

/// Read-write handle, used by ingest and tests.
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Read-only handle scoped to a single request; dropping it closes the connection.
pub fn open_db_read_only(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("open sqlite db read-only {}", path.display()))
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS play_by_play (
            season INTEGER NOT NULL,
            passer TEXT NULL,
            rusher TEXT NULL,
            epa REAL NULL,
            interception INTEGER NULL,
            sack INTEGER NULL,
            qb_scramble INTEGER NULL,
            rush INTEGER NULL,
            air_yards REAL NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pbp_season ON play_by_play(season);
        CREATE INDEX IF NOT EXISTS idx_pbp_passer ON play_by_play(season, passer);
        CREATE INDEX IF NOT EXISTS idx_pbp_rusher ON play_by_play(season, rusher);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

const SELECT_PLAYS: &str = "SELECT season, passer, rusher, epa, interception, sack, qb_scramble, rush, air_yards FROM play_by_play";

/// Plays of `season` involving `participant` as passer or rusher, in storage order.
/// [`AVERAGE`] selects the whole season. No match is an empty vec, not an error.
pub fn fetch_plays(conn: &Connection, participant: &str, season: i32) -> Result<Vec<Play>> {
    let mut out = Vec::new();
    if participant == AVERAGE {
        let mut stmt = conn
            .prepare(&format!("{SELECT_PLAYS} WHERE season = ?1"))
            .context("prepare season plays query")?;
        let rows = stmt
            .query_map(params![season], decode_play)
            .context("query season plays")?;
        for row in rows {
            out.push(row.context("decode play row")?);
        }
    } else {
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_PLAYS} WHERE season = ?1 AND (passer = ?2 OR rusher = ?2)"
            ))
            .context("prepare participant plays query")?;
        let rows = stmt
            .query_map(params![season, participant], decode_play)
            .context("query participant plays")?;
        for row in rows {
            out.push(row.context("decode play row")?);
        }
    }
    log::debug!(
        "fetched {} plays for {participant} in {season}",
        out.len()
    );
    Ok(out)
}

pub fn count_season_plays(conn: &Connection, season: i32) -> Result<usize> {
    let n = conn
        .query_row(
            "SELECT COUNT(*) FROM play_by_play WHERE season = ?1",
            params![season],
            |row| row.get::<_, i64>(0),
        )
        .context("count season plays")?;
    Ok(usize::try_from(n).unwrap_or_default())
}

pub fn seasons(conn: &Connection) -> Result<Vec<i32>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT season FROM play_by_play ORDER BY season ASC")
        .context("prepare seasons query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, i32>(0))
        .context("query seasons")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode season")?);
    }
    Ok(out)
}

/// Passers credited with at least `min_plays` plays in `season`, sorted by name.
pub fn passers_in_season(conn: &Connection, season: i32, min_plays: u32) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT passer
            FROM play_by_play
            WHERE season = ?1 AND passer IS NOT NULL AND passer != ''
            GROUP BY passer
            HAVING COUNT(*) >= ?2
            ORDER BY passer ASC
            "#,
        )
        .context("prepare passers query")?;
    let rows = stmt
        .query_map(params![season, min_plays as i64], |row| row.get::<_, String>(0))
        .context("query passers")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode passer")?);
    }
    Ok(out)
}

/// Replaces every stored play of `season` with `plays` in one transaction.
pub fn replace_season(conn: &mut Connection, season: i32, plays: &[Play]) -> Result<usize> {
    let tx = conn.transaction().context("begin season transaction")?;
    tx.execute("DELETE FROM play_by_play WHERE season = ?1", params![season])
        .context("clear season plays")?;
    let inserted = insert_plays(&tx, plays)?;
    tx.commit().context("commit season transaction")?;
    Ok(inserted)
}

pub fn insert_plays(conn: &Connection, plays: &[Play]) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            r#"
            INSERT INTO play_by_play (
                season, passer, rusher, epa,
                interception, sack, qb_scramble, rush, air_yards
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .context("prepare play insert")?;
    for p in plays {
        stmt.execute(params![
            p.season,
            p.passer,
            p.rusher,
            p.epa,
            bool_to_i64(p.interception),
            bool_to_i64(p.sack),
            bool_to_i64(p.qb_scramble),
            bool_to_i64(p.rush),
            p.air_yards,
        ])
        .context("insert play")?;
    }
    Ok(plays.len())
}

fn decode_play(row: &Row<'_>) -> rusqlite::Result<Play> {
    Ok(Play {
        season: row.get(0)?,
        passer: non_empty_text(row, 1)?,
        rusher: non_empty_text(row, 2)?,
        epa: real(row, 3)?,
        interception: flag(row, 4)?,
        sack: flag(row, 5)?,
        qb_scramble: flag(row, 6)?,
        rush: flag(row, 7)?,
        air_yards: real(row, 8)?,
    })
}

// Exports from dataframes store 0/1 flags as either INTEGER or REAL.
fn flag(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(v) => v == 1,
        ValueRef::Real(v) => v == 1.0,
        ValueRef::Text(raw) => std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .is_some_and(|v| v == 1.0),
        ValueRef::Null | ValueRef::Blob(_) => false,
    })
}

fn real(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<f64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(v) => Some(v as f64),
        ValueRef::Real(v) if v.is_finite() => Some(v),
        ValueRef::Text(raw) => std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite()),
        _ => None,
    })
}

fn non_empty_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    let value = row.get::<_, Option<String>>(idx)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
